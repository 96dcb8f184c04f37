// libs/payment-cell/src/services/reconciliation.rs
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use appointment_cell::models::Appointment;
use appointment_cell::services::lifecycle::AppointmentLifecycleService;
use shared_config::AppConfig;
use shared_database::DocumentClient;

use crate::models::{CheckoutMetadata, Order, OrderStatus, PaymentError};
use crate::services::paystack::PaystackClient;
use crate::services::stripe::StripeClient;

const ORDERS: &str = "orders";
const USERS: &str = "users";

/// Event type that settles a checkout session; every other webhook event
/// type is accepted and ignored.
const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Creates pending orders, hands off to a gateway, and applies confirmed
/// payments to both the order and its appointment. Confirmation is
/// idempotent: the order flip is conditioned on `Placed`, and the
/// appointment paid flag is a plain set.
pub struct PaymentService {
    db: Arc<DocumentClient>,
    lifecycle: AppointmentLifecycleService,
    stripe: StripeClient,
    paystack: PaystackClient,
    frontend_url: String,
}

impl PaymentService {
    pub fn new(config: &AppConfig) -> Self {
        let db = Arc::new(DocumentClient::new(config));
        Self {
            lifecycle: AppointmentLifecycleService::with_client(Arc::clone(&db)),
            stripe: StripeClient::new(config),
            paystack: PaystackClient::new(config),
            frontend_url: config.frontend_url.clone(),
            db,
        }
    }

    /// Card-checkout path (gateway 1): place an order, create a hosted
    /// session, return the redirect target. No redirect target means no
    /// order: the placed order is removed again before the error surfaces.
    pub async fn stripe_checkout(
        &self,
        user_id: &str,
        appointment_id: &str,
    ) -> Result<String, PaymentError> {
        let (order, appointment) = self.place_order(user_id, appointment_id).await?;

        let description = appointment
            .doc_data
            .get("name")
            .and_then(|n| n.as_str())
            .map(|name| format!("Appointment with {}", name))
            .unwrap_or_else(|| "Clinic appointment".to_string());

        let metadata = CheckoutMetadata {
            order_id: order.id.clone(),
            appointment_id: appointment.id.clone(),
        };

        let session = self
            .stripe
            .create_checkout_session(
                order.amount,
                &description,
                &metadata,
                &format!("{}/payment-success", self.frontend_url),
                &format!("{}/payment-cancelled", self.frontend_url),
            )
            .await;

        match session {
            Ok(url) => Ok(url),
            Err(e) => {
                self.handle_initiate_failure(&order.id, &e).await;
                Err(PaymentError::Gateway(e.to_string()))
            }
        }
    }

    /// Signed-webhook confirmation for gateway 1. The signature is checked
    /// before the payload is parsed or any record touched; unrecognized
    /// event types are a deliberate no-op.
    pub async fn handle_stripe_webhook(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<(), PaymentError> {
        let event = self
            .stripe
            .construct_verified_event(raw_body, signature_header)
            .map_err(|e| {
                warn!("Webhook rejected: {}", e);
                PaymentError::InvalidSignature
            })?;

        if event.event_type != CHECKOUT_COMPLETED {
            debug!("Ignoring webhook event type {}", event.event_type);
            return Ok(());
        }

        let metadata = event
            .checkout_metadata()
            .ok_or(PaymentError::OrderNotFound)?;

        self.confirm(&metadata).await
    }

    /// Hosted-page path (gateway 2): same order placement, different
    /// gateway handshake.
    pub async fn paystack_checkout(
        &self,
        user_id: &str,
        appointment_id: &str,
    ) -> Result<String, PaymentError> {
        let (order, appointment) = self.place_order(user_id, appointment_id).await?;

        let email = order
            .user_data
            .get("email")
            .and_then(|e| e.as_str())
            .unwrap_or_default()
            .to_string();

        let metadata = CheckoutMetadata {
            order_id: order.id.clone(),
            appointment_id: appointment.id.clone(),
        };

        let checkout = self
            .paystack
            .initialize_transaction(
                &email,
                order.amount,
                &metadata,
                &format!("{}/payment-success", self.frontend_url),
            )
            .await;

        match checkout {
            Ok(checkout) => Ok(checkout.authorization_url),
            Err(e) => {
                self.handle_initiate_failure(&order.id, &e).await;
                Err(PaymentError::Gateway(e.to_string()))
            }
        }
    }

    /// Client-polled confirmation for gateway 2. Returns whether the
    /// transaction has settled; a settled transaction is applied at most
    /// once.
    pub async fn verify_paystack(&self, reference: &str) -> Result<bool, PaymentError> {
        let verification = self
            .paystack
            .verify_transaction(reference)
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        if !verification.success {
            return Ok(false);
        }

        let metadata = verification.metadata.ok_or(PaymentError::OrderNotFound)?;
        self.confirm(&metadata).await?;
        Ok(true)
    }

    /// Apply a confirmed payment. Both records must exist; replays are
    /// detected by the conditional order flip and change nothing further.
    async fn confirm(&self, metadata: &CheckoutMetadata) -> Result<(), PaymentError> {
        let order: Order = self
            .db
            .find_one_as(ORDERS, json!({ "_id": metadata.order_id }))
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?
            .ok_or(PaymentError::OrderNotFound)?;

        // Appointment must still exist before any state is touched.
        self.lifecycle
            .get(&metadata.appointment_id)
            .await
            .map_err(|_| PaymentError::AppointmentNotFound)?;

        let result = self
            .db
            .update_one(
                ORDERS,
                json!({ "_id": order.id, "status": OrderStatus::Placed }),
                json!({ "$set": { "status": OrderStatus::Paid, "updated_at": Utc::now() } }),
            )
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?;

        if result.matched_count == 0 {
            debug!("Order {} already settled, replay ignored", order.id);
            return Ok(());
        }

        self.lifecycle
            .mark_paid(&metadata.appointment_id)
            .await
            .map_err(|e| match e {
                appointment_cell::models::BookingError::AppointmentNotFound => {
                    PaymentError::AppointmentNotFound
                }
                other => PaymentError::Database(other.to_string()),
            })?;

        info!(
            "Payment confirmed for order {} / appointment {}",
            order.id, metadata.appointment_id
        );
        Ok(())
    }

    async fn place_order(
        &self,
        user_id: &str,
        appointment_id: &str,
    ) -> Result<(Order, Appointment), PaymentError> {
        let mut user = self
            .db
            .find_one(USERS, json!({ "_id": user_id }))
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?
            .ok_or(PaymentError::UserNotFound)?;

        if let Some(map) = user.as_object_mut() {
            map.remove("password");
        }

        let appointment = self
            .lifecycle
            .get(appointment_id)
            .await
            .map_err(|_| PaymentError::AppointmentNotFound)?;

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4().to_string(),
            appointment_id: appointment.id.clone(),
            user_id: user_id.to_string(),
            user_data: user,
            appointment_data: serde_json::to_value(&appointment)
                .map_err(|e| PaymentError::Database(e.to_string()))?,
            status: OrderStatus::Placed,
            amount: appointment.amount,
            created_at: now,
            updated_at: now,
        };

        let document =
            serde_json::to_value(&order).map_err(|e| PaymentError::Database(e.to_string()))?;

        self.db
            .insert_one(ORDERS, document)
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?;

        debug!(
            "Order {} placed for appointment {} ({})",
            order.id, order.appointment_id, order.amount
        );

        Ok((order, appointment))
    }

    /// A definite gateway failure means no dangling order. A timeout is
    /// different: the gateway may still have created the session, so the
    /// order stays placed and reconcilable by a later confirmation.
    async fn handle_initiate_failure(&self, order_id: &str, e: &anyhow::Error) {
        let timed_out = e
            .downcast_ref::<reqwest::Error>()
            .map(|re| re.is_timeout())
            .unwrap_or(false);

        if timed_out {
            warn!("Gateway timeout; order {} left placed: {}", order_id, e);
            return;
        }

        error!("Checkout initiation failed, removing order {}: {}", order_id, e);
        if let Err(e) = self.db.delete_one(ORDERS, json!({ "_id": order_id })).await {
            error!("Failed to remove order {}: {}", order_id, e);
        }
    }
}
