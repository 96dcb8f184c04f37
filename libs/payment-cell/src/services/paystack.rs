// libs/payment-cell/src/services/paystack.rs
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::CheckoutMetadata;

/// Verify-by-reference gateway client (Paystack-shaped). The client polls
/// `verify` with the transaction reference instead of receiving a webhook.
pub struct PaystackClient {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

#[derive(Debug, Clone)]
pub struct PaystackCheckout {
    pub authorization_url: String,
    pub reference: String,
}

#[derive(Debug, Clone)]
pub struct PaystackVerification {
    pub success: bool,
    pub metadata: Option<CheckoutMetadata>,
}

impl PaystackClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            base_url: config.paystack_api_url.clone(),
            secret_key: config.paystack_secret_key.clone(),
        }
    }

    /// Initialize a transaction; amounts are in the minor unit. Returns the
    /// hosted payment page URL plus the reference used to verify later.
    pub async fn initialize_transaction(
        &self,
        email: &str,
        amount: i64,
        metadata: &CheckoutMetadata,
        callback_url: &str,
    ) -> Result<PaystackCheckout> {
        debug!("Initializing transaction for order {}", metadata.order_id);

        let body = json!({
            "email": email,
            "amount": amount * 100,
            "callback_url": callback_url,
            "metadata": {
                "order_id": metadata.order_id,
                "appointment_id": metadata.appointment_id,
            }
        });

        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Transaction initialize error ({}): {}", status, error_text);
            return Err(anyhow!("Transaction initialize error ({})", status));
        }

        let body: Value = response.json().await?;
        let data = &body["data"];

        let authorization_url = data["authorization_url"]
            .as_str()
            .ok_or_else(|| anyhow!("Initialize response had no authorization url"))?
            .to_string();
        let reference = data["reference"]
            .as_str()
            .ok_or_else(|| anyhow!("Initialize response had no reference"))?
            .to_string();

        Ok(PaystackCheckout {
            authorization_url,
            reference,
        })
    }

    /// Verify a transaction by its reference. A non-success status is not
    /// an error here; the caller decides what an unpaid transaction means.
    pub async fn verify_transaction(&self, reference: &str) -> Result<PaystackVerification> {
        debug!("Verifying transaction {}", reference);

        let response = self
            .client
            .get(format!("{}/transaction/verify/{}", self.base_url, reference))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Transaction verify error ({}): {}", status, error_text);
            return Err(anyhow!("Transaction verify error ({})", status));
        }

        let body: Value = response.json().await?;
        let data = &body["data"];

        let success = data["status"].as_str() == Some("success");
        let metadata = data
            .get("metadata")
            .and_then(|m| serde_json::from_value(m.clone()).ok());

        Ok(PaystackVerification { success, metadata })
    }
}
