// libs/payment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One order per payment attempt. Snapshots are frozen at creation; the
/// status only ever moves `Placed -> Paid`, driven by a confirmed gateway
/// callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    pub appointment_id: String,
    pub user_id: String,
    pub user_data: serde_json::Value,
    pub appointment_data: serde_json::Value,
    pub status: OrderStatus,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Paid,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Placed => write!(f, "placed"),
            OrderStatus::Paid => write!(f, "paid"),
        }
    }
}

/// Correlation metadata round-tripped through both gateways. Opaque to the
/// gateway; it is how an asynchronous confirmation finds its way back to
/// the order and appointment it settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    pub order_id: String,
    pub appointment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub appointment_id: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PaymentError {
    #[error("User not found")]
    UserNotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(String),
}
