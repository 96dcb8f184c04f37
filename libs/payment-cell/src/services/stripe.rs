// libs/payment-cell/src/services/stripe.rs
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

use crate::models::CheckoutMetadata;

type HmacSha256 = Hmac<Sha256>;

/// Accepted clock drift between the gateway's signature timestamp and ours.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Webhook event as delivered by the checkout gateway. Only the event type
/// and the session object's metadata matter to reconciliation.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: Value,
}

impl WebhookEvent {
    pub fn checkout_metadata(&self) -> Option<CheckoutMetadata> {
        serde_json::from_value(self.data.object.get("metadata")?.clone()).ok()
    }
}

/// Hosted-checkout gateway client (Stripe-shaped). Sessions are created
/// with form-encoded requests; confirmations arrive on a signed webhook.
pub struct StripeClient {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
    webhook_secret: String,
}

impl StripeClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            base_url: config.stripe_api_url.clone(),
            secret_key: config.stripe_secret_key.clone(),
            webhook_secret: config.stripe_webhook_secret.clone(),
        }
    }

    /// Create a hosted checkout session and return its redirect URL. The
    /// correlation metadata rides along and comes back on the webhook.
    pub async fn create_checkout_session(
        &self,
        amount: i64,
        description: &str,
        metadata: &CheckoutMetadata,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String> {
        debug!("Creating checkout session for order {}", metadata.order_id);

        let amount_minor = (amount * 100).to_string();
        let params = [
            ("mode", "payment"),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
            ("line_items[0][quantity]", "1"),
            ("line_items[0][price_data][currency]", "usd"),
            ("line_items[0][price_data][unit_amount]", &amount_minor),
            (
                "line_items[0][price_data][product_data][name]",
                description,
            ),
            ("metadata[order_id]", &metadata.order_id),
            ("metadata[appointment_id]", &metadata.appointment_id),
        ];

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Checkout session error ({}): {}", status, error_text);
            return Err(anyhow!("Checkout session error ({})", status));
        }

        let body: Value = response.json().await?;
        body["url"]
            .as_str()
            .map(|url| url.to_string())
            .ok_or_else(|| anyhow!("Checkout session had no redirect url"))
    }

    /// Verify the webhook signature and only then parse the payload. The
    /// header format is `t=<unix ts>,v1=<hex hmac>`; the signed payload is
    /// `<ts>.<raw body>`. Nothing is parsed before the signature holds.
    pub fn construct_verified_event(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent> {
        let (timestamp, signature) = parse_signature_header(signature_header)?;

        let age = (Utc::now().timestamp() - timestamp).abs();
        if age > SIGNATURE_TOLERANCE_SECS {
            warn!("Webhook signature timestamp outside tolerance ({}s)", age);
            return Err(anyhow!("Webhook signature timestamp outside tolerance"));
        }

        let mut signed_payload = format!("{}.", timestamp).into_bytes();
        signed_payload.extend_from_slice(raw_body);

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| anyhow!("Failed to create HMAC"))?;
        mac.update(&signed_payload);

        let expected = hex::decode(&signature).map_err(|_| anyhow!("Invalid signature hex"))?;
        mac.verify_slice(&expected)
            .map_err(|_| anyhow!("Webhook signature mismatch"))?;

        let event: WebhookEvent = serde_json::from_slice(raw_body)?;
        Ok(event)
    }
}

fn parse_signature_header(header: &str) -> Result<(i64, String)> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signature = Some(value.to_string()),
            _ => {}
        }
    }

    match (timestamp, signature) {
        (Some(t), Some(v1)) => Ok((t, v1)),
        _ => Err(anyhow!("Malformed signature header")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_header_parses() {
        let (t, v1) = parse_signature_header("t=1700000000,v1=deadbeef").unwrap();
        assert_eq!(t, 1700000000);
        assert_eq!(v1, "deadbeef");
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(parse_signature_header("v1=deadbeef").is_err());
        assert!(parse_signature_header("").is_err());
        assert!(parse_signature_header("t=notanumber,v1=aa").is_err());
    }
}
