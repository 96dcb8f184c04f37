use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::Role;

use crate::jwt::issue_token;

pub struct TestConfig {
    pub jwt_secret: String,
    pub data_api_url: String,
    pub data_api_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            data_api_url: "http://localhost:54320".to_string(),
            data_api_key: "test-data-api-key".to_string(),
        }
    }
}

impl TestConfig {
    /// Point the document-store client at a mock server.
    pub fn with_data_api_url(url: &str) -> Self {
        Self {
            data_api_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            data_api_url: self.data_api_url.clone(),
            data_api_key: self.data_api_key.clone(),
            data_source: "test-cluster".to_string(),
            database: "clinic-test".to_string(),
            jwt_secret: self.jwt_secret.clone(),
            admin_signup_key: "test-admin-key".to_string(),
            media_upload_url: String::new(),
            media_upload_preset: "clinic-uploads".to_string(),
            stripe_api_url: "http://localhost:54321".to_string(),
            stripe_secret_key: "sk_test_123".to_string(),
            stripe_webhook_secret: "whsec_test_123".to_string(),
            paystack_api_url: "http://localhost:54322".to_string(),
            paystack_secret_key: "psk_test_123".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }

    pub fn token_for(&self, subject: &str, role: Role) -> String {
        issue_token(subject, role, &self.jwt_secret).expect("test token")
    }
}

/// Canned document-store responses for wiremock setups.
pub struct MockDocuments;

impl MockDocuments {
    pub fn doctor(doc_id: &str, fees: i64, available: bool) -> serde_json::Value {
        json!({
            "_id": doc_id,
            "name": "Dr. Test",
            "email": "doctor@example.com",
            "password": "$argon2id$fake",
            "specialty": "General Practice",
            "degree": "MBBS",
            "experience": "8 years",
            "about": "Experienced general practitioner",
            "fees": fees,
            "address": { "line1": "1 Clinic Road", "line2": "" },
            "image": "https://media.example.com/doctors/test.png",
            "available": available,
            "slots_booked": {},
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn user(user_id: &str) -> serde_json::Value {
        json!({
            "_id": user_id,
            "name": "Test Patient",
            "email": "patient@example.com",
            "password": "$argon2id$fake",
            "phone": "0000000000",
            "address": { "line1": "", "line2": "" },
            "dob": "1990-01-01",
            "gender": "Other",
            "image": "https://media.example.com/users/default.png",
            "last_login": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment(
        appointment_id: &str,
        user_id: &str,
        doc_id: &str,
        slot_date: &str,
        slot_time: &str,
        amount: i64,
    ) -> serde_json::Value {
        json!({
            "_id": appointment_id,
            "user_id": user_id,
            "doc_id": doc_id,
            "slot_date": slot_date,
            "slot_time": slot_time,
            "amount": amount,
            "user_data": { "name": "Test Patient", "email": "patient@example.com" },
            "doc_data": { "name": "Dr. Test", "specialty": "General Practice", "fees": amount },
            "status": "booked",
            "paid": false,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn order(order_id: &str, appointment_id: &str, user_id: &str, amount: i64) -> serde_json::Value {
        json!({
            "_id": order_id,
            "appointment_id": appointment_id,
            "user_id": user_id,
            "user_data": { "name": "Test Patient", "email": "patient@example.com" },
            "appointment_data": { "slot_date": "2024-01-01", "slot_time": "10:00" },
            "status": "placed",
            "amount": amount,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn find_one(document: Option<serde_json::Value>) -> serde_json::Value {
        json!({ "document": document })
    }

    pub fn find(documents: Vec<serde_json::Value>) -> serde_json::Value {
        json!({ "documents": documents })
    }

    pub fn inserted(id: &str) -> serde_json::Value {
        json!({ "insertedId": id })
    }

    pub fn updated(matched: u64, modified: u64) -> serde_json::Value {
        json!({ "matchedCount": matched, "modifiedCount": modified })
    }

    pub fn deleted(count: u64) -> serde_json::Value {
        json!({ "deletedCount": count })
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Signed webhook payload helper for gateway tests: the scheme is
/// `t=<ts>,v1=<hex hmac-sha256(ts + "." + body)>`.
pub fn sign_webhook_payload(body: &str, secret: &str, age: Duration) -> (String, String) {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let timestamp = (Utc::now() - age).timestamp();
    let signed_payload = format!("{}.{}", timestamp, body);

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take any key size");
    mac.update(signed_payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    (body.to_string(), format!("t={},v1={}", timestamp, signature))
}
