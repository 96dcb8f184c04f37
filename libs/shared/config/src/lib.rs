use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_api_url: String,
    pub data_api_key: String,
    pub data_source: String,
    pub database: String,
    pub jwt_secret: String,
    pub admin_signup_key: String,
    pub media_upload_url: String,
    pub media_upload_preset: String,
    pub stripe_api_url: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub paystack_api_url: String,
    pub paystack_secret_key: String,
    pub frontend_url: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        if default.is_empty() {
            warn!("{} not set, using empty value", key);
        }
        default.to_string()
    })
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            data_api_url: env_or("DATA_API_URL", ""),
            data_api_key: env_or("DATA_API_KEY", ""),
            data_source: env_or("DATA_SOURCE", "clinic-cluster"),
            database: env_or("DATABASE_NAME", "clinic"),
            jwt_secret: env_or("JWT_SECRET", ""),
            admin_signup_key: env_or("ADMIN_KEY", ""),
            media_upload_url: env_or("MEDIA_UPLOAD_URL", ""),
            media_upload_preset: env_or("MEDIA_UPLOAD_PRESET", "clinic-uploads"),
            stripe_api_url: env_or("STRIPE_API_URL", "https://api.stripe.com"),
            stripe_secret_key: env_or("STRIPE_SECRET_KEY", ""),
            stripe_webhook_secret: env_or("STRIPE_WEBHOOK_SECRET", ""),
            paystack_api_url: env_or("PAYSTACK_API_URL", "https://api.paystack.co"),
            paystack_secret_key: env_or("PAYSTACK_SECRET_KEY", ""),
            frontend_url: env_or("FRONTEND_URL", "http://localhost:5173"),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.data_api_url.is_empty()
            && !self.data_api_key.is_empty()
            && !self.jwt_secret.is_empty()
    }

    pub fn is_payments_configured(&self) -> bool {
        !self.stripe_secret_key.is_empty() && !self.paystack_secret_key.is_empty()
    }

    pub fn is_media_configured(&self) -> bool {
        !self.media_upload_url.is_empty()
    }
}
