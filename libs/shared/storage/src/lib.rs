use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::{multipart, Client};
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;

/// Client for the external image host. The platform only needs one
/// operation: hand over the bytes, get back a hosted URL.
pub struct MediaClient {
    client: Client,
    upload_url: String,
    upload_preset: String,
}

impl MediaClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            upload_url: config.media_upload_url.clone(),
            upload_preset: config.media_upload_preset.clone(),
        }
    }

    /// Upload an image and return its public URL. Fails when the host does
    /// not return a secure URL; callers decide whether that aborts the
    /// surrounding operation.
    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String> {
        if self.upload_url.is_empty() {
            return Err(anyhow!("Media host is not configured"));
        }

        debug!("Uploading image {} ({} bytes)", filename, bytes.len());

        let unique_name = format!("{}-{}", Uuid::new_v4(), filename);
        let part = multipart::Part::bytes(bytes)
            .file_name(unique_name)
            .mime_str(content_type)?;

        let form = multipart::Form::new()
            .text("upload_preset", self.upload_preset.clone())
            .part("file", part);

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Media host error ({}): {}", status, error_text);
            return Err(anyhow!("Media host error ({})", status));
        }

        let body: Value = response.json().await?;
        body["secure_url"]
            .as_str()
            .map(|url| url.to_string())
            .ok_or_else(|| anyhow!("Media host response had no secure_url"))
    }
}
