use std::collections::HashMap;

use axum::extract::multipart::{Multipart, MultipartError};

use shared_models::error::AppError;

/// An image file lifted out of a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

/// Text fields plus the optional `image` part of a multipart form. The
/// legacy clients always send the file under the `image` field name.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub image: Option<UploadedImage>,
}

impl FormData {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }

    pub fn require(&self, name: &str) -> Result<&str, AppError> {
        self.field(name)
            .ok_or_else(|| AppError::ValidationError("Data missing".to_string()))
    }
}

pub async fn collect_form(multipart: &mut Multipart) -> Result<FormData, AppError> {
    let mut form = FormData::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_field)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await.map_err(bad_field)?.to_vec();
            form.image = Some(UploadedImage {
                bytes,
                filename,
                content_type,
            });
        } else if !name.is_empty() {
            form.fields
                .insert(name, field.text().await.map_err(bad_field)?);
        }
    }

    Ok(form)
}

fn bad_field(e: MultipartError) -> AppError {
    AppError::BadRequest(e.to_string())
}
