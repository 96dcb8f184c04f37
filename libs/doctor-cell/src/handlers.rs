// libs/doctor-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart, Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use appointment_cell::models::{AppointmentIdRequest, BookingError};
use appointment_cell::services::lifecycle::AppointmentLifecycleService;
use shared_config::AppConfig;
use shared_database::DocumentClient;
use shared_models::auth::{AuthIdentity, Role};
use shared_models::error::AppError;
use shared_storage::MediaClient;
use shared_utils::jwt::issue_token;
use shared_utils::multipart::collect_form;
use shared_utils::password::verify_password;

use crate::models::LoginRequest;

const DOCTORS: &str = "doctors";
const POSTS: &str = "posts";

fn map_booking_error(e: BookingError) -> AppError {
    match e {
        BookingError::SlotUnavailable => AppError::Conflict(e.to_string()),
        BookingError::DoctorNotFound
        | BookingError::UserNotFound
        | BookingError::AppointmentNotFound => AppError::NotFound(e.to_string()),
        BookingError::DoctorNotAvailable | BookingError::InvalidStatusTransition(_) => {
            AppError::BadRequest(e.to_string())
        }
        BookingError::Unauthorized => AppError::Auth(e.to_string()),
        BookingError::Database(msg) => AppError::Database(msg),
    }
}

fn strip_password(mut doc: Value) -> Value {
    if let Some(map) = doc.as_object_mut() {
        map.remove("password");
    }
    doc
}

// ==============================================================================
// ACCOUNT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);

    let doctor = db
        .find_one(DOCTORS, json!({ "email": request.email }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::Auth("Invalid Credentials!".to_string()))?;

    let stored_hash = doctor["password"].as_str().unwrap_or_default();
    let matched = verify_password(&request.password, stored_hash)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if !matched {
        return Err(AppError::Auth("Invalid Credentials!".to_string()));
    }

    let doc_id = doctor["_id"].as_str().unwrap_or_default().to_string();
    let token = issue_token(&doc_id, Role::Doctor, &state.jwt_secret).map_err(AppError::Internal)?;

    info!("Doctor {} logged in", doc_id);
    Ok(Json(json!({
        "success": true,
        "message": "Doctor logged in successfully",
        "doctor": strip_password(doctor),
        "token": token
    })))
}

#[axum::debug_handler]
pub async fn doctor_profile(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);

    let doctor = db
        .find_one(DOCTORS, json!({ "_id": identity.id }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Doctor not available".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Doctor fetched",
        "doctor": strip_password(doctor)
    })))
}

/// Profile self-service: about text, fee, address, availability flag, and
/// optionally a replacement photo. Only the fields present in the form are
/// touched.
#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = collect_form(&mut multipart).await?;

    let mut set = serde_json::Map::new();

    if let Some(about) = form.field("about") {
        set.insert("about".to_string(), json!(about));
    }
    if let Some(fees) = form.field("fees") {
        let fees: i64 = fees
            .parse()
            .map_err(|_| AppError::ValidationError("Invalid fees".to_string()))?;
        set.insert("fees".to_string(), json!(fees));
    }
    if let Some(address) = form.field("address") {
        let address: Value = serde_json::from_str(address)
            .map_err(|_| AppError::ValidationError("Invalid address".to_string()))?;
        set.insert("address".to_string(), json!(address));
    }
    if let Some(available) = form.field("available") {
        let available: bool = available
            .parse()
            .map_err(|_| AppError::ValidationError("Invalid availability flag".to_string()))?;
        set.insert("available".to_string(), json!(available));
    }
    if let Some(image) = form.image {
        let media = MediaClient::new(&state);
        let url = media
            .upload_image(image.bytes, &image.filename, &image.content_type)
            .await
            .map_err(|e| AppError::ExternalService(e.to_string()))?;
        set.insert("image".to_string(), json!(url));
    }

    if set.is_empty() {
        return Err(AppError::ValidationError("Data missing".to_string()));
    }
    set.insert("updated_at".to_string(), json!(Utc::now()));

    let db = DocumentClient::new(&state);
    let result = db
        .update_one(
            DOCTORS,
            json!({ "_id": identity.id }),
            json!({ "$set": Value::Object(set) }),
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    if result.matched_count == 0 {
        return Err(AppError::NotFound("Doctor not available".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Doctor profile updated"
    })))
}

// ==============================================================================
// POST HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn add_post(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = collect_form(&mut multipart).await?;

    let title = form.require("title")?.to_string();
    let content = form.require("content")?.to_string();

    let image_url = match form.image {
        Some(image) => {
            let media = MediaClient::new(&state);
            media
                .upload_image(image.bytes, &image.filename, &image.content_type)
                .await
                .map_err(|e| AppError::ExternalService(e.to_string()))?
        }
        None => String::new(),
    };

    let now = Utc::now();
    let post = json!({
        "_id": Uuid::new_v4().to_string(),
        "doc_id": identity.id,
        "title": title,
        "content": content,
        "image": image_url,
        "created_at": now,
        "updated_at": now,
    });

    let db = DocumentClient::new(&state);
    db.insert_one(POSTS, post.clone())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Post added",
        "post": post
    })))
}

#[axum::debug_handler]
pub async fn get_posts(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);

    let posts = db
        .find(
            POSTS,
            json!({ "doc_id": identity.id }),
            Some(json!({ "created_at": -1 })),
            None,
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Posts fetched",
        "posts": posts
    })))
}

#[axum::debug_handler]
pub async fn get_post(
    State(state): State<Arc<AppConfig>>,
    Path(post_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);

    let post = db
        .find_one(POSTS, json!({ "_id": post_id }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Post fetched",
        "post": post
    })))
}

#[axum::debug_handler]
pub async fn edit_post(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
    Path(post_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = collect_form(&mut multipart).await?;

    let mut set = serde_json::Map::new();
    if let Some(title) = form.field("title") {
        set.insert("title".to_string(), json!(title));
    }
    if let Some(content) = form.field("content") {
        set.insert("content".to_string(), json!(content));
    }
    if let Some(image) = form.image {
        let media = MediaClient::new(&state);
        let url = media
            .upload_image(image.bytes, &image.filename, &image.content_type)
            .await
            .map_err(|e| AppError::ExternalService(e.to_string()))?;
        set.insert("image".to_string(), json!(url));
    }

    if set.is_empty() {
        return Err(AppError::ValidationError("Data missing".to_string()));
    }
    set.insert("updated_at".to_string(), json!(Utc::now()));

    let db = DocumentClient::new(&state);
    // Ownership rides in the filter: a doctor can only edit their own post.
    let result = db
        .update_one(
            POSTS,
            json!({ "_id": post_id, "doc_id": identity.id }),
            json!({ "$set": Value::Object(set) }),
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    if result.matched_count == 0 {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Post updated"
    })))
}

#[axum::debug_handler]
pub async fn delete_post(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
    Path(post_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);

    let deleted = db
        .delete_one(POSTS, json!({ "_id": post_id, "doc_id": identity.id }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    if deleted == 0 {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Post deleted"
    })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
) -> Result<Json<Value>, AppError> {
    let lifecycle = AppointmentLifecycleService::new(&state);

    let appointments = lifecycle
        .list_for_doctor(&identity.id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointments fetched",
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
    Json(request): Json<AppointmentIdRequest>,
) -> Result<Json<Value>, AppError> {
    let lifecycle = AppointmentLifecycleService::new(&state);

    let appointment = lifecycle
        .complete(&identity.id, &request.appointment_id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment completed",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
    Json(request): Json<AppointmentIdRequest>,
) -> Result<Json<Value>, AppError> {
    let lifecycle = AppointmentLifecycleService::new(&state);

    let appointment = lifecycle
        .cancel_by_doctor(&identity.id, &request.appointment_id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn dashboard_data(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
) -> Result<Json<Value>, AppError> {
    let lifecycle = AppointmentLifecycleService::new(&state);

    let dashboard = lifecycle
        .dashboard(&identity.id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Dashboard data fetched",
        "dashboard": dashboard
    })))
}
