// libs/admin-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart, Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use appointment_cell::models::BookingError;
use appointment_cell::services::lifecycle::AppointmentLifecycleService;
use shared_config::AppConfig;
use shared_database::DocumentClient;
use shared_models::auth::{AuthIdentity, Role};
use shared_models::error::AppError;
use shared_storage::MediaClient;
use shared_utils::jwt::issue_token;
use shared_utils::multipart::collect_form;
use shared_utils::password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
use shared_utils::validation::validate_email;

use crate::models::{LoginRequest, SignupRequest};

const ADMINS: &str = "admins";
const DOCTORS: &str = "doctors";
const USERS: &str = "users";
const EVENTS: &str = "events";

fn map_booking_error(e: BookingError) -> AppError {
    match e {
        BookingError::Database(msg) => AppError::Database(msg),
        other => AppError::BadRequest(other.to_string()),
    }
}

fn strip_secrets(mut doc: Value) -> Value {
    if let Some(map) = doc.as_object_mut() {
        map.remove("password");
        map.remove("admin_key");
    }
    doc
}

// ==============================================================================
// ACCOUNT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn signup(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<Value>, AppError> {
    if request.name.is_empty()
        || request.email.is_empty()
        || request.password.is_empty()
        || request.admin_key.is_empty()
    {
        return Err(AppError::ValidationError(
            "All fields are required!".to_string(),
        ));
    }
    if !validate_email(&request.email) {
        return Err(AppError::ValidationError("Enter a valid email".to_string()));
    }
    if request.password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::ValidationError(
            "Enter a stronger password".to_string(),
        ));
    }
    if request.admin_key != state.admin_signup_key {
        return Err(AppError::Auth(
            "Unauthorized, invalid admin key!".to_string(),
        ));
    }

    let db = DocumentClient::new(&state);

    let existing = db
        .find_one(ADMINS, json!({ "email": request.email }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    if existing.is_some() {
        return Err(AppError::BadRequest("Admin already exist!".to_string()));
    }

    let hashed_password =
        hash_password(&request.password).map_err(|e| AppError::Internal(e.to_string()))?;
    let hashed_admin_key =
        hash_password(&request.admin_key).map_err(|e| AppError::Internal(e.to_string()))?;

    let now = Utc::now();
    let admin_id = Uuid::new_v4().to_string();
    let admin = json!({
        "_id": admin_id,
        "name": request.name,
        "email": request.email,
        "password": hashed_password,
        "admin_key": hashed_admin_key,
        "created_at": now,
        "updated_at": now,
    });

    db.insert_one(ADMINS, admin.clone())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let token =
        issue_token(&admin_id, Role::Admin, &state.jwt_secret).map_err(AppError::Internal)?;

    info!("Admin {} signed up", admin_id);
    Ok(Json(json!({
        "success": true,
        "message": "Admin successfully added",
        "admin": strip_secrets(admin),
        "token": token
    })))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);

    let admin = db
        .find_one(ADMINS, json!({ "email": request.email }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::Auth("Invalid Credentials!".to_string()))?;

    let password_ok = verify_password(
        &request.password,
        admin["password"].as_str().unwrap_or_default(),
    )
    .map_err(|e| AppError::Internal(e.to_string()))?;
    let admin_key_ok = verify_password(
        &request.admin_key,
        admin["admin_key"].as_str().unwrap_or_default(),
    )
    .map_err(|e| AppError::Internal(e.to_string()))?;

    if !password_ok || !admin_key_ok {
        return Err(AppError::Auth("Invalid Credentials!".to_string()));
    }

    let admin_id = admin["_id"].as_str().unwrap_or_default().to_string();
    let token =
        issue_token(&admin_id, Role::Admin, &state.jwt_secret).map_err(AppError::Internal)?;

    info!("Admin {} logged in", admin_id);
    Ok(Json(json!({
        "success": true,
        "message": "Admin logged in successfully",
        "admin": strip_secrets(admin),
        "token": token
    })))
}

#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);

    let admin = db
        .find_one(ADMINS, json!({ "_id": identity.id }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Admin not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Admin fetched successfully",
        "admin": strip_secrets(admin)
    })))
}

// ==============================================================================
// DOCTOR MANAGEMENT
// ==============================================================================

/// Register a practitioner. The doctor document starts available with an
/// empty slot ledger; only the booking lifecycle writes the ledger after
/// this point.
#[axum::debug_handler]
pub async fn add_doctor(
    State(state): State<Arc<AppConfig>>,
    Extension(_identity): Extension<AuthIdentity>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = collect_form(&mut multipart).await?;

    let name = form.require("name")?.to_string();
    let email = form.require("email")?.to_string();
    let password = form.require("password")?.to_string();
    let specialty = form.require("specialty")?.to_string();
    let degree = form.require("degree")?.to_string();
    let experience = form.require("experience")?.to_string();
    let about = form.require("about")?.to_string();
    let fees: i64 = form
        .require("fees")?
        .parse()
        .map_err(|_| AppError::ValidationError("Invalid fees".to_string()))?;
    let address: Value = serde_json::from_str(form.require("address")?)
        .map_err(|_| AppError::ValidationError("Invalid address".to_string()))?;

    if !validate_email(&email) {
        return Err(AppError::ValidationError("Enter a valid email".to_string()));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::ValidationError(
            "Enter a stronger password".to_string(),
        ));
    }

    let db = DocumentClient::new(&state);

    let existing = db
        .find_one(DOCTORS, json!({ "email": email }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    if existing.is_some() {
        return Err(AppError::BadRequest("Doctor already exist!".to_string()));
    }

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

    let hashed = hash_password(&password).map_err(|e| AppError::Internal(e.to_string()))?;

    let now = Utc::now();
    let doctor = json!({
        "_id": Uuid::new_v4().to_string(),
        "name": name,
        "email": email,
        "password": hashed,
        "specialty": specialty,
        "degree": degree,
        "experience": experience,
        "about": about,
        "fees": fees,
        "address": address,
        "image": image_url,
        "available": true,
        "slots_booked": {},
        "created_at": now,
        "updated_at": now,
    });

    db.insert_one(DOCTORS, doctor.clone())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    info!("Doctor {} added", doctor["_id"]);
    Ok(Json(json!({
        "success": true,
        "message": "Doctor added",
        "doctor": strip_secrets(doctor)
    })))
}

#[axum::debug_handler]
pub async fn get_doctors(
    State(state): State<Arc<AppConfig>>,
    Extension(_identity): Extension<AuthIdentity>,
) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);

    let doctors = db
        .find(DOCTORS, json!({}), Some(json!({ "name": 1 })), None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let doctors: Vec<Value> = doctors.into_iter().map(strip_secrets).collect();

    Ok(Json(json!({
        "success": true,
        "message": "Doctors fetched",
        "doctors": doctors
    })))
}

// ==============================================================================
// APPOINTMENTS / DASHBOARD
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(_identity): Extension<AuthIdentity>,
) -> Result<Json<Value>, AppError> {
    let lifecycle = AppointmentLifecycleService::new(&state);

    let appointments = lifecycle.list_all().await.map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointments fetched",
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn dashboard_data(
    State(state): State<Arc<AppConfig>>,
    Extension(_identity): Extension<AuthIdentity>,
) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);
    let lifecycle = AppointmentLifecycleService::new(&state);

    let doctors = db
        .find(DOCTORS, json!({}), None, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let users = db
        .find(USERS, json!({}), None, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let appointments = lifecycle.list_all().await.map_err(map_booking_error)?;

    let latest_appointments: Vec<_> = appointments.iter().take(5).collect();

    Ok(Json(json!({
        "success": true,
        "message": "Dashboard data fetched",
        "dashboard": {
            "doctors": doctors.len(),
            "patients": users.len(),
            "appointments": appointments.len(),
            "latest_appointments": latest_appointments,
        }
    })))
}

// ==============================================================================
// EVENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn add_event(
    State(state): State<Arc<AppConfig>>,
    Extension(_identity): Extension<AuthIdentity>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = collect_form(&mut multipart).await?;

    let title = form.require("title")?.to_string();
    let description = form.require("description")?.to_string();
    let date = form.require("date")?.to_string();

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
    let event = json!({
        "_id": Uuid::new_v4().to_string(),
        "title": title,
        "description": description,
        "date": date,
        "image": image_url,
        "created_at": now,
        "updated_at": now,
    });

    let db = DocumentClient::new(&state);
    db.insert_one(EVENTS, event.clone())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Event added",
        "event": event
    })))
}

#[axum::debug_handler]
pub async fn get_events(State(state): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);

    let events = db
        .find(EVENTS, json!({}), Some(json!({ "created_at": -1 })), None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Events fetched",
        "events": events
    })))
}

#[axum::debug_handler]
pub async fn get_event(
    State(state): State<Arc<AppConfig>>,
    Path(event_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);

    let event = db
        .find_one(EVENTS, json!({ "_id": event_id }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Event fetched",
        "event": event
    })))
}

#[axum::debug_handler]
pub async fn edit_event(
    State(state): State<Arc<AppConfig>>,
    Extension(_identity): Extension<AuthIdentity>,
    Path(event_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = collect_form(&mut multipart).await?;

    let mut set = serde_json::Map::new();
    if let Some(title) = form.field("title") {
        set.insert("title".to_string(), json!(title));
    }
    if let Some(description) = form.field("description") {
        set.insert("description".to_string(), json!(description));
    }
    if let Some(date) = form.field("date") {
        set.insert("date".to_string(), json!(date));
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
            EVENTS,
            json!({ "_id": event_id }),
            json!({ "$set": Value::Object(set) }),
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    if result.matched_count == 0 {
        return Err(AppError::NotFound("Event not found".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Event updated"
    })))
}

#[axum::debug_handler]
pub async fn delete_event(
    State(state): State<Arc<AppConfig>>,
    Extension(_identity): Extension<AuthIdentity>,
    Path(event_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);

    let deleted = db
        .delete_one(EVENTS, json!({ "_id": event_id }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    if deleted == 0 {
        return Err(AppError::NotFound("Event not found".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Event deleted"
    })))
}
