// libs/user-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Multipart, Path, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use appointment_cell::models::{
    AppointmentIdRequest, BookAppointmentRequest, BookingError, RescheduleAppointmentRequest,
};
use appointment_cell::services::lifecycle::AppointmentLifecycleService;
use payment_cell::models::{CheckoutRequest, PaymentError};
use payment_cell::services::reconciliation::PaymentService;
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

const USERS: &str = "users";
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

fn map_payment_error(e: PaymentError) -> AppError {
    match e {
        PaymentError::UserNotFound
        | PaymentError::AppointmentNotFound
        | PaymentError::OrderNotFound => AppError::NotFound(e.to_string()),
        PaymentError::InvalidSignature => AppError::BadRequest(e.to_string()),
        PaymentError::Gateway(msg) => AppError::ExternalService(msg),
        PaymentError::Database(msg) => AppError::Database(msg),
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
pub async fn signup(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<Value>, AppError> {
    if request.name.is_empty() || request.email.is_empty() || request.password.is_empty() {
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

    let db = DocumentClient::new(&state);

    let existing = db
        .find_one(USERS, json!({ "email": request.email }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    if existing.is_some() {
        return Err(AppError::BadRequest("User already exist!".to_string()));
    }

    let hashed = hash_password(&request.password)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let now = Utc::now();
    let user_id = Uuid::new_v4().to_string();
    let user = json!({
        "_id": user_id,
        "name": request.name,
        "email": request.email,
        "password": hashed,
        "phone": "",
        "address": { "line1": "", "line2": "" },
        "dob": "",
        "gender": "",
        "image": "",
        "last_login": null,
        "created_at": now,
        "updated_at": now,
    });

    db.insert_one(USERS, user.clone())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let token = issue_token(&user_id, Role::User, &state.jwt_secret).map_err(AppError::Internal)?;

    info!("User {} signed up", user_id);
    Ok(Json(json!({
        "success": true,
        "message": "User successfully created",
        "user": strip_password(user),
        "token": token
    })))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);

    let user = db
        .find_one(USERS, json!({ "email": request.email }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::Auth("Invalid Credentials!".to_string()))?;

    let stored_hash = user["password"].as_str().unwrap_or_default();
    let matched = verify_password(&request.password, stored_hash)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if !matched {
        return Err(AppError::Auth("Invalid Credentials!".to_string()));
    }

    let user_id = user["_id"].as_str().unwrap_or_default().to_string();

    db.update_one(
        USERS,
        json!({ "_id": user_id }),
        json!({ "$set": { "last_login": Utc::now() } }),
    )
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    let token = issue_token(&user_id, Role::User, &state.jwt_secret).map_err(AppError::Internal)?;

    info!("User {} logged in", user_id);
    Ok(Json(json!({
        "success": true,
        "message": "User logged in successfully",
        "data": strip_password(user),
        "token": token
    })))
}

#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);

    let user = db
        .find_one(USERS, json!({ "_id": identity.id }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "User fetched successfully",
        "user": strip_password(user)
    })))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = collect_form(&mut multipart).await?;

    let name = form.require("name")?;
    let phone = form.require("phone")?;
    let dob = form.require("dob")?;
    let gender = form.require("gender")?;
    let address: Value = serde_json::from_str(form.require("address")?)
        .map_err(|_| AppError::ValidationError("Invalid address".to_string()))?;

    let db = DocumentClient::new(&state);

    let mut set = json!({
        "name": name,
        "phone": phone,
        "address": address,
        "dob": dob,
        "gender": gender,
        "updated_at": Utc::now(),
    });

    if let Some(image) = form.image {
        let media = MediaClient::new(&state);
        let url = media
            .upload_image(image.bytes, &image.filename, &image.content_type)
            .await
            .map_err(|e| AppError::ExternalService(e.to_string()))?;
        set["image"] = json!(url);
    }

    let result = db
        .update_one(USERS, json!({ "_id": identity.id }), json!({ "$set": set }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    if result.matched_count == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "message": "User profile updated"
    })))
}

// ==============================================================================
// DOCTOR BROWSING / POSTS (public)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_doctors(State(state): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);

    let doctors = db
        .find(DOCTORS, json!({}), Some(json!({ "name": 1 })), None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let doctors: Vec<Value> = doctors.into_iter().map(strip_password).collect();

    Ok(Json(json!({
        "success": true,
        "message": "Doctors fetched",
        "doctors": doctors
    })))
}

#[axum::debug_handler]
pub async fn filter_doctors(
    State(state): State<Arc<AppConfig>>,
    Path(filter): Path<String>,
) -> Result<Json<Value>, AppError> {
    debug!("Filtering doctors by specialty {}", filter);
    let db = DocumentClient::new(&state);

    let doctors = db
        .find(
            DOCTORS,
            json!({ "specialty": filter }),
            Some(json!({ "name": 1 })),
            None,
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let doctors: Vec<Value> = doctors.into_iter().map(strip_password).collect();

    Ok(Json(json!({
        "success": true,
        "message": "Doctors fetched",
        "doctors": doctors
    })))
}

#[axum::debug_handler]
pub async fn doctor_profile(
    State(state): State<Arc<AppConfig>>,
    Path(doc_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);

    let doctor = db
        .find_one(DOCTORS, json!({ "_id": doc_id }))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Doctor not available".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Doctor fetched",
        "doctor": strip_password(doctor)
    })))
}

#[axum::debug_handler]
pub async fn get_posts(State(state): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let db = DocumentClient::new(&state);

    let posts = db
        .find(POSTS, json!({}), Some(json!({ "created_at": -1 })), None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Posts fetched",
        "posts": posts
    })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let lifecycle = AppointmentLifecycleService::new(&state);

    let appointment = lifecycle
        .book(&identity.id, request)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment booked",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
) -> Result<Json<Value>, AppError> {
    let lifecycle = AppointmentLifecycleService::new(&state);

    let appointments = lifecycle
        .list_for_user(&identity.id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointments fetched",
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
    Json(request): Json<AppointmentIdRequest>,
) -> Result<Json<Value>, AppError> {
    let lifecycle = AppointmentLifecycleService::new(&state);

    let appointment = lifecycle
        .get(&request.appointment_id)
        .await
        .map_err(map_booking_error)?;

    if appointment.user_id != identity.id {
        return Err(AppError::Auth(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Appointment fetched",
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
        .cancel(&identity.id, &request.appointment_id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let lifecycle = AppointmentLifecycleService::new(&state);

    let appointment = lifecycle
        .reschedule(
            &identity.id,
            &request.appointment_id,
            &request.slot_date,
            &request.slot_time,
        )
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment rescheduled",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
    Json(request): Json<AppointmentIdRequest>,
) -> Result<Json<Value>, AppError> {
    let lifecycle = AppointmentLifecycleService::new(&state);

    lifecycle
        .delete(&identity.id, &request.appointment_id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted"
    })))
}

// ==============================================================================
// PAYMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn stripe_checkout(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<Value>, AppError> {
    let payments = PaymentService::new(&state);

    let url = payments
        .stripe_checkout(&identity.id, &request.appointment_id)
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Checkout session created",
        "url": url
    })))
}

/// Webhook endpoint: no bearer credential; the signature header is the only
/// authentication and is checked before the payload is parsed.
#[axum::debug_handler]
pub async fn stripe_webhook(
    State(state): State<Arc<AppConfig>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing signature header".to_string()))?;

    let payments = PaymentService::new(&state);

    payments
        .handle_stripe_webhook(&body, signature)
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!({ "success": true, "message": "Received" })))
}

#[axum::debug_handler]
pub async fn paystack_checkout(
    State(state): State<Arc<AppConfig>>,
    Extension(identity): Extension<AuthIdentity>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<Value>, AppError> {
    let payments = PaymentService::new(&state);

    let url = payments
        .paystack_checkout(&identity.id, &request.appointment_id)
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Checkout session created",
        "url": url
    })))
}

#[axum::debug_handler]
pub async fn verify_paystack_payment(
    State(state): State<Arc<AppConfig>>,
    Path(reference): Path<String>,
) -> Result<Json<Value>, AppError> {
    let payments = PaymentService::new(&state);

    let paid = payments
        .verify_paystack(&reference)
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "message": if paid { "Payment confirmed" } else { "Payment not settled" },
        "paid": paid
    })))
}
