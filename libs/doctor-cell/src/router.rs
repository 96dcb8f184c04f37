// libs/doctor-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_doctor;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/login", post(handlers::login))
        .route("/post/{post_id}", get(handlers::get_post));

    let protected_routes = Router::new()
        .route("/doctor-profile", get(handlers::doctor_profile))
        .route("/update-profile", post(handlers::update_profile))
        .route("/add-post", post(handlers::add_post))
        .route("/posts", get(handlers::get_posts))
        .route("/edit-post/{post_id}", post(handlers::edit_post))
        .route("/delete-post/{post_id}", delete(handlers::delete_post))
        .route("/dashboard-data", get(handlers::dashboard_data))
        .route("/appointments", get(handlers::get_appointments))
        .route("/complete-appointment", post(handlers::complete_appointment))
        .route("/cancel-appointment", post(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_doctor));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
