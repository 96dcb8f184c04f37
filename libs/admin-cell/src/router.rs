// libs/admin-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_admin;

use crate::handlers;

pub fn admin_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route("/events", get(handlers::get_events))
        .route("/event/{event_id}", get(handlers::get_event));

    let protected_routes = Router::new()
        .route("/profile", get(handlers::get_profile))
        .route("/add-doctor", post(handlers::add_doctor))
        .route("/doctors", get(handlers::get_doctors))
        .route("/appointments", get(handlers::get_appointments))
        .route("/dashboard-data", get(handlers::dashboard_data))
        .route("/add-event", post(handlers::add_event))
        .route("/edit-event/{event_id}", post(handlers::edit_event))
        .route("/delete-event/{event_id}", delete(handlers::delete_event))
        .layer(middleware::from_fn_with_state(state.clone(), auth_admin));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
