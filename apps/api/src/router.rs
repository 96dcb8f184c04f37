use std::sync::Arc;

use axum::{routing::get, Router};

use admin_cell::router::admin_routes;
use doctor_cell::router::doctor_routes;
use shared_config::AppConfig;
use user_cell::router::user_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/api/user", user_routes(state.clone()))
        .nest("/api/doctor", doctor_routes(state.clone()))
        .nest("/api/admin", admin_routes(state))
}
