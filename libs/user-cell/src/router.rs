// libs/user-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_user;

use crate::handlers;

pub fn user_routes(state: Arc<AppConfig>) -> Router {
    // Signup/login, doctor browsing, posts and the payment webhook carry no
    // bearer credential; the webhook authenticates via its signature header.
    let public_routes = Router::new()
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route("/get-doctors", get(handlers::get_doctors))
        .route("/get-doctors/{filter}", get(handlers::filter_doctors))
        .route("/doctor-profile/{doc_id}", get(handlers::doctor_profile))
        .route("/posts", get(handlers::get_posts))
        .route("/checkout/webhook", post(handlers::stripe_webhook));

    let protected_routes = Router::new()
        .route("/profile", get(handlers::get_profile))
        .route("/update-profile", post(handlers::update_profile))
        .route("/book-appointment", post(handlers::book_appointment))
        .route("/get-appointments", get(handlers::get_appointments))
        .route("/get-appointment", post(handlers::get_appointment))
        .route("/cancel-appointment", post(handlers::cancel_appointment))
        .route(
            "/reschedule-appointment",
            post(handlers::reschedule_appointment),
        )
        .route("/delete-appointment", post(handlers::delete_appointment))
        .route("/stripe-checkout", post(handlers::stripe_checkout))
        .route("/paystack-checkout", post(handlers::paystack_checkout))
        .route(
            "/verify-paystack-payment/{reference}",
            get(handlers::verify_paystack_payment),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_user));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
