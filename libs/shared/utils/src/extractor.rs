use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::auth::{AuthIdentity, Role};
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Shared body of the three role gates. The legacy clients send the raw
/// signed credential in a custom header (`token` / `dtoken` / `atoken`),
/// not an Authorization bearer.
async fn auth_role(
    config: Arc<AppConfig>,
    role: Role,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(role.header_name())
        .ok_or_else(|| AppError::Auth("Not authorized".to_string()))?;

    let token = header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid token header".to_string()))?;

    let identity =
        validate_token(token, &config.jwt_secret, role).map_err(AppError::Auth)?;

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Gate for `/api/user` routes; validates the `token` header.
pub async fn auth_user(
    State(config): State<Arc<AppConfig>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    auth_role(config, Role::User, request, next).await
}

/// Gate for `/api/doctor` routes; validates the `dtoken` header.
pub async fn auth_doctor(
    State(config): State<Arc<AppConfig>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    auth_role(config, Role::Doctor, request, next).await
}

/// Gate for `/api/admin` routes; validates the `atoken` header.
pub async fn auth_admin(
    State(config): State<Arc<AppConfig>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    auth_role(config, Role::Admin, request, next).await
}

/// Fetch the identity a gate injected into request extensions.
pub fn extract_identity<B>(request: &Request<B>) -> Result<AuthIdentity, AppError> {
    request
        .extensions()
        .get::<AuthIdentity>()
        .cloned()
        .ok_or_else(|| AppError::Auth("Identity not found in request extensions".to_string()))
}
