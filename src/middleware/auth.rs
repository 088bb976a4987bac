use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
    Extension,
};

use crate::auth::{bearer_token, policy, Action, AuthUser};
use crate::error::ApiError;
use crate::services::AppState;

/// Exchanges the bearer token for an `AuthUser` and attaches it to the request.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| ApiError::unauthorized("Invalid Authorization header format")))
        .transpose()?;
    let token = bearer_token(header)?;

    let user = state.auth.authenticate(token).await?;
    tracing::debug!(user_id = %user.id, role = user.role.as_str(), "Authenticated request");

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Elevated tier gate; runs after `auth_middleware`.
pub async fn admin_middleware(
    Extension(user): Extension<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Err(e) = policy::require(user.role, Action::ViewPlatformStats) {
        tracing::warn!(user_id = %user.id, "Non-admin request to admin route");
        return Err(e.into());
    }
    Ok(next.run(request).await)
}
