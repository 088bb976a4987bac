use axum::{extract::State, Extension};

use crate::auth::AuthUser;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, Message};
use crate::services::auth_service::{ChangePassword, Profile, SetRole};
use crate::services::AppState;

/// GET /auth/me
pub async fn me_get(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Profile> {
    Ok(ApiResponse::success(state.auth.me(&user)))
}

/// POST /auth/set-role - OWNER or CLEANER only
pub async fn set_role_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<SetRole>,
) -> ApiResult<Profile> {
    Ok(ApiResponse::success(state.auth.set_role(&user, body).await?))
}

/// POST /auth/change-password
pub async fn change_password_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<ChangePassword>,
) -> ApiResult<Message> {
    state.auth.change_password(&user, body).await?;
    Ok(ApiResponse::message("Password updated"))
}
