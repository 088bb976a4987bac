use axum::extract::State;
use chrono::Utc;

use crate::database::models::User;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, Message};
use crate::services::auth_service::{ForgotPassword, Signup};
use crate::services::roster_service::AcceptInvitation;
use crate::services::AppState;

/// POST /auth/signup - create the identity and a local OWNER row
pub async fn signup_post(State(state): State<AppState>, ApiJson(body): ApiJson<Signup>) -> ApiResult<User> {
    Ok(ApiResponse::created(state.auth.signup(body).await?))
}

/// POST /auth/forgot-password - always answers with the same notice
pub async fn forgot_password_post(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ForgotPassword>,
) -> ApiResult<Message> {
    Ok(ApiResponse::message(state.auth.forgot_password(body).await?))
}

/// POST /auth/accept-invite - set the password chosen through an invitation link
pub async fn accept_invite_post(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AcceptInvitation>,
) -> ApiResult<Message> {
    state.roster.accept_invitation(body, Utc::now()).await?;
    Ok(ApiResponse::message("Password set. You can now sign in."))
}
