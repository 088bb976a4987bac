use axum::{
    extract::{Path, State},
    Extension,
};

use crate::auth::AuthUser;
use crate::database::models::{Business, BusinessCleaner, RosterEntry};
use crate::middleware::{ApiJson, ApiResponse, ApiResult, Message};
use crate::services::roster_service::{CleanerInvite, InviteCleaner};
use crate::services::AppState;

/// POST /business/cleaners - invite by email; reuses an existing CLEANER account
pub async fn cleaner_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<InviteCleaner>,
) -> ApiResult<CleanerInvite> {
    Ok(ApiResponse::created(state.roster.invite(&user, body).await?))
}

/// GET /business/cleaners - roster with each cleaner's profile
pub async fn cleaner_list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<RosterEntry>> {
    Ok(ApiResponse::success(state.roster.list(&user).await?))
}

/// GET /business/cleaners/my-business - `null` data when the cleaner has no active link
pub async fn my_business_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Option<Business>> {
    Ok(ApiResponse::success(state.roster.my_business(&user).await?))
}

pub async fn deactivate_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(cleaner_id): Path<String>,
) -> ApiResult<BusinessCleaner> {
    Ok(ApiResponse::success(state.roster.deactivate(&user, &cleaner_id).await?))
}

pub async fn activate_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(cleaner_id): Path<String>,
) -> ApiResult<BusinessCleaner> {
    Ok(ApiResponse::success(state.roster.activate(&user, &cleaner_id).await?))
}

pub async fn cleaner_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(cleaner_id): Path<String>,
) -> ApiResult<Message> {
    state.roster.remove(&user, &cleaner_id).await?;
    Ok(ApiResponse::message("Cleaner removed"))
}
