use axum::{extract::State, Extension};
use chrono::Utc;

use crate::auth::AuthUser;
use crate::database::models::Subscription;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::services::subscription_service::{SubscriptionView, UpdatePlan, UsageReport};
use crate::services::AppState;

/// GET /subscriptions - a FREE row is created on first read
pub async fn subscription_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<SubscriptionView> {
    Ok(ApiResponse::success(state.subscriptions.get(&user).await?))
}

pub async fn usage_get(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<UsageReport> {
    Ok(ApiResponse::success(state.subscriptions.usage(&user, Utc::now()).await?))
}

pub async fn plan_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<UpdatePlan>,
) -> ApiResult<Subscription> {
    Ok(ApiResponse::success(state.subscriptions.update_plan(&user, body).await?))
}

pub async fn cancel_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Subscription> {
    Ok(ApiResponse::success(state.subscriptions.cancel(&user).await?))
}
