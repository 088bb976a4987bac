use axum::{extract::State, Extension};
use chrono::Utc;

use crate::auth::AuthUser;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::dashboard_service::DashboardStats;
use crate::services::AppState;

/// GET /dashboard/stats - shape depends on the caller's role
pub async fn stats_get(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<DashboardStats> {
    Ok(ApiResponse::success(state.dashboard.stats(&user, Utc::now()).await?))
}
