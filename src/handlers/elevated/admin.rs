use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::Utc;

use crate::auth::AuthUser;
use crate::middleware::{ApiQuery, ApiResponse, ApiResult};
use crate::services::admin_service::{BusinessOverview, BusinessPage, PlatformStats, UserPage};
use crate::services::{AppState, PageQuery};

/// GET /admin/stats
pub async fn stats_get(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<PlatformStats> {
    Ok(ApiResponse::success(state.admin.stats(&user, Utc::now()).await?))
}

/// GET /admin/businesses?page&limit
pub async fn businesses_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<BusinessPage> {
    Ok(ApiResponse::success(state.admin.businesses(&user, query).await?))
}

pub async fn business_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(business_id): Path<String>,
) -> ApiResult<BusinessOverview> {
    Ok(ApiResponse::success(state.admin.business(&user, &business_id, Utc::now()).await?))
}

/// GET /admin/users?page&limit
pub async fn users_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<UserPage> {
    Ok(ApiResponse::success(state.admin.users(&user, query).await?))
}
