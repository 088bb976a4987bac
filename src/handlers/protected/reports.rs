use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::Utc;

use crate::auth::AuthUser;
use crate::middleware::{ApiQuery, ApiResponse, ApiResult};
use crate::services::report_service::{BusinessReport, ClientReport, ReportQuery};
use crate::services::AppState;

/// GET /reports/business?startDate&endDate - defaults to the last 30 days
pub async fn business_report_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> ApiResult<BusinessReport> {
    Ok(ApiResponse::success(state.reports.business_report(&user, query, Utc::now()).await?))
}

pub async fn client_report_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(client_id): Path<String>,
) -> ApiResult<ClientReport> {
    Ok(ApiResponse::success(state.reports.client_report(&user, &client_id).await?))
}
