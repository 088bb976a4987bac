use axum::{extract::State, Extension};

use crate::auth::AuthUser;
use crate::database::models::Business;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::services::business_service::{CreateBusiness, UpdateBusiness, UpdateVat};
use crate::services::AppState;

/// GET /business - own business for owners, linked business for cleaners
pub async fn business_get(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Business> {
    Ok(ApiResponse::success(state.business.get(&user).await?))
}

/// POST /business - one per owner; also opens the FREE subscription
pub async fn business_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<CreateBusiness>,
) -> ApiResult<Business> {
    Ok(ApiResponse::created(state.business.create(&user, body).await?))
}

pub async fn business_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<UpdateBusiness>,
) -> ApiResult<Business> {
    Ok(ApiResponse::success(state.business.update(&user, body).await?))
}

/// PUT /business/vat - disabling VAT clears the stored number
pub async fn vat_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<UpdateVat>,
) -> ApiResult<Business> {
    Ok(ApiResponse::success(state.business.update_vat(&user, body).await?))
}
