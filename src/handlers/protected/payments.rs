use axum::{extract::State, Extension};

use crate::auth::AuthUser;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::services::payment_service::{CheckoutRequest, CheckoutSession};
use crate::services::AppState;

/// POST /payments/create-checkout-session {planType: SOLO|SMALL_TEAM}
pub async fn checkout_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<CheckoutRequest>,
) -> ApiResult<CheckoutSession> {
    Ok(ApiResponse::success(state.payments.create_checkout_session(&user, body).await?))
}
