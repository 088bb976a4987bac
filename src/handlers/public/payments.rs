use axum::{body::Bytes, extract::State, http::HeaderMap};
use chrono::Utc;
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// POST /payments/webhook - authenticated by signature, not bearer token.
/// The raw body is needed for verification, so no JSON extractor here.
pub async fn webhook_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<Value> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
    let handled = state.payments.handle_webhook(&body, signature, Utc::now()).await?;
    Ok(ApiResponse::success(json!({ "received": true, "handled": handled })))
}
