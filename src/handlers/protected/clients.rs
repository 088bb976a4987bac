use axum::{
    extract::{Path, State},
    Extension,
};

use crate::auth::AuthUser;
use crate::database::models::Client;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, Message};
use crate::services::client_service::{ClientJob, CreateClient, UpdateClient};
use crate::services::AppState;

pub async fn client_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<CreateClient>,
) -> ApiResult<Client> {
    Ok(ApiResponse::created(state.clients.create(&user, body).await?))
}

pub async fn client_list(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Vec<Client>> {
    Ok(ApiResponse::success(state.clients.list(&user).await?))
}

pub async fn client_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(client_id): Path<String>,
) -> ApiResult<Client> {
    Ok(ApiResponse::success(state.clients.get(&user, &client_id).await?))
}

pub async fn client_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(client_id): Path<String>,
    ApiJson(body): ApiJson<UpdateClient>,
) -> ApiResult<Client> {
    Ok(ApiResponse::success(state.clients.update(&user, &client_id, body).await?))
}

/// DELETE /clients/:id - the client's jobs and invoices go with it
pub async fn client_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(client_id): Path<String>,
) -> ApiResult<Message> {
    state.clients.delete(&user, &client_id).await?;
    Ok(ApiResponse::message("Client deleted"))
}

/// GET /clients/:id/jobs
pub async fn client_jobs_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(client_id): Path<String>,
) -> ApiResult<Vec<ClientJob>> {
    Ok(ApiResponse::success(state.clients.job_history(&user, &client_id).await?))
}
