use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::database::models::{ChecklistItem, Job, JobPhoto};
use crate::middleware::{ApiJson, ApiQuery, ApiResponse, ApiResult, Attachment, DownloadResult, Message};
use crate::notifications::WhatsAppLink;
use crate::services::job_service::{AddPhoto, CreateJob, JobDetail, JobListItem, JobQuery, UpdateChecklistItem, UpdateJob};
use crate::services::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoTypeQuery {
    #[serde(default)]
    pub photo_type: Option<String>,
}

/// POST /jobs - a recurring job also materialises its next twelve siblings
pub async fn job_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<CreateJob>,
) -> ApiResult<JobDetail> {
    Ok(ApiResponse::created(state.jobs.create(&user, body).await?))
}

/// GET /jobs?status&from&to&clientId
pub async fn job_list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<JobQuery>,
) -> ApiResult<Vec<JobListItem>> {
    Ok(ApiResponse::success(state.jobs.list(&user, query).await?))
}

pub async fn today_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<JobListItem>> {
    Ok(ApiResponse::success(state.jobs.today(&user, Utc::now()).await?))
}

pub async fn job_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<String>,
) -> ApiResult<JobDetail> {
    Ok(ApiResponse::success(state.jobs.get(&user, &job_id).await?))
}

/// PUT /jobs/:id - cleaners may only move the status forward
pub async fn job_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<String>,
    ApiJson(body): ApiJson<UpdateJob>,
) -> ApiResult<Job> {
    Ok(ApiResponse::success(state.jobs.update(&user, &job_id, body).await?))
}

pub async fn job_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<String>,
) -> ApiResult<Message> {
    state.jobs.delete(&user, &job_id).await?;
    Ok(ApiResponse::message("Job deleted"))
}

pub async fn photo_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<String>,
    ApiJson(body): ApiJson<AddPhoto>,
) -> ApiResult<JobPhoto> {
    Ok(ApiResponse::created(state.jobs.add_photo(&user, &job_id, body).await?))
}

/// PUT /jobs/:id/checklist/:itemId
pub async fn checklist_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((job_id, item_id)): Path<(String, String)>,
    ApiJson(body): ApiJson<UpdateChecklistItem>,
) -> ApiResult<ChecklistItem> {
    Ok(ApiResponse::success(state.jobs.update_checklist_item(&user, &job_id, &item_id, body).await?))
}

/// GET /jobs/:id/whatsapp/photos?photoType=BEFORE|AFTER|ALL
pub async fn whatsapp_photos_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<String>,
    ApiQuery(query): ApiQuery<PhotoTypeQuery>,
) -> ApiResult<WhatsAppLink> {
    let link = state.jobs.whatsapp_photos(&user, &job_id, query.photo_type.as_deref()).await?;
    Ok(ApiResponse::success(link))
}

pub async fn whatsapp_completion_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<String>,
) -> ApiResult<WhatsAppLink> {
    Ok(ApiResponse::success(state.jobs.whatsapp_completion(&user, &job_id).await?))
}

/// GET /jobs/:id/photos/download - zip of every photo on the job
pub async fn photos_download_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<String>,
) -> DownloadResult {
    Ok(Attachment(state.documents.job_photos_zip(&user, &job_id).await?))
}
