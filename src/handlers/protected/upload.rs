use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Extension,
};

use crate::auth::AuthUser;
use crate::error::{ApiError, ServiceError};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::upload_service::{ImageUpload, StoredImage};
use crate::services::AppState;

pub const FILE_FIELD: &str = "file";

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("File is larger than the 10MB limit")
    } else {
        ApiError::bad_request(err.body_text())
    }
}

/// POST /upload/image - multipart field `file`.
/// Other fields are drained and ignored.
pub async fn image_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<StoredImage> {
    let mut multipart = multipart.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some(ImageUpload { file_name, content_type, bytes: bytes.to_vec() });
    }

    let upload = upload.ok_or_else(|| ServiceError::invalid(FILE_FIELD, "No file uploaded"))?;
    Ok(ApiResponse::created(state.uploads.upload_image(&user, upload).await?))
}
