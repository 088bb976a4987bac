use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::error::ApiError;
use crate::services::document_service::RenderedFile;

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: StatusCode,
}

/// Body for endpoints that only confirm an action.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { data, status_code: StatusCode::OK }
    }

    pub fn created(data: T) -> Self {
        Self { data, status_code: StatusCode::CREATED }
    }
}

impl ApiResponse<Message> {
    pub fn message(message: impl Into<String>) -> Self {
        Self::success(Message { message: message.into() })
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match serde_json::to_value(&self.data) {
            Ok(data) => (self.status_code, Json(json!({ "success": true, "data": data }))).into_response(),
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                ApiError::internal_server_error("Failed to serialize response data").into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// File download, sent raw rather than inside the JSON envelope.
#[derive(Debug)]
pub struct Attachment(pub RenderedFile);

impl IntoResponse for Attachment {
    fn into_response(self) -> Response {
        let RenderedFile { file_name, content_type, bytes } = self.0;
        let disposition = format!("attachment; filename=\"{}\"", file_name.replace('"', ""));
        (
            [(header::CONTENT_TYPE, content_type.to_string()), (header::CONTENT_DISPOSITION, disposition)],
            bytes,
        )
            .into_response()
    }
}

pub type DownloadResult = Result<Attachment, ApiError>;
