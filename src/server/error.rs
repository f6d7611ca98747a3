use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::downloader::error::{DownloadError, ErrorKind};

/// HTTP 层的错误，响应体为 `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(e: DownloadError) -> Self {
        match (e.kind(), &e) {
            (_, DownloadError::InvalidUrl(_)) => Self::bad_request("Invalid URL format"),
            (_, DownloadError::UnsupportedFileType(_)) => {
                Self::bad_request("Invalid file type. Only video files are allowed.")
            }
            (ErrorKind::InvalidInput, _) => Self::bad_request(e.to_string()),
            (ErrorKind::NotFound, _) => Self::not_found(e.to_string()),
            _ => Self::internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("请求处理失败: {}", self.message);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
