use axum::Json;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use super::error::ApiError;
use crate::common::filename::{mime_type_for, validate_served_name};
use crate::downloader::{DownloadRegistry, DownloadRequest, TransferHandle};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartDownloadBody {
    pub url: Option<String>,
    #[serde(default)]
    pub save_to_cloud: bool,
}

/// POST /download
pub async fn start_download(
    State(registry): State<DownloadRegistry>,
    body: Result<Json<StartDownloadBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let url = body
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("URL is required"))?;

    let accepted = registry.start(DownloadRequest {
        url,
        save_to_cloud: body.save_to_cloud,
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Download started",
            "id": accepted.id,
            "filename": accepted.filename,
        })),
    )
        .into_response())
}

/// GET /downloads/{filename}
pub async fn serve_file(
    State(registry): State<DownloadRegistry>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    validate_served_name(&filename)?;

    let path = registry.file_path(&filename);
    if !registry.has_file(&filename).await {
        return Err(ApiError::not_found("File not found"));
    }

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let length = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .len();
    debug!("提供文件: {} ({} 字节)", path.display(), length);

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (header::CONTENT_TYPE, mime_type_for(&filename).to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
            (header::CONTENT_DISPOSITION, format!("inline; filename=\"{}\"", filename)),
        ],
        body,
    )
        .into_response())
}

/// GET /transfers
pub async fn list_transfers(State(registry): State<DownloadRegistry>) -> Json<Vec<TransferHandle>> {
    Json(registry.list().await)
}

/// GET /transfers/{id}
pub async fn get_transfer(
    State(registry): State<DownloadRegistry>,
    Path(id): Path<String>,
) -> Result<Json<TransferHandle>, ApiError> {
    registry
        .snapshot(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Transfer not found"))
}

/// POST /transfers/{id}/cancel
pub async fn cancel_transfer(
    State(registry): State<DownloadRegistry>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    registry.cancel(&id)?;
    info!("已请求取消: {}", id);
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Cancellation requested", "id": id })),
    )
        .into_response())
}
