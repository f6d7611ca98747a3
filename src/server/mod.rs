//! HTTP 与 WebSocket 接口

pub mod error;
pub mod handlers;
pub mod ws;

use axum::Router;
use axum::http::{Method, header};
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::downloader::DownloadRegistry;

pub use error::ApiError;

/// 组装路由
pub fn router(registry: DownloadRegistry) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/download", post(handlers::start_download))
        .route("/downloads/{filename}", get(handlers::serve_file))
        .route("/transfers", get(handlers::list_transfers))
        .route("/transfers/{id}", get(handlers::get_transfer))
        .route("/transfers/{id}/cancel", post(handlers::cancel_transfer))
        .route("/ws", get(ws::subscribe))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(registry)
}
