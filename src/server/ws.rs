use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::downloader::DownloadRegistry;
use crate::downloader::events::{Envelope, StatusEvent};

/// GET /ws：订阅所有传输的进度事件
pub async fn subscribe(ws: WebSocketUpgrade, State(registry): State<DownloadRegistry>) -> Response {
    ws.on_upgrade(move |socket| forward_events(socket, registry))
}

async fn forward_events(mut socket: WebSocket, registry: DownloadRegistry) {
    let mut events = registry.subscribe();
    info!("Client connected ({} 个订阅者)", registry.events().subscriber_count());

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    if !send_event(&mut socket, &event).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // 慢订阅者直接丢事件
                    warn!("订阅者落后，丢弃了 {} 个事件", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    info!("Client disconnected");
}

async fn send_event(socket: &mut WebSocket, event: &StatusEvent) -> bool {
    let text = match serde_json::to_string(&Envelope::progress(event)) {
        Ok(text) => text,
        Err(e) => {
            warn!("事件序列化失败: {}", e);
            return true;
        }
    };
    if let Err(e) = socket.send(Message::Text(text.into())).await {
        debug!("发送事件失败，断开订阅者: {}", e);
        return false;
    }
    true
}
