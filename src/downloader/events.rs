use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use super::handle::{TransferHandle, TransferState};
use super::progress::Measurement;

/// 广播给客户端的事件名
pub const PROGRESS_EVENT: &str = "download_progress";

/// 事件总线默认容量，慢的订阅者超过这个数量会丢事件
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressFields {
    pub id: String,
    pub filename: String,
    pub progress: f64,
    pub speed: f64,
    pub downloaded: u64,
    pub total: u64,
}

/// 对外的状态事件，`status` 字段区分形态
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusEvent {
    Initializing(ProgressFields),
    Downloading(ProgressFields),
    #[serde(rename_all = "camelCase")]
    Completed {
        #[serde(flatten)]
        fields: ProgressFields,
        file_path: PathBuf,
        file_url: String,
    },
    Error {
        id: String,
        filename: String,
        error: String,
    },
}

impl StatusEvent {
    /// 根据句柄当前状态和采样结果构造事件
    pub fn from_handle(handle: &TransferHandle, measurement: Measurement) -> Self {
        let fields = ProgressFields {
            id: handle.id.clone(),
            filename: handle.filename.clone(),
            progress: measurement.progress_pct,
            speed: measurement.speed_bps,
            downloaded: handle.downloaded_size,
            total: handle.total_size,
        };

        match handle.state {
            TransferState::Initializing => StatusEvent::Initializing(fields),
            TransferState::Downloading => StatusEvent::Downloading(fields),
            TransferState::Completed => StatusEvent::Completed {
                fields,
                file_path: handle.file_path.clone().unwrap_or_default(),
                file_url: handle.file_url(),
            },
            TransferState::Failed => StatusEvent::Error {
                id: handle.id.clone(),
                filename: handle.filename.clone(),
                error: handle
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            },
        }
    }

    pub fn id(&self) -> &str {
        match self {
            StatusEvent::Initializing(f) | StatusEvent::Downloading(f) => &f.id,
            StatusEvent::Completed { fields, .. } => &fields.id,
            StatusEvent::Error { id, .. } => id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StatusEvent::Completed { .. } | StatusEvent::Error { .. })
    }
}

/// WebSocket 上发送的外层结构
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub event: &'static str,
    pub data: &'a StatusEvent,
}

impl<'a> Envelope<'a> {
    pub fn progress(data: &'a StatusEvent) -> Self {
        Self {
            event: PROGRESS_EVENT,
            data,
        }
    }
}

/// 进程内的广播总线，发布不等待订阅者
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StatusEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: StatusEvent) {
        // 没有订阅者时 send 返回 Err，直接丢掉
        match self.sender.send(event) {
            Ok(n) => trace!("事件已发送给 {} 个订阅者", n),
            Err(_) => trace!("没有订阅者，事件被丢弃"),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

/// 把句柄状态转换成事件并发布
#[derive(Debug, Clone)]
pub struct Emitter {
    bus: EventBus,
}

impl Emitter {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn emit(&self, handle: &TransferHandle, measurement: Measurement) {
        let event = StatusEvent::from_handle(handle, measurement);
        if event.is_terminal() {
            debug!("发送终态事件: {} -> {:?}", handle.id, handle.state);
        }
        self.bus.publish(event);
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}
