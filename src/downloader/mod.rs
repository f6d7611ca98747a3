//! 下载进度的跟踪与广播
//!
//! 一次传输的生命周期：`DownloadRegistry::start` 校验请求并创建 [`TransferHandle`]，
//! 然后在后台启动直连流驱动（[`stream`]）或外部任务轮询（[`monitor`]）。
//! 驱动方每次读到新的大小就经 [`progress`] 采样，由 [`events::Emitter`] 广播给所有订阅者，
//! 直到发出唯一一次终态事件。

pub mod context;
pub mod core;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod handle;
pub mod monitor;
pub mod progress;
pub mod stream;

pub use self::core::{Accepted, Backend, DownloadRegistry, DownloadRequest, RegistryConfig};
pub use error::{DownloadError, ErrorKind};
pub use events::{EventBus, StatusEvent};
pub use fetcher::{FetchedStream, HttpFetcher, StreamFetcher};
pub use handle::{TransferHandle, TransferState};
