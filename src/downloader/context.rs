use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::events::Emitter;
use super::handle::TransferHandle;
use super::progress::{Measurement, ProgressSample, SpeedTracker};

pub type SharedHandle = Arc<Mutex<TransferHandle>>;

/// 驱动一次传输所需的全部东西。句柄只通过这里被修改
#[derive(Debug, Clone)]
pub struct DriverContext {
    pub handle: SharedHandle,
    pub emitter: Emitter,
    pub cancel: CancellationToken,
    /// 最终文件路径（已清洗、已加后缀）
    pub target: PathBuf,
}

impl DriverContext {
    pub fn new(handle: TransferHandle, emitter: Emitter, target: PathBuf) -> Self {
        Self {
            handle: Arc::new(Mutex::new(handle)),
            emitter,
            cancel: CancellationToken::new(),
            target,
        }
    }

    /// 更新进度、采样并广播
    pub async fn report_progress(&self, tracker: &mut SpeedTracker, downloaded: u64, total: u64) -> Measurement {
        let mut handle = self.handle.lock().await;
        if !handle.update_progress(downloaded, total) {
            return Measurement::default();
        }
        let measurement = tracker.observe(ProgressSample::now(handle.downloaded_size, handle.total_size));
        self.emitter.emit(&handle, measurement);
        measurement
    }

    /// 进入完成态并发送唯一一次完成事件
    pub async fn finish(&self, tracker: &mut SpeedTracker, downloaded: u64, total: u64, path: &Path) -> bool {
        let mut handle = self.handle.lock().await;
        handle.update_progress(downloaded, total);
        if !handle.mark_complete(path) {
            return false;
        }
        let measurement = tracker.observe(ProgressSample::now(handle.downloaded_size, handle.total_size));
        info!("✅ 下载任务完成: {} -> {}", handle.id, path.display());
        self.emitter.emit(&handle, measurement);
        true
    }

    /// 进入失败态并发送唯一一次错误事件
    pub async fn fail(&self, reason: impl Into<String>) -> bool {
        let mut handle = self.handle.lock().await;
        let reason = reason.into();
        if !handle.mark_failed(reason.clone()) {
            return false;
        }
        error!("❌ 下载任务失败: {}, 错误: {}", handle.id, reason);
        self.emitter.emit(&handle, Measurement::default());
        true
    }

    pub async fn snapshot(&self) -> TransferHandle {
        self.handle.lock().await.clone()
    }
}
