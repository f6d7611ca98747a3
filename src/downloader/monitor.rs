use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::context::DriverContext;
use super::error::{DownloadError, Result};
use super::progress::SpeedTracker;
use crate::jobs::{JobOptions, JobService};

/// 外部任务的默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// 委托模式：提交到外部下载服务，然后按固定间隔轮询直到终态。
///
/// 与外部服务通信失败视为致命错误，发出错误事件后退出，不重试轮询。
pub async fn run(jobs: &dyn JobService, ctx: &DriverContext, url: &str, poll_interval: Duration) -> Result<PathBuf> {
    let result = monitor(jobs, ctx, url, poll_interval).await;
    if let Err(e) = &result {
        let reason = match e {
            DownloadError::JobFailed(message) => message.clone(),
            other => other.to_string(),
        };
        ctx.fail(reason).await;
    }
    result
}

async fn monitor(jobs: &dyn JobService, ctx: &DriverContext, url: &str, poll_interval: Duration) -> Result<PathBuf> {
    let options = job_options(&ctx.target)?;

    let gid = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return Err(DownloadError::Cancelled),
        gid = jobs.submit(url, &options) => gid?,
    };
    info!("外部任务已提交: {} (gid={})", url, gid);

    let mut tracker = SpeedTracker::new();
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                if let Err(e) = jobs.remove(&gid).await {
                    warn!("取消时停止外部任务失败: {}", e);
                }
                return Err(DownloadError::Cancelled);
            }
            _ = ticker.tick() => {}
        }

        let status = jobs.status(&gid).await?;
        debug!(
            "gid={} 进度 {:.1}% ({}/{})",
            gid, status.progress_pct, status.downloaded_bytes, status.total_bytes
        );

        if status.failed {
            return Err(DownloadError::JobFailed(
                status
                    .error_message
                    .unwrap_or_else(|| "external job failed".to_string()),
            ));
        }

        if status.complete {
            let path = settle_output(status.result_path.as_deref(), &ctx.target).await?;
            ctx.finish(&mut tracker, status.downloaded_bytes, status.total_bytes, &path)
                .await;
            return Ok(path);
        }

        ctx.report_progress(&mut tracker, status.downloaded_bytes, status.total_bytes)
            .await;
    }
}

fn job_options(target: &Path) -> Result<JobOptions> {
    let dir = target
        .parent()
        .ok_or_else(|| DownloadError::Internal(format!("目标路径没有父目录: {}", target.display())))?;
    let out = target
        .file_name()
        .ok_or_else(|| DownloadError::Internal(format!("目标路径没有文件名: {}", target.display())))?;
    Ok(JobOptions {
        dir: dir.to_path_buf(),
        out: out.to_string_lossy().into_owned(),
    })
}

/// 外部服务产出的文件不在目标位置时，挪到清洗后的目标路径
async fn settle_output(result_path: Option<&Path>, target: &Path) -> Result<PathBuf> {
    let Some(produced) = result_path else {
        return Ok(target.to_path_buf());
    };
    if produced == target {
        return Ok(target.to_path_buf());
    }

    debug!("移动输出文件: {} -> {}", produced.display(), target.display());
    if tokio::fs::rename(produced, target).await.is_err() {
        // 跨文件系统时 rename 会失败
        tokio::fs::copy(produced, target).await?;
        tokio::fs::remove_file(produced).await?;
    }
    Ok(target.to_path_buf())
}
