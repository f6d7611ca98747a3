use std::path::PathBuf;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::context::DriverContext;
use super::error::{DownloadError, Result};
use super::fetcher::StreamFetcher;
use super::progress::SpeedTracker;

/// 每块最大字节数
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// 直连模式：进程自己拉取响应体并写入目标文件，每写一块就采样并广播一次。
///
/// 失败时句柄被标记为失败、错误事件发出，错误同时返回给调用方；不做重试。
pub async fn run(fetcher: &dyn StreamFetcher, ctx: &DriverContext, url: &str, chunk_size: usize) -> Result<PathBuf> {
    let mut tracker = SpeedTracker::new();

    match stream_to_file(fetcher, ctx, url, chunk_size.max(1), &mut tracker).await {
        Ok((downloaded, total)) => {
            ctx.finish(&mut tracker, downloaded, total, &ctx.target).await;
            Ok(ctx.target.clone())
        }
        Err(e) => {
            ctx.fail(e.to_string()).await;
            // 半截文件不保留，避免被当成成品访问
            if let Err(remove_err) = tokio::fs::remove_file(&ctx.target).await {
                debug!("清理未完成文件失败: {}", remove_err);
            }
            Err(e)
        }
    }
}

async fn stream_to_file(
    fetcher: &dyn StreamFetcher,
    ctx: &DriverContext,
    url: &str,
    chunk_size: usize,
    tracker: &mut SpeedTracker,
) -> Result<(u64, u64)> {
    let fetched = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return Err(DownloadError::Cancelled),
        fetched = fetcher.fetch(url) => fetched?,
    };

    let total = fetched.total_size.unwrap_or(0);
    info!("开始下载: {} ({} 字节)", url, total);

    let mut file = tokio::fs::File::create(&ctx.target).await?;
    let mut body = fetched.body;
    let mut downloaded = 0u64;

    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(DownloadError::Cancelled),
            next = body.next() => next,
        };
        let Some(chunk) = next else { break };
        let mut chunk = chunk?;

        while !chunk.is_empty() {
            let piece = chunk.split_to(chunk_size.min(chunk.len()));
            file.write_all(&piece).await?;
            downloaded += piece.len() as u64;
            ctx.report_progress(tracker, downloaded, total).await;
        }
    }

    file.flush().await?;

    if total > 0 && downloaded != total {
        warn!("声明大小 {} 与实际下载 {} 不一致: {}", total, downloaded, url);
    }
    debug!("数据流结束: {} 共 {} 字节", url, downloaded);
    Ok((downloaded, total))
}
