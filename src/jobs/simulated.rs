use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use super::{JobOptions, JobService, JobStatus};
use crate::downloader::error::{DownloadError, Result};
use crate::downloader::progress::progress_pct;

/// 本地模拟的下载服务，通过配置显式选用（没有 aria2 时联调前端用）。
///
/// 每查询一次状态前进 `step` 字节，到达 `total` 后在目标位置写出同样大小的占位文件。
#[derive(Debug)]
pub struct SimulatedJobService {
    total: u64,
    step: u64,
    jobs: DashMap<String, SimulatedJob>,
}

#[derive(Debug, Clone)]
struct SimulatedJob {
    target: PathBuf,
    downloaded: u64,
    written: bool,
}

impl SimulatedJobService {
    pub fn new(total: u64, step: u64) -> Self {
        Self {
            total,
            step: step.max(1),
            jobs: DashMap::new(),
        }
    }
}

impl Default for SimulatedJobService {
    fn default() -> Self {
        // 10 MiB，十次轮询完成
        Self::new(10 * 1024 * 1024, 1024 * 1024)
    }
}

#[async_trait]
impl JobService for SimulatedJobService {
    async fn submit(&self, url: &str, options: &JobOptions) -> Result<String> {
        let gid = uuid::Uuid::new_v4().simple().to_string();
        info!("模拟任务 {} 已创建: {}", gid, url);
        self.jobs.insert(
            gid.clone(),
            SimulatedJob {
                target: options.dir.join(&options.out),
                downloaded: 0,
                written: false,
            },
        );
        Ok(gid)
    }

    async fn status(&self, gid: &str) -> Result<JobStatus> {
        // 先在锁内推进状态，写文件放到锁外
        let job = {
            let mut entry = self
                .jobs
                .get_mut(gid)
                .ok_or_else(|| DownloadError::NotFound(format!("任务 {}", gid)))?;
            entry.downloaded = (entry.downloaded + self.step).min(self.total);
            entry.clone()
        };

        let complete = job.downloaded >= self.total;
        if complete && !job.written {
            let file = tokio::fs::File::create(&job.target).await?;
            file.set_len(self.total).await?;
            if let Some(mut entry) = self.jobs.get_mut(gid) {
                entry.written = true;
            }
            debug!("模拟任务 {} 已写出 {}", gid, job.target.display());
        }

        Ok(JobStatus {
            complete,
            failed: false,
            progress_pct: progress_pct(job.downloaded, self.total),
            speed_bps: self.step as f64,
            downloaded_bytes: job.downloaded,
            total_bytes: self.total,
            result_path: complete.then(|| job.target.clone()),
            error_message: None,
        })
    }

    async fn remove(&self, gid: &str) -> Result<()> {
        self.jobs.remove(gid);
        Ok(())
    }
}
