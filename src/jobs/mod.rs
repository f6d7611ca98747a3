//! 外部下载服务（按任务 gid 轮询的那一类）

use std::path::PathBuf;

use async_trait::async_trait;

use crate::downloader::error::Result;

pub mod aria2;
pub mod simulated;

pub use aria2::Aria2Client;
pub use simulated::SimulatedJobService;

/// 提交任务时的选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
    /// 保存目录
    pub dir: PathBuf,
    /// 输出文件名
    pub out: String,
}

/// 一次状态查询的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobStatus {
    pub complete: bool,
    pub failed: bool,
    pub progress_pct: f64,
    pub speed_bps: f64,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub result_path: Option<PathBuf>,
    pub error_message: Option<String>,
}

#[async_trait]
pub trait JobService: Send + Sync {
    async fn submit(&self, url: &str, options: &JobOptions) -> Result<String>;

    async fn status(&self, gid: &str) -> Result<JobStatus>;

    /// 尽力而为地停止任务
    async fn remove(&self, gid: &str) -> Result<()>;
}
