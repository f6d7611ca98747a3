#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dl_relay::cloud::CloudUploader;
use dl_relay::downloader::error::{DownloadError, Result};
use dl_relay::downloader::events::StatusEvent;
use dl_relay::downloader::{
    Backend, DownloadRegistry, FetchedStream, RegistryConfig, StreamFetcher,
};
use dl_relay::jobs::{JobOptions, JobService, JobStatus};
use futures::StreamExt;
use tokio::sync::broadcast;

/// 脚本里的一步
#[derive(Debug, Clone)]
pub enum Step {
    Data(usize),
    Fail(&'static str),
}

/// 按脚本吐出数据块的拉取器，块与块之间等待 `delay`
pub struct ScriptedFetcher {
    pub total: Option<u64>,
    pub steps: Vec<Step>,
    pub delay: Duration,
    pub fail_request: bool,
    pub requests: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(total: Option<u64>, steps: Vec<Step>, delay: Duration) -> Self {
        Self {
            total,
            steps,
            delay,
            fail_request: false,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_request: true,
            ..Self::new(None, vec![], Duration::ZERO)
        }
    }
}

#[async_trait]
impl StreamFetcher for ScriptedFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedStream> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.fail_request {
            return Err(DownloadError::HttpStatus(404));
        }
        let delay = self.delay;
        let body = futures::stream::iter(self.steps.clone().into_iter().enumerate())
            .then(move |(i, step)| async move {
                if i > 0 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                match step {
                    Step::Data(n) => Ok(Bytes::from(vec![b'x'; n])),
                    Step::Fail(reason) => Err(DownloadError::Stream(reason.to_string())),
                }
            })
            .boxed();
        Ok(FetchedStream {
            total_size: self.total,
            body,
        })
    }
}

/// 按脚本返回状态的外部服务，脚本用完后重复最后一条
pub struct ScriptedJobs {
    pub script: Vec<std::result::Result<JobStatus, &'static str>>,
    pub fail_submit: bool,
    pub polls: AtomicUsize,
    pub removed: AtomicBool,
    pub submitted: Mutex<Option<JobOptions>>,
}

impl ScriptedJobs {
    pub fn new(script: Vec<std::result::Result<JobStatus, &'static str>>) -> Self {
        Self {
            script,
            fail_submit: false,
            polls: AtomicUsize::new(0),
            removed: AtomicBool::new(false),
            submitted: Mutex::new(None),
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobService for ScriptedJobs {
    async fn submit(&self, _url: &str, options: &JobOptions) -> Result<String> {
        if self.fail_submit {
            return Err(DownloadError::Rpc("connection refused".to_string()));
        }
        *self.submitted.lock().unwrap() = Some(options.clone());
        Ok("gid-1".to_string())
    }

    async fn status(&self, _gid: &str) -> Result<JobStatus> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst);
        let entry = self
            .script
            .get(n)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or_else(|| Ok(JobStatus::default()));
        entry.map_err(|e| DownloadError::Rpc(e.to_string()))
    }

    async fn remove(&self, _gid: &str) -> Result<()> {
        self.removed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub fn in_progress(downloaded: u64, total: u64) -> JobStatus {
    JobStatus {
        downloaded_bytes: downloaded,
        total_bytes: total,
        progress_pct: downloaded as f64 / total as f64 * 100.0,
        ..JobStatus::default()
    }
}

pub fn completed(total: u64, result_path: Option<&Path>) -> JobStatus {
    JobStatus {
        complete: true,
        downloaded_bytes: total,
        total_bytes: total,
        progress_pct: 100.0,
        result_path: result_path.map(Path::to_path_buf),
        ..JobStatus::default()
    }
}

pub fn failed(message: &str) -> JobStatus {
    JobStatus {
        failed: true,
        error_message: Some(message.to_string()),
        ..JobStatus::default()
    }
}

/// 第一次请求时 panic 的拉取器，之后正常返回 `size` 字节
pub struct PanickingFetcher {
    pub size: usize,
    /// true 时先吐出一块数据再在数据流里 panic，否则在 fetch 里直接 panic
    pub in_body: bool,
    pub calls: AtomicUsize,
}

impl PanickingFetcher {
    pub fn new(size: usize, in_body: bool) -> Self {
        Self {
            size,
            in_body,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StreamFetcher for PanickingFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedStream> {
        let first = self.calls.fetch_add(1, Ordering::SeqCst) == 0;
        let size = self.size;
        if first && !self.in_body {
            panic!("fetcher exploded");
        }
        let body = futures::stream::iter(0..2usize)
            .then(move |i| async move {
                if first && i == 1 {
                    panic!("body exploded");
                }
                Ok(Bytes::from(vec![b'x'; size / 2]))
            })
            .boxed();
        Ok(FetchedStream {
            total_size: Some((size / 2 * 2) as u64),
            body,
        })
    }
}

/// 只记录调用的上传器
#[derive(Default)]
pub struct RecordingUploader {
    pub uploads: Mutex<Vec<PathBuf>>,
}

impl RecordingUploader {
    pub fn uploads(&self) -> Vec<PathBuf> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl CloudUploader for RecordingUploader {
    async fn upload(&self, file_path: &Path) -> Result<String> {
        self.uploads.lock().unwrap().push(file_path.to_path_buf());
        Ok(format!("remote/{}", file_path.display()))
    }
}

pub fn registry(dir: &Path, backend: Backend) -> DownloadRegistry {
    registry_with_uploader(dir, backend, None)
}

pub fn registry_with_uploader(
    dir: &Path,
    backend: Backend,
    uploader: Option<Arc<dyn CloudUploader>>,
) -> DownloadRegistry {
    let config = RegistryConfig {
        download_dir: dir.to_path_buf(),
        ..RegistryConfig::default()
    };
    DownloadRegistry::new(config, backend, uploader)
}

pub fn direct(fetcher: ScriptedFetcher) -> (Arc<ScriptedFetcher>, Backend) {
    let fetcher = Arc::new(fetcher);
    (Arc::clone(&fetcher), Backend::Direct(fetcher))
}

pub fn external(jobs: ScriptedJobs) -> (Arc<ScriptedJobs>, Backend) {
    let jobs = Arc::new(jobs);
    (Arc::clone(&jobs), Backend::External(jobs))
}

/// 收集事件直到终态事件（含）
pub async fn collect_until_terminal(rx: &mut broadcast::Receiver<StatusEvent>) -> Vec<StatusEvent> {
    let collect = async {
        let mut events = Vec::new();
        loop {
            let event = rx.recv().await.expect("event bus closed");
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                return events;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(60), collect)
        .await
        .expect("no terminal event")
}

/// 等登记表清空
pub async fn wait_until_idle(registry: &DownloadRegistry) {
    for _ in 0..200 {
        if registry.active_count() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("transfers still active: {}", registry.active_count());
}

pub fn progress_of(event: &StatusEvent) -> Option<f64> {
    match event {
        StatusEvent::Initializing(f) | StatusEvent::Downloading(f) => Some(f.progress),
        StatusEvent::Completed { fields, .. } => Some(fields.progress),
        StatusEvent::Error { .. } => None,
    }
}
