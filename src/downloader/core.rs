use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::context::{DriverContext, SharedHandle};
use super::error::{DownloadError, Result};
use super::events::{DEFAULT_BUS_CAPACITY, Emitter, EventBus, StatusEvent};
use super::fetcher::StreamFetcher;
use super::handle::TransferHandle;
use super::monitor::{self, DEFAULT_POLL_INTERVAL};
use super::stream::{self, DEFAULT_CHUNK_SIZE};
use crate::cloud::CloudUploader;
use crate::common::filename::{filename_from_url, timestamp_suffix, unique_filename};
use crate::jobs::JobService;

/// 由谁来真正执行传输
#[derive(Clone)]
pub enum Backend {
    /// 进程内直接拉取
    Direct(Arc<dyn StreamFetcher>),
    /// 交给外部下载服务，按 gid 轮询
    External(Arc<dyn JobService>),
}

impl Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Direct(_) => "direct",
            Backend::External(_) => "external",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub download_dir: PathBuf,
    pub chunk_size: usize,
    pub poll_interval: Duration,
    pub bus_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("/tmp/downloads"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

/// 一次下载请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub save_to_cloud: bool,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            save_to_cloud: false,
        }
    }
}

/// 请求被接受后的回执
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub id: String,
    pub filename: String,
}

struct TransferEntry {
    handle: SharedHandle,
    cancel: CancellationToken,
}

struct Inner {
    config: RegistryConfig,
    backend: Backend,
    uploader: Option<Arc<dyn CloudUploader>>,
    emitter: Emitter,
    transfers: DashMap<String, TransferEntry>, // id -> 传输
    names: DashSet<String>,                    // 占用中的文件名
}

/// 进程内唯一的下载登记处：持有活跃传输表，为每个传输启动后台驱动任务
#[derive(Clone)]
pub struct DownloadRegistry {
    inner: Arc<Inner>,
}

impl DownloadRegistry {
    pub fn new(config: RegistryConfig, backend: Backend, uploader: Option<Arc<dyn CloudUploader>>) -> Self {
        let emitter = Emitter::new(EventBus::new(config.bus_capacity));
        Self {
            inner: Arc::new(Inner {
                config,
                backend,
                uploader,
                emitter,
                transfers: DashMap::new(),
                names: DashSet::new(),
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    pub fn events(&self) -> &EventBus {
        self.inner.emitter.bus()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events().subscribe()
    }

    pub fn active_count(&self) -> usize {
        self.inner.transfers.len()
    }

    /// 下载目录下某个文件的完整路径
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.inner.config.download_dir.join(filename)
    }

    /// 校验请求、分配文件名并在后台启动传输，立即返回
    pub fn start(&self, request: DownloadRequest) -> Result<Accepted> {
        let raw_name = filename_from_url(&request.url)?;

        let suffix = timestamp_suffix();
        // 下载目录是本地目录，这里的同步 stat 只在接受请求时跑几次
        let filename = unique_filename(&raw_name, &suffix, |candidate| {
            // insert 成功即占位成功
            std::fs::metadata(self.file_path(candidate)).is_ok()
                || !self.inner.names.insert(candidate.to_string())
        });

        let id = uuid::Uuid::new_v4().to_string();
        let ctx = DriverContext::new(
            TransferHandle::new(&id, &filename, &request.url),
            self.inner.emitter.clone(),
            self.file_path(&filename),
        );
        self.inner.transfers.insert(
            id.clone(),
            TransferEntry {
                handle: Arc::clone(&ctx.handle),
                cancel: ctx.cancel.clone(),
            },
        );

        info!(
            "开始下载任务: {} -> {} (id={}, backend={})",
            request.url,
            filename,
            id,
            self.inner.backend.name()
        );

        let registry = self.clone();
        let task_id = id.clone();
        tokio::spawn(async move {
            registry.supervise(task_id, ctx, request).await;
        });

        Ok(Accepted { id, filename })
    }

    /// 取消一个活跃传输
    pub fn cancel(&self, id: &str) -> Result<()> {
        let entry = self
            .inner
            .transfers
            .get(id)
            .ok_or_else(|| DownloadError::NotFound(format!("传输 {}", id)))?;
        info!("取消下载任务: {}", id);
        entry.cancel.cancel();
        Ok(())
    }

    /// 获取任务状态快照
    pub async fn snapshot(&self, id: &str) -> Option<TransferHandle> {
        // 先拿出 Arc，不跨 await 持有 DashMap 的引用
        let handle = self.inner.transfers.get(id).map(|e| Arc::clone(&e.handle))?;
        let snapshot = handle.lock().await.clone();
        Some(snapshot)
    }

    pub async fn list(&self) -> Vec<TransferHandle> {
        let handles: Vec<SharedHandle> = self
            .inner
            .transfers
            .iter()
            .map(|e| Arc::clone(&e.handle))
            .collect();

        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in handles {
            snapshots.push(handle.lock().await.clone());
        }
        snapshots.sort_by(|a, b| a.filename.cmp(&b.filename));
        snapshots
    }

    /// 驱动任务放在单独的 task 里跑，panic 只影响这一个传输
    async fn supervise(self, id: String, ctx: DriverContext, request: DownloadRequest) {
        let backend = self.inner.backend.clone();
        let config = self.inner.config.clone();
        let driver_ctx = ctx.clone();
        let url = request.url.clone();

        let joined = tokio::spawn(async move {
            match backend {
                Backend::Direct(fetcher) => {
                    stream::run(fetcher.as_ref(), &driver_ctx, &url, config.chunk_size).await
                }
                Backend::External(jobs) => {
                    monitor::run(jobs.as_ref(), &driver_ctx, &url, config.poll_interval).await
                }
            }
        })
        .await;

        match joined {
            Ok(Ok(path)) => {
                if request.save_to_cloud {
                    self.upload_in_background(path);
                }
            }
            Ok(Err(e)) => {
                ctx.fail(e.to_string()).await;
                debug!("传输 {} 以错误结束: {}", id, e);
            }
            Err(join_error) => {
                error!("传输 {} 的驱动任务异常退出: {}", id, join_error);
                ctx.fail(format!("内部错误: {}", join_error)).await;
                // 驱动没来得及清理半截文件
                if let Err(e) = tokio::fs::remove_file(&ctx.target).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!("删除未完成文件失败 {}: {}", ctx.target.display(), e);
                    }
                }
            }
        }

        let filename = ctx.snapshot().await.filename;
        self.inner.transfers.remove(&id);
        self.inner.names.remove(&filename);
        debug!("传输 {} 已从登记表移除", id);
    }

    fn upload_in_background(&self, path: PathBuf) {
        let Some(uploader) = self.inner.uploader.clone() else {
            warn!("请求了云端保存，但没有配置上传目标: {}", path.display());
            return;
        };
        tokio::spawn(async move {
            match uploader.upload(&path).await {
                Ok(remote_id) => info!("已上传到云端: {} -> {}", path.display(), remote_id),
                Err(e) => warn!("云端上传失败: {}: {}", path.display(), e),
            }
        });
    }

    /// 下载目录是否存在某个已完成文件
    pub async fn has_file(&self, filename: &str) -> bool {
        is_file(&self.file_path(filename)).await
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
