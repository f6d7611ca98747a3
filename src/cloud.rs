//! 下载完成后的可选云端上传

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::downloader::error::{DownloadError, Result};

#[async_trait]
pub trait CloudUploader: Send + Sync {
    /// 上传文件，返回远端标识
    async fn upload(&self, file_path: &Path) -> Result<String>;
}

/// 把文件复制到一个镜像目录，远端标识就是 `<uuid>/<文件名>`
#[derive(Debug, Clone)]
pub struct DirectoryUploader {
    root: PathBuf,
}

impl DirectoryUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl CloudUploader for DirectoryUploader {
    async fn upload(&self, file_path: &Path) -> Result<String> {
        let name = file_path
            .file_name()
            .ok_or_else(|| DownloadError::Upload(format!("无效的文件路径: {}", file_path.display())))?;

        let remote_id = uuid::Uuid::new_v4().to_string();
        let target_dir = self.root.join(&remote_id);
        tokio::fs::create_dir_all(&target_dir).await?;
        tokio::fs::copy(file_path, target_dir.join(name)).await?;

        let remote_id = format!("{}/{}", remote_id, name.to_string_lossy());
        debug!("已上传 {} -> {}", file_path.display(), remote_id);
        Ok(remote_id)
    }
}
