use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    #[error("不支持的文件类型: {0}")]
    UnsupportedFileType(String),

    #[error("不安全的文件名: {0}")]
    UnsafeFilename(String),

    #[error("HTTP错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP 请求失败，状态码: {0}")]
    HttpStatus(u16),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("数据流错误: {0}")]
    Stream(String),

    #[error("RPC调用失败: {0}")]
    Rpc(String),

    #[error("下载任务失败: {0}")]
    JobFailed(String),

    #[error("cancelled")]
    Cancelled,

    #[error("上传失败: {0}")]
    Upload(String),

    #[error("未找到: {0}")]
    NotFound(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误的大类，决定它在 HTTP 层和广播层分别怎么呈现
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    TransferFailure,
    NotFound,
    Internal,
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::InvalidUrl(_)
            | DownloadError::UnsupportedFileType(_)
            | DownloadError::UnsafeFilename(_) => ErrorKind::InvalidInput,
            DownloadError::Http(_)
            | DownloadError::HttpStatus(_)
            | DownloadError::Io(_)
            | DownloadError::Stream(_)
            | DownloadError::Rpc(_)
            | DownloadError::JobFailed(_)
            | DownloadError::Cancelled
            | DownloadError::Upload(_) => ErrorKind::TransferFailure,
            DownloadError::NotFound(_) => ErrorKind::NotFound,
            DownloadError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
