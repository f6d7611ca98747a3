use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::downloader::RegistryConfig;
use crate::downloader::events::DEFAULT_BUS_CAPACITY;

/// 由谁执行实际下载
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// 进程内直接流式下载
    Direct,
    /// 交给 aria2（JSON-RPC）
    Aria2,
    /// 本地模拟的外部服务，联调用
    Simulated,
}

/// 下载中继服务
#[derive(Parser, Debug)]
#[command(name = "dlrelay")]
#[command(version = "1.0")]
#[command(about = "接收下载请求并通过 WebSocket 广播下载进度", long_about = None)]
pub struct Cli {
    /// 监听地址
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// 监听端口
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// 下载保存目录
    #[arg(long, env = "DOWNLOAD_DIR", value_name = "DIR")]
    #[arg(default_value = "/tmp/downloads")]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub download_dir: PathBuf,

    /// 下载后端
    #[arg(long, value_enum, env = "DOWNLOAD_BACKEND", default_value_t = BackendKind::Direct)]
    pub backend: BackendKind,

    /// aria2 RPC 地址
    #[arg(long, env = "ARIA2_RPC_URL", value_name = "URL")]
    #[arg(default_value = "http://localhost:6800/jsonrpc")]
    #[arg(value_hint = clap::ValueHint::Url)]
    pub aria2_rpc_url: String,

    /// aria2 RPC 密钥
    #[arg(long, env = "ARIA2_SECRET", value_name = "SECRET")]
    pub aria2_secret: Option<String>,

    /// 外部任务轮询间隔（毫秒）
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// 直连模式每块字节数
    #[arg(long, value_name = "BYTES", default_value_t = 8192)]
    pub chunk_size: usize,

    /// 云端保存目录（不指定则不支持 saveToCloud）
    #[arg(long, env = "CLOUD_DIR", value_name = "DIR")]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub cloud_dir: Option<PathBuf>,

    /// 日志级别，RUST_LOG 优先
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            download_dir: self.download_dir.clone(),
            chunk_size: self.chunk_size.max(1),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
