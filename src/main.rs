use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use dl_relay::cli::{BackendKind, Cli};
use dl_relay::cloud::{CloudUploader, DirectoryUploader};
use dl_relay::common::logger::{PrettyLogger, init_tracing};
use dl_relay::downloader::{Backend, DownloadRegistry, HttpFetcher};
use dl_relay::jobs::{Aria2Client, SimulatedJobService};

/// 根据配置选择下载后端
fn build_backend(args: &Cli) -> anyhow::Result<Backend> {
    let backend = match args.backend {
        BackendKind::Direct => Backend::Direct(Arc::new(
            HttpFetcher::new().context("创建 HTTP 客户端失败")?,
        )),
        BackendKind::Aria2 => Backend::External(Arc::new(
            Aria2Client::new(&args.aria2_rpc_url, args.aria2_secret.clone())
                .context("创建 aria2 客户端失败")?,
        )),
        BackendKind::Simulated => Backend::External(Arc::new(SimulatedJobService::default())),
    };
    Ok(backend)
}

/// 准备下载环境
async fn prepare_dirs(args: &Cli) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&args.download_dir)
        .await
        .with_context(|| format!("创建下载目录失败: {}", args.download_dir.display()))?;
    if let Some(cloud_dir) = &args.cloud_dir {
        tokio::fs::create_dir_all(cloud_dir)
            .await
            .with_context(|| format!("创建云端目录失败: {}", cloud_dir.display()))?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("收到退出信号，正在关闭");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level);

    prepare_dirs(&args).await?;

    let uploader: Option<Arc<dyn CloudUploader>> = args
        .cloud_dir
        .as_ref()
        .map(|dir| Arc::new(DirectoryUploader::new(dir)) as Arc<dyn CloudUploader>);
    let registry = DownloadRegistry::new(args.registry_config(), build_backend(&args)?, uploader);

    let addr = args.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("无法监听 {}", addr))?;

    PrettyLogger::title("dlrelay");
    PrettyLogger::setting("监听", &addr);
    PrettyLogger::setting("下载目录", args.download_dir.display().to_string());
    PrettyLogger::setting("后端", format!("{:?}", args.backend));
    match &args.cloud_dir {
        Some(dir) => PrettyLogger::setting("云端目录", dir.display().to_string()),
        None => PrettyLogger::warning("未配置云端目录，saveToCloud 将被忽略"),
    }
    PrettyLogger::separator();
    PrettyLogger::success("服务已启动");

    axum::serve(listener, dl_relay::server::router(registry))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务异常退出")?;

    Ok(())
}
