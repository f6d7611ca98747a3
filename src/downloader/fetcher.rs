use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::{Client, ClientBuilder};
use tracing::{debug, warn};

use super::error::{DownloadError, Result};

/// 一次请求返回的字节流和声明的总大小
pub struct FetchedStream {
    pub total_size: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes>>,
}

/// 直连模式下的流式拉取能力
#[async_trait]
pub trait StreamFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedStream>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    inner: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        // 只限制建连时间，大文件的读取不设上限
        let inner = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { inner })
    }

    pub fn with_client(inner: Client) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StreamFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedStream> {
        let response = self.inner.get(url).send().await?;

        let status = response.status();
        debug!("Response Status: {}", status);
        if !status.is_success() {
            warn!("❌ 非成功状态码: {}", status);
            return Err(DownloadError::HttpStatus(status.as_u16()));
        }

        let total_size = response.content_length();
        debug!("Content Length: {:?}", total_size);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| DownloadError::Stream(e.to_string())))
            .boxed();

        Ok(FetchedStream { total_size, body })
    }
}
