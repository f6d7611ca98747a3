use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{JobOptions, JobService, JobStatus};
use crate::downloader::error::{DownloadError, Result};
use crate::downloader::progress::progress_pct;

const STATUS_KEYS: [&str; 7] = [
    "gid",
    "status",
    "totalLength",
    "completedLength",
    "downloadSpeed",
    "errorMessage",
    "files",
];

/// aria2 的 JSON-RPC 客户端
#[derive(Debug)]
pub struct Aria2Client {
    inner: Client,
    rpc_url: String,
    secret: Option<String>,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TellStatus {
    status: String,
    #[serde(default)]
    total_length: String,
    #[serde(default)]
    completed_length: String,
    #[serde(default)]
    download_speed: String,
    error_message: Option<String>,
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    #[serde(default)]
    path: String,
}

impl Aria2Client {
    pub fn new(rpc_url: impl Into<String>, secret: Option<String>) -> Result<Self> {
        let inner = ClientBuilder::new()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            inner,
            rpc_url: rpc_url.into(),
            secret,
            next_id: AtomicU64::new(1),
        })
    }

    fn params(&self, params: Vec<Value>) -> Vec<Value> {
        match &self.secret {
            Some(secret) => {
                let mut with_token = vec![json!(format!("token:{}", secret))];
                with_token.extend(params);
                with_token
            }
            None => params,
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id.to_string(),
            "method": method,
            "params": self.params(params),
        });
        debug!("aria2 请求: {} (id={})", method, id);

        let response = self
            .inner
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DownloadError::Rpc(e.to_string()))?;

        // aria2 出错时也会带着 JSON 错误体返回非 200，先尝试解析
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DownloadError::Rpc(e.to_string()))?;
        let parsed: RpcResponse<T> = serde_json::from_str(&text).map_err(|e| {
            DownloadError::Rpc(format!("无法解析响应 (状态码 {}): {}", status, e))
        })?;

        if let Some(err) = parsed.error {
            return Err(DownloadError::Rpc(format!("{} ({})", err.message, err.code)));
        }
        parsed
            .result
            .ok_or_else(|| DownloadError::Rpc(format!("{} 没有返回结果", method)))
    }
}

fn parse_len(value: &str) -> u64 {
    value.parse().unwrap_or(0)
}

impl From<TellStatus> for JobStatus {
    fn from(s: TellStatus) -> Self {
        let downloaded_bytes = parse_len(&s.completed_length);
        let total_bytes = parse_len(&s.total_length);
        let result_path = s
            .files
            .into_iter()
            .map(|f| f.path)
            .find(|p| !p.is_empty())
            .map(PathBuf::from);

        let (complete, failed) = match s.status.as_str() {
            "complete" => (true, false),
            "error" | "removed" => (false, true),
            _ => (false, false),
        };
        let error_message = if failed {
            Some(
                s.error_message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| format!("aria2 任务状态: {}", s.status)),
            )
        } else {
            None
        };

        JobStatus {
            complete,
            failed,
            progress_pct: progress_pct(downloaded_bytes, total_bytes),
            speed_bps: parse_len(&s.download_speed) as f64,
            downloaded_bytes,
            total_bytes,
            result_path,
            error_message,
        }
    }
}

#[async_trait]
impl JobService for Aria2Client {
    async fn submit(&self, url: &str, options: &JobOptions) -> Result<String> {
        let opts = json!({
            "dir": options.dir.to_string_lossy(),
            "out": options.out,
        });
        let gid: String = self.call("aria2.addUri", vec![json!([url]), opts]).await?;
        debug!("aria2 任务已提交: {}", gid);
        Ok(gid)
    }

    async fn status(&self, gid: &str) -> Result<JobStatus> {
        let status: TellStatus = self
            .call("aria2.tellStatus", vec![json!(gid), json!(STATUS_KEYS)])
            .await?;
        Ok(status.into())
    }

    async fn remove(&self, gid: &str) -> Result<()> {
        if let Err(e) = self.call::<String>("aria2.remove", vec![json!(gid)]).await {
            warn!("停止 aria2 任务 {} 失败: {}", gid, e);
            return Err(e);
        }
        Ok(())
    }
}
