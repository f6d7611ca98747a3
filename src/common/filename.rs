use std::path::Path;

use chrono::Local;

use crate::downloader::error::{DownloadError, Result};

/// 允许下载和访问的扩展名（小写，不带点）
pub const ALLOWED_EXTENSIONS: [&str; 10] = [
    "mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "m4v", "mpg", "mpeg",
];

const FALLBACK_STEM: &str = "download";

/// 取扩展名（小写）
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn is_allowed_file_type(filename: &str) -> bool {
    extension_of(filename).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// 解码百分号转义后只保留 `[A-Za-z0-9 ._-]`
pub fn sanitize(raw: &str) -> String {
    let decoded = urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    decoded
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// 拆成主干和扩展名（扩展名带点，可能为空）
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => name.split_at(idx),
        None => (name, ""),
    }
}

/// 主干后追加后缀：`a.mp4` + `x` -> `a_x.mp4`
///
/// 主干开头的点和空格会被去掉，结果不会是隐藏文件
pub fn with_suffix(name: &str, suffix: &str) -> String {
    let (stem, ext) = split_name(name);
    let stem = stem.trim_start_matches(['.', ' ']);
    let stem = if stem.trim().is_empty() { FALLBACK_STEM } else { stem };
    format!("{}_{}{}", stem, suffix, ext)
}

/// 当前时间戳后缀
pub fn timestamp_suffix() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// 先清洗再加时间戳，`is_taken` 判定重名时继续追加序号
pub fn unique_filename(raw: &str, suffix: &str, is_taken: impl Fn(&str) -> bool) -> String {
    let base = with_suffix(&sanitize(raw), suffix);
    if !is_taken(&base) {
        return base;
    }
    (1u32..)
        .map(|n| with_suffix(&base, &n.to_string()))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or(base)
}

/// 从 URL 里取出最后一段作为原始文件名，并检查扩展名
pub fn filename_from_url(raw_url: &str) -> Result<String> {
    let parsed = url::Url::parse(raw_url)
        .map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", raw_url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(DownloadError::InvalidUrl(raw_url.to_string()));
    }

    let name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default()
        .to_string();

    // 扩展名看解码后的原始名字，清洗可能把整个主干去掉
    let decoded = urlencoding::decode(&name)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| name.clone());
    if !is_allowed_file_type(&decoded) {
        return Err(DownloadError::UnsupportedFileType(name));
    }
    Ok(name)
}

/// 对外提供下载的文件名必须是单个、已清洗过的路径段
pub fn validate_served_name(name: &str) -> Result<()> {
    if !is_allowed_file_type(name) {
        return Err(DownloadError::UnsupportedFileType(name.to_string()));
    }
    if name.starts_with('.') || sanitize(name) != name {
        return Err(DownloadError::UnsafeFilename(name.to_string()));
    }
    Ok(())
}

/// 按扩展名猜 MIME 类型，未知的当二进制
pub fn mime_type_for(filename: &str) -> &'static str {
    match extension_of(filename).as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("flv") => "video/x-flv",
        Some("wmv") => "video/x-ms-wmv",
        Some("mpg") | Some("mpeg") => "video/mpeg",
        _ => "application/octet-stream",
    }
}
