pub mod cli;
pub mod cloud;
pub mod common;
pub mod downloader;
pub mod jobs;

#[cfg(feature = "http")]
pub mod server;

pub use downloader::{DownloadError, DownloadRegistry};
