use std::path::{Path, PathBuf};

use serde::Serialize;

/// 传输状态
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    Initializing,
    Downloading,
    Completed,
    Failed,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferState::Completed | TransferState::Failed)
    }
}

/// 一个进行中的下载在进程内的记录。
///
/// 只有驱动它的那个任务（直连流或者轮询循环）会修改它；
/// 一旦进入终态，所有修改方法都变成空操作，这样终态事件不会被发两次。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferHandle {
    pub id: String,
    pub filename: String,
    pub source_url: String,
    pub total_size: u64,
    pub downloaded_size: u64,
    pub state: TransferState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

impl TransferHandle {
    pub fn new(id: impl Into<String>, filename: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            source_url: source_url.into(),
            total_size: 0,
            downloaded_size: 0,
            state: TransferState::Initializing,
            last_error: None,
            file_path: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// 更新进度。返回值表示状态是否被改动
    pub fn update_progress(&mut self, downloaded: u64, total: u64) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = TransferState::Downloading;
        // 大小只增不减
        self.downloaded_size = self.downloaded_size.max(downloaded);
        if total > 0 {
            self.total_size = total;
        }
        true
    }

    /// 标记完成。只有从非终态迁移过来时返回 true
    pub fn mark_complete(&mut self, final_path: &Path) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = TransferState::Completed;
        self.file_path = Some(final_path.to_path_buf());
        if self.total_size == 0 {
            self.total_size = self.downloaded_size;
        }
        true
    }

    /// 标记失败。只有从非终态迁移过来时返回 true
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = TransferState::Failed;
        self.last_error = Some(reason.into());
        true
    }

    /// 完成后客户端取文件用的路径
    pub fn file_url(&self) -> String {
        format!("/downloads/{}", self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> TransferHandle {
        TransferHandle::new("id-1", "a_20240101_000000.mp4", "http://x/a.mp4")
    }

    #[test]
    fn test_new_handle_is_initializing() {
        let h = handle();
        assert_eq!(h.state, TransferState::Initializing);
        assert_eq!(h.total_size, 0);
        assert!(!h.is_terminal());
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut h = handle();
        h.update_progress(500, 1000);
        h.update_progress(300, 1000);
        assert_eq!(h.downloaded_size, 500);
        assert_eq!(h.state, TransferState::Downloading);
    }

    #[test]
    fn test_unknown_total_keeps_known_total() {
        let mut h = handle();
        h.update_progress(10, 1000);
        h.update_progress(20, 0);
        assert_eq!(h.total_size, 1000);
    }

    #[test]
    fn test_terminal_transitions_happen_once() {
        let mut h = handle();
        assert!(h.mark_complete(Path::new("/tmp/a.mp4")));
        assert!(!h.mark_complete(Path::new("/tmp/b.mp4")));
        assert!(!h.mark_failed("late"));
        assert!(!h.update_progress(9999, 9999));
        assert_eq!(h.state, TransferState::Completed);
        assert_eq!(h.file_path.as_deref(), Some(Path::new("/tmp/a.mp4")));
        assert!(h.last_error.is_none());
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut h = handle();
        assert!(h.mark_failed("boom"));
        assert!(h.is_terminal());
        assert!(!h.mark_complete(Path::new("/tmp/a.mp4")));
        assert_eq!(h.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_complete_with_unknown_total_uses_downloaded() {
        let mut h = handle();
        h.update_progress(4096, 0);
        h.mark_complete(Path::new("/tmp/a.mp4"));
        assert_eq!(h.total_size, 4096);
        assert_eq!(h.file_url(), "/downloads/a_20240101_000000.mp4");
    }
}
