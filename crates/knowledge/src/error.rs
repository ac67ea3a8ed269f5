//! Knowledge-side failures. Neither is user-visible: callers log them and
//! fall back to the previous checkout or to empty context.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("git is not available: {0}")]
    GitUnavailable(String),

    #[error("git {command} failed (exit code {code:?}): {stderr}")]
    GitFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("git {command} timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },

    #[error("{} exists but is not a git checkout", path.display())]
    NotACheckout { path: PathBuf },

    #[error("I/O error at {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    #[error("another process is syncing (lock held: {})", lock.display())]
    Busy { lock: PathBuf },
}

impl SyncError {
    pub fn kind(&self) -> &'static str {
        "sync_error"
    }
}

#[derive(Debug, Clone, Error)]
pub enum ContextReadError {
    #[error("context file not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("context file unreadable: {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
}

impl ContextReadError {
    pub fn kind(&self) -> &'static str {
        "context_read_error"
    }
}
