//! Local mirror of the external knowledge repository.
//!
//! Workflow of [`KnowledgeMirror::sync`]:
//! 1. Take the mirror's sync lock (one clone/pull at a time), then an
//!    advisory lock on a `.{name}.lock` sibling file so a second process
//!    (e.g. `nexus sync` next to `nexus serve`) fails fast with
//!    [`SyncError::Busy`] instead of racing on the same directory.
//! 2. Directory absent → clone into a sibling staging directory, then
//!    rename it into place. Directory present → `git pull --ff-only`.
//! 3. Record the outcome so status reporting can observe degradation.
//!
//! A failed attempt leaves the directory exactly as it was.

use crate::error::SyncError;
use crate::git::Git;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// What a successful sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Cloned,
    Pulled,
}

/// Outcome of the most recent sync attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    NeverSynced,
    Succeeded {
        action: SyncAction,
        at: DateTime<Utc>,
        head: Option<String>,
    },
    Failed {
        at: DateTime<Utc>,
        error: String,
    },
}

/// A directory bound to a remote repository URL.
#[derive(Debug)]
pub struct KnowledgeMirror {
    path: PathBuf,
    remote_url: String,
    branch: Option<String>,
    git: Git,
    sync_lock: Mutex<()>,
    status: RwLock<SyncStatus>,
}

impl KnowledgeMirror {
    pub fn new(path: impl Into<PathBuf>, remote_url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            remote_url: remote_url.into(),
            branch: None,
            git: Git::new(Duration::from_secs(300)),
            sync_lock: Mutex::new(()),
            status: RwLock::new(SyncStatus::NeverSynced),
        }
    }

    /// Track `branch` instead of the remote's default branch.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_git_timeout(mut self, timeout: Duration) -> Self {
        self.git = Git::new(timeout);
        self
    }

    pub fn from_config(config: &nexus_config::KnowledgeConfig) -> Self {
        let mirror = Self::new(&config.dir, &config.repo_url)
            .with_git_timeout(Duration::from_secs(config.git_timeout_secs));
        match &config.branch {
            Some(branch) => mirror.with_branch(branch),
            None => mirror,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    /// Whether a checkout directory currently exists.
    pub fn is_present(&self) -> bool {
        self.path.is_dir()
    }

    /// Snapshot of the last sync outcome.
    pub fn status(&self) -> SyncStatus {
        self.status
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Clone the repository if absent, fast-forward it otherwise.
    ///
    /// Concurrent calls queue on the mirror's lock; a sync already running
    /// in another process makes this return [`SyncError::Busy`]. Errors are logged and
    /// recorded in [`KnowledgeMirror::status`] before being returned, so
    /// callers that only need best-effort behaviour may ignore them.
    pub async fn sync(&self) -> Result<SyncAction, SyncError> {
        let _guard = self.sync_lock.lock().await;
        let started = Instant::now();

        let result = self.sync_with_file_lock().await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let status = match &result {
            Ok(action) => {
                let head = self.git.head(&self.path).await.ok();
                info!(
                    mirror = %self.path.display(),
                    action = ?action,
                    head = head.as_deref().unwrap_or("unknown"),
                    elapsed_ms,
                    "Knowledge mirror synced"
                );
                SyncStatus::Succeeded {
                    action: *action,
                    at: Utc::now(),
                    head,
                }
            }
            Err(e) => {
                warn!(
                    mirror = %self.path.display(),
                    remote = %self.remote_url,
                    error = %e,
                    elapsed_ms,
                    "Knowledge mirror sync failed; keeping previous state"
                );
                SyncStatus::Failed {
                    at: Utc::now(),
                    error: e.to_string(),
                }
            }
        };
        *self.status.write().unwrap_or_else(|e| e.into_inner()) = status;

        result
    }

    async fn sync_with_file_lock(&self) -> Result<SyncAction, SyncError> {
        let mut lock = self.open_lock_file().await?;
        let _held = match lock.try_write() {
            Ok(guard) => guard,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(SyncError::Busy {
                    lock: self.lock_path(),
                });
            }
            Err(e) => {
                return Err(SyncError::Io {
                    path: self.lock_path(),
                    reason: e.to_string(),
                });
            }
        };

        if self.path.exists() {
            self.pull().await.map(|()| SyncAction::Pulled)
        } else {
            self.clone_fresh().await.map(|()| SyncAction::Cloned)
        }
    }

    async fn open_lock_file(&self) -> Result<fd_lock::RwLock<std::fs::File>, SyncError> {
        let path = self.lock_path();
        let io_err = |e: std::io::Error| SyncError::Io {
            path: path.clone(),
            reason: e.to_string(),
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        Ok(fd_lock::RwLock::new(file.into_std().await))
    }

    async fn pull(&self) -> Result<(), SyncError> {
        // git would otherwise operate on an enclosing repository.
        if !self.path.join(".git").exists() {
            return Err(SyncError::NotACheckout {
                path: self.path.clone(),
            });
        }

        let mut args = vec!["pull", "--ff-only", "--quiet"];
        if let Some(branch) = &self.branch {
            args.extend(["origin", branch.as_str()]);
        }
        self.git.run(Some(&self.path), args).await.map(|_| ())
    }

    async fn clone_fresh(&self) -> Result<(), SyncError> {
        let staging = self.staging_path();
        if let Some(parent) = staging.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::Io {
                    path: parent.to_path_buf(),
                    reason: e.to_string(),
                })?;
        }

        let mut args = vec![OsStr::new("clone"), OsStr::new("--quiet")];
        if let Some(branch) = &self.branch {
            args.extend([OsStr::new("--branch"), OsStr::new(branch)]);
        }
        args.extend([OsStr::new(&self.remote_url), staging.as_os_str()]);

        let cloned = self.git.run(None, args).await;
        let result = match cloned {
            Ok(_) => tokio::fs::rename(&staging, &self.path)
                .await
                .map_err(|e| SyncError::Io {
                    path: self.path.clone(),
                    reason: e.to_string(),
                }),
            Err(e) => Err(e),
        };

        if result.is_err() && staging.exists() {
            let _ = tokio::fs::remove_dir_all(&staging).await;
        }
        result
    }

    fn dir_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "knowledge".into())
    }

    /// Sibling directory used for an in-progress clone.
    fn staging_path(&self) -> PathBuf {
        self.path.with_file_name(format!(
            ".{}.partial-{}",
            self.dir_name(),
            uuid::Uuid::new_v4().simple()
        ))
    }

    /// Sibling file guarding syncs across processes.
    pub fn lock_path(&self) -> PathBuf {
        self.path.with_file_name(format!(".{}.lock", self.dir_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::sync::Arc;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn git(cwd: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(["-c", "user.name=nexus", "-c", "user.email=nexus@example.com"])
            .args(args)
            .current_dir(cwd)
            .output()
            .unwrap();
        assert!(
            status.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&status.stderr)
        );
    }

    /// Create `<root>/work` with one commit and a bare `<root>/remote.git` cloned from it.
    fn make_remote(root: &Path, agents_md: &str) -> (PathBuf, PathBuf) {
        let work = root.join("work");
        std::fs::create_dir_all(&work).unwrap();
        git(&work, &["init", "-q"]);
        std::fs::write(work.join("AGENTS.md"), agents_md).unwrap();
        git(&work, &["add", "AGENTS.md"]);
        git(&work, &["commit", "-q", "-m", "initial"]);
        git(root, &["clone", "-q", "--bare", "work", "remote.git"]);
        (work, root.join("remote.git"))
    }

    fn remote_url(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn new_mirror_is_never_synced() {
        let mirror = KnowledgeMirror::new("/nonexistent/kit", "https://example.com/kit.git");
        assert_eq!(mirror.status(), SyncStatus::NeverSynced);
        assert!(!mirror.is_present());
        assert_eq!(mirror.remote_url(), "https://example.com/kit.git");
    }

    #[test]
    fn from_config_applies_branch() {
        let config = nexus_config::KnowledgeConfig {
            branch: Some("stable".into()),
            ..Default::default()
        };
        let mirror = KnowledgeMirror::from_config(&config);
        assert_eq!(mirror.branch.as_deref(), Some("stable"));
        assert_eq!(mirror.path(), config.dir.as_path());
    }

    #[test]
    fn staging_path_is_a_hidden_sibling() {
        let mirror = KnowledgeMirror::new("/srv/data/kit", "url");
        let staging = mirror.staging_path();
        assert_eq!(staging.parent(), Some(Path::new("/srv/data")));
        let name = staging.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".kit.partial-"));
    }

    #[test]
    fn lock_file_is_a_hidden_sibling() {
        let mirror = KnowledgeMirror::new("/srv/data/kit", "url");
        assert_eq!(mirror.lock_path(), PathBuf::from("/srv/data/.kit.lock"));
    }

    #[tokio::test]
    async fn sync_held_by_another_process_is_busy() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("kit");
        let mirror = KnowledgeMirror::new(&target, "https://example.invalid/kit.git")
            .with_git_timeout(Duration::from_secs(30));

        // A separate open file description stands in for another process.
        let other = std::fs::File::create(mirror.lock_path()).unwrap();
        let mut other = fd_lock::RwLock::new(other);
        let held = other.try_write().unwrap();

        let err = mirror.sync().await.unwrap_err();
        assert!(matches!(err, SyncError::Busy { .. }));
        assert!(!target.exists());
        assert!(matches!(mirror.status(), SyncStatus::Failed { .. }));

        drop(held);
        let err = mirror.sync().await.unwrap_err();
        assert!(!matches!(err, SyncError::Busy { .. }));
    }

    #[tokio::test]
    async fn failed_clone_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("kit");
        let mirror = KnowledgeMirror::new(&target, remote_url(&tmp.path().join("missing.git")))
            .with_git_timeout(Duration::from_secs(30));

        let result = mirror.sync().await;

        assert!(result.is_err());
        assert!(!target.exists());
        assert!(matches!(mirror.status(), SyncStatus::Failed { .. }));
        // No staging directories survive either; only the lock file remains.
        let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(leftovers, vec![mirror.lock_path()]);
    }

    #[tokio::test]
    async fn failed_pull_keeps_existing_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("kit");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("AGENTS.md"), "hand-made").unwrap();

        let mirror = KnowledgeMirror::new(&target, "https://example.invalid/kit.git")
            .with_git_timeout(Duration::from_secs(30));
        let err = mirror.sync().await.unwrap_err();

        assert!(matches!(err, SyncError::NotACheckout { .. }));
        assert_eq!(err.kind(), "sync_error");
        assert!(matches!(mirror.status(), SyncStatus::Failed { .. }));
        assert_eq!(
            std::fs::read_to_string(target.join("AGENTS.md")).unwrap(),
            "hand-made"
        );
    }

    #[tokio::test]
    async fn sync_clones_when_absent() {
        if !git_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let (_work, remote) = make_remote(tmp.path(), "Rule: always answer in English.");
        let target = tmp.path().join("mirror").join("kit");
        let mirror = KnowledgeMirror::new(&target, remote_url(&remote));

        let action = mirror.sync().await.unwrap();

        assert_eq!(action, SyncAction::Cloned);
        assert_eq!(
            std::fs::read_to_string(target.join("AGENTS.md")).unwrap(),
            "Rule: always answer in English."
        );
        match mirror.status() {
            SyncStatus::Succeeded { action, head, .. } => {
                assert_eq!(action, SyncAction::Cloned);
                assert_eq!(head.map(|h| h.len()), Some(40));
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sync_twice_is_idempotent() {
        if !git_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let (_work, remote) = make_remote(tmp.path(), "v1");
        let target = tmp.path().join("kit");
        let mirror = KnowledgeMirror::new(&target, remote_url(&remote));

        assert_eq!(mirror.sync().await.unwrap(), SyncAction::Cloned);
        assert_eq!(std::fs::read_to_string(target.join("AGENTS.md")).unwrap(), "v1");

        assert_eq!(mirror.sync().await.unwrap(), SyncAction::Pulled);
        assert_eq!(std::fs::read_to_string(target.join("AGENTS.md")).unwrap(), "v1");
    }

    #[tokio::test]
    async fn pull_fast_forwards_new_commits() {
        if !git_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let (work, remote) = make_remote(tmp.path(), "v1");
        let target = tmp.path().join("kit");
        let mirror = KnowledgeMirror::new(&target, remote_url(&remote));
        mirror.sync().await.unwrap();

        std::fs::write(work.join("AGENTS.md"), "v2").unwrap();
        git(&work, &["commit", "-q", "-am", "update"]);
        git(&work, &["push", "-q", remote.to_str().unwrap(), "HEAD"]);

        assert_eq!(mirror.sync().await.unwrap(), SyncAction::Pulled);
        assert_eq!(std::fs::read_to_string(target.join("AGENTS.md")).unwrap(), "v2");
    }

    #[tokio::test]
    async fn concurrent_syncs_are_serialized() {
        if !git_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let (_work, remote) = make_remote(tmp.path(), "shared");
        let target = tmp.path().join("kit");
        let mirror = Arc::new(KnowledgeMirror::new(&target, remote_url(&remote)));

        let (a, b) = tokio::join!(mirror.sync(), mirror.sync());
        let mut actions = vec![a.unwrap(), b.unwrap()];
        actions.sort_by_key(|a| matches!(a, SyncAction::Pulled));

        assert_eq!(actions, vec![SyncAction::Cloned, SyncAction::Pulled]);
        assert_eq!(
            std::fs::read_to_string(target.join("AGENTS.md")).unwrap(),
            "shared"
        );
    }
}
