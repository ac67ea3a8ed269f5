//! Workspace file access for the `/dev` routes.
//!
//! All paths are relative to the workspace root. Absolute paths and `..`
//! components are rejected before touching the filesystem, and the nearest
//! existing ancestor is canonicalized so a symlink cannot lead outside.

use std::path::{Component, Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Invalid workspace path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Path '{path}' resolves outside the workspace")]
    OutsideWorkspace { path: String },

    #[error("I/O error at '{path}': {reason}")]
    Io { path: String, reason: String },
}

impl WorkspaceError {
    /// Whether the caller sent a bad path, as opposed to a server-side failure.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, WorkspaceError::Io { .. })
    }
}

/// A directory the `/dev` routes may read and write.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative` against the root, rejecting escapes.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, WorkspaceError> {
        let invalid = |reason| WorkspaceError::InvalidPath {
            path: relative.to_string(),
            reason,
        };

        if relative.contains('\0') {
            return Err(invalid("contains a NUL byte"));
        }

        let candidate = Path::new(relative);
        let mut resolved = self.root.clone();
        for component in candidate.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => return Err(invalid("'..' is not allowed")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("absolute paths are not allowed"));
                }
            }
        }

        self.ensure_contained(relative, &resolved)?;
        Ok(resolved)
    }

    /// Canonicalize the nearest existing ancestor and check it stays under
    /// the root. A root that does not exist yet contains nothing to escape.
    fn ensure_contained(&self, relative: &str, resolved: &Path) -> Result<(), WorkspaceError> {
        let Ok(root) = self.root.canonicalize() else {
            return Ok(());
        };

        // symlink_metadata so a dangling link counts as the nearest entry.
        let mut nearest = resolved;
        while std::fs::symlink_metadata(nearest).is_err() {
            match nearest.parent() {
                Some(parent) => nearest = parent,
                None => return Ok(()),
            }
        }

        let outside = || WorkspaceError::OutsideWorkspace {
            path: relative.to_string(),
        };
        let canonical = match nearest.canonicalize() {
            Ok(canonical) => canonical,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(outside()),
            Err(e) => {
                return Err(WorkspaceError::Io {
                    path: relative.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        if canonical.starts_with(&root) {
            Ok(())
        } else {
            Err(outside())
        }
    }

    /// Write `content` to `relative`, creating parent directories.
    pub async fn create_file(&self, relative: &str, content: &str) -> Result<PathBuf, WorkspaceError> {
        let target = self.resolve(relative)?;
        if target == self.root {
            return Err(WorkspaceError::InvalidPath {
                path: relative.to_string(),
                reason: "a file name is required",
            });
        }

        let io_err = |e: std::io::Error| WorkspaceError::Io {
            path: relative.to_string(),
            reason: e.to_string(),
        };
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&target, content).await.map_err(io_err)?;

        debug!(path = %target.display(), bytes = content.len(), "Workspace file written");
        Ok(target)
    }

    /// Entry names directly under `relative`, sorted. A missing directory
    /// lists as empty.
    pub async fn list(&self, relative: &str) -> Result<Vec<String>, WorkspaceError> {
        let dir = self.resolve(relative)?;
        let io_err = |e: std::io::Error| WorkspaceError::Io {
            path: relative.to_string(),
            reason: e.to_string(),
        };

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}
