use crate::error::SyncError;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Thin wrapper over the `git` binary with a per-invocation deadline.
#[derive(Debug, Clone)]
pub(crate) struct Git {
    timeout: Duration,
}

impl Git {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run git with `args`, optionally inside `cwd`, returning trimmed stdout.
    pub(crate) async fn run<I, S>(&self, cwd: Option<&Path>, args: I) -> Result<String, SyncError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let command = args
            .first()
            .map(|a| a.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut cmd = Command::new("git");
        cmd.args(&args)
            // Never block on a credential prompt.
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        debug!(command = %command, cwd = ?cwd, "Running git");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(SyncError::GitUnavailable(e.to_string())),
            Err(_) => {
                return Err(SyncError::Timeout {
                    command,
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            return Err(SyncError::GitFailed {
                command,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Commit id of HEAD in `repo`.
    pub(crate) async fn head(&self, repo: &Path) -> Result<String, SyncError> {
        self.run(Some(repo), ["rev-parse", "HEAD"]).await
    }
}
