//! Durable persistence of produced artifacts.
//!
//! The batch runner accumulates artifact paths and hands them to a
//! [`CheckpointSink`] every N documents, then once more at the end. What
//! "durable" means is up to the sink: [`GitCheckpoint`] commits (and
//! optionally pushes) the files, [`LogCheckpoint`] only records that a
//! flush happened.

use crate::error::Pdf2TeiError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};

/// Message used for flushes at the checkpoint cadence.
pub const CHECKPOINT_MESSAGE: &str = "Persisting feature conversions";

/// Message used for the flush after the last document.
pub const FINAL_CHECKPOINT_MESSAGE: &str = "Persisting remaining feature conversions";

/// Somewhere a batch of artifacts can be made durable.
#[async_trait]
pub trait CheckpointSink: Send + Sync {
    /// Persist `files` with a short description of the change.
    ///
    /// Called only with a non-empty list.
    async fn persist(&self, files: &[PathBuf], message: &str) -> Result<(), Pdf2TeiError>;
}

/// Sink that only logs. Useful for dry runs and for corpora that are not
/// under version control.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCheckpoint;

#[async_trait]
impl CheckpointSink for LogCheckpoint {
    async fn persist(&self, files: &[PathBuf], message: &str) -> Result<(), Pdf2TeiError> {
        info!("{message}: {} files (not committed)", files.len());
        Ok(())
    }
}

/// Sink that records each checkpoint as a git commit.
#[derive(Debug, Clone)]
pub struct GitCheckpoint {
    workdir: PathBuf,
    push: bool,
}

impl GitCheckpoint {
    /// Commit inside `workdir` (any directory within the repository).
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            push: false,
        }
    }

    /// Also `git push` after each commit.
    pub fn push(mut self, v: bool) -> Self {
        self.push = v;
        self
    }

    async fn output(
        &self,
        args: &[&str],
        files: &[PathBuf],
        message: &str,
    ) -> Result<Output, Pdf2TeiError> {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.workdir).args(args);
        if !files.is_empty() {
            cmd.arg("--").args(files.iter().map(|p| absolute(p)));
        }
        debug!("git {} ({} paths)", args.join(" "), files.len());

        cmd.output().await.map_err(|e| Pdf2TeiError::CheckpointFailed {
            message: message.to_string(),
            detail: format!("could not run git: {e}"),
        })
    }

    async fn git(
        &self,
        args: &[&str],
        files: &[PathBuf],
        message: &str,
    ) -> Result<(), Pdf2TeiError> {
        let output = self.output(args, files, message).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Pdf2TeiError::CheckpointFailed {
                message: message.to_string(),
                detail: format!(
                    "git {} exited with {}: {}",
                    args[0],
                    output.status,
                    stderr.trim()
                ),
            });
        }
        Ok(())
    }

    /// True when the index holds no change to `files` relative to HEAD.
    async fn nothing_staged(
        &self,
        files: &[PathBuf],
        message: &str,
    ) -> Result<bool, Pdf2TeiError> {
        let output = self
            .output(&["diff", "--cached", "--quiet"], files, message)
            .await?;
        Ok(output.status.success())
    }
}

#[async_trait]
impl CheckpointSink for GitCheckpoint {
    async fn persist(&self, files: &[PathBuf], message: &str) -> Result<(), Pdf2TeiError> {
        self.git(&["add"], files, message).await?;
        if self.nothing_staged(files, message).await? {
            info!("{message}: {} files unchanged, nothing to commit", files.len());
            return Ok(());
        }
        self.git(&["commit", "-m", message], files, message).await?;
        if self.push {
            self.git(&["push"], &[], message).await?;
        }
        info!("{message}: committed {} files", files.len());
        Ok(())
    }
}

/// Relative paths are resolved against the process cwd, not `workdir`.
fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn log_checkpoint_always_succeeds() {
        let sink = LogCheckpoint;
        let files = vec![PathBuf::from("a.md"), PathBuf::from("a.xml")];
        tokio_test::block_on(sink.persist(&files, CHECKPOINT_MESSAGE)).unwrap();
    }

    #[test]
    fn absolute_keeps_absolute_paths() {
        assert_eq!(absolute(Path::new("/x/y.md")), PathBuf::from("/x/y.md"));
        assert!(absolute(Path::new("y.md")).is_absolute());
    }

    #[tokio::test]
    async fn git_checkpoint_reports_missing_workdir() {
        let tmp = TempDir::new().unwrap();
        let sink = GitCheckpoint::new(tmp.path().join("does-not-exist"));
        let err = sink
            .persist(&[tmp.path().join("a.md")], CHECKPOINT_MESSAGE)
            .await
            .unwrap_err();
        match err {
            Pdf2TeiError::CheckpointFailed { message, .. } => {
                assert_eq!(message, CHECKPOINT_MESSAGE)
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
