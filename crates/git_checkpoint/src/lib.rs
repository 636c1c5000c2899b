//! Git checkpoint adapter: repository bootstrap, tutorial remote setup and
//! atomic checkpoint loading by cherry-picking commit sets.

use std::{
    io,
    path::{Path, PathBuf},
    process::Output,
};

use async_trait::async_trait;
use shared::domain::Checkpoint;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_REMOTE: &str = "tutorial";

/// Directory entries that do not make a workspace count as non-empty.
const IGNORED_WORKSPACE_ENTRIES: &[&str] = &[".git", ".vscode", ".DS_Store"];

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git is not installed or not on PATH")]
    GitNotInstalled,
    #[error("workspace '{}' is not empty and is not a git repository", .0.display())]
    WorkspaceNotEmpty(PathBuf),
    #[error("invalid remote uri '{0}'")]
    InvalidRemote(String),
    #[error("invalid commit reference '{0}' in checkpoint")]
    InvalidCommit(String),
    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("failed to load checkpoint {checkpoint}: {reason}")]
    CheckpointFailed { checkpoint: String, reason: String },
    #[error("git io error: {0}")]
    Io(#[from] io::Error),
}

#[async_trait]
pub trait GitCheckpoints: Send + Sync {
    async fn git_init_if_not_exists(&self) -> Result<(), GitError>;
    async fn git_setup_remote(&self, uri: &str) -> Result<(), GitError>;
    async fn load_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), GitError>;
}

/// Accepts URLs with a known git transport, scp-style `user@host:path`
/// addresses and absolute local paths.
pub fn validate_remote_uri(uri: &str) -> Result<(), GitError> {
    let trimmed = uri.trim();
    let invalid = || GitError::InvalidRemote(uri.to_string());
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    if let Ok(parsed) = Url::parse(trimmed) {
        return match parsed.scheme() {
            "file" => Ok(()),
            "http" | "https" | "ssh" | "git" if parsed.host_str().is_some() => Ok(()),
            _ => Err(invalid()),
        };
    }

    if let Some((user_host, path)) = trimmed.split_once(':') {
        if let Some((user, host)) = user_host.split_once('@') {
            if !user.is_empty() && !host.is_empty() && !path.is_empty() {
                return Ok(());
            }
        }
    }

    if Path::new(trimmed).is_absolute() {
        return Ok(());
    }

    Err(invalid())
}

/// True when `root` holds nothing but editor or VCS metadata.
pub async fn is_empty_workspace(root: &Path) -> Result<bool, GitError> {
    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !IGNORED_WORKSPACE_ENTRIES.contains(&name.as_ref()) {
            debug!(entry = %name, "workspace is not empty");
            return Ok(false);
        }
    }
    Ok(true)
}

#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    remote: String,
    committer: Option<(String, String)>,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            remote: DEFAULT_REMOTE.to_string(),
            committer: None,
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Identity recorded as committer on cherry-picked tutorial commits.
    pub fn with_committer(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.committer = Some((name.into(), email.into()));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub async fn version(&self) -> Result<String, GitError> {
        let output = self.git(&["--version"]).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn raw(&self, args: &[&str]) -> Result<Output, GitError> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.root).kill_on_drop(true);
        if let Some((name, email)) = &self.committer {
            cmd.env("GIT_COMMITTER_NAME", name)
                .env("GIT_COMMITTER_EMAIL", email)
                .env("GIT_AUTHOR_NAME", name)
                .env("GIT_AUTHOR_EMAIL", email);
        }
        match cmd.output().await {
            Ok(output) => Ok(output),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(GitError::GitNotInstalled),
            Err(err) => Err(GitError::Io(err)),
        }
    }

    async fn git(&self, args: &[&str]) -> Result<Output, GitError> {
        let output = self.raw(args).await?;
        if output.status.success() {
            return Ok(output);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(GitError::CommandFailed {
            command: args.join(" "),
            stderr,
        })
    }

    async fn head(&self) -> Result<Option<String>, GitError> {
        let output = self.raw(&["rev-parse", "--verify", "--quiet", "HEAD"]).await?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
    }

    async fn has_remote(&self) -> Result<bool, GitError> {
        let output = self.git(&["remote"]).await?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .any(|line| line.trim() == self.remote))
    }

    async fn has_tracked_changes(&self) -> Result<bool, GitError> {
        let output = self
            .git(&["status", "--porcelain", "--untracked-files=no"])
            .await?;
        Ok(!output.stdout.is_empty())
    }

    async fn cherry_pick_all(&self, commits: &[String]) -> Result<(), GitError> {
        for commit in commits {
            debug!(commit = %commit, "cherry-picking checkpoint commit");
            self.git(&["cherry-pick", "-X", "theirs", commit.as_str()])
                .await?;
        }
        Ok(())
    }

    /// Puts HEAD and the working tree back to where they were before a failed load.
    async fn rollback(&self, head: Option<&str>, stashed: bool) {
        let _ = self.raw(&["cherry-pick", "--abort"]).await;

        let reset = match head {
            Some(head) => self.git(&["reset", "--hard", "--quiet", head]).await.map(|_| ()),
            None => self.reset_unborn().await,
        };
        if let Err(err) = reset {
            warn!(error = %err, "failed to reset workspace after checkpoint failure");
        }

        if stashed {
            if let Err(err) = self.git(&["stash", "pop", "--index", "--quiet"]).await {
                warn!(error = %err, "failed to restore stashed local changes");
            }
        }
    }

    /// Reapplies stashed edits on top of a loaded checkpoint. Paths that
    /// conflict with the checkpoint keep the checkpoint's version.
    async fn restore_local_changes(&self) -> Result<(), GitError> {
        let applied = self.raw(&["stash", "apply", "--quiet"]).await?;
        if !applied.status.success() {
            let output = self
                .git(&["diff", "--name-only", "--diff-filter=U"])
                .await?;
            let conflicted: Vec<String> = String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(str::trim)
                .filter(|path| !path.is_empty())
                .map(str::to_string)
                .collect();
            if conflicted.is_empty() {
                return Err(GitError::CommandFailed {
                    command: "stash apply".to_string(),
                    stderr: String::from_utf8_lossy(&applied.stderr).trim().to_string(),
                });
            }
            debug!(paths = ?conflicted, "local edits overwritten by checkpoint");
            let mut args = vec!["checkout", "HEAD", "--"];
            args.extend(conflicted.iter().map(String::as_str));
            self.git(&args).await?;
        }
        self.git(&["stash", "drop", "--quiet"]).await?;
        Ok(())
    }

    async fn reset_unborn(&self) -> Result<(), GitError> {
        if self.head().await?.is_some() {
            self.git(&["update-ref", "-d", "HEAD"]).await?;
        }
        self.git(&["read-tree", "--empty"]).await?;
        self.git(&["clean", "-fdq"]).await?;
        Ok(())
    }
}

#[async_trait]
impl GitCheckpoints for GitCli {
    async fn git_init_if_not_exists(&self) -> Result<(), GitError> {
        if self.root.join(".git").exists() {
            debug!(root = %self.root.display(), "git repository already present");
            return Ok(());
        }
        if !is_empty_workspace(&self.root).await? {
            return Err(GitError::WorkspaceNotEmpty(self.root.clone()));
        }
        self.git(&["init", "--quiet"]).await?;
        info!(root = %self.root.display(), "initialized git repository");
        Ok(())
    }

    async fn git_setup_remote(&self, uri: &str) -> Result<(), GitError> {
        validate_remote_uri(uri)?;
        let uri = uri.trim();

        if self.has_remote().await? {
            self.git(&["remote", "set-url", self.remote.as_str(), uri])
                .await?;
        } else {
            self.git(&["remote", "add", self.remote.as_str(), uri])
                .await?;
        }
        self.git(&["fetch", "--quiet", self.remote.as_str()]).await?;
        info!(remote = %self.remote, uri, "tutorial remote configured");
        Ok(())
    }

    async fn load_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), GitError> {
        if checkpoint.is_empty() {
            return Ok(());
        }
        if let Some(commit) = checkpoint.invalid_commit() {
            return Err(GitError::InvalidCommit(commit.to_string()));
        }

        if self.has_remote().await? {
            self.git(&["fetch", "--quiet", self.remote.as_str()]).await?;
        }

        let head = self.head().await?;
        let stashed = head.is_some() && self.has_tracked_changes().await?;
        if stashed {
            self.git(&["stash", "push", "--quiet"]).await?;
        }

        match self.cherry_pick_all(&checkpoint.commits).await {
            Ok(()) => {
                // The checkpoint is in place at this point; a failed restore
                // leaves the edits in the stash instead of failing the load.
                if stashed {
                    if let Err(err) = self.restore_local_changes().await {
                        warn!(
                            checkpoint = %checkpoint.id,
                            error = %err,
                            "failed to restore local changes; they remain in the git stash"
                        );
                    }
                }
                info!(
                    checkpoint = %checkpoint.id,
                    commits = checkpoint.commits.len(),
                    "checkpoint loaded"
                );
                Ok(())
            }
            Err(err) => {
                warn!(checkpoint = %checkpoint.id, error = %err, "checkpoint load failed, rolling back");
                self.rollback(head.as_deref(), stashed).await;
                Err(GitError::CheckpointFailed {
                    checkpoint: checkpoint.id.to_string(),
                    reason: err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
