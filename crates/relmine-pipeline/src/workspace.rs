//! The single mutable checkout used for every release.
//!
//! `checkout` guarantees the tree matches the requested tag with no residue
//! from earlier releases: untracked and ignored files are swept, tracked
//! files are reset, the tag is force-checked-out under a bounded retry
//! policy, and a final sweep removes anything the checkout left behind.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use relmine_core::{MinerConfig, RelmineError};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::retry::{CheckoutRetryPolicy, CleanupAction};
use crate::runner::{execute, ProcessOutcome, ToolInvocation};

/// The tree bound to exactly one release tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceState {
    pub tag: String,
    pub root: PathBuf,
    /// Commit the tag resolved to.
    pub head_sha: String,
}

/// Result of preparing the clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceHandle {
    pub root: PathBuf,
    pub remote_url: String,
    /// `true` when the clone was created, `false` when an existing one was fetched.
    pub cloned: bool,
}

/// A release could not be checked out. The tree is clean but the tag is
/// not checked out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("checkout of {tag} failed after {attempts} attempt(s): {reason}")]
pub struct CheckoutError {
    pub tag: String,
    pub attempts: u32,
    pub reason: String,
}

/// Owner of the mutable checkout. `&mut self` on `checkout` serializes calls.
#[async_trait]
pub trait RepositoryWorkspace: Send + Sync {
    /// Clone if absent, otherwise fetch all refs and tags.
    async fn prepare(&mut self, remote_url: &str) -> Result<WorkspaceHandle, RelmineError>;

    /// Force the tree into the state of `tag`.
    async fn checkout(&mut self, tag: &str) -> Result<WorkspaceState, CheckoutError>;

    /// Root of the full clone (used by repository-wide analysis).
    fn root(&self) -> &Path;
}

/// Git-backed workspace.
pub struct GitWorkspace {
    root: PathBuf,
    git: String,
    timeout: Duration,
    policy: CheckoutRetryPolicy,
    source_extensions: Vec<String>,
}

impl GitWorkspace {
    pub fn new(root: impl Into<PathBuf>, git: impl Into<String>, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            git: git.into(),
            timeout,
            policy: CheckoutRetryPolicy::default(),
            source_extensions: vec!["java".to_string()],
        }
    }

    /// Workspace at `<workspace_root>/projects/<repo>` configured from `config`.
    pub fn from_config(config: &MinerConfig, repo: &str) -> Self {
        Self::new(
            config.project_dir(repo),
            config.tools.git.path.clone(),
            config.tools.git.timeout(),
        )
        .with_policy(
            CheckoutRetryPolicy::default().with_max_attempts(config.checkout.max_attempts),
        )
        .with_source_extensions(config.source_extensions.clone())
    }

    pub fn with_policy(mut self, policy: CheckoutRetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_source_extensions(mut self, extensions: Vec<String>) -> Self {
        self.source_extensions = extensions;
        self
    }

    fn git_invocation(&self, args: &[&str]) -> ToolInvocation {
        let safe_directory = format!("safe.directory={}", self.root.display());
        ToolInvocation::new("git", &self.git)
            .args(["-c", safe_directory.as_str()])
            .args(args)
            .current_dir(&self.root)
            .timeout(self.timeout)
    }

    async fn run_git(&self, args: &[&str]) -> ProcessOutcome {
        execute(&self.git_invocation(args)).await
    }

    /// Remove untracked and ignored files. Failures are logged, not fatal.
    async fn sweep_untracked(&self) {
        let outcome = self.run_git(&["clean", "-fdx"]).await;
        if !outcome.success() {
            warn!(root = %self.root.display(), error = %outcome.stderr.trim(), "git clean failed");
        }
    }

    async fn reset_tracked(&self) {
        let outcome = self.run_git(&["reset", "--hard", "HEAD"]).await;
        if !outcome.success() {
            debug!(error = %outcome.stderr.trim(), "git reset --hard failed");
        }
    }

    async fn force_checkout(&self, tag: &str) -> ProcessOutcome {
        let target = format!("refs/tags/{tag}");
        self.run_git(&["checkout", "--force", "--detach", target.as_str()])
            .await
    }

    /// Delete every file with a configured source extension outside `.git`.
    pub fn delete_untracked_sources(&self) -> std::io::Result<usize> {
        let mut deleted = 0;
        let walker = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git");
        for entry in walker {
            let entry = entry.map_err(std::io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let matches = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| self.source_extensions.iter().any(|s| s == ext));
            if matches {
                std::fs::remove_file(entry.path())?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn apply_cleanup(&self, action: CleanupAction) {
        match action {
            CleanupAction::SweepUntracked => self.sweep_untracked().await,
            CleanupAction::DeleteUntrackedSources => match self.delete_untracked_sources() {
                Ok(count) => info!(count, "Deleted source files before retrying checkout"),
                Err(e) => warn!(error = %e, "Failed to delete source files"),
            },
        }
    }

    async fn head_sha(&self) -> Result<String, String> {
        let outcome = self.run_git(&["rev-parse", "HEAD"]).await;
        if !outcome.success() {
            return Err(outcome.describe());
        }
        let sha = outcome.stdout.trim().to_string();
        if sha.is_empty() {
            return Err("git rev-parse HEAD returned empty output".to_string());
        }
        Ok(sha)
    }
}

#[async_trait]
impl RepositoryWorkspace for GitWorkspace {
    async fn prepare(&mut self, remote_url: &str) -> Result<WorkspaceHandle, RelmineError> {
        let cloned = !self.root.join(".git").exists();

        let outcome = if cloned {
            if let Some(parent) = self.root.parent() {
                std::fs::create_dir_all(parent)?;
            }
            info!(remote = %remote_url, root = %self.root.display(), "Cloning repository");
            let invocation = ToolInvocation::new("git", &self.git)
                .args(["clone", "--"])
                .arg(remote_url)
                .arg(&self.root)
                .timeout(self.timeout);
            execute(&invocation).await
        } else {
            info!(root = %self.root.display(), "Repository exists, fetching refs and tags");
            self.run_git(&["fetch", "--all", "--tags", "--force"]).await
        };

        if !outcome.success() {
            return Err(RelmineError::Git(format!(
                "{}: {}",
                outcome.describe(),
                outcome.stderr.trim()
            )));
        }

        Ok(WorkspaceHandle {
            root: self.root.clone(),
            remote_url: remote_url.to_string(),
            cloned,
        })
    }

    async fn checkout(&mut self, tag: &str) -> Result<WorkspaceState, CheckoutError> {
        // A single pass can miss files regenerated by a half-finished operation.
        self.sweep_untracked().await;
        self.sweep_untracked().await;
        self.reset_tracked().await;

        let mut attempts = 0;
        let mut last_error = String::new();
        while attempts < self.policy.max_attempts {
            attempts += 1;
            if let Some(action) = self.policy.cleanup_before(attempts) {
                self.apply_cleanup(action).await;
            }

            let outcome = self.force_checkout(tag).await;
            if outcome.success() {
                last_error.clear();
                break;
            }
            last_error = format!("{}: {}", outcome.describe(), outcome.stderr.trim());
            debug!(tag, attempt = attempts, error = %last_error, "Checkout attempt failed");
        }

        if !last_error.is_empty() {
            self.sweep_untracked().await;
            return Err(CheckoutError {
                tag: tag.to_string(),
                attempts,
                reason: last_error,
            });
        }

        self.sweep_untracked().await;

        let head_sha = self.head_sha().await.map_err(|reason| CheckoutError {
            tag: tag.to_string(),
            attempts,
            reason,
        })?;

        Ok(WorkspaceState {
            tag: tag.to_string(),
            root: self.root.clone(),
            head_sha,
        })
    }

    fn root(&self) -> &Path {
        &self.root
    }
}
