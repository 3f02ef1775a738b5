//! Best-effort project build.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use relmine_core::store::BUILD_LOG_FILE;
use relmine_core::{BuildOutcome, MinerConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::runner::{execute, ToolInvocation};
use crate::workspace::WorkspaceState;

/// Build tooling recognised at the tree root.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuildKind {
    /// `pom.xml`
    MavenStyle,
    /// `build.gradle` / `build.gradle.kts`
    GradleStyle,
    None,
}

impl BuildKind {
    pub fn name(&self) -> &'static str {
        match self {
            BuildKind::MavenStyle => "maven",
            BuildKind::GradleStyle => "gradle",
            BuildKind::None => "none",
        }
    }

    /// Select the build kind from the descriptor files present in `root`.
    pub fn detect_in(root: &Path) -> BuildKind {
        if root.join("pom.xml").is_file() {
            BuildKind::MavenStyle
        } else if root.join("build.gradle").is_file() || root.join("build.gradle.kts").is_file() {
            BuildKind::GradleStyle
        } else {
            BuildKind::None
        }
    }
}

/// Detects and runs the project's build. Never fatal to the pipeline.
#[async_trait]
pub trait BuildSystem: Send + Sync {
    fn detect(&self, state: &WorkspaceState) -> BuildKind;

    /// Compile with tests disabled; output goes to `log_dir`.
    async fn build(&self, state: &WorkspaceState, kind: BuildKind, log_dir: &Path) -> BuildOutcome;
}

/// Maven/Gradle build driven by configured executables.
#[derive(Debug, Clone)]
pub struct ProjectBuildSystem {
    maven: String,
    maven_timeout: Duration,
    gradle: String,
    gradle_timeout: Duration,
}

impl ProjectBuildSystem {
    pub fn new(
        maven: impl Into<String>,
        maven_timeout: Duration,
        gradle: impl Into<String>,
        gradle_timeout: Duration,
    ) -> Self {
        Self {
            maven: maven.into(),
            maven_timeout,
            gradle: gradle.into(),
            gradle_timeout,
        }
    }

    pub fn from_config(config: &MinerConfig) -> Self {
        Self::new(
            config.tools.maven.path.clone(),
            config.tools.maven.timeout(),
            config.tools.gradle.path.clone(),
            config.tools.gradle.timeout(),
        )
    }

    /// Build command for `kind`, or `None` when there is nothing to build.
    pub fn invocation(&self, kind: BuildKind, root: &Path) -> Option<ToolInvocation> {
        let invocation = match kind {
            BuildKind::MavenStyle => ToolInvocation::new("maven", &self.maven)
                .args(["clean", "package", "-DskipTests", "-q"])
                .timeout(self.maven_timeout),
            BuildKind::GradleStyle => ToolInvocation::new("gradle", &self.gradle)
                .args(["clean", "build", "-x", "test", "-q"])
                .timeout(self.gradle_timeout),
            BuildKind::None => return None,
        };
        Some(invocation.current_dir(root))
    }
}

#[async_trait]
impl BuildSystem for ProjectBuildSystem {
    fn detect(&self, state: &WorkspaceState) -> BuildKind {
        BuildKind::detect_in(&state.root)
    }

    async fn build(&self, state: &WorkspaceState, kind: BuildKind, log_dir: &Path) -> BuildOutcome {
        let Some(invocation) = self.invocation(kind, &state.root) else {
            return BuildOutcome::failure("No build system detected (Maven/Gradle)", None);
        };

        let outcome = execute(&invocation).await;
        let log_path: PathBuf = log_dir.join(BUILD_LOG_FILE);
        let log_path = match outcome.write_log(&log_path) {
            Ok(()) => Some(log_path),
            Err(e) => {
                warn!(path = %log_path.display(), error = %e, "Failed to write build log");
                None
            }
        };

        if outcome.success() {
            return BuildOutcome::success(log_path);
        }

        let diagnostic = if outcome.stderr.trim().is_empty() {
            outcome.describe()
        } else {
            outcome.stderr.clone()
        };
        BuildOutcome::failure(&diagnostic, log_path)
    }
}
