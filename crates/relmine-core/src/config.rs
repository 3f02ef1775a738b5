//! Run configuration: tool locations, time budgets and output layout.
//!
//! Every field has a default matching the container image the miner is
//! normally run in (`/workspace`, tools under `/tools`). A TOML file may
//! override any subset of them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::domain::error::{RelmineError, Result};

/// One external executable and its time budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolConfig {
    /// Executable path, or a bare name looked up on `PATH`.
    pub path: String,

    /// Wall-clock budget per invocation, in seconds.
    pub timeout_secs: u64,
}

impl ToolConfig {
    pub fn new(path: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            path: path.into(),
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self::new("", 1800)
    }
}

/// Executables used by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    pub git: ToolConfig,
    pub maven: ToolConfig,
    pub gradle: ToolConfig,
    /// Source-metric analyzer.
    pub ck: ToolConfig,
    /// Lint analyzer.
    pub pmd: ToolConfig,
    /// Ruleset passed to the lint analyzer.
    pub pmd_ruleset: String,
    /// Bytecode analyzer.
    pub spotbugs: ToolConfig,
    /// Security-rules plugin for the bytecode analyzer.
    pub findsecbugs_plugin: Option<PathBuf>,
    /// History analyzer.
    pub refactoring_miner: ToolConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            git: ToolConfig::new("git", 600),
            maven: ToolConfig::new("mvn", 1800),
            gradle: ToolConfig::new("gradle", 1800),
            ck: ToolConfig::new("ck", 1800),
            pmd: ToolConfig::new("/tools/pmd/pmd-bin-7.7.0/bin/pmd", 1800),
            pmd_ruleset: "rulesets/java/quickstart.xml".to_string(),
            spotbugs: ToolConfig::new("/tools/spotbugs/bin/spotbugs", 3600),
            findsecbugs_plugin: Some(PathBuf::from(
                "/tools/spotbugs/plugin/findsecbugs-plugin.jar",
            )),
            refactoring_miner: ToolConfig::new(
                "/tools/refactoring-miner/refactoring-miner.sh",
                7200,
            ),
        }
    }
}

/// Checkout retry settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Total force-checkout attempts per release (including the first).
    pub max_attempts: u32,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

/// Top-level miner configuration, passed into the orchestrator at construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MinerConfig {
    /// Root holding `projects/<repo>` clones and `results/<repo>` outputs.
    pub workspace_root: PathBuf,

    /// Overrides `<workspace_root>/results/<repo>` when set.
    pub output_root: Option<PathBuf>,

    pub tools: ToolsConfig,

    /// How many compiled artifacts the bytecode analyzer inspects per release.
    pub bytecode_artifact_limit: usize,

    /// Extensions deleted when a checkout has to be retried.
    pub source_extensions: Vec<String>,

    pub checkout: CheckoutConfig,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("/workspace"),
            output_root: None,
            tools: ToolsConfig::default(),
            bytecode_artifact_limit: 3,
            source_extensions: vec!["java".to_string()],
            checkout: CheckoutConfig::default(),
        }
    }
}

impl MinerConfig {
    /// Parse a TOML document; absent fields keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| RelmineError::Config(e.to_string()))
    }

    /// Load a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RelmineError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Directory holding the single mutable clone of `repo`.
    pub fn project_dir(&self, repo: &str) -> PathBuf {
        self.workspace_root.join("projects").join(repo)
    }

    /// Directory receiving every persisted result for `repo`.
    pub fn results_dir(&self, repo: &str) -> PathBuf {
        match &self.output_root {
            Some(root) => root.clone(),
            None => self.workspace_root.join("results").join(repo),
        }
    }

    /// Validate the configuration before any release is processed.
    ///
    /// Analyzer executables and git must resolve; build tools only produce a
    /// warning since a missing build tool is an ordinary build failure.
    pub fn preflight(&self) -> Result<()> {
        if self.bytecode_artifact_limit == 0 {
            return Err(RelmineError::Misconfigured(
                "bytecode_artifact_limit must be at least 1".to_string(),
            ));
        }
        if self.checkout.max_attempts == 0 {
            return Err(RelmineError::Misconfigured(
                "checkout.max_attempts must be at least 1".to_string(),
            ));
        }

        let required = [
            ("git", &self.tools.git),
            ("ck", &self.tools.ck),
            ("pmd", &self.tools.pmd),
            ("spotbugs", &self.tools.spotbugs),
            ("refactoring_miner", &self.tools.refactoring_miner),
        ];
        for (name, tool) in required {
            if tool.timeout_secs == 0 {
                return Err(RelmineError::Misconfigured(format!(
                    "tool '{name}' has a zero timeout"
                )));
            }
            if resolve_executable(&tool.path).is_none() {
                return Err(RelmineError::ToolNotFound {
                    tool: name.to_string(),
                    path: tool.path.clone(),
                });
            }
        }

        if let Some(plugin) = &self.tools.findsecbugs_plugin {
            if !plugin.is_file() {
                return Err(RelmineError::ToolNotFound {
                    tool: "findsecbugs_plugin".to_string(),
                    path: plugin.display().to_string(),
                });
            }
        }

        for (name, tool) in [("maven", &self.tools.maven), ("gradle", &self.tools.gradle)] {
            if resolve_executable(&tool.path).is_none() {
                warn!(tool = name, path = %tool.path, "Build tool not found; builds using it will fail");
            }
        }

        Ok(())
    }

    /// Deterministic digest of the tool set and limits.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        let tools = &self.tools;
        for tool in [
            &tools.git,
            &tools.maven,
            &tools.gradle,
            &tools.ck,
            &tools.pmd,
            &tools.spotbugs,
            &tools.refactoring_miner,
        ] {
            hasher.update(tool.path.as_bytes());
            hasher.update(b"\0");
            hasher.update(tool.timeout_secs.to_le_bytes());
        }
        hasher.update(tools.pmd_ruleset.as_bytes());
        hasher.update(b"\0");
        if let Some(plugin) = &tools.findsecbugs_plugin {
            hasher.update(plugin.to_string_lossy().as_bytes());
        }
        hasher.update(b"\0");
        hasher.update((self.bytecode_artifact_limit as u64).to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Resolve an executable: paths containing a separator must exist, bare
/// names are searched on `PATH`.
pub fn resolve_executable(program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }

    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|full| full.is_file())
}
