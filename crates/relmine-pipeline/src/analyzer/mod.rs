//! Static-analysis tool adapters.
//!
//! Every analyzer persists the captured tool output to `<id>.log` in its
//! output directory whatever the outcome, and classifies the outcome from
//! produced artifacts rather than from the exit code.

pub mod bytecode;
pub mod history;
pub mod lint;
pub mod source_metric;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use relmine_core::{AnalysisResult, AnalysisStatus, BuildOutcome, MinerConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::runner::ProcessOutcome;

pub use bytecode::BytecodeAnalyzer;
pub use history::HistoryAnalyzer;
pub use lint::LintAnalyzer;
pub use source_metric::SourceMetricAnalyzer;

/// Analyzer family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    SourceMetric,
    Lint,
    Bytecode,
    History,
}

/// Inputs of one analyzer run.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    /// Release being analyzed; `None` for repository-wide analysis.
    pub tag: Option<&'a str>,
    /// Checked-out tree (or the full clone for history analysis).
    pub tree: &'a Path,
    /// Where artifacts and the log go.
    pub output_dir: &'a Path,
    /// Build outcome of this release, if a build was attempted.
    pub build: Option<&'a BuildOutcome>,
}

impl<'a> AnalysisContext<'a> {
    pub fn build_succeeded(&self) -> bool {
        self.build.is_some_and(|b| b.succeeded)
    }
}

/// One static-analysis tool.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Stable identifier, used as the result key and output subdirectory.
    fn id(&self) -> &str;

    fn kind(&self) -> AnalyzerKind;

    /// Whether the analyzer needs a successful build.
    fn requires_build(&self) -> bool {
        self.kind() == AnalyzerKind::Bytecode
    }

    async fn run(&self, ctx: &AnalysisContext<'_>) -> AnalysisResult;
}

/// Path of the analyzer's log file inside `output_dir`.
pub fn log_path_for(output_dir: &Path, analyzer_id: &str) -> PathBuf {
    output_dir.join(format!("{analyzer_id}.log"))
}

/// Create `output_dir` and remove artifacts left by an earlier run, so the
/// outcome is judged only on what this run produces.
pub(crate) fn prepare_output(output_dir: &Path, artifacts: &[PathBuf]) -> std::io::Result<()> {
    std::fs::create_dir_all(output_dir)?;
    for artifact in artifacts {
        match std::fs::remove_file(artifact) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Write the captured output and assemble the result.
pub(crate) fn finish(
    analyzer_id: &str,
    outcome: &ProcessOutcome,
    output_dir: &Path,
    status: AnalysisStatus,
    artifacts: Vec<PathBuf>,
) -> AnalysisResult {
    let result = AnalysisResult::new(analyzer_id, status)
        .with_artifacts(artifacts)
        .with_log(outcome.describe());

    let log_path = log_path_for(output_dir, analyzer_id);
    match outcome.write_log(&log_path) {
        Ok(()) => result.with_log_path(log_path),
        Err(e) => {
            warn!(analyzer = analyzer_id, error = %e, "Failed to write analyzer log");
            result
        }
    }
}

/// Skip without running the tool, still leaving a log behind.
pub(crate) fn skip(analyzer_id: &str, output_dir: &Path, reason: &str) -> AnalysisResult {
    let result = AnalysisResult::skipped(analyzer_id, reason);
    let log_path = log_path_for(output_dir, analyzer_id);
    let written = std::fs::create_dir_all(output_dir)
        .and_then(|()| std::fs::write(&log_path, format!("# skipped: {reason}\n")));
    match written {
        Ok(()) => result.with_log_path(log_path),
        Err(e) => {
            warn!(analyzer = analyzer_id, error = %e, "Failed to write analyzer log");
            result
        }
    }
}

/// The per-release analyzer set, in execution order.
pub fn release_analyzers(config: &MinerConfig) -> Vec<Box<dyn Analyzer>> {
    vec![
        Box::new(SourceMetricAnalyzer::from_config(config)),
        Box::new(LintAnalyzer::from_config(config)),
        Box::new(BytecodeAnalyzer::from_config(config)),
    ]
}
