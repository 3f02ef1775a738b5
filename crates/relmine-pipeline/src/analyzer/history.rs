//! Repository-wide refactoring history (RefactoringMiner).
//!
//! Runs once per repository over the full clone, not per release.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use relmine_core::store::HISTORY_OUTPUT_FILE;
use relmine_core::{AnalysisResult, MinerConfig};

use super::{finish, prepare_output, skip, AnalysisContext, Analyzer, AnalyzerKind};
use crate::classify::{classify, non_empty_file, MissingArtifact, OutcomeEvidence};
use crate::runner::{execute, ToolInvocation};

#[derive(Debug, Clone)]
pub struct HistoryAnalyzer {
    program: String,
    timeout: Duration,
    report_path: Option<PathBuf>,
}

impl HistoryAnalyzer {
    pub const ID: &'static str = "refactoring_miner";

    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            report_path: None,
        }
    }

    pub fn from_config(config: &MinerConfig) -> Self {
        Self::new(
            config.tools.refactoring_miner.path.clone(),
            config.tools.refactoring_miner.timeout(),
        )
    }

    /// Write the JSON report here instead of into the output directory.
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    fn report_path(&self, output_dir: &Path) -> PathBuf {
        self.report_path
            .clone()
            .unwrap_or_else(|| output_dir.join(HISTORY_OUTPUT_FILE))
    }

    fn invocation(&self, repo: &Path, report: &Path) -> ToolInvocation {
        ToolInvocation::new(Self::ID, &self.program)
            .arg("-a")
            .arg(repo)
            .arg("-json")
            .arg(report)
            .timeout(self.timeout)
    }
}

#[async_trait]
impl Analyzer for HistoryAnalyzer {
    fn id(&self) -> &str {
        Self::ID
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::History
    }

    async fn run(&self, ctx: &AnalysisContext<'_>) -> AnalysisResult {
        if !ctx.tree.join(".git").exists() {
            return skip(Self::ID, ctx.output_dir, "not a git repository");
        }

        let report = self.report_path(ctx.output_dir);
        let report_dir = report.parent().unwrap_or(ctx.output_dir);
        if let Err(e) = prepare_output(report_dir, std::slice::from_ref(&report)) {
            return skip(Self::ID, ctx.output_dir, &format!("cannot prepare output dir: {e}"));
        }
        let outcome = execute(&self.invocation(ctx.tree, &report)).await;

        let present = non_empty_file(&report);
        let status = classify(
            &OutcomeEvidence {
                termination: outcome.termination.clone(),
                artifacts_present: present,
                findings: false,
            },
            MissingArtifact::Fail,
        );
        let artifacts = if present { vec![report] } else { Vec::new() };

        finish(Self::ID, &outcome, ctx.output_dir, status, artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmine_core::AnalysisStatus;

    #[test]
    fn test_invocation_and_report_location() {
        let analyzer = HistoryAnalyzer::new("rm.sh", Duration::from_secs(60));
        let report = analyzer.report_path(Path::new("/r/history"));
        assert_eq!(report, PathBuf::from("/r/history/refactorings-all.json"));

        let analyzer = analyzer.with_report_path("/r/refactorings-all.json");
        let report = analyzer.report_path(Path::new("/r/history"));
        assert_eq!(report, PathBuf::from("/r/refactorings-all.json"));
        assert_eq!(
            analyzer.invocation(Path::new("/p/repo"), &report).command_line(),
            "rm.sh -a /p/repo -json /r/refactorings-all.json"
        );
    }

    #[tokio::test]
    async fn test_non_repository_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("history");
        let analyzer = HistoryAnalyzer::new("/nonexistent/rm.sh", Duration::from_secs(5));

        let result = analyzer
            .run(&AnalysisContext {
                tag: None,
                tree: dir.path(),
                output_dir: &out,
                build: None,
            })
            .await;
        assert_eq!(result.status, AnalysisStatus::Skipped);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_report_written_is_success() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("repo/.git")).expect("mkdir");
        let tool = crate::test_support::write_script(
            dir.path(),
            "rm.sh",
            "echo '{\"commits\":[]}' > \"$4\"\n",
        );
        let out = dir.path().join("results/history");
        let analyzer = HistoryAnalyzer::new(tool.to_string_lossy(), Duration::from_secs(30))
            .with_report_path(dir.path().join("results/refactorings-all.json"));

        let result = analyzer
            .run(&AnalysisContext {
                tag: None,
                tree: &dir.path().join("repo"),
                output_dir: &out,
                build: None,
            })
            .await;

        assert_eq!(result.status, AnalysisStatus::Success);
        assert_eq!(
            result.artifact_paths,
            vec![dir.path().join("results/refactorings-all.json")]
        );
        assert!(out.join("refactoring_miner.log").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_crash_on_rerun_ignores_previous_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(repo.join(".git")).expect("mkdir");
        let out = dir.path().join("results/history");
        let report = dir.path().join("results/refactorings-all.json");
        let ctx = AnalysisContext {
            tag: None,
            tree: &repo,
            output_dir: &out,
            build: None,
        };

        let working = crate::test_support::write_script(
            dir.path(),
            "rm.sh",
            "echo '{\"commits\":[]}' > \"$4\"\n",
        );
        let first = HistoryAnalyzer::new(working.to_string_lossy(), Duration::from_secs(30))
            .with_report_path(report.clone())
            .run(&ctx)
            .await;
        assert_eq!(first.status, AnalysisStatus::Success);

        let crashing = crate::test_support::write_script(dir.path(), "rm-crash.sh", "exit 1\n");
        let second = HistoryAnalyzer::new(crashing.to_string_lossy(), Duration::from_secs(30))
            .with_report_path(report.clone())
            .run(&ctx)
            .await;
        assert_eq!(second.status, AnalysisStatus::Failed);
        assert!(!report.exists());
    }
}
