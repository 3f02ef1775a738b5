//! Rule-based source lint (PMD).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use relmine_core::{AnalysisResult, MinerConfig};

use super::{finish, prepare_output, skip, AnalysisContext, Analyzer, AnalyzerKind};
use crate::classify::{classify, csv_has_rows, non_empty_file, MissingArtifact, OutcomeEvidence};
use crate::runner::{execute, ToolInvocation};

pub const REPORT_FILE: &str = "pmd-report.csv";

/// Lint analyzer over the tree's `src` directory.
#[derive(Debug, Clone)]
pub struct LintAnalyzer {
    program: String,
    ruleset: String,
    timeout: Duration,
}

impl LintAnalyzer {
    pub const ID: &'static str = "pmd";

    pub fn new(program: impl Into<String>, ruleset: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            ruleset: ruleset.into(),
            timeout,
        }
    }

    pub fn from_config(config: &MinerConfig) -> Self {
        Self::new(
            config.tools.pmd.path.clone(),
            config.tools.pmd_ruleset.clone(),
            config.tools.pmd.timeout(),
        )
    }

    fn invocation(&self, src: &Path, report: &Path) -> ToolInvocation {
        ToolInvocation::new(Self::ID, &self.program)
            .arg("check")
            .arg("-d")
            .arg(src)
            .arg("-R")
            .arg(&self.ruleset)
            .args(["-f", "csv", "-r"])
            .arg(report)
            .timeout(self.timeout)
    }
}

#[async_trait]
impl Analyzer for LintAnalyzer {
    fn id(&self) -> &str {
        Self::ID
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Lint
    }

    async fn run(&self, ctx: &AnalysisContext<'_>) -> AnalysisResult {
        let src = ctx.tree.join("src");
        if !src.is_dir() {
            return skip(Self::ID, ctx.output_dir, "source directory not found");
        }
        let report = ctx.output_dir.join(REPORT_FILE);
        if let Err(e) = prepare_output(ctx.output_dir, std::slice::from_ref(&report)) {
            return skip(Self::ID, ctx.output_dir, &format!("cannot prepare output dir: {e}"));
        }

        let outcome = execute(&self.invocation(&src, &report)).await;

        // Exit code 4 means "violations found"; the report decides.
        let present = non_empty_file(&report);
        let status = classify(
            &OutcomeEvidence {
                termination: outcome.termination.clone(),
                artifacts_present: present,
                findings: present && csv_has_rows(&report),
            },
            MissingArtifact::SuccessOnCleanExit,
        );
        let artifacts: Vec<PathBuf> = if present { vec![report] } else { Vec::new() };

        finish(Self::ID, &outcome, ctx.output_dir, status, artifacts)
    }
}
