//! Class/method/field/variable size and coupling metrics (CK).

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use relmine_core::{AnalysisResult, MinerConfig};

use super::{finish, prepare_output, skip, AnalysisContext, Analyzer, AnalyzerKind};
use crate::classify::{classify, MissingArtifact, OutcomeEvidence};
use crate::runner::{execute, ToolInvocation};

/// Files CK writes into its working directory.
pub const EXPECTED_FILES: [&str; 4] = ["class.csv", "method.csv", "field.csv", "variable.csv"];

/// Source-metric analyzer. Works on the raw tree; no build needed.
#[derive(Debug, Clone)]
pub struct SourceMetricAnalyzer {
    program: String,
    timeout: Duration,
}

impl SourceMetricAnalyzer {
    pub const ID: &'static str = "ck";

    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &MinerConfig) -> Self {
        Self::new(config.tools.ck.path.clone(), config.tools.ck.timeout())
    }
}

#[async_trait]
impl Analyzer for SourceMetricAnalyzer {
    fn id(&self) -> &str {
        Self::ID
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::SourceMetric
    }

    async fn run(&self, ctx: &AnalysisContext<'_>) -> AnalysisResult {
        let expected: Vec<PathBuf> = EXPECTED_FILES.iter().map(|f| ctx.output_dir.join(f)).collect();
        if let Err(e) = prepare_output(ctx.output_dir, &expected) {
            return skip(Self::ID, ctx.output_dir, &format!("cannot prepare output dir: {e}"));
        }

        // CK writes its CSVs into the working directory.
        let invocation = ToolInvocation::new(Self::ID, &self.program)
            .arg(ctx.tree)
            .arg(".")
            .current_dir(ctx.output_dir)
            .timeout(self.timeout);
        let outcome = execute(&invocation).await;

        let artifacts: Vec<PathBuf> = expected.into_iter().filter(|p| p.is_file()).collect();

        let status = classify(
            &OutcomeEvidence {
                termination: outcome.termination.clone(),
                artifacts_present: !artifacts.is_empty(),
                findings: false,
            },
            MissingArtifact::Fail,
        );

        finish(Self::ID, &outcome, ctx.output_dir, status, artifacts)
    }
}
