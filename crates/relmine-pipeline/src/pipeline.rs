//! Release pipeline orchestration.
//!
//! Releases are processed strictly in the order given, one at a time, over
//! the single checkout owned by the [`RepositoryWorkspace`]. A failing step
//! only affects its own release; the run always yields one report per
//! release.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use relmine_core::obs;
use relmine_core::{
    AggregateReport, AnalysisResult, ReleaseDescriptor, ReleaseReport, ReleaseStage, ResultSink,
};
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::analyzer::{skip, AnalysisContext, Analyzer};
use crate::build::BuildSystem;
use crate::workspace::RepositoryWorkspace;

/// Drives every release through checkout, build, analysis and recording.
pub struct PipelineOrchestrator {
    repository: String,
    config_fingerprint: String,
    workspace: Box<dyn RepositoryWorkspace>,
    build_system: Box<dyn BuildSystem>,
    analyzers: Vec<Box<dyn Analyzer>>,
    history: Option<Box<dyn Analyzer>>,
    sink: Arc<dyn ResultSink>,
}

impl PipelineOrchestrator {
    pub fn new(
        repository: impl Into<String>,
        workspace: Box<dyn RepositoryWorkspace>,
        build_system: Box<dyn BuildSystem>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            repository: repository.into(),
            config_fingerprint: String::new(),
            workspace,
            build_system,
            analyzers: Vec::new(),
            history: None,
            sink,
        }
    }

    /// Per-release analyzers, run in the given order.
    pub fn with_analyzers(mut self, analyzers: Vec<Box<dyn Analyzer>>) -> Self {
        self.analyzers = analyzers;
        self
    }

    /// Repository-wide analyzer run once after the last release.
    pub fn with_history(mut self, history: Box<dyn Analyzer>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_config_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.config_fingerprint = fingerprint.into();
        self
    }

    pub fn analyzer_ids(&self) -> Vec<&str> {
        self.analyzers.iter().map(|a| a.id()).collect()
    }

    /// Process every release and persist the aggregate.
    ///
    /// Per-release persistence failures are logged and skipped; failing to
    /// persist the aggregate is an error.
    pub async fn run(&mut self, releases: &[ReleaseDescriptor]) -> anyhow::Result<AggregateReport> {
        let start = Instant::now();
        let run_id = Uuid::new_v4();
        let total = releases.len();
        obs::emit_run_started(&run_id.to_string(), &self.repository, total);

        let mut reports = Vec::with_capacity(total);
        for (i, descriptor) in releases.iter().enumerate() {
            let index = i + 1;
            let report = self
                .process_release(descriptor, index, total)
                .instrument(obs::release_span(&descriptor.tag, index, total))
                .await?;
            let report = self.record(report)?;
            obs::emit_release_recorded(&report, index, total);
            reports.push(report);
        }

        let history = self.run_history().await;

        let aggregate = AggregateReport::fold(
            run_id,
            self.repository.clone(),
            self.config_fingerprint.clone(),
            reports,
            history,
        );
        self.sink.record_aggregate(&aggregate)?;

        obs::emit_run_finished(
            &run_id.to_string(),
            start.elapsed().as_millis() as u64,
            aggregate.total(),
            aggregate.checkout_failure_count,
        );
        Ok(aggregate)
    }

    /// Take one release from `Pending` to `Analyzed`, or to `CheckoutFailed`.
    ///
    /// Step failures are folded into the report; the only error is an
    /// illegal stage transition.
    pub async fn process_release(
        &mut self,
        descriptor: &ReleaseDescriptor,
        index: usize,
        total: usize,
    ) -> anyhow::Result<ReleaseReport> {
        let tag = descriptor.tag.as_str();
        obs::emit_release_started(tag, index, total);
        if let Err(e) = self.sink.begin_release(descriptor) {
            obs::emit_record_error(tag, &e);
        }

        let mut stage = ReleaseStage::Pending;
        let state = match self.workspace.checkout(tag).await {
            Ok(state) => state,
            Err(e) => {
                obs::emit_checkout_failed(tag, &e);
                stage.advance(ReleaseStage::CheckoutFailed)?;
                let mut report =
                    ReleaseReport::checkout_failed(descriptor.clone(), self.analyzer_ids(), &e.reason);
                for analyzer in &self.analyzers {
                    let id = analyzer.id();
                    let result = skip(id, &self.sink.analyzer_dir(tag, id), "checkout failed");
                    report.results.insert(id.to_string(), result);
                }
                return Ok(report);
            }
        };
        stage.advance(ReleaseStage::CheckedOut)?;

        let kind = self.build_system.detect(&state);
        info!(tag, build = kind.name(), "Building release");
        let build = self
            .build_system
            .build(&state, kind, &self.sink.release_dir(tag))
            .await;
        obs::emit_build_finished(tag, build.succeeded, &build.diagnostic);
        stage.advance(if build.succeeded {
            ReleaseStage::Built
        } else {
            ReleaseStage::BuildSkippedOrFailed
        })?;

        let mut results = BTreeMap::new();
        for analyzer in &self.analyzers {
            let id = analyzer.id();
            let output_dir = self.sink.analyzer_dir(tag, id);
            let result = if analyzer.requires_build() && !build.succeeded {
                skip(id, &output_dir, "build did not succeed")
            } else {
                let ctx = AnalysisContext {
                    tag: Some(tag),
                    tree: &state.root,
                    output_dir: &output_dir,
                    build: Some(&build),
                };
                analyzer.run(&ctx).await
            };
            obs::emit_analyzer_finished(tag, id, result.status);
            results.insert(id.to_string(), result);
        }
        stage.advance(ReleaseStage::Analyzed)?;

        Ok(ReleaseReport {
            descriptor: descriptor.clone(),
            stage,
            build: Some(build),
            results,
            error: None,
        })
    }

    /// Persist a finished release. An analyzed release only becomes
    /// `Recorded` once the sink accepted it.
    fn record(&self, report: ReleaseReport) -> anyhow::Result<ReleaseReport> {
        if report.stage != ReleaseStage::Analyzed {
            if let Err(e) = self.sink.record_release(&report) {
                obs::emit_record_error(report.tag(), &e);
            }
            return Ok(report);
        }

        let mut recorded = report.clone();
        recorded.stage.advance(ReleaseStage::Recorded)?;
        match self.sink.record_release(&recorded) {
            Ok(()) => Ok(recorded),
            Err(e) => {
                obs::emit_record_error(report.tag(), &e);
                Ok(report)
            }
        }
    }

    /// Run the repository-wide analyzer against the full clone.
    pub async fn run_history(&self) -> Option<AnalysisResult> {
        let history = self.history.as_ref()?;
        let output_dir = self.sink.history_dir();
        let ctx = AnalysisContext {
            tag: None,
            tree: self.workspace.root(),
            output_dir: &output_dir,
            build: None,
        };
        let result = history.run(&ctx).await;
        obs::emit_history_finished(result.status);
        Some(result)
    }
}
