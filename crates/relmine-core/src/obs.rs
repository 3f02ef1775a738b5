//! Structured log events for the mining run lifecycle.
//!
//! Every event carries an `event` field so log pipelines can filter on it:
//! `run.started`, `release.started`, `release.checkout_failed`,
//! `release.build_finished`, `analyzer.finished`, `release.recorded`,
//! `history.finished`, `run.finished`.

use tracing::{info, warn};

use crate::domain::report::{AnalysisStatus, ReleaseReport};

/// Span covering the processing of one release.
///
/// ```ignore
/// orchestrator.process_release(d).instrument(release_span("v1.2.0", 3, 20)).await;
/// // every event emitted inside carries tag = "v1.2.0"
/// ```
pub fn release_span(tag: &str, index: usize, total: usize) -> tracing::Span {
    tracing::info_span!("relmine.release", tag = %tag, index, total)
}

pub fn emit_run_started(run_id: &str, repository: &str, releases: usize) {
    info!(event = "run.started", run_id = %run_id, repository = %repository, releases);
}

pub fn emit_release_started(tag: &str, index: usize, total: usize) {
    info!(event = "release.started", tag = %tag, "[{index}/{total}] Analyzing {tag}");
}

pub fn emit_checkout_failed(tag: &str, error: &dyn std::fmt::Display) {
    warn!(event = "release.checkout_failed", tag = %tag, error = %error, "Skipping release");
}

pub fn emit_build_finished(tag: &str, succeeded: bool, diagnostic: &str) {
    if succeeded {
        info!(event = "release.build_finished", tag = %tag, succeeded);
    } else {
        warn!(event = "release.build_finished", tag = %tag, succeeded, diagnostic = %diagnostic);
    }
}

pub fn emit_analyzer_finished(tag: &str, analyzer_id: &str, status: AnalysisStatus) {
    if status.is_malfunction() {
        warn!(event = "analyzer.finished", tag = %tag, analyzer = %analyzer_id, status = %status);
    } else {
        info!(event = "analyzer.finished", tag = %tag, analyzer = %analyzer_id, status = %status);
    }
}

/// Per-release progress line, emitted once the report is persisted.
pub fn emit_release_recorded(report: &ReleaseReport, index: usize, total: usize) {
    let ran = report
        .results
        .values()
        .filter(|r| r.status.ran_correctly())
        .count();
    info!(
        event = "release.recorded",
        tag = %report.tag(),
        stage = %report.stage,
        build_succeeded = report.build_succeeded(),
        analyzers_ok = ran,
        analyzers = report.results.len(),
        "[{index}/{total}] {} done",
        report.tag()
    );
}

pub fn emit_history_finished(status: AnalysisStatus) {
    info!(event = "history.finished", status = %status);
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, releases: usize, checkout_failures: usize) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms,
        releases,
        checkout_failures,
    );
}

/// Warning for a persistence failure that does not abort the run.
pub fn emit_record_error(tag: &str, error: &dyn std::fmt::Display) {
    warn!(event = "release.record_error", tag = %tag, error = %error);
}
