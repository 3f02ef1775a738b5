//! Per-release and aggregate analysis reports.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::release::ReleaseDescriptor;
use crate::domain::stage::ReleaseStage;

/// Maximum length of a summary diagnostic kept in a report.
pub const DIAGNOSTIC_LIMIT: usize = 200;

/// Truncate `text` to at most `limit` characters, on a char boundary.
pub fn truncate_diagnostic(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(limit) {
        Some((idx, _)) => trimmed[..idx].to_string(),
        None => trimmed.to_string(),
    }
}

/// Result of the best-effort build of one release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildOutcome {
    pub succeeded: bool,

    /// Short summary of the failure (first characters of the error stream).
    pub diagnostic: String,

    /// Full captured build output, when a build command ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

impl BuildOutcome {
    pub fn success(log_path: Option<PathBuf>) -> Self {
        Self {
            succeeded: true,
            diagnostic: String::new(),
            log_path,
        }
    }

    pub fn failure(diagnostic: &str, log_path: Option<PathBuf>) -> Self {
        Self {
            succeeded: false,
            diagnostic: truncate_diagnostic(diagnostic, DIAGNOSTIC_LIMIT),
            log_path,
        }
    }
}

/// Classified outcome of one analyzer invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Tool ran and reported nothing of note.
    Success,
    /// Tool ran and reported findings.
    IssuesFound,
    /// Tool was not attempted (precondition not met).
    Skipped,
    /// Tool malfunctioned or could not be launched.
    Failed,
    /// Tool exceeded its time budget and was terminated.
    TimedOut,
}

impl AnalysisStatus {
    /// Whether the tool ran correctly (with or without findings).
    pub fn ran_correctly(&self) -> bool {
        matches!(self, AnalysisStatus::Success | AnalysisStatus::IssuesFound)
    }

    /// Whether the tool malfunctioned.
    pub fn is_malfunction(&self) -> bool {
        matches!(self, AnalysisStatus::Failed | AnalysisStatus::TimedOut)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnalysisStatus::Success => "success",
            AnalysisStatus::IssuesFound => "issues_found",
            AnalysisStatus::Skipped => "skipped",
            AnalysisStatus::Failed => "failed",
            AnalysisStatus::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one (release, analyzer) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisResult {
    pub analyzer_id: String,
    pub status: AnalysisStatus,

    /// Produced artifacts, in the order the analyzer reported them.
    pub artifact_paths: Vec<PathBuf>,

    /// Short human-readable log excerpt or skip reason.
    pub log: String,

    /// Full captured process output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

impl AnalysisResult {
    pub fn new(analyzer_id: impl Into<String>, status: AnalysisStatus) -> Self {
        Self {
            analyzer_id: analyzer_id.into(),
            status,
            artifact_paths: Vec::new(),
            log: String::new(),
            log_path: None,
        }
    }

    /// A result for an analyzer that was not attempted.
    pub fn skipped(analyzer_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(analyzer_id, AnalysisStatus::Skipped).with_log(reason)
    }

    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = log.into();
        self
    }

    pub fn with_log_path(mut self, path: PathBuf) -> Self {
        self.log_path = Some(path);
        self
    }

    pub fn with_artifacts(mut self, artifacts: Vec<PathBuf>) -> Self {
        self.artifact_paths = artifacts;
        self
    }
}

/// Everything recorded for one release. Never mutated after it is recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseReport {
    pub descriptor: ReleaseDescriptor,

    /// Terminal stage the release reached.
    pub stage: ReleaseStage,

    /// Absent when the release never got past checkout.
    pub build: Option<BuildOutcome>,

    /// Analyzer results keyed by analyzer id.
    pub results: BTreeMap<String, AnalysisResult>,

    /// Set when the release could not be processed at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReleaseReport {
    /// Report for a release whose checkout failed: every analyzer slot is skipped.
    pub fn checkout_failed<'a>(
        descriptor: ReleaseDescriptor,
        analyzer_ids: impl IntoIterator<Item = &'a str>,
        reason: &str,
    ) -> Self {
        let results = analyzer_ids
            .into_iter()
            .map(|id| {
                (
                    id.to_string(),
                    AnalysisResult::skipped(id, "checkout failed"),
                )
            })
            .collect();

        Self {
            descriptor,
            stage: ReleaseStage::CheckoutFailed,
            build: None,
            results,
            error: Some(format!("Checkout failed: {reason}")),
        }
    }

    pub fn tag(&self) -> &str {
        &self.descriptor.tag
    }

    pub fn status_of(&self, analyzer_id: &str) -> Option<AnalysisStatus> {
        self.results.get(analyzer_id).map(|r| r.status)
    }

    pub fn build_succeeded(&self) -> bool {
        self.build.as_ref().is_some_and(|b| b.succeeded)
    }
}

/// Chronological collection of every release outcome plus summary counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateReport {
    pub run_id: Uuid,
    pub repository: String,
    pub generated_at: DateTime<Utc>,

    /// Fingerprint of the tool configuration the run used.
    pub config_fingerprint: String,

    /// One report per input release, in input order.
    pub reports: Vec<ReleaseReport>,

    /// Number of releases where each analyzer ran correctly.
    pub per_analyzer_success_count: BTreeMap<String, usize>,

    pub build_success_count: usize,
    pub checkout_failure_count: usize,

    /// Repository-wide history analysis, independent of the per-release reports.
    pub history: Option<AnalysisResult>,
}

impl AggregateReport {
    /// Fold recorded release reports, in the order given, into the aggregate.
    pub fn fold(
        run_id: Uuid,
        repository: impl Into<String>,
        config_fingerprint: impl Into<String>,
        reports: Vec<ReleaseReport>,
        history: Option<AnalysisResult>,
    ) -> Self {
        let mut per_analyzer_success_count = BTreeMap::new();
        let mut build_success_count = 0;
        let mut checkout_failure_count = 0;

        for report in &reports {
            for (id, result) in &report.results {
                let count = per_analyzer_success_count.entry(id.clone()).or_insert(0);
                if result.status.ran_correctly() {
                    *count += 1;
                }
            }
            if report.build_succeeded() {
                build_success_count += 1;
            }
            if report.stage == ReleaseStage::CheckoutFailed {
                checkout_failure_count += 1;
            }
        }

        Self {
            run_id,
            repository: repository.into(),
            generated_at: Utc::now(),
            config_fingerprint: config_fingerprint.into(),
            reports,
            per_analyzer_success_count,
            build_success_count,
            checkout_failure_count,
            history,
        }
    }

    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn tags(&self) -> Vec<&str> {
        self.reports.iter().map(|r| r.tag()).collect()
    }

    pub fn success_count(&self, analyzer_id: &str) -> usize {
        self.per_analyzer_success_count
            .get(analyzer_id)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn release(tag: &str, y: i32, m: u32, d: u32) -> ReleaseDescriptor {
        ReleaseDescriptor::on_date(tag, NaiveDate::from_ymd_opt(y, m, d).expect("valid date"))
    }

    fn analyzed(tag: &str, statuses: &[(&str, AnalysisStatus)], built: bool) -> ReleaseReport {
        ReleaseReport {
            descriptor: release(tag, 2020, 1, 1),
            stage: ReleaseStage::Recorded,
            build: Some(if built {
                BuildOutcome::success(None)
            } else {
                BuildOutcome::failure("no build descriptor", None)
            }),
            results: statuses
                .iter()
                .map(|(id, status)| (id.to_string(), AnalysisResult::new(*id, *status)))
                .collect(),
            error: None,
        }
    }

    #[test]
    fn test_truncate_diagnostic_respects_char_boundaries() {
        let text = "é".repeat(300);
        let truncated = truncate_diagnostic(&text, DIAGNOSTIC_LIMIT);
        assert_eq!(truncated.chars().count(), DIAGNOSTIC_LIMIT);

        assert_eq!(truncate_diagnostic("  short  ", 200), "short");
    }

    #[test]
    fn test_build_failure_diagnostic_is_truncated() {
        let outcome = BuildOutcome::failure(&"x".repeat(1000), None);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.diagnostic.len(), DIAGNOSTIC_LIMIT);
    }

    #[test]
    fn test_status_classes() {
        assert!(AnalysisStatus::Success.ran_correctly());
        assert!(AnalysisStatus::IssuesFound.ran_correctly());
        assert!(!AnalysisStatus::Skipped.ran_correctly());
        assert!(!AnalysisStatus::Skipped.is_malfunction());
        assert!(AnalysisStatus::Failed.is_malfunction());
        assert!(AnalysisStatus::TimedOut.is_malfunction());
    }

    #[test]
    fn test_checkout_failed_report_skips_every_analyzer() {
        let report = ReleaseReport::checkout_failed(
            release("v1.0", 2019, 1, 1),
            ["ck", "pmd", "spotbugs"],
            "pathspec 'v1.0' did not match",
        );

        assert_eq!(report.stage, ReleaseStage::CheckoutFailed);
        assert!(report.build.is_none());
        assert_eq!(report.results.len(), 3);
        assert!(report
            .results
            .values()
            .all(|r| r.status == AnalysisStatus::Skipped));
        assert!(report.error.as_deref().unwrap_or("").contains("pathspec"));
    }

    #[test]
    fn test_fold_counts_and_preserves_order() {
        let reports = vec![
            analyzed(
                "v1.0",
                &[
                    ("ck", AnalysisStatus::Success),
                    ("pmd", AnalysisStatus::IssuesFound),
                    ("spotbugs", AnalysisStatus::Skipped),
                ],
                false,
            ),
            ReleaseReport::checkout_failed(release("v1.1", 2019, 6, 1), ["ck", "pmd", "spotbugs"], "x"),
            analyzed(
                "v2.0",
                &[
                    ("ck", AnalysisStatus::Failed),
                    ("pmd", AnalysisStatus::Success),
                    ("spotbugs", AnalysisStatus::TimedOut),
                ],
                true,
            ),
        ];

        let aggregate = AggregateReport::fold(Uuid::new_v4(), "jhy/jsoup", "abc", reports, None);

        assert_eq!(aggregate.total(), 3);
        assert_eq!(aggregate.tags(), vec!["v1.0", "v1.1", "v2.0"]);
        assert_eq!(aggregate.success_count("ck"), 1);
        assert_eq!(aggregate.success_count("pmd"), 2);
        assert_eq!(aggregate.success_count("spotbugs"), 0);
        assert!(aggregate.per_analyzer_success_count.contains_key("spotbugs"));
        assert_eq!(aggregate.build_success_count, 1);
        assert_eq!(aggregate.checkout_failure_count, 1);
    }

    #[test]
    fn test_fold_empty() {
        let aggregate = AggregateReport::fold(Uuid::new_v4(), "o/r", "abc", vec![], None);
        assert_eq!(aggregate.total(), 0);
        assert!(aggregate.per_analyzer_success_count.is_empty());
        assert_eq!(aggregate.success_count("ck"), 0);
    }
}
