//! Outcome classification for analyzer runs.
//!
//! Analysis tools routinely exit non-zero to say "found issues", so the
//! exit code alone is not a malfunction signal. Classification looks at the
//! runner's termination first (did the tool run at all, did it time out),
//! then at the produced artifacts and whether they carry findings.

use std::path::Path;

use relmine_core::AnalysisStatus;

use crate::runner::Termination;

/// What to conclude when the tool ran but produced no artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingArtifact {
    /// The artifact is mandatory; its absence is a failure.
    Fail,
    /// Absence is fine when the tool exited 0 (nothing to report).
    SuccessOnCleanExit,
}

/// Evidence gathered after a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeEvidence {
    pub termination: Termination,
    /// At least one expected artifact exists.
    pub artifacts_present: bool,
    /// The artifacts contain findings.
    pub findings: bool,
}

/// Map evidence to a status.
pub fn classify(evidence: &OutcomeEvidence, missing: MissingArtifact) -> AnalysisStatus {
    let exit_code = match &evidence.termination {
        Termination::TimedOut => return AnalysisStatus::TimedOut,
        Termination::LaunchFailed(_) | Termination::Signaled => return AnalysisStatus::Failed,
        Termination::Exited(code) => *code,
    };

    if evidence.artifacts_present {
        return if evidence.findings {
            AnalysisStatus::IssuesFound
        } else {
            AnalysisStatus::Success
        };
    }

    match missing {
        MissingArtifact::SuccessOnCleanExit if exit_code == 0 => AnalysisStatus::Success,
        _ => AnalysisStatus::Failed,
    }
}

/// A CSV report has findings when it holds at least one row after the header.
pub fn csv_has_rows(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .map(|content| content.lines().filter(|l| !l.trim().is_empty()).count() > 1)
        .unwrap_or(false)
}

/// A SpotBugs XML report has findings when it contains a bug instance.
pub fn xml_has_bug_instances(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .map(|content| content.contains("<BugInstance"))
        .unwrap_or(false)
}

/// Whether `path` exists and is a non-empty file.
pub fn non_empty_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}
