//! Persisted result layout.
//!
//! ```text
//! <results>/
//!   <tag>/metadata.json        release descriptor
//!   <tag>/build.log            captured build output
//!   <tag>/<analyzer>/          analyzer artifacts and log
//!   <tag>/summary.json         release report
//!   history/                   history analyzer log
//!   refactorings-all.json      history analyzer output
//!   analysis-summary.json      aggregate report
//!   analysis-summary.txt       human-readable aggregate
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::domain::release::ReleaseDescriptor;
use crate::domain::report::{AggregateReport, ReleaseReport};
use crate::reporting::{write_aggregate_summary_txt, write_json};

pub const METADATA_FILE: &str = "metadata.json";
pub const RELEASE_SUMMARY_FILE: &str = "summary.json";
pub const BUILD_LOG_FILE: &str = "build.log";
pub const HISTORY_OUTPUT_FILE: &str = "refactorings-all.json";
pub const AGGREGATE_JSON_FILE: &str = "analysis-summary.json";
pub const AGGREGATE_TXT_FILE: &str = "analysis-summary.txt";

/// Map a tag to a single safe directory name.
///
/// Tags that needed rewriting get a short digest of the original tag
/// appended, so `release/1.0` and `release_1.0` never share a directory.
pub fn dir_name_for_tag(tag: &str) -> String {
    let name: String = tag
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let name = match name.as_str() {
        "" | "." | ".." => format!("_{name}"),
        _ => name,
    };
    if name == tag {
        return name;
    }
    let digest = hex::encode(Sha256::digest(tag.as_bytes()));
    format!("{name}-{}", &digest[..8])
}

/// Sink for everything the orchestrator produces.
pub trait ResultSink: Send + Sync {
    /// Root directory of the results.
    fn root(&self) -> &Path;

    /// Directory holding everything for one release.
    fn release_dir(&self, tag: &str) -> PathBuf {
        self.root().join(dir_name_for_tag(tag))
    }

    /// Directory an analyzer writes its artifacts and log into.
    fn analyzer_dir(&self, tag: &str, analyzer_id: &str) -> PathBuf {
        self.release_dir(tag).join(analyzer_id)
    }

    /// Directory for repository-wide history analysis.
    fn history_dir(&self) -> PathBuf {
        self.root().join("history")
    }

    /// Persist the descriptor when a release starts.
    fn begin_release(&self, descriptor: &ReleaseDescriptor) -> Result<()>;

    /// Persist a finished release report.
    fn record_release(&self, report: &ReleaseReport) -> Result<()>;

    /// Persist the final aggregate.
    fn record_aggregate(&self, aggregate: &AggregateReport) -> Result<()>;
}

/// Filesystem result store.
#[derive(Debug, Clone)]
pub struct FsResultStore {
    root: PathBuf,
}

impl FsResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).with_context(|| format!("create {:?}", root))?;
        Ok(Self { root })
    }
}

impl ResultSink for FsResultStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn begin_release(&self, descriptor: &ReleaseDescriptor) -> Result<()> {
        let dir = self.release_dir(&descriptor.tag);
        std::fs::create_dir_all(&dir).with_context(|| format!("create {:?}", dir))?;
        write_json(&dir.join(METADATA_FILE), descriptor)
    }

    fn record_release(&self, report: &ReleaseReport) -> Result<()> {
        let dir = self.release_dir(report.tag());
        std::fs::create_dir_all(&dir).with_context(|| format!("create {:?}", dir))?;
        write_json(&dir.join(RELEASE_SUMMARY_FILE), report)
    }

    fn record_aggregate(&self, aggregate: &AggregateReport) -> Result<()> {
        write_json(&self.root.join(AGGREGATE_JSON_FILE), aggregate)?;
        write_aggregate_summary_txt(&self.root.join(AGGREGATE_TXT_FILE), aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::AnalysisResult;
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[test]
    fn test_dir_name_for_tag() {
        assert_eq!(dir_name_for_tag("jsoup-1.12.1"), "jsoup-1.12.1");
        assert_eq!(dir_name_for_tag("release_2.0"), "release_2.0");

        let slashed = dir_name_for_tag("release/2.0");
        assert!(slashed.starts_with("release_2.0-"));
        assert_eq!(slashed.len(), "release_2.0-".len() + 8);
        assert_ne!(slashed, dir_name_for_tag("release_2.0"));
        assert_ne!(dir_name_for_tag("v1 beta"), dir_name_for_tag("v1:beta"));
        assert_eq!(dir_name_for_tag("release/2.0"), slashed);

        assert!(dir_name_for_tag("..").starts_with("_..-"));
        assert!(dir_name_for_tag("").starts_with("_-"));
        assert!(!dir_name_for_tag("a/../b").contains('/'));
    }

    #[test]
    fn test_layout_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsResultStore::new(dir.path().join("results")).expect("store");

        assert_eq!(
            store.analyzer_dir("release/2.0", "pmd"),
            dir.path()
                .join("results")
                .join(dir_name_for_tag("release/2.0"))
                .join("pmd")
        );
        assert_eq!(store.history_dir(), dir.path().join("results").join("history"));
    }

    #[test]
    fn test_release_and_aggregate_documents_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsResultStore::new(dir.path()).expect("store");
        let descriptor =
            ReleaseDescriptor::on_date("v1.0", NaiveDate::from_ymd_opt(2019, 1, 1).expect("date"));

        store.begin_release(&descriptor).expect("begin");
        let report = ReleaseReport::checkout_failed(descriptor.clone(), ["ck"], "boom");
        store.record_release(&report).expect("record");

        let metadata: ReleaseDescriptor = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("v1.0").join(METADATA_FILE)).expect("read"),
        )
        .expect("parse metadata");
        assert_eq!(metadata, descriptor);

        let summary: ReleaseReport = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("v1.0").join(RELEASE_SUMMARY_FILE))
                .expect("read"),
        )
        .expect("parse summary");
        assert_eq!(summary, report);

        let aggregate = AggregateReport::fold(
            Uuid::new_v4(),
            "o/r",
            "fp",
            vec![report],
            Some(AnalysisResult::skipped("refactoring_miner", "disabled")),
        );
        store.record_aggregate(&aggregate).expect("aggregate");
        assert!(dir.path().join(AGGREGATE_JSON_FILE).is_file());
        let txt = std::fs::read_to_string(dir.path().join(AGGREGATE_TXT_FILE)).expect("read");
        assert!(txt.contains("v1.0"));
    }
}
