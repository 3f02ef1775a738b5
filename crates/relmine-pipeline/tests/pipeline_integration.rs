//! Integration tests for the release pipeline with in-memory fakes.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use relmine_core::{AnalysisStatus, ReleaseDescriptor, ReleaseStage, ResultSink};
use relmine_pipeline::fakes::{FakeAnalyzer, FakeBuildSystem, FakeWorkspace, MemoryResultSink};
use relmine_pipeline::{Analyzer, AnalyzerKind, BuildKind, PipelineOrchestrator};

fn releases(tags: &[&str]) -> Vec<ReleaseDescriptor> {
    tags.iter()
        .enumerate()
        .map(|(i, tag)| {
            let date = NaiveDate::from_ymd_opt(2020, 1, 1).expect("date")
                + chrono::Days::new(30 * i as u64);
            ReleaseDescriptor::on_date(*tag, date)
        })
        .collect()
}

struct Harness {
    ck: FakeAnalyzer,
    pmd: FakeAnalyzer,
    spotbugs: FakeAnalyzer,
    history: FakeAnalyzer,
}

impl Harness {
    fn new() -> Self {
        Self {
            ck: FakeAnalyzer::new("ck", AnalyzerKind::SourceMetric),
            pmd: FakeAnalyzer::new("pmd", AnalyzerKind::Lint),
            spotbugs: FakeAnalyzer::new("spotbugs", AnalyzerKind::Bytecode),
            history: FakeAnalyzer::new("refactoring_miner", AnalyzerKind::History),
        }
    }

    fn orchestrator(
        &self,
        workspace: FakeWorkspace,
        build: FakeBuildSystem,
        sink: Arc<MemoryResultSink>,
    ) -> PipelineOrchestrator {
        let analyzers: Vec<Box<dyn Analyzer>> = vec![
            Box::new(self.ck.clone()),
            Box::new(self.pmd.clone()),
            Box::new(self.spotbugs.clone()),
        ];
        PipelineOrchestrator::new("acme/widget", Box::new(workspace), Box::new(build), sink)
            .with_analyzers(analyzers)
            .with_history(Box::new(self.history.clone()))
            .with_config_fingerprint("cafebabe")
    }
}

/// Test: one report per release, in input order, even when a checkout fails
#[tokio::test]
async fn test_order_preserved_and_checkout_failure_isolated() {
    let input = releases(&["v1.0", "v1.1", "v2.0", "v2.1", "v3.0"]);
    let harness = Harness {
        // Vary step timing per release; order must not depend on it.
        ck: FakeAnalyzer::new("ck", AnalyzerKind::SourceMetric).with_delay(Duration::from_millis(5)),
        ..Harness::new()
    };
    let workspace = FakeWorkspace::new("/repo").with_failing_tags(["v2.0"]);
    let checkouts = workspace.checkouts();
    let dir = tempfile::tempdir().expect("tempdir");
    let sink = Arc::new(MemoryResultSink::new().with_root(dir.path()));

    let mut orchestrator = harness.orchestrator(
        workspace,
        FakeBuildSystem::new(BuildKind::MavenStyle),
        sink.clone(),
    );
    let aggregate = orchestrator.run(&input).await.expect("run");

    let input_tags: Vec<&str> = input.iter().map(|r| r.tag.as_str()).collect();
    assert_eq!(aggregate.total(), input.len());
    assert_eq!(aggregate.tags(), input_tags);
    assert_eq!(checkouts.entries(), input_tags);
    assert_eq!(aggregate.checkout_failure_count, 1);
    assert_eq!(aggregate.repository, "acme/widget");
    assert_eq!(aggregate.config_fingerprint, "cafebabe");

    let failed = &aggregate.reports[2];
    assert_eq!(failed.stage, ReleaseStage::CheckoutFailed);
    assert!(failed.build.is_none());
    assert!(failed
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("Checkout failed:")));
    assert_eq!(failed.results.len(), 3);
    assert!(failed
        .results
        .values()
        .all(|r| r.status == AnalysisStatus::Skipped));
    for id in ["ck", "pmd", "spotbugs"] {
        let log = sink.analyzer_dir("v2.0", id).join(format!("{id}.log"));
        let text = std::fs::read_to_string(&log).expect("skip log");
        assert!(text.contains("checkout failed"));
        assert_eq!(failed.results[id].log_path.as_deref(), Some(log.as_path()));
    }

    // Analyzers never saw the failed release, but saw every other one.
    assert_eq!(harness.ck.calls().entries(), vec!["v1.0", "v1.1", "v2.1", "v3.0"]);

    for report in aggregate.reports.iter().filter(|r| r.tag() != "v2.0") {
        assert_eq!(report.stage, ReleaseStage::Recorded);
        assert!(report.build_succeeded());
    }

    // Persisted in the same order.
    let recorded: Vec<String> = sink.releases().iter().map(|r| r.tag().to_string()).collect();
    assert_eq!(recorded, input_tags);
    assert_eq!(sink.begun().len(), input.len());
    assert_eq!(sink.aggregate().expect("aggregate persisted").total(), input.len());
}

/// Test: a failed build skips only the bytecode analyzer
#[tokio::test]
async fn test_failed_build_skips_bytecode_analysis_only() {
    let input = releases(&["v1.0", "v1.1"]);
    let harness = Harness::new();
    let dir = tempfile::tempdir().expect("tempdir");
    let sink = Arc::new(MemoryResultSink::new().with_root(dir.path()));

    let mut orchestrator = harness.orchestrator(
        FakeWorkspace::new("/repo"),
        FakeBuildSystem::new(BuildKind::GradleStyle).with_failing_tags(["v1.0"]),
        sink.clone(),
    );
    let aggregate = orchestrator.run(&input).await.expect("run");

    let broken = &aggregate.reports[0];
    assert!(!broken.build_succeeded());
    assert_eq!(
        broken.build.as_ref().map(|b| b.diagnostic.as_str()),
        Some("[ERROR] COMPILATION ERROR")
    );
    assert_eq!(broken.status_of("ck"), Some(AnalysisStatus::Success));
    assert_eq!(broken.status_of("pmd"), Some(AnalysisStatus::Success));
    assert_eq!(broken.status_of("spotbugs"), Some(AnalysisStatus::Skipped));
    assert_eq!(broken.stage, ReleaseStage::Recorded);
    let spotbugs_log = dir.path().join("v1.0/spotbugs/spotbugs.log");
    let text = std::fs::read_to_string(&spotbugs_log).expect("spotbugs log after failed build");
    assert!(text.contains("build did not succeed"));

    assert_eq!(harness.spotbugs.calls().entries(), vec!["v1.1"]);
    assert_eq!(aggregate.build_success_count, 1);
    assert_eq!(aggregate.success_count("spotbugs"), 1);
    assert_eq!(aggregate.success_count("ck"), 2);
}

/// Test: a tree without a build descriptor is still analyzed from source
#[tokio::test]
async fn test_no_build_descriptor() {
    let input = releases(&["v0.1"]);
    let harness = Harness::new();
    let build = FakeBuildSystem::new(BuildKind::None);
    let sink = Arc::new(MemoryResultSink::new());

    let mut orchestrator = harness.orchestrator(FakeWorkspace::new("/repo"), build, sink);
    let aggregate = orchestrator.run(&input).await.expect("run");

    let report = &aggregate.reports[0];
    assert!(!report.build_succeeded());
    assert_eq!(report.status_of("ck"), Some(AnalysisStatus::Success));
    assert_eq!(report.status_of("pmd"), Some(AnalysisStatus::Success));
    assert_eq!(report.status_of("spotbugs"), Some(AnalysisStatus::Skipped));
    assert!(harness.spotbugs.calls().is_empty());
}

/// Test: a timed-out analyzer does not stop later analyzers or releases
#[tokio::test]
async fn test_analyzer_malfunction_is_isolated() {
    let input = releases(&["v1.0", "v1.1"]);
    let harness = Harness {
        pmd: FakeAnalyzer::new("pmd", AnalyzerKind::Lint)
            .with_status("v1.0", AnalysisStatus::TimedOut)
            .with_default_status(AnalysisStatus::IssuesFound),
        ck: FakeAnalyzer::new("ck", AnalyzerKind::SourceMetric)
            .with_status("v1.1", AnalysisStatus::Failed),
        ..Harness::new()
    };
    let sink = Arc::new(MemoryResultSink::new());

    let mut orchestrator = harness.orchestrator(
        FakeWorkspace::new("/repo"),
        FakeBuildSystem::new(BuildKind::MavenStyle),
        sink,
    );
    let aggregate = orchestrator.run(&input).await.expect("run");

    assert_eq!(aggregate.reports[0].status_of("pmd"), Some(AnalysisStatus::TimedOut));
    assert_eq!(aggregate.reports[0].status_of("spotbugs"), Some(AnalysisStatus::Success));
    assert_eq!(aggregate.reports[1].status_of("pmd"), Some(AnalysisStatus::IssuesFound));
    assert_eq!(aggregate.reports[1].status_of("ck"), Some(AnalysisStatus::Failed));

    // IssuesFound counts as a correct run, TimedOut and Failed do not.
    assert_eq!(aggregate.success_count("pmd"), 1);
    assert_eq!(aggregate.success_count("ck"), 1);
    assert_eq!(aggregate.success_count("spotbugs"), 2);
}

/// Test: history analysis runs exactly once, after the last release
#[tokio::test]
async fn test_history_runs_once_against_full_clone() {
    let input = releases(&["v1.0", "v1.1", "v1.2"]);
    let harness = Harness {
        history: FakeAnalyzer::new("refactoring_miner", AnalyzerKind::History)
            .with_default_status(AnalysisStatus::Failed),
        ..Harness::new()
    };
    let sink = Arc::new(MemoryResultSink::new());

    let mut orchestrator = harness.orchestrator(
        FakeWorkspace::new("/repo"),
        FakeBuildSystem::new(BuildKind::MavenStyle),
        sink,
    );
    let aggregate = orchestrator.run(&input).await.expect("run");

    assert_eq!(harness.history.calls().entries(), vec!["*"]);
    let history = aggregate.history.as_ref().expect("history result");
    assert_eq!(history.status, AnalysisStatus::Failed);

    // History failure does not touch any per-release report.
    assert!(aggregate
        .reports
        .iter()
        .all(|r| r.stage == ReleaseStage::Recorded && !r.results.contains_key("refactoring_miner")));
}

/// Test: per-release persistence failures are tolerated, aggregate ones are not
#[tokio::test]
async fn test_persistence_failures() {
    let input = releases(&["v1.0", "v1.1"]);
    let harness = Harness::new();

    let sink = Arc::new(MemoryResultSink::new().failing_releases());
    let mut orchestrator = harness.orchestrator(
        FakeWorkspace::new("/repo"),
        FakeBuildSystem::new(BuildKind::MavenStyle),
        sink.clone(),
    );
    let aggregate = orchestrator.run(&input).await.expect("run survives release write errors");
    assert_eq!(aggregate.total(), 2);
    assert!(sink.releases().is_empty());
    assert!(sink.aggregate().is_some());
    // Unpersisted releases never reach Recorded.
    assert!(aggregate
        .reports
        .iter()
        .all(|r| r.stage == ReleaseStage::Analyzed));

    let sink = Arc::new(MemoryResultSink::new().failing_aggregate());
    let mut orchestrator = harness.orchestrator(
        FakeWorkspace::new("/repo"),
        FakeBuildSystem::new(BuildKind::MavenStyle),
        sink.clone(),
    );
    let err = orchestrator.run(&input).await.expect_err("aggregate write fails");
    assert!(err.to_string().contains("disk full"));
    assert_eq!(sink.releases().len(), 2);
    assert!(sink
        .releases()
        .iter()
        .all(|r| r.stage == ReleaseStage::Recorded));
}

/// Test: empty release list yields an empty aggregate
#[tokio::test]
async fn test_empty_release_list() {
    let harness = Harness::new();
    let sink = Arc::new(MemoryResultSink::new());
    let mut orchestrator = harness.orchestrator(
        FakeWorkspace::new("/repo"),
        FakeBuildSystem::new(BuildKind::MavenStyle),
        sink.clone(),
    );

    let aggregate = orchestrator.run(&[]).await.expect("run");
    assert_eq!(aggregate.total(), 0);
    assert_eq!(aggregate.success_count("ck"), 0);
    assert!(sink.root().ends_with("relmine-memory"));
}

#[cfg(unix)]
mod with_tool_scripts {
    use super::*;
    use relmine_core::store::{AGGREGATE_JSON_FILE, AGGREGATE_TXT_FILE, METADATA_FILE};
    use relmine_core::{dir_name_for_tag, FsResultStore};
    use relmine_pipeline::{LintAnalyzer, SourceMetricAnalyzer};
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    /// Test: lint violations with non-zero exit are IssuesFound, a hung tool
    /// is TimedOut, and the release still completes and persists.
    #[tokio::test]
    async fn test_real_processes_classified_and_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tools = dir.path().join("tools");
        let tree = dir.path().join("repo");
        std::fs::create_dir_all(&tools).expect("mkdir tools");
        std::fs::create_dir_all(tree.join("src/main/java")).expect("mkdir src");

        let ck = script(&tools, "ck", "sleep 10\n");
        let pmd = script(
            &tools,
            "pmd",
            "for last; do :; done\nprintf '\"Problem\",\"File\"\\n\"1\",\"A.java\"\\n' > \"$last\"\necho 'violations' >&2\nexit 4\n",
        );

        let analyzers: Vec<Box<dyn Analyzer>> = vec![
            Box::new(SourceMetricAnalyzer::new(
                ck.to_string_lossy(),
                Duration::from_millis(300),
            )),
            Box::new(LintAnalyzer::new(
                pmd.to_string_lossy(),
                "rulesets/java/quickstart.xml",
                Duration::from_secs(30),
            )),
        ];
        let results_root = dir.path().join("results");
        let store = Arc::new(FsResultStore::new(&results_root).expect("store"));

        let mut orchestrator = PipelineOrchestrator::new(
            "acme/widget",
            Box::new(FakeWorkspace::new(&tree)),
            Box::new(FakeBuildSystem::new(BuildKind::None)),
            store,
        )
        .with_analyzers(analyzers);

        let aggregate = orchestrator
            .run(&releases(&["release/1.0"]))
            .await
            .expect("run");

        let report = &aggregate.reports[0];
        assert_eq!(report.status_of("ck"), Some(AnalysisStatus::TimedOut));
        assert_eq!(report.status_of("pmd"), Some(AnalysisStatus::IssuesFound));

        let release_dir = results_root.join(dir_name_for_tag("release/1.0"));
        assert!(release_dir.starts_with(&results_root));
        assert!(release_dir.join(METADATA_FILE).is_file());
        assert!(release_dir.join("summary.json").is_file());
        assert!(release_dir.join("ck/ck.log").is_file());
        assert!(release_dir.join("pmd/pmd-report.csv").is_file());
        let pmd_log = std::fs::read_to_string(release_dir.join("pmd/pmd.log")).expect("pmd log");
        assert!(pmd_log.contains("exited with code 4"));
        assert!(pmd_log.contains("violations"));

        let raw = std::fs::read_to_string(results_root.join(AGGREGATE_JSON_FILE)).expect("json");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("parse aggregate");
        assert_eq!(value["repository"], "acme/widget");
        assert_eq!(value["reports"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["per_analyzer_success_count"]["pmd"], 1);
        let txt = std::fs::read_to_string(results_root.join(AGGREGATE_TXT_FILE)).expect("txt");
        assert!(txt.contains("release/1.0"));
    }
}
