//! In-memory fakes for the pipeline seams (testing only)
//!
//! Provides `FakeWorkspace`, `FakeBuildSystem`, `FakeAnalyzer`,
//! `MemoryResultSink` and `StaticReleaseSource`, which satisfy the trait
//! contracts without git, build tools or analyzers installed.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use relmine_core::{
    AggregateReport, AnalysisResult, AnalysisStatus, BuildOutcome, ReleaseDescriptor,
    ReleaseReport, ReleaseSource, RelmineError, ResultSink,
};

use crate::analyzer::{AnalysisContext, Analyzer, AnalyzerKind};
use crate::build::{BuildKind, BuildSystem};
use crate::workspace::{CheckoutError, RepositoryWorkspace, WorkspaceHandle, WorkspaceState};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared, cloneable record of calls made to a fake.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, entry: impl Into<String>) {
        lock(&self.0).push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        lock(&self.0).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.0).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// FakeWorkspace
// ---------------------------------------------------------------------------

/// Workspace whose checkouts succeed unless the tag is scripted to fail.
#[derive(Debug, Clone)]
pub struct FakeWorkspace {
    root: PathBuf,
    failing: HashSet<String>,
    checkouts: CallLog,
}

impl FakeWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            failing: HashSet::new(),
            checkouts: CallLog::default(),
        }
    }

    pub fn with_failing_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Tags passed to `checkout`, in call order.
    pub fn checkouts(&self) -> CallLog {
        self.checkouts.clone()
    }
}

#[async_trait]
impl RepositoryWorkspace for FakeWorkspace {
    async fn prepare(&mut self, remote_url: &str) -> Result<WorkspaceHandle, RelmineError> {
        Ok(WorkspaceHandle {
            root: self.root.clone(),
            remote_url: remote_url.to_string(),
            cloned: false,
        })
    }

    async fn checkout(&mut self, tag: &str) -> Result<WorkspaceState, CheckoutError> {
        self.checkouts.push(tag);
        if self.failing.contains(tag) {
            return Err(CheckoutError {
                tag: tag.to_string(),
                attempts: 2,
                reason: format!("pathspec 'refs/tags/{tag}' did not match any file(s) known to git"),
            });
        }
        Ok(WorkspaceState {
            tag: tag.to_string(),
            root: self.root.clone(),
            head_sha: format!("{:0>40}", tag.len()),
        })
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

// ---------------------------------------------------------------------------
// FakeBuildSystem
// ---------------------------------------------------------------------------

/// Build system that reports a fixed kind and fails for scripted tags.
#[derive(Debug, Clone)]
pub struct FakeBuildSystem {
    kind: BuildKind,
    failing: HashSet<String>,
    builds: CallLog,
}

impl FakeBuildSystem {
    pub fn new(kind: BuildKind) -> Self {
        Self {
            kind,
            failing: HashSet::new(),
            builds: CallLog::default(),
        }
    }

    pub fn with_failing_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Tags that were built, in call order.
    pub fn builds(&self) -> CallLog {
        self.builds.clone()
    }
}

#[async_trait]
impl BuildSystem for FakeBuildSystem {
    fn detect(&self, _state: &WorkspaceState) -> BuildKind {
        self.kind
    }

    async fn build(&self, state: &WorkspaceState, kind: BuildKind, _log_dir: &Path) -> BuildOutcome {
        self.builds.push(state.tag.as_str());
        if kind == BuildKind::None {
            return BuildOutcome::failure("No build system detected (Maven/Gradle)", None);
        }
        if self.failing.contains(&state.tag) {
            return BuildOutcome::failure("[ERROR] COMPILATION ERROR", None);
        }
        BuildOutcome::success(None)
    }
}

// ---------------------------------------------------------------------------
// FakeAnalyzer
// ---------------------------------------------------------------------------

/// Analyzer returning scripted statuses per tag.
#[derive(Debug, Clone)]
pub struct FakeAnalyzer {
    id: String,
    kind: AnalyzerKind,
    default_status: AnalysisStatus,
    scripted: HashMap<String, AnalysisStatus>,
    delay: Duration,
    calls: CallLog,
}

impl FakeAnalyzer {
    pub fn new(id: impl Into<String>, kind: AnalyzerKind) -> Self {
        Self {
            id: id.into(),
            kind,
            default_status: AnalysisStatus::Success,
            scripted: HashMap::new(),
            delay: Duration::ZERO,
            calls: CallLog::default(),
        }
    }

    pub fn with_default_status(mut self, status: AnalysisStatus) -> Self {
        self.default_status = status;
        self
    }

    pub fn with_status(mut self, tag: impl Into<String>, status: AnalysisStatus) -> Self {
        self.scripted.insert(tag.into(), status);
        self
    }

    /// Sleep before answering, to vary step timing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Tags analyzed, in call order. History runs are logged as `*`.
    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }
}

#[async_trait]
impl Analyzer for FakeAnalyzer {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> AnalyzerKind {
        self.kind
    }

    async fn run(&self, ctx: &AnalysisContext<'_>) -> AnalysisResult {
        let tag = ctx.tag.unwrap_or("*");
        self.calls.push(tag);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let status = self
            .scripted
            .get(tag)
            .copied()
            .unwrap_or(self.default_status);
        AnalysisResult::new(self.id.clone(), status).with_log(format!("{} {}", self.id, status))
    }
}

// ---------------------------------------------------------------------------
// MemoryResultSink
// ---------------------------------------------------------------------------

/// Result sink that keeps reports in memory.
///
/// Analyzer logs still go to disk under [`ResultSink::root`]; point it at a
/// temporary directory with [`MemoryResultSink::with_root`].
#[derive(Debug, Default)]
pub struct MemoryResultSink {
    root: PathBuf,
    begun: Mutex<Vec<ReleaseDescriptor>>,
    releases: Mutex<Vec<ReleaseReport>>,
    aggregate: Mutex<Option<AggregateReport>>,
    fail_releases: bool,
    fail_aggregate: bool,
}

impl MemoryResultSink {
    pub fn new() -> Self {
        Self {
            root: std::env::temp_dir().join("relmine-memory"),
            ..Self::default()
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Reject every per-release write.
    pub fn failing_releases(mut self) -> Self {
        self.fail_releases = true;
        self
    }

    /// Reject the aggregate write.
    pub fn failing_aggregate(mut self) -> Self {
        self.fail_aggregate = true;
        self
    }

    pub fn begun(&self) -> Vec<ReleaseDescriptor> {
        lock(&self.begun).clone()
    }

    pub fn releases(&self) -> Vec<ReleaseReport> {
        lock(&self.releases).clone()
    }

    pub fn aggregate(&self) -> Option<AggregateReport> {
        lock(&self.aggregate).clone()
    }
}

impl ResultSink for MemoryResultSink {
    fn root(&self) -> &Path {
        &self.root
    }

    fn begin_release(&self, descriptor: &ReleaseDescriptor) -> anyhow::Result<()> {
        if self.fail_releases {
            anyhow::bail!("disk full");
        }
        lock(&self.begun).push(descriptor.clone());
        Ok(())
    }

    fn record_release(&self, report: &ReleaseReport) -> anyhow::Result<()> {
        if self.fail_releases {
            anyhow::bail!("disk full");
        }
        lock(&self.releases).push(report.clone());
        Ok(())
    }

    fn record_aggregate(&self, aggregate: &AggregateReport) -> anyhow::Result<()> {
        if self.fail_aggregate {
            anyhow::bail!("disk full");
        }
        *lock(&self.aggregate) = Some(aggregate.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StaticReleaseSource
// ---------------------------------------------------------------------------

/// Release source returning a fixed list, or a fixed fetch error.
#[derive(Debug, Clone, Default)]
pub struct StaticReleaseSource {
    releases: Vec<ReleaseDescriptor>,
    error: Option<String>,
}

impl StaticReleaseSource {
    pub fn new(releases: Vec<ReleaseDescriptor>) -> Self {
        Self {
            releases,
            error: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            releases: Vec::new(),
            error: Some(message.into()),
        }
    }
}

#[async_trait]
impl ReleaseSource for StaticReleaseSource {
    async fn fetch_releases(
        &self,
        _owner: &str,
        _repo: &str,
    ) -> relmine_core::Result<Vec<ReleaseDescriptor>> {
        match &self.error {
            Some(message) => Err(RelmineError::Fetch(message.clone())),
            None => Ok(self.releases.clone()),
        }
    }
}
