//! relmine pipeline
//!
//! Checks out each release of a repository into a single workspace, builds
//! it best-effort, runs the static-analysis tools against it and records the
//! outcome:
//! - Bounded, shell-free tool execution (`runner`)
//! - Artifact-based outcome classification (`classify`)
//! - Sequential, failure-isolating orchestration (`pipeline`)

pub mod analyzer;
pub mod build;
pub mod classify;
pub mod fakes;
pub mod pipeline;
pub mod retry;
pub mod runner;
pub mod workspace;

#[cfg(all(test, unix))]
mod test_support;

// Re-export key types
pub use analyzer::{
    release_analyzers, AnalysisContext, Analyzer, AnalyzerKind, BytecodeAnalyzer,
    HistoryAnalyzer, LintAnalyzer, SourceMetricAnalyzer,
};
pub use build::{BuildKind, BuildSystem, ProjectBuildSystem};
pub use classify::{classify, MissingArtifact, OutcomeEvidence};
pub use pipeline::PipelineOrchestrator;
pub use retry::{CheckoutRetryPolicy, CleanupAction};
pub use runner::{execute, ProcessOutcome, Termination, ToolInvocation};
pub use workspace::{
    CheckoutError, GitWorkspace, RepositoryWorkspace, WorkspaceHandle, WorkspaceState,
};
