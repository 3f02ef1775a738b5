//! relmine core library
//!
//! Domain model, configuration, release source and result store shared by
//! the pipeline and the `relmine` binary.

pub mod config;
pub mod domain;
pub mod obs;
pub mod release_source;
pub mod reporting;
pub mod store;
pub mod telemetry;

pub use config::{resolve_executable, CheckoutConfig, MinerConfig, ToolConfig, ToolsConfig};

pub use domain::{
    truncate_diagnostic, AggregateReport, AnalysisResult, AnalysisStatus, BuildOutcome,
    ReleaseDescriptor, ReleaseReport, ReleaseStage, RelmineError, Result, StageTransitionError,
    DIAGNOSTIC_LIMIT,
};

pub use release_source::{
    normalize_releases, parse_repo_slug, GitHubRelease, GitHubReleaseSource, ReleaseSource,
    GITHUB_API_BASE,
};
pub use reporting::{render_aggregate_summary_txt, write_aggregate_summary_txt, write_json};
pub use store::{dir_name_for_tag, FsResultStore, ResultSink};

pub use telemetry::init_tracing;

/// relmine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
