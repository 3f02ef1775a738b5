//! Domain models for relmine.
//!
//! Canonical definitions for the core entities:
//! - `ReleaseDescriptor`: immutable identity of a published release
//! - `ReleaseStage`: per-release pipeline state machine
//! - `BuildOutcome`, `AnalysisResult`, `ReleaseReport`: per-release outcomes
//! - `AggregateReport`: chronological fold over all release reports

pub mod error;
pub mod release;
pub mod report;
pub mod stage;

// Re-export main types and errors
pub use error::{RelmineError, Result};
pub use release::ReleaseDescriptor;
pub use report::{
    truncate_diagnostic, AggregateReport, AnalysisResult, AnalysisStatus, BuildOutcome,
    ReleaseReport, DIAGNOSTIC_LIMIT,
};
pub use stage::{ReleaseStage, StageTransitionError};
