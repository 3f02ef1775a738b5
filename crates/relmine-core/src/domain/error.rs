//! Domain-level error taxonomy for relmine.
//!
//! Only the run-scoped kinds (`Fetch`, `InvalidRepository`, `ToolNotFound`,
//! `Misconfigured`, `Config`) are meant to abort a run. Release-scoped failures
//! are captured as data in the release reports instead of being raised.

/// relmine domain errors.
#[derive(Debug, thiserror::Error)]
pub enum RelmineError {
    #[error("release fetch failed: {0}")]
    Fetch(String),

    #[error("invalid repository '{0}': expected owner/repo")]
    InvalidRepository(String),

    #[error("tool '{tool}' not found at {path}")]
    ToolNotFound { tool: String, path: String },

    #[error("misconfigured: {0}")]
    Misconfigured(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("checkout of {tag} failed: {reason}")]
    Checkout { tag: String, reason: String },

    #[error("git error: {0}")]
    Git(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelmineError {
    /// Whether this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelmineError::Fetch(_)
                | RelmineError::InvalidRepository(_)
                | RelmineError::ToolNotFound { .. }
                | RelmineError::Misconfigured(_)
                | RelmineError::Config(_)
        )
    }
}

impl From<reqwest::Error> for RelmineError {
    fn from(err: reqwest::Error) -> Self {
        RelmineError::Fetch(err.to_string())
    }
}

/// Result type for relmine domain operations.
pub type Result<T> = std::result::Result<T, RelmineError>;
