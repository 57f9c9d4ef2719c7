//! Error types for the enforcement pipeline.
//!
//! Numeric edge cases (zero-norm vectors, wildcard slots, anchor truncation)
//! are not errors: they have defined values and are surfaced through logs and
//! evidence. Everything here aborts an evaluation with a typed failure so the
//! caller never receives a partial decision.

use std::fmt;

use thiserror::Error;

/// External collaborator a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Embedder,
    BoundaryStore,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upstream::Embedder => write!(f, "embedder"),
            Upstream::BoundaryStore => write!(f, "boundary store"),
        }
    }
}

/// Errors that can occur while encoding, loading or evaluating boundaries.
#[derive(Debug, Error)]
pub enum EnforcementError {
    /// The embedder or boundary store failed; no decision was made.
    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable { service: Upstream, reason: String },

    /// The embedder or boundary store did not answer in time.
    #[error("{service} call timed out after {elapsed_ms} ms")]
    Timeout { service: Upstream, elapsed_ms: u64 },

    /// A boundary violates its invariants (missing thresholds, bad ranges, ...).
    #[error("invalid boundary '{boundary_id}': {reason}")]
    InvalidBoundary { boundary_id: String, reason: String },

    /// The intent document could not be parsed.
    #[error("invalid intent: {0}")]
    InvalidIntent(String),

    /// Reference boundary store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration value could not be parsed or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EnforcementError {
    pub fn invalid_boundary(boundary_id: impl Into<String>, reason: impl Into<String>) -> Self {
        EnforcementError::InvalidBoundary {
            boundary_id: boundary_id.into(),
            reason: reason.into(),
        }
    }

    /// True for failures of an external collaborator (embedder or store),
    /// the class a caller may map to fail-open or fail-closed.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            EnforcementError::UpstreamUnavailable { .. } | EnforcementError::Timeout { .. }
        )
    }
}

impl From<rusqlite::Error> for EnforcementError {
    fn from(err: rusqlite::Error) -> Self {
        EnforcementError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EnforcementError>;
