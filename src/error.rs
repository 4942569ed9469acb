//! Error taxonomy for the training core (§7).
//!
//! `MissingContextFailure` and `DivergingReplayFailure` are deliberately
//! *not* variants here: per spec they are expected, non-fatal per-invocation
//! outcomes and are modeled by [`crate::replay_host::RolloutOutcome`] instead
//! of propagated as errors.

use thiserror::Error;

/// Top-level error for the training core.
#[derive(Debug, Error)]
pub enum JitRlCseError {
    #[error("replay host exited with status {code}: {stderr}")]
    ExternalHost { code: i32, stderr: String },

    #[error("replay host timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("interrupted")]
    Interrupted,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, JitRlCseError>;
