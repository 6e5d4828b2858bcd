//! Error types for the equivalence and measurement engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Hard failures of the engine.
///
/// Comparison mismatches and validation findings are first-class results,
/// never errors; only unrecoverable conditions land here.
#[derive(Error, Debug)]
pub enum Error {
    /// A result set violates its own structural invariants (collaborator bug)
    #[error("malformed result set: {0}")]
    MalformedResult(String),

    /// A rule set failed validation during resolution
    #[error("invalid comparison rules: {0}")]
    InvalidRules(String),

    /// The profiler could not collect enough successful runs
    #[error("insufficient samples: {got} successful runs, {floor} required")]
    InsufficientSamples { got: usize, floor: usize },

    /// No pricing is registered for the requested model
    #[error("no pricing found for model '{0}'")]
    UnknownModel(String),
}

impl Error {
    /// Create a malformed-result error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResult(msg.into())
    }

    /// Create an invalid-rules error
    pub fn invalid_rules(msg: impl Into<String>) -> Self {
        Self::InvalidRules(msg.into())
    }
}
