//! Decode error types.
//!
//! Structural misconfiguration is rejected before the decode loop starts.
//! Scoring failures are never masked. Per-step numeric anomalies are not
//! errors: the step function absorbs them and reports a count.

use thiserror::Error;

use crate::memory::CacheError;

/// Errors that can occur during a decode call.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid decode configuration: {0}")]
    Configuration(String),

    #[error("Scoring function failed: {0}")]
    ScoringFailure(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Decode worker failed: {0}")]
    Runtime(String),
}

impl DecodeError {
    /// Returns true if this error was raised before decoding started.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::InvalidInput(_))
    }

    /// Returns true if the beam state of the failing call is undefined.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ScoringFailure(_) | Self::Cache(_) | Self::Model(_) | Self::Runtime(_)
        )
    }
}
