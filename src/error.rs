//! Error types for roe-core.

use thiserror::Error;

/// Result type alias using roe-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a solve run.
///
/// Recoverable execution failures (bad generated code, runtime errors in the
/// sandbox) are not represented here; they travel through
/// [`crate::sandbox::ExecutionOutcome`] so the retry loop can consume them.
/// An `Error` reaching the orchestrator aborts the current run.
#[derive(Error, Debug)]
pub enum Error {
    /// Inference backend unreachable or returned an HTTP-level failure
    #[error("Transport error: {provider} - {message}")]
    Transport { provider: String, message: String },

    /// Sandbox subprocess communication error
    #[error("Subprocess communication error: {0}")]
    SubprocessComm(String),

    /// Timeout during operation
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Budget exhausted
    #[error("Budget exhausted: {resource}")]
    BudgetExhausted { resource: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a transport error.
    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a budget exhausted error.
    pub fn budget_exhausted(resource: impl Into<String>) -> Self {
        Self::BudgetExhausted {
            resource: resource.into(),
        }
    }

    /// Whether this error came from the inference transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
