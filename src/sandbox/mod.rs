//! Candidate-code execution.
//!
//! A sandbox runs one generated code unit against bound inputs and reports a
//! structured outcome. It owns no state across calls and performs no retries;
//! the solve loop decides what a failure means. Isolation is best-effort
//! (restricted builtins, subprocess boundary, deadline), not a security
//! boundary against a hostile model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::classifier::ErrorKind;

mod python;

pub use python::{PythonSandbox, SandboxConfig, DEFAULT_ALLOWED_BUILTINS};

/// Sentinel success value for code that sets no `result` binding.
pub const NO_RESULT: &str = "no result";

/// Outcome of executing one code candidate.
///
/// Failures here are data consumed by the retry loop, not crate errors; even
/// a sandbox that fails to start reports through this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success {
        value: Value,
    },
    Failure {
        kind: ErrorKind,
        message: String,
    },
}

impl ExecutionOutcome {
    /// Successful execution with a result value.
    pub fn success(value: impl Into<Value>) -> Self {
        Self::Success {
            value: value.into(),
        }
    }

    /// Successful execution that produced no `result` binding.
    pub fn no_result() -> Self {
        Self::Success {
            value: Value::String(NO_RESULT.to_string()),
        }
    }

    /// Failed execution with a classified kind and raw message.
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Render the outcome as answer text: strings verbatim, other values as
    /// JSON, failures as their message.
    pub fn answer_text(&self) -> String {
        match self {
            Self::Success {
                value: Value::String(s),
            } => s.clone(),
            Self::Success { value } => value.to_string(),
            Self::Failure { message, .. } => message.clone(),
        }
    }
}

/// Executes a single code unit against bound inputs.
///
/// Implementations must be stateless per call: nothing from one `run`
/// survives into the next.
#[async_trait]
pub trait CodeSandbox: Send + Sync {
    /// Execute `code` with `inputs` bound into its environment. The
    /// conventional `result` binding is the returned value; its absence is
    /// the [`NO_RESULT`] sentinel success, not a failure.
    async fn run(&self, code: &str, inputs: &HashMap<String, Value>) -> ExecutionOutcome;
}
