//! Data model for a solve run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::sandbox::ExecutionOutcome;

/// Immutable input to one solve run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// The question text
    pub text: String,
    /// Ordered attached-file references (paths persisted before the run)
    pub files: Vec<String>,
    /// Free-text constraints or instructions
    pub constraints: Option<String>,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            files: Vec::new(),
            constraints: None,
        }
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    pub fn with_constraints(mut self, constraints: impl Into<String>) -> Self {
        self.constraints = Some(constraints.into());
        self
    }

    /// Inputs bound into the sandbox environment for this question.
    pub fn sandbox_inputs(&self) -> HashMap<String, Value> {
        let mut inputs = HashMap::new();
        inputs.insert("files".to_string(), Value::from(self.files.clone()));
        inputs
    }
}

/// Classification output: task type plus extracted parameters, as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescription(pub String);

impl TaskDescription {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Best-effort fact-seeking dispatch: a case-insensitive "fact-based"
    /// substring in the classification text. A heuristic, not a guaranteed
    /// classification boundary.
    pub fn is_fact_seeking(&self) -> bool {
        self.0.to_lowercase().contains("fact-based")
    }
}

impl std::fmt::Display for TaskDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry in the attempt log. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// The plan that produced this attempt's code
    pub plan_snapshot: String,
    /// The generated candidate (absent for the fact-seeking shortcut)
    pub code_snapshot: Option<String>,
    /// Execution outcome, with the classified failure kind
    pub outcome: ExecutionOutcome,
    /// Diagnostic notes for this attempt
    pub debug_notes: String,
    /// When the attempt was recorded
    pub timestamp: DateTime<Utc>,
}

impl Attempt {
    pub fn new(
        plan_snapshot: impl Into<String>,
        code_snapshot: Option<String>,
        outcome: ExecutionOutcome,
        debug_notes: impl Into<String>,
    ) -> Self {
        Self {
            plan_snapshot: plan_snapshot.into(),
            code_snapshot,
            outcome,
            debug_notes: debug_notes.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Running counters for one solve run. Monotonically non-decreasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Candidates rejected by the syntax checker
    pub syntax_error_count: u64,
    /// Executions that ended in a failure outcome
    pub runtime_error_count: u64,
    /// Successful executions (at most 1 per run)
    pub success_count: u64,
}

/// Final structured result of a solve run. The caller always receives one of
/// these, never a raw error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResult {
    /// Unique run identifier
    pub run_id: Uuid,
    /// The answer text (or an error/exhaustion report)
    pub final_answer: String,
    /// The last solution plan in effect
    pub execution_steps: String,
    /// Ordered, append-only attempt history
    pub attempt_log: Vec<Attempt>,
    /// Per-run counters
    pub quality_metrics: QualityMetrics,
    /// Run-level diagnostics
    pub debug_notes: String,
}

impl SolveResult {
    /// Degraded result for a run aborted at the top-level failure boundary.
    pub fn degraded(run_id: Uuid, error_message: impl Into<String>) -> Self {
        Self {
            run_id,
            final_answer: "error".to_string(),
            execution_steps: "Unable to complete the task due to an error.".to_string(),
            attempt_log: Vec::new(),
            quality_metrics: QualityMetrics::default(),
            debug_notes: error_message.into(),
        }
    }

    /// Whether the run was aborted before producing any attempt.
    pub fn is_degraded(&self) -> bool {
        self.final_answer == "error" && self.attempt_log.is_empty()
    }
}
