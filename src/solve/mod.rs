//! The solve loop: classification, planning, generation, execution, and
//! adaptation for one question.

mod orchestrator;
mod types;

pub mod prompts;

pub use orchestrator::{SolveConfig, SolveOrchestrator, MAX_RETRIES};
pub use types::{Attempt, QualityMetrics, Question, SolveResult, TaskDescription};
