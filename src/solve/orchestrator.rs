//! The adaptive solve loop.
//!
//! A bounded-retry state machine: classify the task, plan a solution,
//! generate candidate code, validate it, execute it in the sandbox, classify
//! any failure, and either regenerate, repair the plan, or give up. Every
//! attempt is recorded; the caller always gets a structured [`SolveResult`],
//! never a raw error.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classifier::{ErrorClassifier, ErrorKind};
use crate::error::Result;
use crate::llm::{ChatMessage, CompletionRequest, InferenceClient};
use crate::sandbox::{CodeSandbox, ExecutionOutcome};
use crate::syntax::SyntaxChecker;

use super::prompts;
use super::types::{Attempt, QualityMetrics, Question, SolveResult, TaskDescription};

/// Retry budget for the generate/validate/execute loop. A fixed policy
/// constant: it bounds both latency and external-call cost for one run.
pub const MAX_RETRIES: usize = 3;

const NO_ERRORS: &str = "No errors encountered.";
const EXHAUSTED_ANSWER: &str =
    "Execution failed after maximum retries. Please review the attempt log.";

/// Sampling configuration for the code-generation call.
///
/// Defaults favor deterministic, non-repetitive code output.
#[derive(Debug, Clone)]
pub struct SolveConfig {
    /// Model override passed to the inference client
    pub model: Option<String>,
    /// Generation temperature
    pub temperature: f64,
    /// Maximum tokens per generation call
    pub max_tokens: u32,
    /// Nucleus sampling cutoff
    pub top_p: f64,
    /// Repetition penalty for llamafile backends
    pub repeat_penalty: f64,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.3,
            max_tokens: 800,
            top_p: 0.9,
            repeat_penalty: 1.15,
        }
    }
}

/// The bounded-retry solve state machine.
///
/// Holds no state across runs; every `solve` call is independent, so one
/// orchestrator can serve concurrent runs behind an `Arc`.
pub struct SolveOrchestrator {
    llm: Arc<dyn InferenceClient>,
    sandbox: Arc<dyn CodeSandbox>,
    checker: SyntaxChecker,
    classifier: ErrorClassifier,
    config: SolveConfig,
}

impl SolveOrchestrator {
    pub fn new(llm: Arc<dyn InferenceClient>, sandbox: Arc<dyn CodeSandbox>) -> Self {
        Self::with_config(llm, sandbox, SolveConfig::default())
    }

    pub fn with_config(
        llm: Arc<dyn InferenceClient>,
        sandbox: Arc<dyn CodeSandbox>,
        config: SolveConfig,
    ) -> Self {
        Self {
            llm,
            sandbox,
            checker: SyntaxChecker::new(),
            classifier: ErrorClassifier::new(),
            config,
        }
    }

    /// Solve a question. Infallible at this boundary: any error escaping the
    /// run (transport, budget, sandbox plumbing) degrades into a structured
    /// result carrying the error message.
    pub async fn solve(&self, question: &Question) -> SolveResult {
        let run_id = Uuid::new_v4();
        info!(%run_id, files = question.files.len(), "solve run started");

        match self.run(run_id, question).await {
            Ok(result) => result,
            Err(e) => {
                warn!(%run_id, error = %e, "solve run aborted");
                SolveResult::degraded(run_id, e.to_string())
            }
        }
    }

    async fn run(&self, run_id: Uuid, question: &Question) -> Result<SolveResult> {
        let task = self.classify(question).await?;
        debug!(%run_id, task = %task, "task classified");

        if task.is_fact_seeking() {
            return self.answer_directly(run_id, question).await;
        }

        let mut plan = self.plan(&task, question).await?;
        debug!(%run_id, plan_len = plan.len(), "solution planned");

        let mut attempts: Vec<Attempt> = Vec::new();
        let mut metrics = QualityMetrics::default();
        let inputs = question.sandbox_inputs();
        let mut final_outcome: Option<ExecutionOutcome> = None;

        for attempt_idx in 0..MAX_RETRIES {
            debug!(%run_id, attempt = attempt_idx + 1, max = MAX_RETRIES, "attempt started");

            let code = self.generate(&plan).await?;

            if !self.checker.is_valid(&code) {
                metrics.syntax_error_count += 1;
                attempts.push(Attempt::new(
                    plan.clone(),
                    Some(code),
                    ExecutionOutcome::failure(ErrorKind::Syntax, "invalid syntax"),
                    "Syntax check rejected the candidate; regenerating.",
                ));
                continue;
            }

            let outcome = self.sandbox.run(&code, &inputs).await;

            match outcome {
                ExecutionOutcome::Success { .. } => {
                    metrics.success_count += 1;
                    attempts.push(Attempt::new(
                        plan.clone(),
                        Some(code),
                        outcome.clone(),
                        NO_ERRORS,
                    ));
                    final_outcome = Some(outcome);
                    break;
                }
                ExecutionOutcome::Failure { kind, message } => {
                    metrics.runtime_error_count += 1;
                    // The sandbox only pre-classifies its own resource
                    // signals; everything else goes through the vocabulary.
                    let kind = if kind == ErrorKind::Resource {
                        ErrorKind::Resource
                    } else {
                        self.classifier.classify(&message)
                    };
                    debug!(%run_id, %kind, "execution failed");

                    let notes = self.debug_notes(&code, &message).await?;

                    attempts.push(Attempt::new(
                        plan.clone(),
                        Some(code),
                        ExecutionOutcome::failure(kind, message.clone()),
                        notes,
                    ));

                    // A logical failure means the plan itself is wrong;
                    // adapting on the last iteration would buy nothing.
                    if kind == ErrorKind::Logical && attempt_idx + 1 < MAX_RETRIES {
                        plan = self.adapt(&plan, &message).await?;
                        debug!(%run_id, "solution plan replaced");
                    }
                }
            }
        }

        let (final_answer, debug_notes) = match &final_outcome {
            Some(outcome) => (outcome.answer_text(), NO_ERRORS.to_string()),
            None => (
                EXHAUSTED_ANSWER.to_string(),
                "Max retries reached. Unable to execute code successfully.".to_string(),
            ),
        };

        info!(
            %run_id,
            attempts = attempts.len(),
            success = final_outcome.is_some(),
            "solve run finished"
        );

        Ok(SolveResult {
            run_id,
            final_answer,
            execution_steps: plan,
            attempt_log: attempts,
            quality_metrics: metrics,
            debug_notes,
        })
    }

    /// Fact-seeking shortcut: one direct answer request, one attempt, no code.
    async fn answer_directly(&self, run_id: Uuid, question: &Question) -> Result<SolveResult> {
        let answer = self.complete(prompts::direct_answer(question)).await?;
        info!(%run_id, "fact-seeking shortcut taken");

        let steps = "Direct answer for fact-seeking question.".to_string();
        let attempt = Attempt::new(
            steps.clone(),
            None,
            ExecutionOutcome::success(answer.clone()),
            NO_ERRORS,
        );

        Ok(SolveResult {
            run_id,
            final_answer: answer,
            execution_steps: steps,
            attempt_log: vec![attempt],
            quality_metrics: QualityMetrics {
                success_count: 1,
                ..QualityMetrics::default()
            },
            debug_notes: NO_ERRORS.to_string(),
        })
    }

    async fn classify(&self, question: &Question) -> Result<TaskDescription> {
        let text = self.complete(prompts::classify(question)).await?;
        Ok(TaskDescription::new(text))
    }

    async fn plan(&self, task: &TaskDescription, question: &Question) -> Result<String> {
        self.complete(prompts::plan(&task.0, question)).await
    }

    async fn generate(&self, plan: &str) -> Result<String> {
        let mut request = CompletionRequest::new()
            .with_message(ChatMessage::system(prompts::SYSTEM_ROLE))
            .with_message(ChatMessage::user(prompts::generate(plan)))
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
            .with_top_p(self.config.top_p)
            .with_repeat_penalty(self.config.repeat_penalty);
        request.model = self.config.model.clone();

        let response = self.llm.complete(request).await?;
        Ok(response.content)
    }

    async fn adapt(&self, plan: &str, error_message: &str) -> Result<String> {
        self.complete(prompts::adapt(plan, error_message)).await
    }

    async fn debug_notes(&self, code: &str, error_message: &str) -> Result<String> {
        self.complete(prompts::debug(code, error_message)).await
    }

    /// One reasoning round-trip under the fixed system role.
    async fn complete(&self, user_prompt: String) -> Result<String> {
        let mut request = CompletionRequest::new()
            .with_message(ChatMessage::system(prompts::SYSTEM_ROLE))
            .with_message(ChatMessage::user(user_prompt));
        request.model = self.config.model.clone();

        let response = self.llm.complete(request).await?;
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::llm::{
        CompletionResponse, EmbeddingRequest, EmbeddingResponse, Provider, TokenUsage,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Inference client that replays a scripted sequence of outcomes.
    struct ScriptedClient {
        script: Mutex<VecDeque<Result<String>>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().collect()),
            })
        }
    }

    #[async_trait]
    impl InferenceClient for ScriptedClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .expect("script exhausted: unexpected completion call");
            next.map(|content| CompletionResponse {
                model: "scripted".to_string(),
                content,
                usage: TokenUsage::default(),
                timestamp: Utc::now(),
            })
        }

        async fn embed(&self, _request: EmbeddingRequest) -> Result<EmbeddingResponse> {
            Err(Error::transport("scripted", "no embeddings in script"))
        }

        fn provider(&self) -> Provider {
            Provider::Proxy
        }
    }

    /// Sandbox that replays scripted outcomes and counts calls.
    struct ScriptedSandbox {
        outcomes: Mutex<VecDeque<ExecutionOutcome>>,
        calls: AtomicUsize,
    }

    impl ScriptedSandbox {
        fn new(outcomes: Vec<ExecutionOutcome>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into_iter().collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CodeSandbox for ScriptedSandbox {
        async fn run(&self, _code: &str, _inputs: &HashMap<String, Value>) -> ExecutionOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("sandbox script exhausted: unexpected execution")
        }
    }

    fn ok(s: &str) -> Result<String> {
        Ok(s.to_string())
    }

    const VALID_CODE: &str = "result = 40 + 2";
    const INVALID_CODE: &str = "result = (40 + 2";

    #[tokio::test]
    async fn scenario_fact_seeking_shortcut() {
        let llm = ScriptedClient::new(vec![
            ok("fact-based: capital of France"),
            ok("Paris"),
        ]);
        let sandbox = ScriptedSandbox::new(vec![]);
        let orchestrator = SolveOrchestrator::new(llm, sandbox.clone());

        let question = Question::new("What is the capital of France?");
        let result = orchestrator.solve(&question).await;

        assert_eq!(result.final_answer, "Paris");
        assert_eq!(result.attempt_log.len(), 1);
        assert!(result.attempt_log[0].code_snapshot.is_none());
        assert_eq!(result.quality_metrics.success_count, 1);
        assert_eq!(sandbox.call_count(), 0);
    }

    #[tokio::test]
    async fn scenario_syntax_failure_then_success() {
        let llm = ScriptedClient::new(vec![
            ok("other: compute mean from csv"),
            ok("plan: read the csv, average the column"),
            ok(INVALID_CODE),
            ok(VALID_CODE),
        ]);
        let sandbox = ScriptedSandbox::new(vec![ExecutionOutcome::success(json!(41.5))]);
        let orchestrator = SolveOrchestrator::new(llm, sandbox.clone());

        let question =
            Question::new("What is the mean price?").with_files(vec!["data.csv".to_string()]);
        let result = orchestrator.solve(&question).await;

        assert_eq!(result.attempt_log.len(), 2);
        assert!(matches!(
            result.attempt_log[0].outcome,
            ExecutionOutcome::Failure {
                kind: ErrorKind::Syntax,
                ..
            }
        ));
        assert!(result.attempt_log[1].outcome.is_success());
        assert_eq!(result.final_answer, "41.5");
        assert_eq!(result.quality_metrics.syntax_error_count, 1);
        assert_eq!(result.quality_metrics.success_count, 1);
        // The invalid candidate never reached the sandbox.
        assert_eq!(sandbox.call_count(), 1);
    }

    #[tokio::test]
    async fn scenario_logical_failures_replace_plan_twice() {
        let llm = ScriptedClient::new(vec![
            ok("other: derive a figure"),
            ok("plan v1"),
            ok(VALID_CODE),
            ok("debug notes 1"),
            ok("plan v2"),
            ok(VALID_CODE),
            ok("debug notes 2"),
            ok("plan v3"),
            ok(VALID_CODE),
            ok("debug notes 3"),
        ]);
        let logical = || {
            ExecutionOutcome::failure(
                ErrorKind::Unknown,
                "logical error: aggregated the wrong column",
            )
        };
        let sandbox = ScriptedSandbox::new(vec![logical(), logical(), logical()]);
        let orchestrator = SolveOrchestrator::new(llm, sandbox.clone());

        let result = orchestrator.solve(&Question::new("derive the figure")).await;

        assert_eq!(result.attempt_log.len(), MAX_RETRIES);
        let plans: Vec<&str> = result
            .attempt_log
            .iter()
            .map(|a| a.plan_snapshot.as_str())
            .collect();
        assert_eq!(plans, vec!["plan v1", "plan v2", "plan v3"]);
        for attempt in &result.attempt_log {
            assert!(matches!(
                attempt.outcome,
                ExecutionOutcome::Failure {
                    kind: ErrorKind::Logical,
                    ..
                }
            ));
        }
        assert_eq!(result.execution_steps, "plan v3");
        assert_eq!(result.final_answer, EXHAUSTED_ANSWER);
        assert_eq!(result.quality_metrics.runtime_error_count, 3);
        assert_eq!(result.quality_metrics.success_count, 0);
        assert_eq!(sandbox.call_count(), 3);
    }

    #[tokio::test]
    async fn scenario_transport_failure_degrades() {
        let llm = ScriptedClient::new(vec![
            ok("other: needs planning"),
            Err(Error::transport("proxy", "connection refused")),
        ]);
        let sandbox = ScriptedSandbox::new(vec![]);
        let orchestrator = SolveOrchestrator::new(llm, sandbox.clone());

        let result = orchestrator.solve(&Question::new("anything")).await;

        assert!(result.is_degraded());
        assert_eq!(result.final_answer, "error");
        assert!(result.attempt_log.is_empty());
        assert!(result.debug_notes.contains("connection refused"));
        assert_eq!(sandbox.call_count(), 0);
    }

    #[tokio::test]
    async fn first_attempt_success_terminates_immediately() {
        let llm = ScriptedClient::new(vec![
            ok("other: compute"),
            ok("plan"),
            ok(VALID_CODE),
        ]);
        let sandbox = ScriptedSandbox::new(vec![ExecutionOutcome::success(json!("42"))]);
        let orchestrator = SolveOrchestrator::new(llm, sandbox.clone());

        let result = orchestrator.solve(&Question::new("compute")).await;

        assert_eq!(result.attempt_log.len(), 1);
        assert_eq!(result.final_answer, "42");
        assert_eq!(result.quality_metrics.success_count, 1);
        assert_eq!(sandbox.call_count(), 1);
    }

    #[tokio::test]
    async fn all_candidates_rejected_means_zero_executions() {
        let llm = ScriptedClient::new(vec![
            ok("other: compute"),
            ok("plan"),
            ok(INVALID_CODE),
            ok(INVALID_CODE),
            ok(INVALID_CODE),
        ]);
        let sandbox = ScriptedSandbox::new(vec![]);
        let orchestrator = SolveOrchestrator::new(llm, sandbox.clone());

        let result = orchestrator.solve(&Question::new("compute")).await;

        assert_eq!(result.attempt_log.len(), MAX_RETRIES);
        assert_eq!(result.final_answer, EXHAUSTED_ANSWER);
        assert_eq!(result.quality_metrics.syntax_error_count, 3);
        assert_eq!(sandbox.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_failures_retry_with_unchanged_plan() {
        let llm = ScriptedClient::new(vec![
            ok("other: compute"),
            ok("the only plan"),
            ok(VALID_CODE),
            ok("debug notes 1"),
            ok(VALID_CODE),
            ok("debug notes 2"),
            ok(VALID_CODE),
        ]);
        let sandbox = ScriptedSandbox::new(vec![
            ExecutionOutcome::failure(ErrorKind::Unknown, "KeyError: 'price'"),
            ExecutionOutcome::failure(ErrorKind::Unknown, "KeyError: 'price'"),
            ExecutionOutcome::success(json!(7)),
        ]);
        let orchestrator = SolveOrchestrator::new(llm, sandbox.clone());

        let result = orchestrator.solve(&Question::new("compute")).await;

        assert_eq!(result.attempt_log.len(), 3);
        for attempt in &result.attempt_log {
            assert_eq!(attempt.plan_snapshot, "the only plan");
        }
        assert_eq!(result.final_answer, "7");
        assert_eq!(result.quality_metrics.runtime_error_count, 2);
        assert_eq!(result.quality_metrics.success_count, 1);
    }

    #[tokio::test]
    async fn resource_failure_from_sandbox_keeps_its_kind() {
        let llm = ScriptedClient::new(vec![
            ok("other: compute"),
            ok("plan"),
            ok(VALID_CODE),
            ok("debug notes"),
            ok(VALID_CODE),
        ]);
        let sandbox = ScriptedSandbox::new(vec![
            ExecutionOutcome::failure(ErrorKind::Resource, "Execution timed out after 200ms"),
            ExecutionOutcome::success(json!(1)),
        ]);
        let orchestrator = SolveOrchestrator::new(llm, sandbox.clone());

        let result = orchestrator.solve(&Question::new("compute")).await;

        assert!(matches!(
            result.attempt_log[0].outcome,
            ExecutionOutcome::Failure {
                kind: ErrorKind::Resource,
                ..
            }
        ));
        // Plan unchanged by a resource failure.
        assert_eq!(result.attempt_log[1].plan_snapshot, "plan");
        assert!(result.attempt_log[1].outcome.is_success());
    }

    #[tokio::test]
    async fn attempt_log_never_exceeds_budget() {
        let llm = ScriptedClient::new(vec![
            ok("other: compute"),
            ok("plan"),
            ok(VALID_CODE),
            ok("debug notes 1"),
            ok(VALID_CODE),
            ok("debug notes 2"),
            ok(VALID_CODE),
            ok("debug notes 3"),
        ]);
        let sandbox = ScriptedSandbox::new(vec![
            ExecutionOutcome::failure(ErrorKind::Unknown, "boom"),
            ExecutionOutcome::failure(ErrorKind::Unknown, "boom"),
            ExecutionOutcome::failure(ErrorKind::Unknown, "boom"),
        ]);
        let orchestrator = SolveOrchestrator::new(llm, sandbox.clone());

        let result = orchestrator.solve(&Question::new("compute")).await;

        assert!(result.attempt_log.len() <= MAX_RETRIES);
        assert_eq!(result.final_answer, EXHAUSTED_ANSWER);
    }
}
