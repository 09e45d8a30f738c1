//! # roe-core
//!
//! An adaptive question-solving library built around an LLM-driven
//! plan/generate/execute loop with bounded retries.
//!
//! ## Core Components
//!
//! - **Solve**: The bounded-retry orchestrator and its run data model
//! - **Llm**: Inference clients (OpenAI-compatible proxy, llamafile) and
//!   usage tracking
//! - **Sandbox**: Restricted Python subprocess execution of generated code
//! - **Syntax**: Structural pre-validation of candidates before execution
//! - **Classifier**: Vocabulary-based failure classification driving the
//!   retry policy
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use roe_core::{
//!     ClientConfig, ProxyClient, PythonSandbox, Question, SandboxConfig, SolveOrchestrator,
//! };
//!
//! let client = ProxyClient::new(ClientConfig::new("sk-..."))?;
//! let sandbox = PythonSandbox::new(SandboxConfig::default());
//! let orchestrator = SolveOrchestrator::new(Arc::new(client), Arc::new(sandbox));
//!
//! let question = Question::new("What is the mean of column price?")
//!     .with_files(vec!["data.csv".to_string()]);
//! let result = orchestrator.solve(&question).await;
//! println!("{}", result.final_answer);
//! ```

pub mod classifier;
pub mod error;
pub mod llm;
pub mod sandbox;
pub mod solve;
pub mod syntax;

// Re-exports for convenience
pub use classifier::{ErrorClassifier, ErrorKind};
pub use error::{Error, Result};
pub use llm::{
    ChatMessage, ChatRole, ClientConfig, CompletionRequest, CompletionResponse, EmbeddingRequest,
    EmbeddingResponse, InferenceClient, LlamafileClient, Provider, ProxyClient, TokenUsage,
    TrackedClient, UsageTracker,
};
pub use sandbox::{
    CodeSandbox, ExecutionOutcome, PythonSandbox, SandboxConfig, DEFAULT_ALLOWED_BUILTINS,
    NO_RESULT,
};
pub use solve::{
    Attempt, QualityMetrics, Question, SolveConfig, SolveOrchestrator, SolveResult,
    TaskDescription, MAX_RETRIES,
};
pub use syntax::{strip_code_fences, SyntaxChecker};
