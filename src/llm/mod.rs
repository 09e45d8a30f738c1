//! Inference client abstraction.
//!
//! A unified interface over the backends the solver can round-trip with: an
//! OpenAI-compatible hosted proxy and a local llamafile completion server.
//! Transport failures are always distinguishable errors, and token usage is
//! tracked per client for budget accounting.
//!
//! ## Example
//!
//! ```rust,ignore
//! use roe_core::llm::{
//!     ClientConfig, CompletionRequest, ChatMessage, InferenceClient, ProxyClient,
//! };
//!
//! let client = ProxyClient::new(
//!     ClientConfig::new("your-api-key").with_default_model("gpt-4o-mini"),
//! )?;
//!
//! let request = CompletionRequest::new()
//!     .with_message(ChatMessage::user("What is the capital of France?"));
//!
//! let response = client.complete(request).await?;
//! ```

mod client;
mod types;

pub use client::{ClientConfig, InferenceClient, LlamafileClient, ProxyClient, TrackedClient};
pub use types::{
    ChatMessage, ChatRole, CompletionRequest, CompletionResponse, EmbeddingRequest,
    EmbeddingResponse, Provider, TokenUsage, UsageTracker,
};
