//! Inference client trait and backend implementations.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};

use super::types::{
    ChatRole, CompletionRequest, CompletionResponse, EmbeddingRequest, EmbeddingResponse,
    Provider, TokenUsage, UsageTracker,
};

/// Inference client trait for making completions and embeddings.
///
/// Implementations must surface transport/HTTP failures as
/// [`Error::Transport`] rather than returning empty text; the solve
/// orchestrator relies on that distinction for its top-level boundary.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Complete a conversation.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Create embeddings for texts.
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;

    /// Get the backend for this client.
    fn provider(&self) -> Provider;
}

/// Configuration for inference clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key (ignored by backends that do not authenticate)
    pub api_key: String,
    /// Base URL override
    pub base_url: Option<String>,
    /// Default model
    pub default_model: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            default_model: None,
            timeout_secs: 120,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

fn build_http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// OpenAI-compatible proxy client (chat completions + embeddings).
pub struct ProxyClient {
    config: ClientConfig,
    http: Client,
}

impl ProxyClient {
    const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";

    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = build_http_client(config.timeout_secs)?;
        Ok(Self { config, http })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }
}

// OpenAI-compatible API types
#[derive(Debug, Serialize)]
struct ProxyRequest {
    model: String,
    messages: Vec<ProxyMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProxyMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ProxyResponse {
    model: String,
    choices: Vec<ProxyChoice>,
    usage: Option<ProxyUsage>,
}

#[derive(Debug, Deserialize)]
struct ProxyChoice {
    message: ProxyMessage,
}

#[derive(Debug, Deserialize)]
struct ProxyUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ProxyError {
    error: ProxyErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProxyErrorDetail {
    message: String,
}

#[derive(Debug, Serialize)]
struct ProxyEmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ProxyEmbeddingResponse {
    model: String,
    data: Vec<ProxyEmbeddingData>,
    usage: Option<ProxyEmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct ProxyEmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ProxyEmbeddingUsage {
    prompt_tokens: u64,
}

#[async_trait]
impl InferenceClient for ProxyClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = request
            .model
            .or(self.config.default_model.clone())
            .unwrap_or_else(|| "gpt-4o-mini".to_string());

        let messages: Vec<ProxyMessage> = request
            .messages
            .iter()
            .map(|m| ProxyMessage {
                role: match m.role {
                    ChatRole::System => "system".to_string(),
                    ChatRole::User => "user".to_string(),
                    ChatRole::Assistant => "assistant".to_string(),
                },
                content: m.content.clone(),
            })
            .collect();

        let api_request = ProxyRequest {
            model: model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stop: request.stop,
        };

        let url = format!("{}/v1/chat/completions", self.base_url());
        debug!(%model, url = %url, "proxy completion request");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::transport("proxy", format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport("proxy", format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ProxyError>(&body) {
                return Err(Error::transport(
                    "proxy",
                    format!("API error ({}): {}", status, error.error.message),
                ));
            }
            return Err(Error::transport(
                "proxy",
                format!("API error ({}): {}", status, body),
            ));
        }

        let api_response: ProxyResponse = serde_json::from_str(&body)
            .map_err(|e| Error::transport("proxy", format!("Failed to parse response: {}", e)))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::transport("proxy", "No choices in response"))?;

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            model: api_response.model,
            content: choice.message.content,
            usage,
            timestamp: Utc::now(),
        })
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let model = request
            .model
            .unwrap_or_else(|| "text-embedding-3-small".to_string());

        let api_request = ProxyEmbeddingRequest {
            model: model.clone(),
            input: request.texts,
        };

        let url = format!("{}/v1/embeddings", self.base_url());

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::transport("proxy", format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport("proxy", format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ProxyError>(&body) {
                return Err(Error::transport(
                    "proxy",
                    format!("API error ({}): {}", status, error.error.message),
                ));
            }
            return Err(Error::transport(
                "proxy",
                format!("API error ({}): {}", status, body),
            ));
        }

        let api_response: ProxyEmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| Error::transport("proxy", format!("Failed to parse response: {}", e)))?;

        let embeddings = api_response.data.into_iter().map(|d| d.embedding).collect();
        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: 0,
            })
            .unwrap_or_default();

        Ok(EmbeddingResponse {
            model: api_response.model,
            embeddings,
            usage,
        })
    }

    fn provider(&self) -> Provider {
        Provider::Proxy
    }
}

/// Local llamafile completion server client.
///
/// The llamafile API takes a single flattened prompt rather than a role-tagged
/// conversation; messages are joined with their role labels before sending.
pub struct LlamafileClient {
    config: ClientConfig,
    http: Client,
}

impl LlamafileClient {
    const DEFAULT_BASE_URL: &'static str = "http://127.0.0.1:8080";

    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = build_http_client(config.timeout_secs)?;
        Ok(Self { config, http })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }

    fn flatten_messages(request: &CompletionRequest) -> String {
        request
            .messages
            .iter()
            .map(|m| match m.role {
                ChatRole::System => format!("[system] {}", m.content),
                ChatRole::User => m.content.clone(),
                ChatRole::Assistant => format!("[assistant] {}", m.content),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
struct LlamafileRequest {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repeat_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct LlamafileResponse {
    content: Option<String>,
    #[serde(default)]
    tokens_evaluated: u64,
    #[serde(default)]
    tokens_predicted: u64,
}

#[async_trait]
impl InferenceClient for LlamafileClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let prompt = Self::flatten_messages(&request);

        let api_request = LlamafileRequest {
            prompt,
            temperature: request.temperature,
            n_predict: request.max_tokens,
            top_p: request.top_p,
            repeat_penalty: request.repeat_penalty,
            stop: request.stop,
        };

        let url = format!("{}/completion", self.base_url());
        debug!(url = %url, "llamafile completion request");

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::transport("llamafile", format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            Error::transport("llamafile", format!("Failed to read response: {}", e))
        })?;

        if !status.is_success() {
            return Err(Error::transport(
                "llamafile",
                format!("API error ({}): {}", status, body),
            ));
        }

        let api_response: LlamafileResponse = serde_json::from_str(&body).map_err(|e| {
            Error::transport("llamafile", format!("Failed to parse response: {}", e))
        })?;

        // A well-formed response without content is a backend fault, not an
        // answer; surface it so the caller's boundary can degrade.
        let content = api_response
            .content
            .ok_or_else(|| Error::transport("llamafile", "No content field in response"))?;

        let model = self
            .config
            .default_model
            .clone()
            .unwrap_or_else(|| "llamafile".to_string());

        Ok(CompletionResponse {
            model,
            content,
            usage: TokenUsage {
                input_tokens: api_response.tokens_evaluated,
                output_tokens: api_response.tokens_predicted,
            },
            timestamp: Utc::now(),
        })
    }

    async fn embed(&self, _request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        Err(Error::transport(
            "llamafile",
            "Embedding endpoint not supported by llamafile backend",
        ))
    }

    fn provider(&self) -> Provider {
        Provider::Llamafile
    }
}

/// Client wrapper that accounts token usage against a budget.
///
/// Usage is recorded after every successful completion; a request made after
/// the budget is consumed fails with [`Error::BudgetExhausted`] before any
/// HTTP traffic.
pub struct TrackedClient {
    inner: Arc<dyn InferenceClient>,
    usage: Arc<RwLock<UsageTracker>>,
}

impl TrackedClient {
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self {
            inner: client,
            usage: Arc::new(RwLock::new(UsageTracker::new())),
        }
    }

    /// Wrap a client with a total-token budget.
    pub fn with_budget(client: Arc<dyn InferenceClient>, budget: u64) -> Self {
        Self {
            inner: client,
            usage: Arc::new(RwLock::new(UsageTracker::with_budget(budget))),
        }
    }

    /// Read the current usage snapshot.
    pub async fn usage(&self) -> UsageTracker {
        self.usage.read().await.clone()
    }
}

#[async_trait]
impl InferenceClient for TrackedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        {
            let usage = self.usage.read().await;
            if usage.exhausted() {
                return Err(Error::budget_exhausted("tokens"));
            }
        }

        let response = self.inner.complete(request).await?;

        let mut usage = self.usage.write().await;
        usage.record(&response.usage);

        Ok(response)
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let response = self.inner.embed(request).await?;

        let mut usage = self.usage.write().await;
        usage.record(&response.usage);

        Ok(response)
    }

    fn provider(&self) -> Provider {
        self.inner.provider()
    }
}
