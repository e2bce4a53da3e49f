//! OpenAI-compatible chat completion client
//!
//! One HTTP client covers every supported endpoint flavor: OpenAI itself,
//! Azure OpenAI deployments, GitHub Models, and Ollama's `/v1` surface.
//! The flavors differ only in base URL, auth header and the name of the
//! token-limit field.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::error::TransportError;
use crate::types::{CompletionRequest, CompletionResponse};
use crate::Result;

/// A single call that turns a request into generated text plus metadata.
///
/// Implementations block the calling task for the full duration of the
/// request. Retries, if any, belong inside the implementation.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

/// How the client authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer(String),
    /// `api-key: <key>` (Azure OpenAI)
    ApiKeyHeader(String),
    /// No credentials (local endpoints)
    None,
}

/// URL layout of the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointLayout {
    /// `{base_url}/chat/completions`
    OpenAi,
    /// `{base_url}/openai/deployments/{model}/chat/completions?api-version=..`
    AzureDeployment { api_version: String },
}

/// Endpoint configuration for [`OpenAiCompatibleClient`].
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
    pub auth: AuthStyle,
    pub layout: EndpointLayout,
    /// Body field carrying the token limit (`max_completion_tokens` or `max_tokens`)
    pub token_field: &'static str,
    pub timeout: Duration,
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";

impl EndpointConfig {
    /// api.openai.com, key from `OPENAI_API_KEY`, base overridable via `OPENAI_BASE_URL`.
    pub fn openai_from_env() -> Result<Self> {
        let key = require_env("OPENAI_API_KEY")?;
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        Ok(Self {
            base_url,
            auth: AuthStyle::Bearer(key),
            layout: EndpointLayout::OpenAi,
            token_field: "max_completion_tokens",
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Azure OpenAI; reads `AZURE_OPENAI_ENDPOINT`, `AZURE_OPENAI_API_KEY`
    /// and optionally `AZURE_OPENAI_API_VERSION`.
    pub fn azure_from_env() -> Result<Self> {
        let base_url = require_env("AZURE_OPENAI_ENDPOINT")?;
        let key = require_env("AZURE_OPENAI_API_KEY")?;
        let api_version = std::env::var("AZURE_OPENAI_API_VERSION")
            .unwrap_or_else(|_| DEFAULT_AZURE_API_VERSION.to_string());
        Ok(Self {
            base_url,
            auth: AuthStyle::ApiKeyHeader(key),
            layout: EndpointLayout::AzureDeployment { api_version },
            token_field: "max_completion_tokens",
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Local Ollama server, `OLLAMA_HOST` or `http://localhost:11434`.
    pub fn ollama_from_env() -> Self {
        let host =
            std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".to_string());
        Self {
            base_url: format!("{}/v1", host.trim_end_matches('/')),
            auth: AuthStyle::None,
            layout: EndpointLayout::OpenAi,
            token_field: "max_tokens",
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// GitHub Models inference endpoint, token from `GITHUB_TOKEN`.
    pub fn github_models_from_env() -> Result<Self> {
        let token = require_env("GITHUB_TOKEN")?;
        Ok(Self {
            base_url: "https://models.inference.ai.azure.com".to_string(),
            auth: AuthStyle::Bearer(token),
            layout: EndpointLayout::OpenAi,
            token_field: "max_tokens",
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL of the chat completions route for `model`.
    pub fn completions_url(&self, model: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        match &self.layout {
            EndpointLayout::OpenAi => format!("{}/chat/completions", base),
            EndpointLayout::AzureDeployment { api_version } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                base, model, api_version
            ),
        }
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| TransportError::MissingCredentials(name.to_string()))
}

/// Chat completion client for any OpenAI-compatible endpoint.
pub struct OpenAiCompatibleClient {
    config: EndpointConfig,
    http_client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    /// Create a new client. Construction is the expensive part; reuse the handle.
    pub fn new(config: EndpointConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("evalai-llm-transport/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Build the JSON body for a request.
    pub fn request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
        });
        body[self.config.token_field] = json!(request.max_completion_tokens);
        if request.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

/// Extract text and token usage from an OpenAI-style response body.
pub fn parse_completion_body(body: &Value, duration_seconds: f64) -> Result<CompletionResponse> {
    let text = body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            TransportError::MalformedResponse("missing choices[0].message.content".to_string())
        })?
        .to_string();

    let usage = |field: &str| {
        body.pointer(&format!("/usage/{}", field))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };

    Ok(CompletionResponse {
        text,
        prompt_tokens: usage("prompt_tokens"),
        completion_tokens: usage("completion_tokens"),
        duration_seconds,
    })
}

#[async_trait]
impl CompletionTransport for OpenAiCompatibleClient {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let url = self.config.completions_url(&request.model);
        let body = self.request_body(request);

        let mut builder = self.http_client.post(&url).json(&body);
        builder = match &self.config.auth {
            AuthStyle::Bearer(key) => builder.bearer_auth(key),
            AuthStyle::ApiKeyHeader(key) => builder.header("api-key", key),
            AuthStyle::None => builder,
        };

        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        let duration_seconds = start.elapsed().as_secs_f64();
        debug!(duration_seconds, "completion received");

        parse_completion_body(&payload, duration_seconds)
    }
}
