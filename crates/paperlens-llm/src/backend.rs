//! LLM backend trait and concrete implementations.
//!
//! Backends:
//!   AnthropicBackend        — Anthropic Messages API (claude-*)
//!   OpenAiBackend           — OpenAI chat completions (gpt-4o, …)
//!   OpenAiCompatibleBackend — any OpenAI-compatible endpoint (vLLM,
//!                             LMStudio, OpenRouter, Groq, …)

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
}

impl LlmError {
    /// Worth retrying: transport failures, throttling and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Http(_)                 => true,
            LlmError::RateLimitExceeded       => true,
            LlmError::ApiError { status, .. } => *status >= 500,
            LlmError::Serde(_)                => false,
            LlmError::Unavailable(_)          => false,
        }
    }
}

// ── Provider ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[default]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anthropic        => "anthropic",
            Provider::OpenAi           => "openai",
            Provider::OpenAiCompatible => "openai_compatible",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Anthropic        => "claude-sonnet-4-20250514",
            Provider::OpenAi           => "gpt-4o",
            Provider::OpenAiCompatible => "local-model",
        }
    }

    /// Whether calls need an API key.
    pub fn requires_key(&self) -> bool {
        !matches!(self, Provider::OpenAiCompatible)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude"                       => Ok(Provider::Anthropic),
            "openai" | "gpt"                             => Ok(Provider::OpenAi),
            "openai_compatible" | "openai-compatible"    => Ok(Provider::OpenAiCompatible),
            other => Err(format!("unknown provider '{other}' (expected anthropic, openai or openai_compatible)")),
        }
    }
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,   // "system" | "user" | "assistant"
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError>;
    fn model_id(&self) -> &str;
    fn provider(&self) -> Provider;
    fn max_context_tokens(&self) -> usize;
    fn max_output_tokens(&self) -> usize;
}

/// Construct the backend for `provider`.
pub fn build_backend(
    provider: Provider,
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let model = model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| provider.default_model().to_string());
    let api_key = api_key.filter(|k| !k.trim().is_empty());

    let missing_key = || LlmError::Unavailable(format!("no API key configured for {provider}"));

    Ok(match provider {
        Provider::Anthropic => {
            let mut b = AnthropicBackend::new(api_key.ok_or_else(missing_key)?, model);
            if let Some(url) = base_url {
                b = b.with_base_url(url);
            }
            Arc::new(b)
        }
        Provider::OpenAi => {
            let mut b = OpenAiBackend::new(api_key.ok_or_else(missing_key)?, model);
            if let Some(url) = base_url {
                b = b.with_base_url(url);
            }
            Arc::new(b)
        }
        Provider::OpenAiCompatible => {
            let url = base_url.ok_or_else(|| {
                LlmError::Unavailable("openai_compatible provider needs a base_url".to_string())
            })?;
            Arc::new(OpenAiCompatibleBackend::new(url, model, api_key))
        }
    })
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse_openai_response(json: &serde_json::Value, fallback_model: &str) -> LlmResponse {
    LlmResponse {
        content: json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        model: json["model"]
            .as_str()
            .unwrap_or(fallback_model)
            .to_string(),
        prompt_tokens:     json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    }
}

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    if status == 429 {
        return Err(LlmError::RateLimitExceeded);
    }
    if status >= 400 {
        return Err(LlmError::ApiError { status, message: error_message(&text) });
    }
    Ok(serde_json::from_str(&text)?)
}

/// Best-effort error message from a provider's error body.
fn error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        let trimmed = body.trim();
        return if trimmed.is_empty() {
            "unknown API error".to_string()
        } else {
            trimmed.chars().take(300).collect()
        };
    };
    json["error"]["message"]
        .as_str()
        .or_else(|| json["message"].as_str())
        .or_else(|| json["error"].as_str())
        .unwrap_or("unknown API error")
        .to_string()
}

fn openai_body(req: &LlmRequest, model: &str) -> serde_json::Value {
    serde_json::json!({
        "model":       req.model.as_deref().unwrap_or(model),
        "messages":    req.messages,
        "max_tokens":  req.max_tokens.unwrap_or(4096),
        "temperature": req.temperature.unwrap_or(0.1),
    })
}

// ── 1. Anthropic (claude-*) ───────────────────────────────────────────────────

pub struct AnthropicBackend {
    pub model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.anthropic.com".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        // Messages API takes the system prompt as a top-level field
        let system = req.messages.iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let messages: Vec<serde_json::Value> = req.messages.iter()
            .filter(|m| m.role != "system")
            .map(|m| serde_json::json!({"role": m.role, "content": m.content}))
            .collect();

        let model = req.model.as_deref().unwrap_or(&self.model);

        let mut body = serde_json::json!({
            "model":      model,
            "messages":   messages,
            "max_tokens": req.max_tokens.unwrap_or(4096),
        });
        if let Some(t) = req.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if !system.is_empty() {
            body["system"] = serde_json::Value::String(system.to_string());
        }

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let resp = self.client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let json = check_response_status(resp).await?;

        let content = json["content"]
            .as_array()
            .and_then(|blocks| blocks.first())
            .and_then(|b| b["text"].as_str())
            .unwrap_or("")
            .to_string();

        Ok(LlmResponse {
            content,
            model: json["model"].as_str().unwrap_or(model).to_string(),
            prompt_tokens:     json["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: json["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
        })
    }

    fn model_id(&self) -> &str { &self.model }
    fn provider(&self) -> Provider { Provider::Anthropic }
    fn max_context_tokens(&self) -> usize { 200_000 }
    fn max_output_tokens(&self) -> usize { 8_192 }
}

// ── 2. OpenAI ─────────────────────────────────────────────────────────────────

pub struct OpenAiBackend {
    pub model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: "https://api.openai.com".to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let resp = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&openai_body(&req, &self.model))
            .send()
            .await?;
        let json = check_response_status(resp).await?;
        Ok(parse_openai_response(&json, &self.model))
    }

    fn model_id(&self) -> &str { &self.model }
    fn provider(&self) -> Provider { Provider::OpenAi }
    fn max_context_tokens(&self) -> usize { 128_000 }
    fn max_output_tokens(&self) -> usize { 16_384 }
}

// ── 3. OpenAI-Compatible (vLLM, LMStudio, OpenRouter, Groq, …) ───────────────

pub struct OpenAiCompatibleBackend {
    pub base_url: String,
    pub model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(k) => req.bearer_auth(k),
            None    => req,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let resp = self.auth(self.client.post(&url))
            .json(&openai_body(&req, &self.model))
            .send()
            .await?;
        let json = check_response_status(resp).await?;
        Ok(parse_openai_response(&json, &self.model))
    }

    fn model_id(&self) -> &str { &self.model }
    fn provider(&self) -> Provider { Provider::OpenAiCompatible }
    fn max_context_tokens(&self) -> usize { 128_000 }
    fn max_output_tokens(&self) -> usize { 8_192 }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
