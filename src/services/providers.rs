// LLM Provider Service
// OpenAI-compatible chat completions and Anthropic messages calls

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::config_store::ProxyConfig;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEEPSEEK_DEFAULT_URL: &str = "https://api.deepseek.com/chat/completions";
const ANTHROPIC_DEFAULT_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

static JSON_OBJECT_RE: OnceLock<Regex> = OnceLock::new();

fn json_object_re() -> &'static Regex {
    JSON_OBJECT_RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static regex"))
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured for provider {0}")]
    MissingApiKey(String),
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    DeepSeek,
    Anthropic,
}

impl ProviderKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "deepseek" => Some(Self::DeepSeek),
            "anthropic" | "claude" => Some(Self::Anthropic),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::DeepSeek => "deepseek",
            Self::Anthropic => "anthropic",
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::DeepSeek => "deepseek-chat",
            Self::Anthropic => "claude-3-5-haiku-latest",
        }
    }

    fn default_url(self) -> String {
        let (var, fallback) = match self {
            Self::OpenAi => ("OPENAI_API_URL", OPENAI_DEFAULT_URL),
            Self::DeepSeek => ("DEEPSEEK_API_URL", DEEPSEEK_DEFAULT_URL),
            Self::Anthropic => ("ANTHROPIC_API_URL", ANTHROPIC_DEFAULT_URL),
        };
        env::var(var).unwrap_or_else(|_| fallback.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderSpec {
    pub name: String,
    pub model: String,
}

/// Parse `name[:model]`; an empty model falls back to the provider default.
pub fn parse_provider(spec: &str) -> ProviderSpec {
    let (name, model) = match spec.split_once(':') {
        Some((name, model)) => (name.trim(), model.trim()),
        None => (spec.trim(), ""),
    };
    let model = if model.is_empty() {
        ProviderKind::from_name(name)
            .map(|k| k.default_model().to_string())
            .unwrap_or_default()
    } else {
        model.to_string()
    };
    ProviderSpec {
        name: name.to_string(),
        model,
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: i32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
    reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
    reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

pub struct ProviderClient {
    client: Client,
    base_url: Option<String>,
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: None,
        }
    }

    /// Client with an explicit timeout, optional endpoint override and optional proxy.
    pub fn configured(
        timeout: Duration,
        base_url: Option<String>,
        proxy: Option<&ProxyConfig>,
    ) -> Result<Self, ProviderError> {
        let mut builder = Client::builder().timeout(timeout);
        if let Some(url) = proxy.filter(|p| p.enabled).and_then(|p| p.https.as_ref().or(p.http.as_ref())) {
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.filter(|u| !u.trim().is_empty()),
        })
    }

    fn url_for(&self, kind: ProviderKind) -> String {
        self.base_url.clone().unwrap_or_else(|| kind.default_url())
    }

    /// Send one system/user exchange to `provider`, asking for a JSON object back.
    pub async fn call_json(
        &self,
        provider: &ProviderSpec,
        api_key: &str,
        system: &str,
        user: &str,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        let kind = ProviderKind::from_name(&provider.name)
            .ok_or_else(|| ProviderError::UnsupportedProvider(provider.name.clone()))?;
        let url = self.url_for(kind);
        match kind {
            ProviderKind::Anthropic => {
                self.call_anthropic_api(&url, &provider.model, api_key, system, user, max_tokens)
                    .await
            }
            ProviderKind::OpenAi | ProviderKind::DeepSeek => {
                self.call_chat_api(&url, &provider.model, api_key, system, user, max_tokens)
                    .await
            }
        }
    }

    async fn call_anthropic_api(
        &self,
        url: &str,
        model: &str,
        api_key: &str,
        system: &str,
        user: &str,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        #[derive(Serialize)]
        struct AnthropicRequest {
            model: String,
            max_tokens: i32,
            #[serde(skip_serializing_if = "String::is_empty")]
            system: String,
            messages: Vec<ChatMessage>,
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Option<Vec<AnthropicContent>>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            text: Option<String>,
        }

        let request = AnthropicRequest {
            model: model.to_string(),
            max_tokens,
            system: system.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        };

        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data
            .content
            .and_then(|c| c.into_iter().find_map(|c| c.text))
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }

    async fn call_chat_api(
        &self,
        url: &str,
        model: &str,
        api_key: &str,
        system: &str,
        user: &str,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens,
            temperature: 0.0,
            response_format: Some(ResponseFormat {
                r#type: "json_object".to_string(),
            }),
        };

        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let message = data
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref());

        let mut content = message
            .and_then(|m| m.content.clone())
            .filter(|c| !c.trim().is_empty());

        let reasoning = message
            .and_then(|m| m.reasoning_content.clone())
            .or(data.reasoning_content);

        // Reasoning models sometimes leave content empty and put the JSON in reasoning.
        if content.is_none() {
            if let Some(ref r) = reasoning {
                content = json_object_re().find(r).map(|m| m.as_str().to_string());
            }
        }

        let content = content.ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }
}

fn env_key_names(provider: &str) -> &'static [&'static str] {
    match ProviderKind::from_name(provider) {
        Some(ProviderKind::OpenAi) => &["OPENAI_API_KEY", "REVIEW_GUARD_OPENAI_API_KEY"],
        Some(ProviderKind::DeepSeek) => &["DEEPSEEK_API_KEY", "REVIEW_GUARD_DEEPSEEK_API_KEY"],
        Some(ProviderKind::Anthropic) => &["ANTHROPIC_API_KEY", "REVIEW_GUARD_ANTHROPIC_API_KEY"],
        None => &[],
    }
}

/// Resolve a provider API key: environment first, then the supplied config keys.
pub fn resolve_api_key(provider: &str, configured: &HashMap<String, String>) -> Option<String> {
    for key in env_key_names(provider) {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    configured
        .get(provider)
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}
