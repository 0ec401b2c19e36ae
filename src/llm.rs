//! Reasoning service client
//!
//! Provider-agnostic chat-completions client. All supported providers
//! speak the OpenAI-compatible wire format; they differ only in base URL
//! and API-key environment variable. Uses a long-lived reqwest::Client
//! for connection pooling.

use crate::config::LlmConfig;
use crate::error::{FundError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Supported reasoning providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    DeepSeek,
    Alibaba,
    Kimi,
    #[serde(rename = "OpenAI")]
    OpenAi,
    Aihubmix,
}

impl Provider {
    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::DeepSeek => "https://api.deepseek.com/v1",
            Provider::Alibaba => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            Provider::Kimi => "https://api.moonshot.cn/v1",
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Aihubmix => "https://api.aihubmix.com/v1",
        }
    }

    pub fn env_key(&self) -> &'static str {
        match self {
            Provider::DeepSeek => "DEEPSEEK_API_KEY",
            Provider::Alibaba => "QWEN_API_KEY",
            Provider::Kimi => "KIMI_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Aihubmix => "AIHUBMIX_API_KEY",
        }
    }
}

/// Black-box reasoning interface. The pipeline never depends on a
/// specific vendor; failures surface as recoverable errors.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Chat-completions client with a bounded retry budget.
pub struct OpenAiCompatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAiCompatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(config.provider.env_key()).map_err(|_| {
            FundError::Config(format!("{} not configured", config.provider.env_key()))
        })?;

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.provider.base_url().trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn attempt(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.3,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(FundError::Llm(format!(
                "provider returned {}: {}",
                status, error_text
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| FundError::Llm(format!("malformed completion response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| FundError::Llm("empty completion response".to_string()))?;

        Ok(content)
    }
}

#[async_trait]
impl ReasoningClient for OpenAiCompatClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            debug!(attempt, model = %self.model, "Calling reasoning service");
            match self.attempt(prompt).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    warn!(attempt, error = %e, "Reasoning call failed");
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => FundError::Llm(format!("retry budget exhausted: {}", e)),
            None => FundError::Llm("retry budget exhausted".to_string()),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Parse a structured JSON payload out of a completion, tolerating
/// markdown fences and surrounding prose.
pub fn parse_structured<T: serde::de::DeserializeOwned>(
    raw: &str,
) -> std::result::Result<T, serde_json::Error> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    match serde_json::from_str(cleaned) {
        Ok(value) => Ok(value),
        Err(first_error) => {
            // Fallback: largest { ... } block in the text.
            if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
                if start < end {
                    return serde_json::from_str(&cleaned[start..=end]);
                }
            }
            Err(first_error)
        }
    }
}

/// Scripted client for tests and offline runs: pops canned responses in
/// order, then keeps returning the fallback.
pub struct ScriptedReasoningClient {
    responses: Mutex<VecDeque<String>>,
    fallback: String,
}

impl ScriptedReasoningClient {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: fallback.into(),
        }
    }

    pub fn push(&self, response: impl Into<String>) {
        self.responses
            .lock()
            .expect("scripted responses lock poisoned")
            .push_back(response.into());
    }
}

#[async_trait]
impl ReasoningClient for ScriptedReasoningClient {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        let next = self
            .responses
            .lock()
            .expect("scripted responses lock poisoned")
            .pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}
