//! OpenRouter chat-completions backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use contentgen_shared::{ContentGenError, Result};

use crate::{USER_AGENT, parse_base_url};
use crate::backend::{GenerationBackend, GenerationRequest, GenerationResponse};

/// HTTP timeout for one completion call. Stage timeouts are usually tighter.
const REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct OpenRouterBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
}

impl OpenRouterBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ContentGenError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: parse_base_url(&base_url.into())?,
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        })
    }
}

#[async_trait]
impl GenerationBackend for OpenRouterBackend {
    fn name(&self) -> &str {
        "openrouter"
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let prompt = request.full_prompt();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ContentGenError::Generation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, &response));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ContentGenError::Generation(format!("malformed completion body: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ContentGenError::Generation("completion had no content".into()))?;

        debug!(chars = text.len(), "completion received");
        Ok(GenerationResponse {
            text,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

/// Map a non-success status onto the error taxonomy.
pub(crate) fn classify_status(status: StatusCode, response: &reqwest::Response) -> ContentGenError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| secs * 1000);
            warn!(?retry_after_ms, "rate limited by backend");
            ContentGenError::RateLimited { retry_after_ms }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ContentGenError::config(format!("backend rejected credentials ({status})"))
        }
        _ => ContentGenError::Generation(format!("backend returned {status}")),
    }
}
