//! Local Ollama backend (`/api/generate`, non-streaming).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use contentgen_shared::{ContentGenError, Result};

use crate::{USER_AGENT, parse_base_url};
use crate::backend::{GenerationBackend, GenerationRequest, GenerationResponse};
use crate::openrouter::classify_status;

const REQUEST_TIMEOUT_SECS: u64 = 300;

pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateReply {
    #[serde(default)]
    model: Option<String>,
    response: String,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, temperature: f32) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ContentGenError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: parse_base_url(&base_url.into())?,
            model: model.into(),
            temperature,
        })
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let prompt = request.full_prompt();
        let body = GenerateBody {
            model: &self.model,
            system: &request.system,
            prompt: &prompt,
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ContentGenError::Generation(format!("ollama request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, &response));
        }

        let reply: GenerateReply = response
            .json()
            .await
            .map_err(|e| ContentGenError::Generation(format!("malformed ollama body: {e}")))?;

        if reply.response.trim().is_empty() {
            return Err(ContentGenError::Generation("ollama returned an empty response".into()));
        }

        debug!(chars = reply.response.len(), "ollama response received");
        Ok(GenerationResponse {
            text: reply.response,
            model: reply.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_non_streaming_generate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3.2",
                "stream": false,
                "format": "json"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama3.2",
                "response": "{\"summary\": \"ok\"}",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = OllamaBackend::new(server.uri(), "llama3.2", 0.3).unwrap();
        let response = backend
            .generate(&GenerationRequest::new("sys", "describe"))
            .await
            .unwrap();
        assert_eq!(response.text, "{\"summary\": \"ok\"}");
    }

    #[tokio::test]
    async fn server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let backend = OllamaBackend::new(server.uri(), "llama3.2", 0.3).unwrap();
        let err = backend
            .generate(&GenerationRequest::new("sys", "describe"))
            .await
            .unwrap_err();
        assert!(!err.is_fatal());
    }
}
