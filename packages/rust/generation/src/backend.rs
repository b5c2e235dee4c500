//! The generation capability seen by content stages.

use async_trait::async_trait;
use serde::Serialize;

use contentgen_shared::{PipelineConfig, Provider, Result};

use crate::throttle::CallSlot;

/// One generation call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    /// System instructions (role, output format).
    pub system: String,
    pub prompt: String,
    /// JSON shape the caller expects back, appended to the prompt by backends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_hint: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            schema_hint: None,
            max_tokens: None,
        }
    }

    pub fn with_schema_hint(mut self, hint: serde_json::Value) -> Self {
        self.schema_hint = Some(hint);
        self
    }

    /// Prompt text with the schema hint appended.
    pub fn full_prompt(&self) -> String {
        match &self.schema_hint {
            Some(hint) => format!(
                "{}\n\nRespond with JSON only, matching this shape:\n{hint}",
                self.prompt
            ),
            None => self.prompt.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub text: String,
    /// Model that actually served the call, as reported by the backend.
    pub model: String,
}

/// An external text-generation capability.
///
/// Implementations classify failures: rate limits become
/// `ContentGenError::RateLimited`, auth problems `ContentGenError::Config`
/// (fatal), everything else `ContentGenError::Generation`.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse>;

    /// Wait for room to make one call and hold it.
    ///
    /// Queueing happens here, not in [`generate`](Self::generate) on the
    /// returned slot, so callers can keep the wait out of a call timeout.
    /// Backends without limits have nothing to reserve.
    async fn reserve(&self) -> Result<Option<CallSlot>> {
        Ok(None)
    }
}

/// Cache key for one backend configuration.
///
/// Temperature is stored in hundredths so the key stays `Eq + Hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendKey {
    pub provider: Provider,
    pub model: String,
    pub temperature_centi: u16,
}

impl BackendKey {
    pub fn new(provider: Provider, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature_centi: (temperature.clamp(0.0, 2.0) * 100.0).round() as u16,
        }
    }

    pub fn temperature(&self) -> f32 {
        f32::from(self.temperature_centi) / 100.0
    }
}

impl From<&PipelineConfig> for BackendKey {
    fn from(config: &PipelineConfig) -> Self {
        Self::new(config.provider, config.model.clone(), config.temperature)
    }
}

impl std::fmt::Display for BackendKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{:.2}", self.provider, self.model, self.temperature())
    }
}
