//! Text-generation backends and the process-scoped client registry.
//!
//! Content stages talk to a [`GenerationBackend`]. Handles are built once per
//! [`BackendKey`] by a [`ClientRegistry`] and shared by every job in the
//! process, each wrapped in a [`Throttled`] limiter so concurrent jobs cannot
//! overrun a rate-limited provider.

pub mod backend;
pub mod extract;
pub mod ollama;
pub mod openrouter;
pub mod registry;
pub mod throttle;

pub use backend::{BackendKey, GenerationBackend, GenerationRequest, GenerationResponse};
pub use extract::extract_json;
pub use ollama::OllamaBackend;
pub use openrouter::OpenRouterBackend;
pub use registry::{BackendFactory, ClientRegistry, HttpBackendFactory};
pub use throttle::{CallSlot, ThrottleLimits, Throttled};

/// User-Agent string for backend requests.
pub(crate) const USER_AGENT: &str = concat!("contentgen/", env!("CARGO_PKG_VERSION"));

/// Check a configured endpoint and strip its trailing slash.
pub(crate) fn parse_base_url(raw: &str) -> contentgen_shared::Result<String> {
    let url = url::Url::parse(raw.trim())
        .map_err(|e| contentgen_shared::ContentGenError::config(format!("invalid base URL {raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(contentgen_shared::ContentGenError::config(format!(
            "base URL must be http or https, got {}",
            url.scheme()
        )));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}
