//! Stage workers.
//!
//! `parse`, `logic` and `assembly` are pure and run once. The content stages
//! (`questions`, `faq`, `description`, `comparison`) implement
//! [`StageWorker`] and run under the retry supervisor. Each content worker
//! generates through a backend when one is configured and falls back to
//! deterministic rules otherwise.

pub mod assembly;
pub mod comparison;
pub mod description;
pub mod faq;
pub mod logic;
pub mod parse;
pub mod questions;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use contentgen_generation::{CallSlot, GenerationBackend, GenerationRequest, extract_json};
use contentgen_shared::{ContentGenError, Result};

use crate::state::{PipelineState, StageId};

pub use comparison::ComparisonWorker;
pub use description::DescriptionWorker;
pub use faq::FaqWorker;
pub use questions::QuestionsWorker;

/// A supervised pipeline step.
///
/// Workers never touch [`PipelineState`] beyond reading their inputs in
/// [`prepare`](StageWorker::prepare); the executor records whatever the
/// supervisor returns. [`produce`](StageWorker::produce) may be called
/// several times with the same input.
#[async_trait]
pub trait StageWorker: Send + Sync {
    type Input: Send + Sync;
    type Output: Serialize + Send;

    fn id(&self) -> StageId;

    /// Collect this stage's inputs from earlier stages.
    fn prepare(&self, state: &PipelineState) -> Result<Self::Input>;

    /// Hold a backend call slot for the next attempt. The supervisor calls
    /// this before the attempt's timeout starts, so queueing behind other
    /// jobs on a shared backend does not count against it.
    async fn reserve(&self) -> Result<Option<CallSlot>> {
        Ok(None)
    }

    async fn produce(&self, input: &Self::Input, slot: Option<&CallSlot>) -> Result<Self::Output>;

    /// Same input always yields the same output, so a failed attempt is not
    /// worth repeating.
    fn is_deterministic(&self) -> bool {
        false
    }

    /// Minimal, schema-shaped placeholder used once retries are exhausted.
    fn degraded(&self, input: &Self::Input) -> Self::Output;
}

/// Call the backend and decode its JSON reply into `T`.
pub(crate) async fn generate_json<T: DeserializeOwned>(
    backend: &Arc<dyn GenerationBackend>,
    slot: Option<&CallSlot>,
    request: &GenerationRequest,
) -> Result<T> {
    let response = match slot {
        Some(slot) => slot.generate(request).await?,
        None => backend.generate(request).await?,
    };
    debug!(backend = backend.name(), model = %response.model, "decoding generated JSON");
    let value = extract_json(&response.text)?;
    serde_json::from_value(value)
        .map_err(|e| ContentGenError::parse(format!("generated JSON has the wrong shape: {e}")))
}

/// Reserve on `backend` when the worker has one.
pub(crate) async fn reserve_on(
    backend: Option<&Arc<dyn GenerationBackend>>,
) -> Result<Option<CallSlot>> {
    match backend {
        Some(backend) => backend.reserve().await,
        None => Ok(None),
    }
}

/// `a`, `a and b`, `a, b and c`.
pub(crate) fn natural_join(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

/// Lower-case the first letter so list items read inside a sentence.
pub(crate) fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
