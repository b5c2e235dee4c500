//! Shared fixtures and a scripted backend for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use contentgen_generation::{GenerationBackend, GenerationRequest, GenerationResponse};
use contentgen_shared::{ContentGenError, Currency, Price, ProductModel, Result};

pub fn glowboost() -> ProductModel {
    ProductModel {
        product_name: "GlowBoost Vitamin C Serum".into(),
        concentration: "10% Vitamin C".into(),
        skin_type: vec!["Oily".into(), "Combination".into()],
        key_ingredients: vec!["Vitamin C".into(), "Hyaluronic Acid".into()],
        benefits: vec!["Brightening".into(), "Fades dark spots".into()],
        how_to_use: "Apply 2–3 drops in the morning before sunscreen".into(),
        side_effects: "Mild tingling for sensitive skin".into(),
        price: Price::new(699.0, Currency::Inr),
    }
}

pub fn clearglow() -> ProductModel {
    ProductModel {
        product_name: "ClearGlow Niacinamide Serum".into(),
        concentration: "5% Niacinamide".into(),
        skin_type: vec!["Oily".into(), "Acne-prone".into()],
        key_ingredients: vec!["Niacinamide".into(), "Zinc".into(), "Hyaluronic Acid".into()],
        benefits: vec!["Controls oil".into(), "Brightening".into()],
        how_to_use: "Apply 3 drops morning and evening after cleansing".into(),
        side_effects: "Rare redness".into(),
        price: Price::new(799.0, Currency::Inr),
    }
}

/// Backend that replays a fixed script of replies, one per call.
///
/// Once the script runs out it answers with `fallback`, or fails with a
/// retryable generation error when there is none.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String>>>,
    fallback: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self::build(script, None, Duration::ZERO))
    }

    /// Always reply with `text` after the script.
    pub fn with_fallback(script: Vec<Result<String>>, text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::build(script, Some(text.into()), Duration::ZERO))
    }

    /// Sleep `delay` before every reply.
    pub fn slow(text: impl Into<String>, delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(Vec::new(), Some(text.into()), delay))
    }

    fn build(script: Vec<Result<String>>, fallback: Option<String>, delay: Duration) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        let text = match next {
            Some(reply) => reply?,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| ContentGenError::Generation("script exhausted".into()))?,
        };
        Ok(GenerationResponse {
            text,
            model: "scripted".into(),
        })
    }
}
