//! Process-scoped cache of generation backend handles.
//!
//! One handle per [`BackendKey`], built lazily on first use and kept for the
//! life of the registry. Concurrent first requests for the same key wait on a
//! per-key [`OnceCell`], so at most one construction happens per key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;
use tracing::{debug, info};

use contentgen_shared::{AppConfig, ContentGenError, Provider, Result};

use crate::backend::{BackendKey, GenerationBackend};
use crate::ollama::OllamaBackend;
use crate::openrouter::OpenRouterBackend;
use crate::throttle::{ThrottleLimits, Throttled};

/// Builds a raw backend for a key. Injected so tests can count constructions.
pub trait BackendFactory: Send + Sync {
    fn build(&self, key: &BackendKey) -> Result<Arc<dyn GenerationBackend>>;
}

/// Builds real HTTP backends from application config.
pub struct HttpBackendFactory {
    config: AppConfig,
}

impl HttpBackendFactory {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }
}

impl BackendFactory for HttpBackendFactory {
    fn build(&self, key: &BackendKey) -> Result<Arc<dyn GenerationBackend>> {
        match key.provider {
            Provider::OpenRouter => {
                let var = &self.config.openrouter.api_key_env;
                let api_key = std::env::var(var)
                    .ok()
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| {
                        ContentGenError::config(format!("{var} is not set; cannot reach OpenRouter"))
                    })?;
                Ok(Arc::new(OpenRouterBackend::new(
                    &self.config.openrouter.base_url,
                    api_key,
                    &key.model,
                    key.temperature(),
                )?))
            }
            Provider::Ollama => Ok(Arc::new(OllamaBackend::new(
                &self.config.ollama.base_url,
                &key.model,
                key.temperature(),
            )?)),
            Provider::Rules => Err(ContentGenError::config(
                "the rules provider has no generation backend",
            )),
        }
    }
}

type Slot = Arc<OnceCell<Arc<dyn GenerationBackend>>>;

pub struct ClientRegistry {
    factory: Arc<dyn BackendFactory>,
    limits: ThrottleLimits,
    slots: Mutex<HashMap<BackendKey, Slot>>,
}

impl ClientRegistry {
    pub fn new(factory: Arc<dyn BackendFactory>, limits: ThrottleLimits) -> Self {
        Self {
            factory,
            limits,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Registry backed by real HTTP clients.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(HttpBackendFactory::new(config.clone())),
            ThrottleLimits::from(config),
        )
    }

    /// Return the handle for `key`, constructing it on first use.
    ///
    /// A failed construction leaves the slot empty, so a later call retries.
    pub async fn get(&self, key: &BackendKey) -> Result<Arc<dyn GenerationBackend>> {
        let slot = self.slot(key)?;
        let handle = slot
            .get_or_try_init(|| async {
                let raw = self.factory.build(key)?;
                info!(%key, "constructed generation backend");
                Ok::<_, ContentGenError>(
                    Arc::new(Throttled::new(raw, self.limits)) as Arc<dyn GenerationBackend>
                )
            })
            .await?;
        Ok(handle.clone())
    }

    /// Number of keys with a constructed handle.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| slots.values().filter(|s| s.initialized()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached handle. Calls already holding a handle keep it.
    pub fn reset(&self) {
        if let Ok(mut slots) = self.slots.lock() {
            debug!(count = slots.len(), "resetting client registry");
            slots.clear();
        }
    }

    fn slot(&self, key: &BackendKey) -> Result<Slot> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| ContentGenError::state("client registry lock poisoned"))?;
        Ok(slots.entry(key.clone()).or_default().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::backend::{GenerationRequest, GenerationResponse};

    struct Echo;

    #[async_trait]
    impl GenerationBackend for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
            Ok(GenerationResponse {
                text: request.prompt.clone(),
                model: "echo".into(),
            })
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        builds: AtomicUsize,
    }

    impl BackendFactory for CountingFactory {
        fn build(&self, _key: &BackendKey) -> Result<Arc<dyn GenerationBackend>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Echo))
        }
    }

    fn key(model: &str) -> BackendKey {
        BackendKey::new(Provider::Ollama, model, 0.7)
    }

    #[tokio::test]
    async fn concurrent_first_access_builds_once() {
        let factory = Arc::new(CountingFactory::default());
        let registry = Arc::new(ClientRegistry::new(factory.clone(), ThrottleLimits::default()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move { registry.get(&key("m")).await }));
        }
        let mut backends = Vec::new();
        for handle in handles {
            backends.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert!(backends.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn distinct_keys_build_separately() {
        let factory = Arc::new(CountingFactory::default());
        let registry = ClientRegistry::new(factory.clone(), ThrottleLimits::default());

        registry.get(&key("a")).await.unwrap();
        registry.get(&key("b")).await.unwrap();
        registry.get(&key("a")).await.unwrap();

        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn reset_forces_reconstruction() {
        let factory = Arc::new(CountingFactory::default());
        let registry = ClientRegistry::new(factory.clone(), ThrottleLimits::default());

        registry.get(&key("a")).await.unwrap();
        registry.reset();
        assert!(registry.is_empty());
        registry.get(&key("a")).await.unwrap();

        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rules_provider_has_no_backend() {
        let registry = ClientRegistry::from_config(&AppConfig::default());
        let err = registry
            .get(&BackendKey::new(Provider::Rules, "", 0.7))
            .await
            .err()
            .unwrap();
        assert!(err.is_fatal());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn handles_are_usable() {
        let registry =
            ClientRegistry::new(Arc::new(CountingFactory::default()), ThrottleLimits::default());
        let backend = registry.get(&key("a")).await.unwrap();
        let response = backend
            .generate(&GenerationRequest::new("s", "hello"))
            .await
            .unwrap();
        assert_eq!(response.text, "hello");
    }
}
