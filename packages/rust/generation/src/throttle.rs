//! Concurrency and pacing limits shared by every caller of one backend handle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::trace;

use contentgen_shared::{AppConfig, ContentGenError, Result};

use crate::backend::{GenerationBackend, GenerationRequest, GenerationResponse};

#[derive(Debug, Clone, Copy)]
pub struct ThrottleLimits {
    /// Calls allowed in flight at once (at least 1).
    pub max_in_flight: usize,
    /// Minimum gap between two call starts.
    pub min_interval: Duration,
}

impl Default for ThrottleLimits {
    fn default() -> Self {
        Self {
            max_in_flight: 1,
            min_interval: Duration::ZERO,
        }
    }
}

impl From<&AppConfig> for ThrottleLimits {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_in_flight: config.generation.max_in_flight.max(1),
            min_interval: Duration::from_millis(config.generation.min_interval_ms),
        }
    }
}

/// A backend wrapped in a semaphore and a start-time pacer.
pub struct Throttled {
    inner: Arc<dyn GenerationBackend>,
    permits: Arc<Semaphore>,
    min_interval: Duration,
    next_start: Mutex<Instant>,
}

impl Throttled {
    pub fn new(inner: Arc<dyn GenerationBackend>, limits: ThrottleLimits) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(limits.max_in_flight.max(1))),
            min_interval: limits.min_interval,
            next_start: Mutex::new(Instant::now()),
        }
    }

    /// Wait until the pacer allows another call to start.
    async fn pace(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut next = self.next_start.lock().await;
        let now = Instant::now();
        if *next > now {
            trace!(wait_ms = (*next - now).as_millis() as u64, "pacing backend call");
            tokio::time::sleep_until(*next).await;
        }
        *next = Instant::now() + self.min_interval;
    }
}

/// One reserved, already paced call on a throttled backend.
///
/// The in-flight permit is released when the slot drops.
pub struct CallSlot {
    inner: Arc<dyn GenerationBackend>,
    _permit: OwnedSemaphorePermit,
}

impl CallSlot {
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        self.inner.generate(request).await
    }
}

impl std::fmt::Debug for CallSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSlot").field("backend", &self.name()).finish()
    }
}

#[async_trait]
impl GenerationBackend for Throttled {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        match self.reserve().await? {
            Some(slot) => slot.generate(request).await,
            None => self.inner.generate(request).await,
        }
    }

    async fn reserve(&self) -> Result<Option<CallSlot>> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ContentGenError::Generation("backend throttle closed".into()))?;
        self.pace().await;
        Ok(Some(CallSlot {
            inner: self.inner.clone(),
            _permit: permit,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records the peak number of overlapping calls.
    struct Slow {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl GenerationBackend for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationResponse> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(GenerationResponse {
                text: "{}".into(),
                model: "slow".into(),
            })
        }
    }

    fn slow() -> Arc<Slow> {
        Arc::new(Slow {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn caps_calls_in_flight() {
        let inner = slow();
        let throttled = Arc::new(Throttled::new(
            inner.clone(),
            ThrottleLimits {
                max_in_flight: 2,
                min_interval: Duration::ZERO,
            },
        ));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let t = throttled.clone();
            handles.push(tokio::spawn(async move {
                t.generate(&GenerationRequest::new("s", "p")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(inner.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn spaces_call_starts() {
        let throttled = Throttled::new(
            slow(),
            ThrottleLimits {
                max_in_flight: 4,
                min_interval: Duration::from_millis(40),
            },
        );

        let started = std::time::Instant::now();
        for _ in 0..3 {
            throttled.generate(&GenerationRequest::new("s", "p")).await.unwrap();
        }
        // Second and third calls each wait for the interval after the previous start.
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn held_slot_blocks_other_reservations() {
        let throttled = Arc::new(Throttled::new(slow(), ThrottleLimits::default()));
        let slot = throttled.reserve().await.unwrap().unwrap();

        let waiter = {
            let t = throttled.clone();
            tokio::spawn(async move { t.reserve().await.map(|s| s.is_some()) })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());

        slot.generate(&GenerationRequest::new("s", "p")).await.unwrap();
        drop(slot);
        assert!(waiter.await.unwrap().unwrap());
    }
}
