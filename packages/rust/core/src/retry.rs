//! Retry supervision for content stages.
//!
//! Per stage invocation the supervisor moves through
//! `Attempting -> {Succeeded, Retrying, Degraded}`. A worker fault, timeout
//! or validation failure sends it to `Retrying` (wait, then attempt again)
//! until the attempt budget runs out, at which point the worker's degraded
//! fragment is recorded instead. Deterministic workers degrade after their
//! first failure. Only fatal errors escape.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use contentgen_shared::{BackoffKind, ContentGenError, PipelineConfig, Result};

use crate::cancel::CancellationToken;
use crate::fragments::{StageDiagnostic, StageStatus};
use crate::schema::Schema;
use crate::stages::StageWorker;

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Delay before retry number `attempt` (1 = first retry).
pub trait BackoffStrategy: Send + Sync + std::fmt::Debug {
    fn next_delay(&self, attempt: u32) -> Duration;
}

/// Same delay every time. Suits providers with a known rate-limit window.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff(pub Duration);

impl BackoffStrategy for FixedBackoff {
    fn next_delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// `base * 2^(attempt-1)`, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
}

impl BackoffStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base.saturating_mul(factor).min(self.max)
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries beyond the first attempt.
    pub max_retries: u32,
    pub backoff: Arc<dyn BackoffStrategy>,
    /// Budget for a single attempt.
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// No waiting between attempts. Used by tests and dry runs.
    pub fn immediate(max_retries: u32, timeout: Duration) -> Self {
        Self {
            max_retries,
            backoff: Arc::new(FixedBackoff(Duration::ZERO)),
            timeout,
        }
    }
}

impl From<&PipelineConfig> for RetryPolicy {
    fn from(config: &PipelineConfig) -> Self {
        let backoff: Arc<dyn BackoffStrategy> = match config.backoff {
            BackoffKind::Fixed => Arc::new(FixedBackoff(config.retry_delay)),
            BackoffKind::Exponential => Arc::new(ExponentialBackoff {
                base: config.retry_delay,
                max: config.max_retry_delay,
            }),
        };
        Self {
            max_retries: config.max_retries,
            backoff,
            timeout: config.stage_timeout,
        }
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// Supervisor states, as logged per transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    Attempting { attempt: u32 },
    Retrying { attempt: u32, reason: String },
    Succeeded { attempt: u32 },
    Degraded { attempts: u32 },
}

/// A recorded fragment plus how it was obtained.
#[derive(Debug)]
pub struct StageOutcome<T> {
    pub output: T,
    pub diagnostic: StageDiagnostic,
    pub transitions: Vec<AttemptState>,
}

#[derive(Debug, Clone)]
pub struct Supervisor {
    policy: RetryPolicy,
}

impl Supervisor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `worker` until it yields a fragment that passes `schema`, or
    /// degrade once the attempt budget is spent.
    #[instrument(skip_all, fields(stage = %worker.id()))]
    pub async fn run<W: StageWorker>(
        &self,
        worker: &W,
        input: &W::Input,
        schema: &Schema,
        cancel: &CancellationToken,
    ) -> Result<StageOutcome<W::Output>> {
        let stage = worker.id();
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts();
        let mut transitions = Vec::new();
        let mut last_error: Option<String> = None;
        let mut attempts = 0;

        for attempt in 1..=max_attempts {
            attempts = attempt;
            transitions.push(AttemptState::Attempting { attempt });
            debug!(attempt, max_attempts, "attempting stage");

            // Waiting for a shared backend slot is not part of the attempt's budget.
            let produced = match worker.reserve().await {
                Ok(slot) => {
                    let call = worker.produce(input, slot.as_ref());
                    let produced = tokio::time::timeout(self.policy.timeout, call).await;
                    drop(slot);
                    produced
                        .map_err(|_| ContentGenError::Timeout {
                            stage: stage.to_string(),
                            timeout_ms: self.policy.timeout.as_millis() as u64,
                        })
                        .and_then(|output| output)
                }
                Err(e) => Err(e),
            };

            let failure = match produced {
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => e,
                Ok(output) => {
                    let result = schema.validate_fragment(&output)?;
                    if result.passed() {
                        transitions.push(AttemptState::Succeeded { attempt });
                        let elapsed_ms = started.elapsed().as_millis() as u64;
                        info!(attempt, elapsed_ms, "stage succeeded");
                        return Ok(StageOutcome {
                            output,
                            diagnostic: StageDiagnostic {
                                last_error,
                                ..StageDiagnostic::succeeded(stage, attempt, elapsed_ms)
                            },
                            transitions,
                        });
                    }
                    result.into_error(&schema.name)
                }
            };

            warn!(attempt, error = %failure, "stage attempt failed");
            let reason = failure.to_string();
            last_error = Some(reason.clone());

            if worker.is_deterministic() {
                debug!("deterministic worker, not retrying");
                break;
            }

            if attempt < max_attempts {
                transitions.push(AttemptState::Retrying { attempt, reason });
                if cancel.is_cancelled() {
                    return Err(ContentGenError::Cancelled);
                }
                let delay = self.retry_delay(attempt, &failure);
                if !delay.is_zero() {
                    debug!(delay_ms = delay.as_millis() as u64, "waiting before retry");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        let output = worker.degraded(input);
        let violations = schema.validate_fragment(&output)?.messages();
        transitions.push(AttemptState::Degraded { attempts });
        warn!(
            attempts,
            violations = violations.len(),
            "stage degraded after exhausting retries"
        );

        Ok(StageOutcome {
            output,
            diagnostic: StageDiagnostic {
                stage,
                status: StageStatus::Degraded,
                attempts,
                violations,
                last_error,
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
            transitions,
        })
    }

    /// Backoff delay, stretched to honor a provider's `Retry-After`.
    fn retry_delay(&self, attempt: u32, failure: &ContentGenError) -> Duration {
        let delay = self.policy.backoff.next_delay(attempt);
        match failure {
            ContentGenError::RateLimited {
                retry_after_ms: Some(ms),
            } => delay.max(Duration::from_millis(*ms)),
            _ => delay,
        }
    }
}
