//! Retry controller for provider calls
//!
//! Drives one call through an explicit state machine:
//!
//! ```text
//! Attempting(n) ──ok──────────────────────────────▶ Success
//!      │
//!      └─err─▶ transient && n < max_attempts ──▶ Retry { delay } ──▶ Attempting(n + 1)
//!              otherwise ─────────────────────────▶ Failed
//! ```
//!
//! Each attempt is bounded by the per-call timeout. The controller never logs; every
//! transition is reported to a [`RetryObserver`].

use crate::config::RetryConfig;
use crate::llm::{FailureClass, ProviderError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Hard ceiling on any single backoff, whatever the configuration says
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
    attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: max_delay.min(MAX_BACKOFF),
            jitter: false,
            attempt_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &RetryConfig, timeout_seconds: u64) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_secs_f64(config.base_delay_seconds),
            Duration::from_secs_f64(config.max_delay_seconds),
        )
        .with_jitter(config.jitter)
        .with_attempt_timeout(Duration::from_secs(timeout_seconds))
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts allowed: the first call plus `max_retries` retries
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Delay before retry `retry` (1-based), with jitter applied when enabled
    fn delay_for(&self, retry: u32) -> Duration {
        let delay = calculate_backoff(self, retry);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let millis = delay.as_millis().min(u64::MAX as u128) as u64;
        Duration::from_millis(rand::rng().random_range(0..=millis))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(30))
    }
}

/// Exponential backoff with overflow protection
///
/// `base * 2^(retry-1)`, capped at the policy's `max_delay`.
///
/// With base=1s and max=30s:
/// - Retry 1: 1s
/// - Retry 2: 2s
/// - Retry 3: 4s
/// - Retry 6+: 30s (capped)
pub fn calculate_backoff(policy: &RetryPolicy, retry: u32) -> Duration {
    let exponent = retry.saturating_sub(1).min(31);
    policy
        .base_delay
        .saturating_mul(2_u32.saturating_pow(exponent))
        .min(policy.max_delay)
}

/// Final result of a retried call
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T> {
    Success { value: T, attempts: u32 },
    /// Permanent failure, or transient failures until attempts ran out
    Failed { error: ProviderError, attempts: u32 },
    /// Cancellation fired before or between attempts, or abandoned the in-flight one
    Cancelled { attempts: u32 },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. }
            | Self::Failed { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Observable transitions
#[derive(Debug)]
pub enum RetryEvent<'a> {
    AttemptFailed {
        attempt: u32,
        class: FailureClass,
        error: &'a ProviderError,
        /// `None` when no retry follows
        next_delay: Option<Duration>,
    },
    Succeeded {
        attempts: u32,
    },
    GaveUp {
        attempts: u32,
        class: FailureClass,
        error: &'a ProviderError,
    },
    Cancelled {
        attempts: u32,
    },
}

/// Reporting hook for retry transitions
pub trait RetryObserver: Send + Sync {
    fn on_event(&self, event: &RetryEvent<'_>);
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RetryObserver for NoopObserver {
    fn on_event(&self, _event: &RetryEvent<'_>) {}
}

enum State<T> {
    Attempting(u32),
    Retry { attempt: u32, delay: Duration },
    Success { value: T, attempts: u32 },
    Failed { error: ProviderError, attempts: u32 },
}

#[derive(Debug, Clone, Default)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `call` until it succeeds, fails permanently, runs out of attempts or is cancelled
    ///
    /// `call` receives the 1-based attempt number.
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        observer: &dyn RetryObserver,
        mut call: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut state = State::Attempting(1);
        loop {
            state = match state {
                State::Attempting(attempt) => {
                    if cancel.is_cancelled() {
                        return self.cancelled(observer, attempt - 1);
                    }
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return self.cancelled(observer, attempt);
                        }
                        result = tokio::time::timeout(self.policy.attempt_timeout, call(attempt)) => result,
                    };
                    match result {
                        Ok(Ok(value)) => State::Success {
                            value,
                            attempts: attempt,
                        },
                        Ok(Err(error)) => self.after_failure(observer, attempt, error),
                        Err(_elapsed) => self.after_failure(
                            observer,
                            attempt,
                            ProviderError::Timeout {
                                timeout_seconds: self.policy.attempt_timeout.as_secs(),
                            },
                        ),
                    }
                }
                State::Retry { attempt, delay } => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return self.cancelled(observer, attempt);
                        }
                        _ = tokio::time::sleep(delay) => State::Attempting(attempt + 1),
                    }
                }
                State::Success { value, attempts } => {
                    observer.on_event(&RetryEvent::Succeeded { attempts });
                    return RetryOutcome::Success { value, attempts };
                }
                State::Failed { error, attempts } => {
                    observer.on_event(&RetryEvent::GaveUp {
                        attempts,
                        class: error.class(),
                        error: &error,
                    });
                    return RetryOutcome::Failed { error, attempts };
                }
            };
        }
    }

    fn after_failure<T>(
        &self,
        observer: &dyn RetryObserver,
        attempt: u32,
        error: ProviderError,
    ) -> State<T> {
        let class = error.class();
        let next_delay = (class == FailureClass::Transient && attempt < self.policy.max_attempts())
            .then(|| self.policy.delay_for(attempt));

        observer.on_event(&RetryEvent::AttemptFailed {
            attempt,
            class,
            error: &error,
            next_delay,
        });

        match next_delay {
            Some(delay) => State::Retry { attempt, delay },
            None => State::Failed {
                error,
                attempts: attempt,
            },
        }
    }

    fn cancelled<T>(&self, observer: &dyn RetryObserver, attempts: u32) -> RetryOutcome<T> {
        observer.on_event(&RetryEvent::Cancelled { attempts });
        RetryOutcome::Cancelled { attempts }
    }
}
