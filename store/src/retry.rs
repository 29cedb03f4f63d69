//! Bounded retry for fallible, side-effecting operations.
//!
//! Attempts run sequentially with a fixed pause between them. Failures are
//! classified only to pick the log line. [`Retry::run`] retries every failure
//! until the attempt budget runs out or the operation is cancelled;
//! [`Retry::run_retryable`] also gives up on failures that cannot heal.

use std::future::Future;
use std::time::Duration;

use freighter_core::config::FreighterConfig;
use freighter_core::consts::{DEFAULT_RETRIES, RETRIES_INTERVAL, TLOG_UNAVAILABLE_MESSAGE};
use freighter_core::error::{FreighterError, Result};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Retry limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts; zero or negative falls back to the default of 3
    pub max_attempts: i32,
    /// Pause between attempts
    pub interval: Duration,
    /// Report interim failures as warnings instead of errors
    pub ignore_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRIES as i32,
            interval: Duration::from_secs(RETRIES_INTERVAL),
            ignore_errors: false,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &FreighterConfig) -> Self {
        Self {
            max_attempts: i32::try_from(config.retries).unwrap_or(i32::MAX),
            ignore_errors: config.ignore_errors,
            ..Default::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Attempt budget after substituting the default for non-positive values.
    pub fn attempts(&self) -> u32 {
        if self.max_attempts <= 0 {
            DEFAULT_RETRIES
        } else {
            self.max_attempts as u32
        }
    }
}

/// Progress of one [`Retry::run`] invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Pending,
    Running { attempt: u32 },
    Retrying { attempt: u32 },
    Succeeded { attempts: u32 },
    ExhaustedFailed { attempts: u32 },
}

/// Class of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Online transparency-log verification was requested without a log client
    TransparencyLog,
    Other,
}

impl FailureClass {
    pub fn of(err: &FreighterError) -> Self {
        match err {
            FreighterError::TransparencyLogUnavailable(_) => Self::TransparencyLog,
            other if other.to_string().contains(TLOG_UNAVAILABLE_MESSAGE) => Self::TransparencyLog,
            _ => Self::Other,
        }
    }
}

/// Retry orchestrator.
pub struct Retry {
    policy: RetryPolicy,
    state: Mutex<RetryState>,
    span: tracing::Span,
}

impl Retry {
    pub fn new(policy: RetryPolicy) -> Self {
        let span = tracing::info_span!("retry", attempts = policy.attempts());
        Self {
            policy,
            state: Mutex::new(RetryState::Pending),
            span,
        }
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// State reached by the most recent run.
    pub fn state(&self) -> RetryState {
        *self.state.lock()
    }

    /// Invoke `operation` until it succeeds, the attempt budget is spent, or
    /// `cancel` fires.
    ///
    /// Exhaustion yields `RetryExhausted` carrying the last failure.
    /// Cancellation, observed before each attempt and during the pause,
    /// yields `Cancelled`.
    pub async fn run<F, Fut, T>(&self, cancel: &CancellationToken, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.attempt_loop(cancel, operation, false).await
    }

    /// Like [`Retry::run`], but a failure that can never heal on its own
    /// (see [`FreighterError::is_retryable`]) ends the run at once and is
    /// returned unwrapped.
    pub async fn run_retryable<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.attempt_loop(cancel, operation, true).await
    }

    async fn attempt_loop<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
        stop_on_permanent: bool,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.policy.attempts();
        self.transition(RetryState::Pending);

        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(FreighterError::Cancelled);
            }
            self.transition(RetryState::Running { attempt });

            let err = match operation().await {
                Ok(value) => {
                    self.transition(RetryState::Succeeded { attempts: attempt });
                    return Ok(value);
                }
                Err(FreighterError::Cancelled) => return Err(FreighterError::Cancelled),
                Err(err) => err,
            };
            self.report(attempt, attempts, &err);

            if stop_on_permanent && !err.is_retryable() {
                self.transition(RetryState::ExhaustedFailed { attempts: attempt });
                return Err(err);
            }
            if attempt >= attempts {
                self.transition(RetryState::ExhaustedFailed { attempts: attempt });
                return Err(FreighterError::RetryExhausted {
                    attempts: attempt,
                    last_error: Box::new(err),
                });
            }

            self.transition(RetryState::Retrying { attempt });
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FreighterError::Cancelled),
                _ = tokio::time::sleep(self.policy.interval) => {}
            }
            attempt += 1;
        }
    }

    fn transition(&self, next: RetryState) {
        *self.state.lock() = next;
        tracing::debug!(parent: &self.span, state = ?next, "Retry state");
    }

    fn report(&self, attempt: u32, attempts: u32, err: &FreighterError) {
        let class = FailureClass::of(err);
        match (self.policy.ignore_errors, class) {
            (true, FailureClass::TransparencyLog) => tracing::warn!(
                parent: &self.span,
                attempt,
                attempts,
                "Attempt failed transparency log verification"
            ),
            (true, FailureClass::Other) => tracing::warn!(
                parent: &self.span,
                attempt,
                attempts,
                error = %err,
                "Attempt failed"
            ),
            (false, FailureClass::TransparencyLog) => tracing::error!(
                parent: &self.span,
                attempt,
                attempts,
                "Attempt failed transparency log verification"
            ),
            (false, FailureClass::Other) => tracing::error!(
                parent: &self.span,
                attempt,
                attempts,
                error = %err,
                "Attempt failed"
            ),
        }
    }
}
