//! Resilient execution of remote calls with failure-class-aware retries.
//!
//! Every feed operation (fetch and send) goes through [`ResilientExecutor`],
//! which retries only transient failures, using exponential backoff:
//! - Initial delay: 1s
//! - Multiplier: 2x
//! - Max attempts: 5 (first attempt included)
//!
//! Quota exhaustion and client errors are returned after the first
//! occurrence; retrying them would not change the outcome.
//!
//! # Usage
//!
//! ```ignore
//! use livechat_bot::bot::resilient::ResilientExecutor;
//!
//! let executor = ResilientExecutor::default();
//! let messages = executor
//!     .execute("list_new_messages", || feed.list_new_messages(50))
//!     .await?;
//! ```

use crate::config::{RETRY_BACKOFF_MULTIPLIER, RETRY_INITIAL_DELAY_MS, RETRY_MAX_ATTEMPTS};
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::RetryIf;
use tracing::{error, instrument, warn};

/// How a failed remote call should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Server-side hiccup, worth retrying after a pause
    Retryable,
    /// Usage limit reached; stop calling for now
    QuotaExhausted,
    /// Deterministic failure; retrying would not help
    Fatal,
}

impl FailureClass {
    /// Classify an HTTP status code
    ///
    /// # Examples
    ///
    /// ```
    /// use livechat_bot::bot::resilient::FailureClass;
    ///
    /// assert_eq!(FailureClass::from_status(503), FailureClass::Retryable);
    /// assert_eq!(FailureClass::from_status(403), FailureClass::QuotaExhausted);
    /// assert_eq!(FailureClass::from_status(404), FailureClass::Fatal);
    /// ```
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            500..=599 => Self::Retryable,
            403 | 429 => Self::QuotaExhausted,
            _ => Self::Fatal,
        }
    }
}

/// Errors that know their own [`FailureClass`]
pub trait Classify {
    /// The class this error belongs to
    fn failure_class(&self) -> FailureClass;
}

/// Failure returned by [`ResilientExecutor::execute`]
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// The remote quota is exhausted; no retries were made
    #[error("quota exhausted: {0}")]
    QuotaExhausted(E),
    /// Non-retryable failure on the first occurrence
    #[error("fatal error: {0}")]
    Fatal(E),
    /// Every attempt failed with a transient error
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made, the first one included
        attempts: usize,
        /// Error from the final attempt
        last: E,
    },
}

impl<E> CallError<E> {
    /// The underlying error
    pub fn inner(&self) -> &E {
        match self {
            Self::QuotaExhausted(e) | Self::Fatal(e) | Self::Exhausted { last: e, .. } => e,
        }
    }

    /// Consume into the underlying error
    pub fn into_inner(self) -> E {
        match self {
            Self::QuotaExhausted(e) | Self::Fatal(e) | Self::Exhausted { last: e, .. } => e,
        }
    }
}

/// Backoff parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call, the first one included
    pub max_attempts: usize,
    /// Pause before the first retry
    pub initial_delay: Duration,
    /// Factor applied to the pause after every retry
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(RETRY_INITIAL_DELAY_MS),
            multiplier: RETRY_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Pauses between attempts: `initial, initial*m, initial*m^2, ...`
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let multiplier = self.multiplier;
        std::iter::successors(Some(self.initial_delay), move |d| d.checked_mul(multiplier))
            .take(self.max_attempts.saturating_sub(1))
    }
}

/// Runs remote operations under a [`RetryPolicy`]
#[derive(Debug, Clone, Default)]
pub struct ResilientExecutor {
    policy: RetryPolicy,
}

impl ResilientExecutor {
    /// Create an executor with the given policy
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The active policy
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation`, retrying transient failures with exponential backoff.
    ///
    /// # Errors
    ///
    /// - [`CallError::QuotaExhausted`] on the first quota failure
    /// - [`CallError::Fatal`] on the first non-retryable failure
    /// - [`CallError::Exhausted`] when every attempt failed transiently
    #[instrument(skip(self, operation))]
    pub async fn execute<F, Fut, T, E>(&self, name: &str, mut operation: F) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let attempts = AtomicUsize::new(0);
        let max_attempts = self.policy.max_attempts;

        let result = RetryIf::spawn(
            self.policy.delays(),
            || {
                attempts.fetch_add(1, Ordering::Relaxed);
                operation()
            },
            |e: &E| {
                let is_retryable = e.failure_class() == FailureClass::Retryable;
                let attempt = attempts.load(Ordering::Relaxed);
                if is_retryable && attempt < max_attempts {
                    warn!("{name} failed (attempt {attempt}/{max_attempts}): {e}. Retrying.");
                }
                is_retryable
            },
        )
        .await;

        result.map_err(|e| {
            let attempts = attempts.load(Ordering::Relaxed);
            match e.failure_class() {
                FailureClass::Retryable => {
                    error!("{name} failed after {attempts} attempts: {e}");
                    CallError::Exhausted { attempts, last: e }
                }
                FailureClass::QuotaExhausted => {
                    error!("{name}: quota exceeded, stopping retries: {e}");
                    CallError::QuotaExhausted(e)
                }
                FailureClass::Fatal => {
                    error!("{name} failed: {e}");
                    CallError::Fatal(e)
                }
            }
        })
    }
}
