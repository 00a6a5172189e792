//! Retry with bounded attempts and configurable backoff
//!
//! Re-invokes a fallible asynchronous operation up to a total attempt bound.
//! Attempts are strictly sequential; success returns immediately, and when
//! every attempt fails the error from the final attempt escapes as-is.
//!
//! The inter-attempt delay is constant with `RetryConfig::fixed`, or grows
//! exponentially with a cap and optional jitter when configured.
//!
//! # Example
//!
//! ```rust,ignore
//! use pacer::{RetryConfig, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(RetryConfig::fixed(3, Duration::from_millis(200)));
//! let value = policy
//!     .run_observed(|| flaky_call(), |err, attempt| {
//!         eprintln!("attempt {attempt} failed: {err}");
//!     })
//!     .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PacerError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one. Must be >= 1;
    /// `attempts = 1` means a single try with no retrying.
    pub attempts: u32,
    /// Base delay between attempts
    pub delay: Duration,
    /// Multiplier applied to the delay after each failed attempt
    /// (1.0 keeps the delay constant)
    pub backoff_multiplier: f64,
    /// Cap on the grown delay
    pub max_delay: Duration,
    /// Jitter factor (0.0 to 1.0) adding bounded randomness to each delay
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    /// Constant-delay retry: `attempts` tries spaced exactly `delay` apart.
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay,
            backoff_multiplier: 1.0,
            max_delay: delay,
            jitter: 0.0,
        }
    }

    /// Set the total attempt count
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set the base delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set the delay cap
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the jitter factor (clamped to 0.0..=1.0)
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }
}

/// Retry policy that executes operations with bounded, sequential attempts
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay slept after the `attempt`-th failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let base = self.config.delay.as_millis() as f64
            * self.config.backoff_multiplier.powi(exponent as i32);
        let capped = base.min(self.config.max_delay.as_millis() as f64);

        let jittered = if self.config.jitter > 0.0 {
            let range = capped * self.config.jitter;
            let offset = rand::random::<f64>() * range * 2.0 - range;
            (capped + offset).max(0.0)
        } else {
            capped
        };

        Duration::from_millis(jittered as u64)
    }

    /// Execute the operation, retrying every failure up to the attempt bound.
    ///
    /// Returns the success value as soon as any attempt succeeds. When all
    /// attempts fail, the error from the final attempt is returned directly.
    /// `attempts = 0` fails with `[PACE-002]` before the operation is ever
    /// invoked.
    pub async fn run<F, Fut, T>(&self, operation: F) -> anyhow::Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.run_observed(operation, |_, _| {}).await
    }

    /// Like [`run`](Self::run), with an observer invoked after every
    /// non-final failure with the error and the 1-based attempt number.
    pub async fn run_observed<F, Fut, T, O>(
        &self,
        operation: F,
        mut on_failure: O,
    ) -> anyhow::Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
        O: FnMut(&anyhow::Error, u32),
    {
        if self.config.attempts == 0 {
            return Err(PacerError::InvalidAttempts { attempts: 0 }.into());
        }

        let mut attempt = 1u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(cause) if attempt >= self.config.attempts => return Err(cause),
                Err(cause) => {
                    on_failure(&cause, attempt);
                    let delay = self.delay_after(attempt);
                    debug!(attempt, %cause, ?delay, "attempt failed; backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
