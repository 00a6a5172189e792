//! Bounded-concurrency execution with input-order results
//!
//! Runs a batch of caller-supplied asynchronous operations with a cap on how
//! many may be in flight at once. Operations are admitted in input order;
//! each result is recorded in a slot reserved for its input index, so the
//! output order never depends on completion order.
//!
//! On the first failure the executor stops admitting new operations but
//! drains everything already in flight, then surfaces the failure with the
//! lowest input index. No operation's outcome goes unobserved.
//!
//! # Example
//!
//! ```rust,ignore
//! use pacer::{BoundedExecutor, Concurrency};
//!
//! let executor = BoundedExecutor::new(Concurrency::Bounded(4));
//! let pages = executor
//!     .run(urls.into_iter().map(|url| move || fetch(url)).collect())
//!     .await?;
//! ```

use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use crate::error::{PacerError, Result};

/// In-flight cap for a run.
///
/// Unrestricted concurrency is an explicit choice, never a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// At most `n` operations in flight at once. `Bounded(1)` is strict
    /// sequential execution.
    Bounded(usize),
    /// No cap: every operation is admitted immediately.
    Unbounded,
}

impl Concurrency {
    fn cap(self) -> Result<usize> {
        match self {
            Concurrency::Bounded(0) => Err(PacerError::InvalidConcurrencyLimit { limit: 0 }),
            Concurrency::Bounded(n) => Ok(n),
            Concurrency::Unbounded => Ok(usize::MAX),
        }
    }
}

/// Executor that runs operation batches under a concurrency cap
#[derive(Debug, Clone, Copy)]
pub struct BoundedExecutor {
    limit: Concurrency,
}

impl BoundedExecutor {
    pub fn new(limit: Concurrency) -> Self {
        Self { limit }
    }

    /// Get the configured cap
    pub fn limit(&self) -> Concurrency {
        self.limit
    }

    /// Run all operations, returning their results in input order.
    ///
    /// Fails with `[PACE-001]` before starting anything if the cap is zero,
    /// and with `[PACE-010]` (first failure by input index) after draining
    /// in-flight work if any operation fails. Empty input returns an empty
    /// vector without scheduling anything.
    #[instrument(skip_all, fields(total = operations.len()))]
    pub async fn run<F, Fut, T>(&self, operations: Vec<F>) -> Result<Vec<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.run_inner(operations, None).await
    }

    /// Like [`run`](Self::run), but stops admitting queued operations once
    /// `cancel` is triggered. Already-admitted operations run to completion.
    ///
    /// A cancellation that prevented at least one admission fails the run
    /// with `[PACE-012]`; a cancellation arriving after every operation was
    /// admitted changes nothing.
    pub async fn run_with_cancellation<F, Fut, T>(
        &self,
        operations: Vec<F>,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.run_inner(operations, Some(cancel)).await
    }

    async fn run_inner<F, Fut, T>(
        &self,
        operations: Vec<F>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let cap = self.limit.cap()?;
        let total = operations.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        // One slot per input index; completion order never touches layout.
        let mut slots: Vec<Option<T>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);

        let mut in_flight: JoinSet<(usize, anyhow::Result<T>)> = JoinSet::new();
        let mut queue = operations.into_iter().enumerate();
        let mut first_failure: Option<(usize, anyhow::Error)> = None;
        let mut admitted = 0usize;
        let mut halted = false;

        loop {
            while !halted && in_flight.len() < cap {
                if cancel.is_some_and(|token| token.is_cancelled()) {
                    debug!(admitted, total, "cancellation observed; no further admissions");
                    halted = true;
                    break;
                }
                let Some((index, operation)) = queue.next() else {
                    break;
                };
                trace!(index, "admitting operation");
                let fut = operation();
                in_flight.spawn(async move { (index, fut.await) });
                admitted += 1;
            }

            match in_flight.join_next().await {
                Some(Ok((index, Ok(value)))) => {
                    trace!(index, "operation completed");
                    slots[index] = Some(value);
                }
                Some(Ok((index, Err(cause)))) => {
                    debug!(index, %cause, "operation failed; draining in-flight work");
                    halted = true;
                    let keep_existing = first_failure
                        .as_ref()
                        .is_some_and(|(first, _)| *first < index);
                    if !keep_existing {
                        first_failure = Some((index, cause));
                    }
                }
                Some(Err(join_error)) => {
                    // Slot integrity is gone; abandon the rest of the set.
                    return Err(PacerError::OperationPanicked {
                        details: join_error.to_string(),
                    });
                }
                None => break,
            }
        }

        if let Some((index, cause)) = first_failure {
            return Err(PacerError::OperationFailed { index, cause });
        }
        if admitted < total {
            return Err(PacerError::Cancelled { admitted, total });
        }

        let mut results = Vec::with_capacity(total);
        for slot in slots {
            // Every slot is filled once all operations have settled.
            results.push(slot.expect("result slot filled after drain"));
        }
        Ok(results)
    }
}
