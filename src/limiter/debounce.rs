//! Trailing debounce
//!
//! Each call re-arms a timer for `quiet_period` and captures its arguments;
//! the wrapped function fires once the calls stop arriving for a full quiet
//! period, with the arguments of the most recent call.
//!
//! # Coalescing contract
//!
//! A superseded call's handle does NOT resolve on its own. Waiters
//! accumulate across supersessions and all of them receive (a clone of) the
//! result of the invocation that eventually fires. Callers that need
//! per-call resolution want [`Throttler`](super::Throttler) instead.
//!
//! Timer state is owned by the instance: independent debouncers never
//! interfere with each other, and dropping a debouncer aborts its pending
//! timer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::trace;

use super::{wrap_fn, CallHandle, Waiters, WrappedFn};

struct DebounceState<T, R> {
    latest_args: Option<T>,
    waiters: Waiters<R>,
    timer: Option<JoinHandle<()>>,
    // Stale timers check this before firing.
    generation: u64,
}

/// Debounced wrapper around an asynchronous function
pub struct Debouncer<T, R> {
    func: WrappedFn<T, R>,
    quiet_period: Duration,
    state: Arc<Mutex<DebounceState<T, R>>>,
}

impl<T, R> Debouncer<T, R>
where
    T: Send + 'static,
    R: Clone + Send + 'static,
{
    pub fn new<F, Fut>(quiet_period: Duration, func: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        Self {
            func: wrap_fn(func),
            quiet_period,
            state: Arc::new(Mutex::new(DebounceState {
                latest_args: None,
                waiters: SmallVec::new(),
                timer: None,
                generation: 0,
            })),
        }
    }

    /// Record a call: capture its arguments, cancel any pending timer and
    /// arm a fresh one for a full quiet period.
    pub fn call(&self, args: T) -> CallHandle<R> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock();

        state.latest_args = Some(args);
        state.waiters.push(tx);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;
        let generation = state.generation;
        trace!(generation, "debounce timer re-armed");

        let func = Arc::clone(&self.func);
        let shared = Arc::clone(&self.state);
        let quiet = self.quiet_period;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let (args, waiters) = {
                let mut state = shared.lock();
                if state.generation != generation {
                    return;
                }
                state.timer = None;
                let Some(args) = state.latest_args.take() else {
                    return;
                };
                (args, std::mem::take(&mut state.waiters))
            };
            trace!(generation, "debounce quiet period elapsed; firing");
            let result = func(args).await;
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
        }));

        CallHandle::new(rx)
    }

    /// Whether a firing is currently scheduled
    pub fn pending(&self) -> bool {
        self.state.lock().latest_args.is_some()
    }

    /// Fire the pending invocation now, without waiting out the quiet
    /// period. Returns `None` when nothing was pending.
    pub async fn flush(&self) -> Option<R> {
        let (args, waiters) = {
            let mut state = self.state.lock();
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.generation += 1;
            let args = state.latest_args.take()?;
            (args, std::mem::take(&mut state.waiters))
        };
        let result = (self.func)(args).await;
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
        Some(result)
    }

    /// Discard the pending invocation. Outstanding handles resolve with
    /// `[PACE-020]`.
    pub fn cancel_pending(&self) {
        let mut state = self.state.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;
        state.latest_args = None;
        state.waiters.clear();
    }
}

impl<T, R> Drop for Debouncer<T, R> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;
        state.latest_args = None;
        state.waiters.clear();
    }
}
