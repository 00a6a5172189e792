//! Fixed-window throttle
//!
//! A window of `window` length admits up to `limit` immediate executions.
//! Once the quota is exhausted, exactly one deferred execution is scheduled
//! for the end of the window; further calls before the rollover replace the
//! pending arguments (last write wins) rather than queueing additional
//! invocations. The deferred firing opens the next window and consumes one
//! unit of its quota.
//!
//! The schedule is fixed: overflow calls never push the deferred firing
//! later. Calls return a [`CallHandle`] immediately; every caller waiting on
//! the deferred firing observes its (shared) result.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::trace;

use super::{wrap_fn, CallHandle, Waiters, WrappedFn};
use crate::error::{PacerError, Result};

struct Pending<T, R> {
    args: T,
    waiters: Waiters<R>,
    timer: JoinHandle<()>,
}

struct WindowState<T, R> {
    quota_remaining: u32,
    /// Set by the first executed call of a window, cleared on rollover.
    window_start: Option<Instant>,
    pending: Option<Pending<T, R>>,
}

/// Timer path: take the pending call, roll the window and execute.
async fn fire_pending<T, R>(
    state: Arc<Mutex<WindowState<T, R>>>,
    func: WrappedFn<T, R>,
    limit: u32,
) where
    R: Clone,
{
    let (args, waiters) = {
        let mut state = state.lock();
        let Some(pending) = state.pending.take() else {
            return;
        };
        // The deferred firing opens the next window and consumes one unit
        // of its quota.
        state.quota_remaining = limit - 1;
        state.window_start = Some(Instant::now());
        (pending.args, pending.waiters)
    };
    let result = func(args).await;
    for waiter in waiters {
        let _ = waiter.send(result.clone());
    }
}

/// Fixed-window state machine, shared between [`Throttler`] and
/// [`KeyedThrottler`](super::KeyedThrottler) (one core per key).
pub(crate) struct WindowCore<T, R> {
    func: WrappedFn<T, R>,
    limit: u32,
    window: Duration,
    state: Arc<Mutex<WindowState<T, R>>>,
}

impl<T, R> WindowCore<T, R> {
    pub(crate) fn new(func: WrappedFn<T, R>, limit: u32, window: Duration) -> Self {
        Self {
            func,
            limit,
            window,
            state: Arc::new(Mutex::new(WindowState {
                quota_remaining: limit,
                window_start: None,
                pending: None,
            })),
        }
    }

    pub(crate) fn cancel_pending(&self) {
        let mut state = self.state.lock();
        if let Some(pending) = state.pending.take() {
            pending.timer.abort();
        }
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    /// Effective quota right now, accounting for an elapsed window.
    pub(crate) fn quota_remaining(&self) -> u32 {
        let state = self.state.lock();
        match state.window_start {
            Some(start) if start.elapsed() >= self.window && state.pending.is_none() => self.limit,
            _ => state.quota_remaining,
        }
    }

    /// Idle means: nothing pending and the window (if any) has elapsed.
    /// Returns `None` when the state is locked by a concurrent caller.
    pub(crate) fn idle(&self, now: Instant) -> Option<bool> {
        let state = self.state.try_lock()?;
        Some(
            state.pending.is_none()
                && state
                    .window_start
                    .is_none_or(|start| now.duration_since(start) >= self.window),
        )
    }
}

impl<T, R> WindowCore<T, R>
where
    T: Send + 'static,
    R: Clone + Send + 'static,
{
    pub(crate) fn call(&self, args: T) -> CallHandle<R> {
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();
        let mut state = self.state.lock();

        // One deferred execution per window; later calls replace its
        // arguments, never its schedule.
        if let Some(pending) = state.pending.as_mut() {
            pending.args = args;
            pending.waiters.push(tx);
            trace!("throttle overflow call replaced pending arguments");
            return CallHandle::new(rx);
        }

        // Roll the window if it has fully elapsed.
        if let Some(start) = state.window_start {
            if now.duration_since(start) >= self.window {
                state.quota_remaining = self.limit;
                state.window_start = None;
            }
        }

        if state.quota_remaining > 0 {
            if state.window_start.is_none() {
                state.window_start = Some(now);
            }
            state.quota_remaining -= 1;
            let func = Arc::clone(&self.func);
            tokio::spawn(async move {
                let result = func(args).await;
                let _ = tx.send(result);
            });
            return CallHandle::new(rx);
        }

        // Quota exhausted inside a live window: schedule the single
        // deferred firing at the window's end.
        let fire_at = state.window_start.unwrap_or(now) + self.window;
        let timer_state = Arc::clone(&self.state);
        let func = Arc::clone(&self.func);
        let limit = self.limit;
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(fire_at.into()).await;
            fire_pending(timer_state, func, limit).await;
        });
        let mut waiters: Waiters<R> = SmallVec::new();
        waiters.push(tx);
        state.pending = Some(Pending {
            args,
            waiters,
            timer,
        });
        trace!("throttle call deferred to window end");
        CallHandle::new(rx)
    }

    pub(crate) async fn flush(&self) -> Option<R> {
        let (args, waiters) = {
            let mut state = self.state.lock();
            let pending = state.pending.take()?;
            pending.timer.abort();
            state.quota_remaining = self.limit - 1;
            state.window_start = Some(Instant::now());
            (pending.args, pending.waiters)
        };
        let result = (self.func)(args).await;
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
        Some(result)
    }
}

/// Fixed-window throttled wrapper around an asynchronous function
pub struct Throttler<T, R> {
    core: WindowCore<T, R>,
}

impl<T, R> Throttler<T, R>
where
    T: Send + 'static,
    R: Clone + Send + 'static,
{
    /// Create a throttler admitting `limit` immediate executions per
    /// `window`. Zero `limit` or zero `window` is a configuration error.
    pub fn new<F, Fut>(limit: u32, window: Duration, func: F) -> Result<Self>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        if limit == 0 {
            return Err(PacerError::InvalidQuota { limit });
        }
        if window.is_zero() {
            return Err(PacerError::InvalidWindow);
        }
        Ok(Self {
            core: WindowCore::new(wrap_fn(func), limit, window),
        })
    }

    pub fn call(&self, args: T) -> CallHandle<R> {
        self.core.call(args)
    }

    /// Fire the deferred invocation now. Returns `None` when nothing was
    /// pending.
    pub async fn flush(&self) -> Option<R> {
        self.core.flush().await
    }

    /// Discard the deferred invocation. Outstanding handles resolve with
    /// `[PACE-020]`.
    pub fn cancel_pending(&self) {
        self.core.cancel_pending();
    }

    pub fn has_pending(&self) -> bool {
        self.core.has_pending()
    }

    pub fn quota_remaining(&self) -> u32 {
        self.core.quota_remaining()
    }
}

impl<T, R> Drop for Throttler<T, R> {
    fn drop(&mut self) {
        self.core.cancel_pending();
    }
}
