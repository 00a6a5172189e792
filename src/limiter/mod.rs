//! Temporal rate limiting
//!
//! This module provides:
//! - [`debounce`]: trailing coalescing (fire once the calls go quiet)
//! - [`throttle`]: fixed-window quota with one deferred overflow execution
//! - [`keyed`]: the fixed-window policy partitioned by a caller-supplied key
//!
//! Every call returns a [`CallHandle`] immediately; the caller is never
//! blocked, even when execution is deferred to a timer. A handle resolves
//! with the result of the invocation that actually fired (for debounce that
//! may be a later, coalesced call's invocation), or with `[PACE-020]` when
//! the pending work was cancelled.

pub mod debounce;
pub mod keyed;
pub mod throttle;

pub use debounce::Debouncer;
pub use keyed::KeyedThrottler;
pub use throttle::Throttler;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use smallvec::SmallVec;
use tokio::sync::oneshot;

use crate::error::{PacerError, Result};

/// Senders waiting on one deferred firing. Almost always one or two.
pub(crate) type Waiters<R> = SmallVec<[oneshot::Sender<R>; 4]>;

/// The wrapped callable, boxed once at construction.
pub(crate) type WrappedFn<T, R> = Arc<dyn Fn(T) -> BoxFuture<'static, R> + Send + Sync>;

pub(crate) fn wrap_fn<T, R, F, Fut>(func: F) -> WrappedFn<T, R>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    Arc::new(move |args| Box::pin(func(args)))
}

/// Future resolving to the result of a (possibly deferred) limiter firing
#[derive(Debug)]
pub struct CallHandle<R> {
    rx: oneshot::Receiver<R>,
}

impl<R> CallHandle<R> {
    pub(crate) fn new(rx: oneshot::Receiver<R>) -> Self {
        Self { rx }
    }
}

impl<R> Future for CallHandle<R> {
    type Output = Result<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(Ok(value)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(PacerError::PendingCancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
