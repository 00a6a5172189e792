//! Keyed fixed-window throttle
//!
//! The fixed-window policy of [`Throttler`](super::Throttler), partitioned
//! by a caller-supplied key function. Each key owns an independent window,
//! quota and pending slot; two keys never interact.
//!
//! The key function must be deterministic: logically-equal argument sets
//! must map to equal keys. Deriving keys from unstable serializations of
//! argument objects is the caller's bug, not this module's.
//!
//! Idle key state (window elapsed, nothing pending) is evicted by an
//! opportunistic sweep every 64 calls, or explicitly via
//! [`KeyedThrottler::evict_idle`], so long-lived limiters with many distinct
//! keys stay bounded.

use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

use super::throttle::WindowCore;
use super::{wrap_fn, CallHandle, WrappedFn};
use crate::error::{PacerError, Result};

/// Calls between opportunistic idle-key sweeps
const SWEEP_INTERVAL: u64 = 64;

/// Per-key fixed-window throttled wrapper around an asynchronous function
pub struct KeyedThrottler<T, K: Eq + Hash, R> {
    func: WrappedFn<T, R>,
    key_fn: Arc<dyn Fn(&T) -> K + Send + Sync>,
    limit: u32,
    window: Duration,
    states: DashMap<K, Arc<WindowCore<T, R>>>,
    calls: AtomicU64,
}

impl<T, K, R> KeyedThrottler<T, K, R>
where
    T: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    R: Clone + Send + 'static,
{
    /// Create a keyed throttler. `key_fn` maps each call's arguments to its
    /// partition; `limit`/`window` apply per key.
    pub fn new<KF, F, Fut>(limit: u32, window: Duration, key_fn: KF, func: F) -> Result<Self>
    where
        KF: Fn(&T) -> K + Send + Sync + 'static,
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
            func: wrap_fn(func),
            key_fn: Arc::new(key_fn),
            limit,
            window,
            states: DashMap::new(),
            calls: AtomicU64::new(0),
        })
    }

    pub fn call(&self, args: T) -> CallHandle<R> {
        let calls = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if calls % SWEEP_INTERVAL == 0 {
            self.evict_idle();
        }

        let key = (self.key_fn)(&args);
        self.core_for(key).call(args)
    }

    /// Get or create the window core for a key (atomic via DashMap entry API)
    fn core_for(&self, key: K) -> Arc<WindowCore<T, R>> {
        match self.states.entry(key) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let core = Arc::new(WindowCore::new(
                    Arc::clone(&self.func),
                    self.limit,
                    self.window,
                ));
                entry.insert(Arc::clone(&core));
                core
            }
        }
    }

    /// Fire the deferred invocation for `key` now, if any.
    pub async fn flush(&self, key: &K) -> Option<R> {
        let core = Arc::clone(self.states.get(key)?.value());
        core.flush().await
    }

    /// Discard the deferred invocation for `key`, if any. Its handles
    /// resolve with `[PACE-020]`.
    pub fn cancel_pending(&self, key: &K) {
        if let Some(core) = self.states.get(key) {
            core.cancel_pending();
        }
    }

    pub fn has_pending(&self, key: &K) -> bool {
        self.states
            .get(key)
            .is_some_and(|core| core.has_pending())
    }

    /// Effective quota for `key` right now; a key with no state has the
    /// full quota.
    pub fn quota_remaining(&self, key: &K) -> u32 {
        self.states
            .get(key)
            .map_or(self.limit, |core| core.quota_remaining())
    }

    /// Number of keys currently holding state
    pub fn tracked_keys(&self) -> usize {
        self.states.len()
    }

    /// Drop state for every key whose window has elapsed with nothing
    /// pending. Keys whose state is momentarily locked are kept.
    pub fn evict_idle(&self) {
        let now = Instant::now();
        let before = self.states.len();
        self.states
            .retain(|_, core| !core.idle(now).unwrap_or(false));
        let evicted = before - self.states.len();
        if evicted > 0 {
            trace!(evicted, "idle throttle keys evicted");
        }
    }
}

impl<T, K: Eq + Hash, R> Drop for KeyedThrottler<T, K, R> {
    fn drop(&mut self) {
        for entry in self.states.iter() {
            entry.value().cancel_pending();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Instant;

    const WINDOW: Duration = Duration::from_millis(120);

    /// Throttle on the string key, count invocations per call argument.
    fn keyed(
        limit: u32,
        invocations: Arc<AtomicU32>,
    ) -> KeyedThrottler<(String, u32), String, u32> {
        KeyedThrottler::new(
            limit,
            WINDOW,
            |args: &(String, u32)| args.0.clone(),
            move |args: (String, u32)| {
                let invocations = Arc::clone(&invocations);
                async move {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    args.1 * 10
                }
            },
        )
        .unwrap()
    }

    #[test]
    fn invalid_configs_rejected() {
        let zero_quota: Result<KeyedThrottler<u32, u32, ()>> =
            KeyedThrottler::new(0, WINDOW, |a: &u32| *a, |_| async {});
        assert!(matches!(zero_quota, Err(PacerError::InvalidQuota { .. })));

        let zero_window: Result<KeyedThrottler<u32, u32, ()>> =
            KeyedThrottler::new(1, Duration::ZERO, |a: &u32| *a, |_| async {});
        assert!(matches!(zero_window, Err(PacerError::InvalidWindow)));
    }

    #[tokio::test]
    async fn keys_have_independent_quotas() {
        let invocations = Arc::new(AtomicU32::new(0));
        let throttler = keyed(1, Arc::clone(&invocations));

        // Exhaust key "a".
        let _ = throttler.call(("a".into(), 1)).await.unwrap();
        assert_eq!(throttler.quota_remaining(&"a".to_string()), 0);

        // Key "b" still executes immediately.
        let start = Instant::now();
        let result = throttler.call(("b".into(), 2)).await.unwrap();
        assert_eq!(result, 20);
        assert!(start.elapsed() < WINDOW / 2);
        assert_eq!(throttler.quota_remaining(&"b".to_string()), 0);
    }

    #[tokio::test]
    async fn overflow_defers_per_key() {
        let invocations = Arc::new(AtomicU32::new(0));
        let throttler = keyed(1, Arc::clone(&invocations));

        let _ = throttler.call(("a".into(), 1)).await.unwrap();
        let deferred_a = throttler.call(("a".into(), 3));
        assert!(throttler.has_pending(&"a".to_string()));
        assert!(!throttler.has_pending(&"b".to_string()));

        // A deferred "a" does not delay an immediate "b".
        let start = Instant::now();
        let b = throttler.call(("b".into(), 5)).await.unwrap();
        assert_eq!(b, 50);
        assert!(start.elapsed() < WINDOW / 2);

        assert_eq!(deferred_a.await.unwrap(), 30);
        assert_eq!(invocations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn key_function_partitions_arguments() {
        let invocations = Arc::new(AtomicU32::new(0));
        let throttler: KeyedThrottler<u32, u32, u32> = KeyedThrottler::new(
            1,
            WINDOW,
            |args: &u32| args % 2,
            {
                let invocations = Arc::clone(&invocations);
                move |args: u32| {
                    let invocations = Arc::clone(&invocations);
                    async move {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        args
                    }
                }
            },
        )
        .unwrap();

        // 1 and 2 land in different partitions: both immediate.
        let odd = throttler.call(1).await.unwrap();
        let even = throttler.call(2).await.unwrap();
        assert_eq!((odd, even), (1, 2));
        assert_eq!(throttler.tracked_keys(), 2);
    }

    #[tokio::test]
    async fn idle_keys_are_evicted() {
        let invocations = Arc::new(AtomicU32::new(0));
        let throttler = keyed(1, Arc::clone(&invocations));

        let _ = throttler.call(("a".into(), 1)).await.unwrap();
        let _ = throttler.call(("b".into(), 2)).await.unwrap();
        assert_eq!(throttler.tracked_keys(), 2);

        // Still inside the window: nothing is idle yet.
        throttler.evict_idle();
        assert_eq!(throttler.tracked_keys(), 2);

        tokio::time::sleep(WINDOW + Duration::from_millis(20)).await;
        throttler.evict_idle();
        assert_eq!(throttler.tracked_keys(), 0);

        // Fresh state after eviction behaves like a fresh key.
        assert_eq!(throttler.quota_remaining(&"a".to_string()), 1);
    }

    #[tokio::test]
    async fn keys_with_pending_work_are_not_evicted() {
        let invocations = Arc::new(AtomicU32::new(0));
        let throttler = keyed(1, Arc::clone(&invocations));

        let _ = throttler.call(("a".into(), 1)).await.unwrap();
        let deferred = throttler.call(("a".into(), 2));

        throttler.evict_idle();
        assert_eq!(throttler.tracked_keys(), 1);

        assert_eq!(deferred.await.unwrap(), 20);
    }

    #[tokio::test]
    async fn flush_and_cancel_are_per_key() {
        let invocations = Arc::new(AtomicU32::new(0));
        let throttler = keyed(1, Arc::clone(&invocations));

        let _ = throttler.call(("a".into(), 1)).await.unwrap();
        let _ = throttler.call(("b".into(), 2)).await.unwrap();
        let deferred_a = throttler.call(("a".into(), 3));
        let deferred_b = throttler.call(("b".into(), 4));

        assert_eq!(throttler.flush(&"a".to_string()).await, Some(30));
        assert_eq!(deferred_a.await.unwrap(), 30);

        throttler.cancel_pending(&"b".to_string());
        assert!(deferred_b.await.is_err());
    }
}
