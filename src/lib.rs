//! Pacer - flow-control primitives for async tasks
//!
//! Three independent building blocks, composed only by the caller:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  executor    Bounded-concurrency batch execution             │
//! │              (input-order results, drain-on-failure)         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  limiter/    Temporal rate limiting                          │
//! │              (debounce, fixed-window throttle, keyed)        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  retry       Bounded sequential retry with backoff           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`executor`] | Run operation batches under a concurrency cap, results in input order |
//! | [`limiter`] | Debounce and fixed-window/keyed throttling of repeated calls |
//! | [`retry`] | Bounded, strictly-sequential retry with configurable backoff |
//! | [`recover`] | Ordered failure-handler chains (handled / declined dispatch) |
//! | [`error`] | Error types with error codes and fix suggestions |
//!
//! Operations are zero-argument callables producing `anyhow`-fallible
//! futures; the crate only observes their completion and outcome. No
//! component spawns unbounded background work: the executor caps its
//! in-flight set, each limiter instance keeps at most one pending timer per
//! key, and retry attempts never overlap.

pub mod error;
pub mod executor;
pub mod limiter;
pub mod recover;
pub mod retry;

// Error types
pub use error::{FixSuggestion, PacerError, Result};

// Bounded-concurrency execution
pub use executor::{BoundedExecutor, Concurrency};

// Temporal rate limiting
pub use limiter::{CallHandle, Debouncer, KeyedThrottler, Throttler};

// Failure-handler chains
pub use recover::{HandlerChain, Recovery};

// Retry
pub use retry::{RetryConfig, RetryPolicy};
