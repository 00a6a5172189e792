//! Pacer Error Types with Error Codes
//!
//! Error code ranges:
//! - PACE-000-009: Configuration errors (rejected before any work starts)
//! - PACE-010-019: Operation errors (failures attributed to caller-supplied work)
//! - PACE-020-029: Pending-invocation errors (deferred firings that never happen)

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PacerError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum PacerError {
    // ═══════════════════════════════════════════
    // CONFIGURATION ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[PACE-001] Invalid concurrency limit: {limit} (must be > 0)")]
    InvalidConcurrencyLimit { limit: usize },

    #[error("[PACE-002] Invalid attempt count: {attempts} (must be >= 1)")]
    InvalidAttempts { attempts: u32 },

    #[error("[PACE-003] Invalid throttle quota: {limit} (must be > 0)")]
    InvalidQuota { limit: u32 },

    #[error("[PACE-004] Invalid window length: must be non-zero")]
    InvalidWindow,

    // ═══════════════════════════════════════════
    // OPERATION ERRORS (010-019)
    // ═══════════════════════════════════════════
    /// The first failing operation of a run, by input index. In-flight
    /// operations were drained before this was surfaced.
    #[error("[PACE-010] Operation {index} failed: {cause}")]
    OperationFailed { index: usize, cause: anyhow::Error },

    #[error("[PACE-011] Operation panicked: {details}")]
    OperationPanicked { details: String },

    #[error("[PACE-012] Run cancelled after {admitted} of {total} operations were admitted")]
    Cancelled { admitted: usize, total: usize },

    // ═══════════════════════════════════════════
    // PENDING-INVOCATION ERRORS (020-029)
    // ═══════════════════════════════════════════
    /// The deferred invocation this handle was waiting on was cancelled
    /// (explicitly, or because its limiter was dropped).
    #[error("[PACE-020] Pending invocation cancelled before firing")]
    PendingCancelled,
}

impl FixSuggestion for PacerError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            PacerError::InvalidConcurrencyLimit { .. } => {
                Some("Use Concurrency::Bounded(n) with n >= 1, or Concurrency::Unbounded")
            }
            PacerError::InvalidAttempts { .. } => {
                Some("Set attempts >= 1 (attempts = 1 means a single try, no retrying)")
            }
            PacerError::InvalidQuota { .. } => Some("Set the per-window limit to at least 1"),
            PacerError::InvalidWindow => Some("Use a window length greater than zero"),
            PacerError::OperationFailed { .. }
            | PacerError::OperationPanicked { .. }
            | PacerError::Cancelled { .. }
            | PacerError::PendingCancelled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_carry_codes_and_suggestions() {
        let err = PacerError::InvalidConcurrencyLimit { limit: 0 };
        assert!(err.to_string().contains("[PACE-001]"));
        assert!(err.fix_suggestion().is_some());

        let err = PacerError::InvalidAttempts { attempts: 0 };
        assert!(err.to_string().contains("[PACE-002]"));
    }

    #[test]
    fn operation_failed_reports_index_and_cause() {
        let err = PacerError::OperationFailed {
            index: 3,
            cause: anyhow::anyhow!("boom"),
        };
        let msg = err.to_string();
        assert!(msg.contains("Operation 3"));
        assert!(msg.contains("boom"));
        assert!(err.fix_suggestion().is_none());
    }
}
