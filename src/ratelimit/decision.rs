//! Admission decisions.

use std::fmt;
use std::time::Duration;

/// Outcome of checking or recording an event for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The event fits in the current window.
    Allowed,
    /// The key is at capacity.
    Rejected {
        /// Time until the oldest in-window event ages out, as of the decision.
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    /// Whether the event was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed)
    }

    /// How long to wait before retrying; zero when allowed.
    pub fn retry_after(&self) -> Duration {
        match self {
            RateLimitDecision::Allowed => Duration::ZERO,
            RateLimitDecision::Rejected { retry_after } => *retry_after,
        }
    }
}

impl fmt::Display for RateLimitDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitDecision::Allowed => write!(f, "allowed"),
            RateLimitDecision::Rejected { retry_after } => {
                write!(f, "rejected (retry in {:.1}s)", retry_after.as_secs_f64())
            }
        }
    }
}
