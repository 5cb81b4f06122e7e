//! Slidegate - In-Process Sliding Window Rate Limiting
//!
//! This crate implements a per-key sliding window rate limiter: each key may
//! record at most `max_requests` events in any trailing window. Histories are
//! trimmed lazily on access and keys are dropped once their window empties,
//! so memory follows the set of recently active keys.

pub mod config;
pub mod error;
pub mod ratelimit;

pub use config::{LimiterConfig, SlidegateConfig};
pub use error::{Result, SlidegateError};
pub use ratelimit::{RateLimitDecision, SlidingWindowLimiter};
