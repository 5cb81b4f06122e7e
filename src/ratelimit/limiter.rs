//! Core sliding window limiter.

use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::decision::RateLimitDecision;
use super::history::EventHistory;
use crate::error::{Result, SlidegateError};

/// Per-key limiter admitting at most `max_requests` events in any trailing
/// window of length `window`.
///
/// Each key keeps the instants of its admitted events. Every operation first
/// evicts instants older than the window (an instant exactly `window` old
/// still counts) and drops the key entirely once nothing is left, so memory
/// tracks only recently active keys. There is no background sweeper.
///
/// Each public operation reads the clock once and uses that instant for
/// eviction, the decision, and the append.
///
/// The limiter is `Send + Sync`. State lives in a sharded map; the
/// check-and-append of [`record_if_allowed`](Self::record_if_allowed) runs
/// under the key's shard lock, so concurrent callers on one key never admit
/// more than `max_requests` events per window.
///
/// ```
/// use slidegate::ratelimit::SlidingWindowLimiter;
/// use std::time::Duration;
///
/// let limiter: SlidingWindowLimiter<String> =
///     SlidingWindowLimiter::new(Duration::from_secs(10), 1).unwrap();
///
/// assert!(limiter.record_if_allowed("user-1"));
/// assert!(!limiter.record_if_allowed("user-1"));
/// assert!(limiter.time_until_next_allowed("user-1") > Duration::ZERO);
/// assert!(limiter.can_send("user-2"));
/// ```
pub struct SlidingWindowLimiter<K = String, C = SystemClock>
where
    K: Eq + Hash,
{
    window: Duration,
    max_requests: usize,
    histories: DashMap<K, EventHistory>,
    clock: C,
}

impl<K> SlidingWindowLimiter<K, SystemClock>
where
    K: Eq + Hash,
{
    /// Create a limiter reading the system monotonic clock.
    pub fn new(window: Duration, max_requests: usize) -> Result<Self> {
        Self::with_clock(window, max_requests, SystemClock::new())
    }

    /// Create a limiter whose window is given in (fractional) seconds.
    pub fn from_secs_f64(window_secs: f64, max_requests: usize) -> Result<Self> {
        Self::new(window_from_secs(window_secs)?, max_requests)
    }
}

impl<K, C> SlidingWindowLimiter<K, C>
where
    K: Eq + Hash,
    C: Clock,
{
    /// Create a limiter reading time from `clock`.
    ///
    /// Fails when `window` is zero or `max_requests` is zero.
    pub fn with_clock(window: Duration, max_requests: usize, clock: C) -> Result<Self> {
        if window.is_zero() {
            return Err(SlidegateError::InvalidWindow(
                "window must be longer than zero".to_string(),
            ));
        }
        if max_requests == 0 {
            return Err(SlidegateError::InvalidMaxRequests);
        }

        Ok(Self {
            window,
            max_requests,
            histories: DashMap::new(),
            clock,
        })
    }

    /// Length of the trailing window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Events admitted per window.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Whether an event for `key` would be admitted right now.
    ///
    /// Unknown keys are always allowed. Only evicts; never records.
    pub fn can_send<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        self.check(key).is_allowed()
    }

    /// Record an event for `key` if it fits in the window.
    ///
    /// Returns `false`, leaving the history untouched, when the key is at
    /// capacity.
    pub fn record_if_allowed<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ToOwned<Owned = K> + ?Sized,
    {
        self.record(key).is_allowed()
    }

    /// How long until an event for `key` would be admitted.
    ///
    /// Zero when `key` has spare capacity. Otherwise the time until its oldest
    /// in-window event ages out, which is positive and at most the window.
    /// Only valid at the instant of the call.
    pub fn time_until_next_allowed<Q>(&self, key: &Q) -> Duration
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        self.check(key).retry_after()
    }

    /// Decide whether an event for `key` would be admitted, without recording.
    pub fn check<Q>(&self, key: &Q) -> RateLimitDecision
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let Some(mut history) = self.histories.get_mut(key) else {
            trace!(key = ?key, "No history, allowing");
            return RateLimitDecision::Allowed;
        };

        let now = self.clock.now();
        history.evict(now, self.window);

        if !history.is_empty() {
            let retry_after = history.retry_after(now, self.window, self.max_requests);
            trace!(
                key = ?key,
                in_window = history.len(),
                limit = self.max_requests,
                retry_after = ?retry_after,
                "Checked rate limit"
            );
            return if retry_after.is_zero() {
                RateLimitDecision::Allowed
            } else {
                RateLimitDecision::Rejected { retry_after }
            };
        }

        drop(history);
        self.reclaim(key);
        RateLimitDecision::Allowed
    }

    /// Record an event for `key` if it fits, reporting the decision.
    ///
    /// On rejection the decision carries the wait computed from the same
    /// instant as the admission check.
    pub fn record<Q>(&self, key: &Q) -> RateLimitDecision
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ToOwned<Owned = K> + ?Sized,
    {
        // The clock is read only while the key's shard lock is held, so
        // instants reach the history in the order they were taken.
        if let Some(mut history) = self.histories.get_mut(key) {
            return self.admit(key, &mut history);
        }

        // The key may have been inserted since the lookup above; the entry
        // lock settles it either way.
        match self.histories.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => self.admit(key, occupied.get_mut()),
            Entry::Vacant(vacant) => {
                vacant.insert(EventHistory::starting_at(self.clock.now()));
                trace!(key = ?key, "Recorded first event");
                RateLimitDecision::Allowed
            }
        }
    }

    /// Number of events for `key` inside the window right now.
    pub fn event_count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let Some(mut history) = self.histories.get_mut(key) else {
            return 0;
        };

        history.evict(self.clock.now(), self.window);
        let count = history.len();

        drop(history);
        if count == 0 {
            self.reclaim(key);
        }
        count
    }

    /// Events `key` may still record in the current window.
    pub fn remaining<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        self.max_requests.saturating_sub(self.event_count(key))
    }

    /// Number of keys currently tracked.
    pub fn active_keys(&self) -> usize {
        self.histories.len()
    }

    /// Evict stale events across every key and drop keys left empty.
    ///
    /// Applies the same rule as per-key access. Returns the number of keys
    /// dropped. Useful for callers with many one-off keys that are never
    /// queried again.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;

        self.histories.retain(|_, history| {
            history.evict(now, self.window);
            if history.is_empty() {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            debug!(
                removed = removed,
                remaining = self.histories.len(),
                "Purged expired keys"
            );
        }
        removed
    }

    /// Forget `key`. Returns whether it was tracked.
    pub fn reset<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.histories.remove(key).is_some()
    }

    /// Forget every key.
    pub fn clear(&self) {
        self.histories.clear();
    }

    fn admit<Q>(&self, key: &Q, history: &mut EventHistory) -> RateLimitDecision
    where
        Q: Debug + ?Sized,
    {
        let now = self.clock.now();
        history.evict(now, self.window);

        if history.has_capacity(self.max_requests) {
            history.record(now);
            trace!(
                key = ?key,
                in_window = history.len(),
                limit = self.max_requests,
                "Recorded event"
            );
            return RateLimitDecision::Allowed;
        }

        let retry_after = history.retry_after(now, self.window, self.max_requests);
        debug!(
            key = ?key,
            limit = self.max_requests,
            retry_after = ?retry_after,
            "Rate limit exceeded"
        );
        RateLimitDecision::Rejected { retry_after }
    }

    fn reclaim<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        // Another caller may have recorded in between; only drop a still-empty
        // history.
        if self
            .histories
            .remove_if(key, |_, history| history.is_empty())
            .is_some()
        {
            debug!(key = ?key, "Reclaimed idle key");
        }
    }
}

/// Convert a window given in seconds into a `Duration`.
///
/// Rejects non-finite, non-positive, sub-nanosecond and out-of-range values.
pub(crate) fn window_from_secs(window_secs: f64) -> Result<Duration> {
    if !window_secs.is_finite() || window_secs <= 0.0 {
        return Err(SlidegateError::InvalidWindow(format!(
            "window must be a positive number of seconds, got {}",
            window_secs
        )));
    }

    let window = Duration::try_from_secs_f64(window_secs)
        .map_err(|e| SlidegateError::InvalidWindow(format!("{}: {}", window_secs, e)))?;

    if window.is_zero() {
        return Err(SlidegateError::InvalidWindow(format!(
            "window of {} seconds rounds down to zero",
            window_secs
        )));
    }
    Ok(window)
}
