//! Per-key event history.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Smallest wait reported for a key that is still at capacity.
///
/// An entry exactly `window` old still counts, so a key sitting on that
/// boundary is blocked with nothing left to wait for. Reporting one tick keeps
/// the wait positive and the retry strictly after the boundary.
const BOUNDARY_TICK: Duration = Duration::from_nanos(1);

/// Ordered instants of the events admitted for one key, oldest first.
///
/// Instants are kept non-decreasing, so the oldest event is always at the
/// front.
#[derive(Debug, Clone, Default)]
pub struct EventHistory {
    events: VecDeque<Instant>,
}

impl EventHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a history holding a single event at `at`.
    pub fn starting_at(at: Instant) -> Self {
        let mut history = Self::new();
        history.record(at);
        history
    }

    /// Append an event at `at`.
    ///
    /// An instant earlier than the newest one held is recorded as the newest
    /// one, keeping the history ordered so eviction from the front stays
    /// exact.
    pub fn record(&mut self, at: Instant) {
        let at = match self.events.back() {
            Some(&newest) if newest > at => newest,
            _ => at,
        };
        self.events.push_back(at);
    }

    /// Drop every event older than `window` as of `now`.
    ///
    /// An event exactly `window` old is kept. Returns the number of events
    /// removed.
    pub fn evict(&mut self, now: Instant, window: Duration) -> usize {
        let mut evicted = 0;
        while let Some(&oldest) = self.events.front() {
            if now.saturating_duration_since(oldest) <= window {
                break;
            }
            self.events.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Number of events held.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are held.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The oldest event held.
    pub fn oldest(&self) -> Option<Instant> {
        self.events.front().copied()
    }

    /// Iterate over the held instants, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Instant> + '_ {
        self.events.iter()
    }

    /// Whether another event fits under `max_requests`.
    pub fn has_capacity(&self, max_requests: usize) -> bool {
        self.events.len() < max_requests
    }

    /// How long until another event fits, as of `now`.
    ///
    /// Expects stale events to have been evicted already. The result is
    /// zero when there is spare capacity and otherwise lies in
    /// `(0, window]`, even if `now` is earlier than the oldest event.
    pub fn retry_after(&self, now: Instant, window: Duration, max_requests: usize) -> Duration {
        if self.has_capacity(max_requests) {
            return Duration::ZERO;
        }

        match self.oldest() {
            None => Duration::ZERO,
            Some(oldest) => {
                let elapsed = now.saturating_duration_since(oldest);
                window.saturating_sub(elapsed).max(BOUNDARY_TICK)
            }
        }
    }
}
