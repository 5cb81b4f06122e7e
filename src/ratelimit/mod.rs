//! Rate limiting logic and state management.

mod clock;
mod decision;
mod history;
mod limiter;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::RateLimitDecision;
pub use history::EventHistory;
pub use limiter::SlidingWindowLimiter;

pub(crate) use limiter::window_from_secs;
