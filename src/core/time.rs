//! Explicit Time
//!
//! The core never samples a clock. Every state-dependent call receives
//! `now` from its caller; these helpers only do the window arithmetic.

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// One minute in seconds.
pub const MINUTE: u64 = 60;

/// One hour in seconds.
pub const HOUR: u64 = 60 * MINUTE;

/// One day in seconds.
pub const DAY: u64 = 24 * HOUR;

/// One week in seconds.
pub const WEEK: u64 = 7 * DAY;

/// A 30-day month in seconds.
pub const MONTH: u64 = 30 * DAY;

/// A 365-day year in seconds.
pub const YEAR: u64 = 365 * DAY;

/// End of a window starting at `start`, or `None` on overflow.
#[inline]
pub fn window_end(start: Timestamp, length: u64) -> Option<Timestamp> {
    start.checked_add(length)
}

/// Seconds left until `deadline`, saturating at zero once it has passed.
#[inline]
pub fn seconds_until(now: Timestamp, deadline: Timestamp) -> u64 {
    deadline.saturating_sub(now)
}

/// Human name for the common timeframe presets.
pub fn timeframe_name(seconds: u64) -> Option<&'static str> {
    match seconds {
        DAY => Some("day"),
        WEEK => Some("week"),
        MONTH => Some("month"),
        YEAR => Some("year"),
        _ => None,
    }
}
