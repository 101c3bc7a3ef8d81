//! Error types for the virtual clock and timer scheduler.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced synchronously by clock and timer operations.
///
/// Every failing operation leaves the clock and registry unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClockError {
    /// Virtual time never decreases; `set_now_ns` with an earlier instant fails.
    #[error("cannot move virtual time backwards: requested {requested_ns}ns, current {now_ns}ns")]
    OutOfOrderTime { requested_ns: u64, now_ns: u64 },

    /// A due time, period, or advance delta outside `[0, MAX_TIMER_DURATION]`.
    #[error("{what} of {requested:?} exceeds the maximum supported duration")]
    InvalidDuration {
        what: &'static str,
        requested: Duration,
    },

    /// The requested mutation would overflow the clock's nanosecond counter.
    #[error("virtual clock arithmetic overflow")]
    ClockOverflow,
}
