//! # tidvakt-core
//!
//! Deterministic virtual clock and cooperative timer scheduler.
//! Built to make time-dependent logic (timeouts, retries, periodic polling)
//! testable without wall-clock delays and with fully reproducible results.
//!
//! ### Expectations (Production):
//! - No background threads; every callback runs on the caller's stack
//! - Deterministic fire order for any sequence of clock mutations
//! - Safe reentrancy: callbacks may advance time and create/cancel timers
//!
//! ### Key Submodules:
//! - `clock`: `VirtualClock` with explicit set/advance and optional auto-advance
//! - `registry`: generational slab of pending timer registrations
//! - `wake`: the gate-protected drain loop that fires due waiters
//! - `handle`: `TimerHandle` lifecycle (change, dispose, drop-as-dispose)

pub mod clock;
pub mod error;
pub mod handle;

mod registry;
mod wake;

pub mod prelude {
    pub use crate::clock::{VirtualClock, MAX_TIMER_DURATION, TICK_FREQUENCY};
    pub use crate::error::ClockError;
    pub use crate::handle::TimerHandle;
}

pub use clock::{VirtualClock, MAX_TIMER_DURATION, TICK_FREQUENCY};
pub use error::ClockError;
pub use handle::TimerHandle;
