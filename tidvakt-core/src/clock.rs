//! ## tidvakt-core::clock
//! **Virtual clock with explicit and automatic advancement**
//!
//! A `VirtualClock` owns the current virtual time in nanoseconds and the
//! registry of pending waiters. Time only moves when a caller moves it:
//! `advance`, `set_now_ns`, or reads with a non-zero auto-advance amount.
//! Every mutation synchronously drains due timers on the caller's stack.
//!
//! ### Expectations:
//! - `now_ns` is strictly non-decreasing
//! - Cheap to clone; all clones share one registry and one wake gate
//! - Nanosecond resolution internally, fixed 10 MHz tick interop externally

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::ClockError;
use crate::handle::TimerHandle;
use crate::registry::{Callback, Waiter, WaiterRegistry};
use crate::wake::wake_waiters;

/// Frequency of the fixed-rate tick representation: 10 MHz, i.e. one tick
/// per 100ns. Exposed for interoperability with monotonic-timestamp
/// consumers.
pub const TICK_FREQUENCY: u64 = 10_000_000;

const NS_PER_TICK: u64 = 1_000_000_000 / TICK_FREQUENCY;

/// Upper bound for due times, periods, advance deltas, and the auto-advance
/// amount. Roughly 136 years; large enough for any test scenario while
/// keeping `now + duration` far from overflowing the nanosecond counter.
pub const MAX_TIMER_DURATION: Duration = Duration::from_secs(u32::MAX as u64);

/// Deterministic in-memory clock plus cooperative timer scheduler.
///
/// Cloning yields another handle to the same clock: all clones observe the
/// same time and the same set of timers.
#[derive(Clone)]
pub struct VirtualClock {
    shared: Arc<ClockShared>,
}

/// State shared between the clock, its timer handles, and the wake loop.
pub(crate) struct ClockShared {
    pub state: Mutex<ClockState>,
    /// Non-reentrant gate for the wake loop. See `wake::wake_waiters`.
    pub wake_gate: AtomicBool,
}

pub(crate) struct ClockState {
    pub now_ns: u64,
    pub auto_advance_ns: u64,
    pub local_time_zone: Option<String>,
    pub registry: WaiterRegistry,
}

impl VirtualClock {
    /// Creates a clock starting at `start_ns` nanoseconds of virtual time,
    /// with auto-advance disabled.
    pub fn new(start_ns: u64) -> Self {
        Self {
            shared: Arc::new(ClockShared {
                state: Mutex::new(ClockState {
                    now_ns: start_ns,
                    auto_advance_ns: 0,
                    local_time_zone: None,
                    registry: WaiterRegistry::new(),
                }),
                wake_gate: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the current virtual time in nanoseconds, then adds the
    /// auto-advance amount. When the amount is non-zero the read itself
    /// moves time, so due timers fire synchronously before this returns.
    pub fn now_ns(&self) -> u64 {
        let (current, advanced) = {
            let mut state = self.shared.state.lock();
            let current = state.now_ns;
            let advanced = state.auto_advance_ns > 0;
            if advanced {
                // Saturating: a clock pinned at the far future beats a panic
                // deep inside an unrelated read.
                state.now_ns = state.now_ns.saturating_add(state.auto_advance_ns);
            }
            (current, advanced)
        };
        if advanced {
            wake_waiters(&self.shared);
        }
        current
    }

    /// Sets the current virtual time. Fails with
    /// [`ClockError::OutOfOrderTime`] if `value_ns` is earlier than the
    /// current time, leaving state unchanged. Due timers fire synchronously
    /// before this returns.
    pub fn set_now_ns(&self, value_ns: u64) -> Result<(), ClockError> {
        {
            let mut state = self.shared.state.lock();
            if value_ns < state.now_ns {
                return Err(ClockError::OutOfOrderTime {
                    requested_ns: value_ns,
                    now_ns: state.now_ns,
                });
            }
            state.now_ns = value_ns;
        }
        wake_waiters(&self.shared);
        Ok(())
    }

    /// Advances the clock by `delta`. Pending callbacks run synchronously
    /// inside this call, on the caller's stack.
    pub fn advance(&self, delta: Duration) -> Result<(), ClockError> {
        if delta > MAX_TIMER_DURATION {
            return Err(ClockError::InvalidDuration {
                what: "advance delta",
                requested: delta,
            });
        }
        {
            let mut state = self.shared.state.lock();
            state.now_ns = state
                .now_ns
                .checked_add(delta.as_nanos() as u64)
                .ok_or(ClockError::ClockOverflow)?;
        }
        wake_waiters(&self.shared);
        Ok(())
    }

    /// Current time as fixed-frequency ticks (see [`TICK_FREQUENCY`]).
    /// Reads through [`VirtualClock::now_ns`], so auto-advance applies.
    pub fn monotonic_ticks(&self) -> u64 {
        self.now_ns() / NS_PER_TICK
    }

    /// Tick rate of [`VirtualClock::monotonic_ticks`], a fixed constant.
    pub fn frequency(&self) -> u64 {
        TICK_FREQUENCY
    }

    /// Sets the amount added to the clock on every read. Zero disables
    /// auto-advance.
    pub fn set_auto_advance(&self, amount: Duration) -> Result<(), ClockError> {
        if amount > MAX_TIMER_DURATION {
            return Err(ClockError::InvalidDuration {
                what: "auto-advance amount",
                requested: amount,
            });
        }
        self.shared.state.lock().auto_advance_ns = amount.as_nanos() as u64;
        Ok(())
    }

    pub fn auto_advance(&self) -> Duration {
        Duration::from_nanos(self.shared.state.lock().auto_advance_ns)
    }

    /// Opaque pass-through storage for a local time zone identifier. The
    /// scheduler itself never interprets it.
    pub fn set_local_time_zone(&self, zone: impl Into<String>) {
        self.shared.state.lock().local_time_zone = Some(zone.into());
    }

    pub fn local_time_zone(&self) -> Option<String> {
        self.shared.state.lock().local_time_zone.clone()
    }

    /// Number of timers currently registered. Diagnostic only.
    pub fn timer_count(&self) -> usize {
        self.shared.state.lock().registry.len()
    }

    /// Registers a timer. `due` is the delay until the first fire (`None`
    /// never fires, zero fires synchronously before this returns); `period`
    /// is the interval between subsequent fires (`None` or zero is
    /// one-shot). The callback runs on whichever stack moves time past the
    /// wakeup instant, and may itself advance the clock or create, change,
    /// and dispose timers.
    pub fn create_timer<F>(
        &self,
        callback: F,
        due: Option<Duration>,
        period: Option<Duration>,
    ) -> Result<TimerHandle, ClockError>
    where
        F: FnMut() + Send + 'static,
    {
        let due_ns = duration_to_ns("due time", due)?;
        let period_ns = duration_to_ns("period", period)?;
        let callback: Callback = Arc::new(Mutex::new(Box::new(callback)));
        let id = {
            let mut state = self.shared.state.lock();
            let now = state.now_ns;
            let wakeup_ns = match due_ns {
                None => None,
                Some(d) => Some(now.checked_add(d).ok_or(ClockError::ClockOverflow)?),
            };
            state.registry.insert(Waiter {
                callback: Arc::clone(&callback),
                wakeup_ns,
                period_ns,
                scheduled_ns: now,
            })
        };
        let handle = TimerHandle::new(Arc::clone(&self.shared), id, callback);
        wake_waiters(&self.shared);
        Ok(handle)
    }
}

/// Validates a user-supplied duration and converts it to nanoseconds.
/// `None` is the "never" sentinel and passes through.
pub(crate) fn duration_to_ns(
    what: &'static str,
    value: Option<Duration>,
) -> Result<Option<u64>, ClockError> {
    match value {
        None => Ok(None),
        Some(d) if d > MAX_TIMER_DURATION => Err(ClockError::InvalidDuration {
            what,
            requested: d,
        }),
        Some(d) => Ok(Some(d.as_nanos() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_clock_initial_value() {
        let clock = VirtualClock::new(100);
        assert_eq!(clock.now_ns(), 100);
    }

    #[test]
    fn test_clock_advance_accumulates() {
        let clock = VirtualClock::new(0);
        clock.advance(Duration::from_nanos(500)).unwrap();
        assert_eq!(clock.now_ns(), 500);
        clock.advance(Duration::from_nanos(250)).unwrap();
        assert_eq!(clock.now_ns(), 750);
    }

    #[test]
    fn test_set_now_backwards_fails_and_leaves_state() {
        let clock = VirtualClock::new(1_000);
        let err = clock.set_now_ns(999).unwrap_err();
        assert_eq!(
            err,
            ClockError::OutOfOrderTime {
                requested_ns: 999,
                now_ns: 1_000,
            }
        );
        assert_eq!(clock.now_ns(), 1_000);
        clock.set_now_ns(1_000).unwrap(); // equal is allowed
    }

    #[test]
    fn test_auto_advance_applies_after_read() {
        let clock = VirtualClock::new(0);
        clock.set_auto_advance(Duration::from_nanos(10)).unwrap();
        assert_eq!(clock.now_ns(), 0);
        assert_eq!(clock.now_ns(), 10);
        assert_eq!(clock.now_ns(), 20);
        clock.set_auto_advance(Duration::ZERO).unwrap();
        assert_eq!(clock.now_ns(), 30);
        assert_eq!(clock.now_ns(), 30);
    }

    #[test]
    fn test_monotonic_ticks_at_fixed_frequency() {
        let clock = VirtualClock::new(0);
        clock.advance(Duration::from_secs(1)).unwrap();
        assert_eq!(clock.monotonic_ticks(), TICK_FREQUENCY);
        assert_eq!(clock.frequency(), TICK_FREQUENCY);
    }

    #[test]
    fn test_advance_overflow_is_rejected() {
        let clock = VirtualClock::new(u64::MAX - 10);
        let err = clock.advance(Duration::from_nanos(100)).unwrap_err();
        assert_eq!(err, ClockError::ClockOverflow);
        assert_eq!(clock.now_ns(), u64::MAX - 10);
    }

    #[test]
    fn test_oversized_delta_is_rejected() {
        let clock = VirtualClock::new(0);
        let too_big = MAX_TIMER_DURATION + Duration::from_nanos(1);
        assert!(matches!(
            clock.advance(too_big),
            Err(ClockError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_local_time_zone_pass_through() {
        let clock = VirtualClock::new(0);
        assert_eq!(clock.local_time_zone(), None);
        clock.set_local_time_zone("Europe/Stockholm");
        assert_eq!(clock.local_time_zone().as_deref(), Some("Europe/Stockholm"));
    }

    #[test]
    fn test_clones_share_time() {
        let clock = VirtualClock::new(0);
        let view = clock.clone();
        clock.advance(Duration::from_nanos(42)).unwrap();
        assert_eq!(view.now_ns(), 42);
    }

    proptest! {
        /// With zero auto-advance, `now` equals the start plus the sum of
        /// all advance deltas.
        #[test]
        fn prop_advance_sums(start in 0u64..1_000_000, deltas in proptest::collection::vec(0u64..1_000_000u64, 0..32)) {
            let clock = VirtualClock::new(start);
            for &d in &deltas {
                clock.advance(Duration::from_nanos(d)).unwrap();
            }
            prop_assert_eq!(clock.now_ns(), start + deltas.iter().sum::<u64>());
        }
    }
}
