//! ## tidvakt-core::wake
//! **Gate-protected drain loop for due waiters**
//!
//! Whenever time moves or a waiter is added or rearmed, `wake_waiters`
//! repeatedly selects the earliest-due waiter, invokes its callback with the
//! state lock released, and reschedules or removes it, until nothing is due.
//!
//! A single atomic gate keeps the loop non-reentrant: a trigger from inside
//! a fired callback (advancing time, creating or changing a timer) finds the
//! gate held and returns immediately. Nothing is lost, because the active
//! loop re-reads the live registry and clock on its next iteration.

use std::sync::atomic::Ordering;

use tracing::trace;

use crate::clock::ClockShared;
use crate::registry::WaiterId;

/// Releases the wake gate when the drain pass ends, including via unwind
/// when a callback panics. A permanently-held gate would silently disable
/// all future scheduling on this clock.
struct GateGuard<'a> {
    shared: &'a ClockShared,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.shared.wake_gate.store(false, Ordering::Release);
    }
}

/// Runs the scheduling loop if no other execution holds the gate.
///
/// Callback panics propagate to whichever external call triggered the
/// drain; the waiter that panicked stays registered (dispose its handle
/// after catching), and the gate is released on the way out.
pub(crate) fn wake_waiters(shared: &ClockShared) {
    if shared
        .wake_gate
        .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
        .is_err()
    {
        // Reentrant trigger: the holder's loop will observe the new state.
        return;
    }
    let _gate = GateGuard { shared };

    loop {
        let (id, callback, before_ns) = {
            let state = shared.state.lock();
            let Some(id) = state.registry.select_due(state.now_ns) else {
                return;
            };
            let Some(waiter) = state.registry.get(id) else {
                return;
            };
            trace!(waiter = ?id, wakeup_ns = ?waiter.wakeup_ns, now_ns = state.now_ns, "firing waiter");
            (id, waiter.callback.clone(), state.now_ns)
        };

        // State lock released: the callback may freely reenter the clock.
        {
            let mut cb = callback.lock();
            (cb.as_mut())();
        }

        let mut state = shared.state.lock();
        let after_ns = state.now_ns;
        reschedule(&mut state, id, before_ns, after_ns);
    }
}

/// Post-fire bookkeeping. The waiter may be gone already if the callback
/// disposed or reconfigured its own handle; that is not an error.
fn reschedule(
    state: &mut crate::clock::ClockState,
    id: WaiterId,
    before_ns: u64,
    after_ns: u64,
) {
    let mut remove = false;
    if let Some(waiter) = state.registry.get_mut(id) {
        match waiter.period_ns {
            // One-shot: removed before control returns to the trigger.
            None | Some(0) => remove = true,
            Some(period) => {
                waiter.scheduled_ns = after_ns;
                let next = if after_ns != before_ns {
                    // The callback moved the clock: resynchronize to the new
                    // present instead of compounding drift.
                    after_ns.saturating_add(period)
                } else {
                    // Advance exactly one period from the prior schedule so a
                    // large jump catches up one fire per loop iteration.
                    waiter.wakeup_ns.unwrap_or(after_ns).saturating_add(period)
                };
                waiter.wakeup_ns = Some(next);
                trace!(waiter = ?id, next_wakeup_ns = next, "rescheduled periodic waiter");
            }
        }
    }
    if remove {
        state.registry.remove(id);
        trace!(waiter = ?id, "removed one-shot waiter");
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use proptest::prelude::*;

    use crate::clock::VirtualClock;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let cb_count = Arc::clone(&count);
        (count, move || {
            cb_count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_one_shot_fires_exactly_once() {
        let clock = VirtualClock::new(0);
        let (fired, cb) = counter();
        let _timer = clock.create_timer(cb, Some(ms(1000)), None).unwrap();
        clock.advance(ms(500)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        clock.advance(ms(500)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        clock.advance(ms(1000)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(clock.timer_count(), 0);
    }

    #[test]
    fn test_zero_due_fires_during_create() {
        let clock = VirtualClock::new(0);
        let (fired, cb) = counter();
        let _timer = clock.create_timer(cb, Some(ms(0)), None).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_infinite_due_never_fires() {
        let clock = VirtualClock::new(0);
        let (fired, cb) = counter();
        let _timer = clock.create_timer(cb, None, Some(ms(10))).unwrap();
        clock.advance(ms(1_000_000)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(clock.timer_count(), 1); // registered, just never due
    }

    #[test]
    fn test_periodic_catch_up_firing() {
        let clock = VirtualClock::new(0);
        let (fired, cb) = counter();
        let _timer = clock.create_timer(cb, Some(ms(0)), Some(ms(1000))).unwrap();
        // Fires immediately at creation.
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // One jump across two period boundaries: two catch-up fires.
        clock.advance(ms(2500)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        // The fire due at 3000ms is not yet reached.
        clock.advance(ms(400)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        clock.advance(ms(100)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_set_now_drains_due_timers() {
        let clock = VirtualClock::new(0);
        let (fired, cb) = counter();
        let _timer = clock.create_timer(cb, Some(ms(1000)), None).unwrap();
        clock.set_now_ns(500_000_000).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        // Jumping past the wakeup must fire inside the set_now_ns call.
        clock.set_now_ns(2_000_000_000).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        clock.set_now_ns(4_000_000_000).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(clock.timer_count(), 0);
    }

    #[test]
    fn test_auto_advance_read_fires_due_timer() {
        let clock = VirtualClock::new(0);
        clock.set_auto_advance(ms(1)).unwrap();
        let (fired, cb) = counter();
        let _timer = clock.create_timer(cb, Some(ms(5)), None).unwrap();
        // Four reads leave the clock at 4ms, short of the wakeup.
        for _ in 0..4 {
            clock.now_ns();
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        // The fifth read moves time to 5ms and must drain on the spot.
        clock.now_ns();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        clock.now_ns();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_equal_due_fires_in_creation_order() {
        let clock = VirtualClock::new(0);
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let order_a = Arc::clone(&order);
        let order_b = Arc::clone(&order);
        let _a = clock
            .create_timer(move || order_a.lock().push("a"), Some(ms(100)), None)
            .unwrap();
        let _b = clock
            .create_timer(move || order_b.lock().push("b"), Some(ms(100)), None)
            .unwrap();
        clock.advance(ms(100)).unwrap();
        assert_eq!(*order.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_callback_advancing_clock_resynchronizes_period() {
        let clock = VirtualClock::new(0);
        let fired = Arc::new(AtomicUsize::new(0));
        let cb_fired = Arc::clone(&fired);
        let cb_clock = clock.clone();
        let _timer = clock
            .create_timer(
                move || {
                    // Only the first fire jumps the clock forward.
                    if cb_fired.fetch_add(1, Ordering::SeqCst) == 0 {
                        cb_clock.advance(ms(350)).unwrap();
                    }
                },
                Some(ms(100)),
                Some(ms(100)),
            )
            .unwrap();
        // Fire at 100ms jumps time to 450ms. The next wakeup resynchronizes
        // to 450 + 100 = 550ms; the skipped 200..500ms boundaries do not
        // produce catch-up fires.
        clock.advance(ms(100)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        clock.advance(ms(90)).unwrap(); // 540ms, just short of the wakeup
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        clock.advance(ms(10)).unwrap(); // 550ms
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reentrant_create_from_callback() {
        let clock = VirtualClock::new(0);
        let (inner_fired, inner_cb) = counter();
        let cb_clock = clock.clone();
        let inner_cb = Arc::new(parking_lot::Mutex::new(Some(inner_cb)));
        let keep = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let cb_keep = Arc::clone(&keep);
        let _outer = clock
            .create_timer(
                move || {
                    if let Some(cb) = inner_cb.lock().take() {
                        // Zero due time: must fire before this drain finishes.
                        let handle = cb_clock.create_timer(cb, Some(ms(0)), None).unwrap();
                        cb_keep.lock().push(handle);
                    }
                },
                Some(ms(10)),
                None,
            )
            .unwrap();
        clock.advance(ms(10)).unwrap();
        assert_eq!(inner_fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_gate_released_after_callback_panic() {
        let clock = VirtualClock::new(0);
        let panicking = clock
            .create_timer(|| panic!("callback failure"), Some(ms(10)), None)
            .unwrap();
        let (fired, cb) = counter();
        let _survivor = clock.create_timer(cb, Some(ms(20)), None).unwrap();

        let result = catch_unwind(AssertUnwindSafe(|| clock.advance(ms(10))));
        assert!(result.is_err());

        // The panicking waiter is still registered; dispose it explicitly.
        panicking.dispose();

        // The gate must have been released, so scheduling still works.
        clock.advance(ms(10)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    proptest! {
        /// A periodic timer with due D and period P fires k+1 times when a
        /// single advance crosses D plus k periods plus a remainder.
        #[test]
        fn prop_periodic_fire_count(d in 0u64..500, p in 1u64..500, k in 0u64..20, r_frac in 0u64..100) {
            let r = (p - 1) * r_frac / 100;
            let clock = VirtualClock::new(0);
            let (fired, cb) = counter();
            let _timer = clock
                .create_timer(cb, Some(ms(d)), Some(ms(p)))
                .unwrap();
            clock.advance(ms(d + k * p + r)).unwrap();
            prop_assert_eq!(fired.load(Ordering::SeqCst) as u64, k + 1);
        }
    }
}
