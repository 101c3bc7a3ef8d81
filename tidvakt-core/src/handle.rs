//! ## tidvakt-core::handle
//! **Timer handle lifecycle: change, dispose, drop-as-dispose**
//!
//! A `TimerHandle` is the owning reference to at most one waiter in its
//! clock's registry. Disposal is explicit and idempotent; dropping the
//! handle disposes too, so an abandoned handle releases its waiter
//! deterministically instead of leaning on any collection mechanism.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::clock::{duration_to_ns, ClockShared};
use crate::error::ClockError;
use crate::registry::{Callback, Waiter, WaiterId};
use crate::wake::wake_waiters;

/// Owning handle to one registered timer.
///
/// Created by [`crate::VirtualClock::create_timer`]. Not `Clone`: exactly
/// one handle owns each waiter. Safe to dispose from inside the timer's own
/// callback (hand the handle to the callback through a shared `Option`).
pub struct TimerHandle {
    shared: Arc<ClockShared>,
    inner: Mutex<HandleInner>,
}

struct HandleInner {
    /// `None` once disposed.
    waiter: Option<WaiterId>,
    callback: Callback,
}

impl TimerHandle {
    pub(crate) fn new(shared: Arc<ClockShared>, waiter: WaiterId, callback: Callback) -> Self {
        Self {
            shared,
            inner: Mutex::new(HandleInner {
                waiter: Some(waiter),
                callback,
            }),
        }
    }

    /// Rearms the timer relative to the current virtual time, discarding any
    /// pending fire. Returns `Ok(false)` if the handle was already disposed.
    /// A zero `due` fires synchronously before this returns.
    pub fn change(
        &self,
        due: Option<Duration>,
        period: Option<Duration>,
    ) -> Result<bool, ClockError> {
        let due_ns = duration_to_ns("due time", due)?;
        let period_ns = duration_to_ns("period", period)?;
        {
            let mut inner = self.inner.lock();
            let Some(old) = inner.waiter else {
                return Ok(false);
            };
            let mut state = self.shared.state.lock();
            let now = state.now_ns;
            // Validate the new wakeup before touching the old waiter so a
            // failed change leaves everything unchanged.
            let wakeup_ns = match due_ns {
                None => None,
                Some(d) => Some(now.checked_add(d).ok_or(ClockError::ClockOverflow)?),
            };
            state.registry.remove(old);
            let id = state.registry.insert(Waiter {
                callback: Arc::clone(&inner.callback),
                wakeup_ns,
                period_ns,
                scheduled_ns: now,
            });
            inner.waiter = Some(id);
            debug!(old = ?old, new = ?id, "timer rearmed");
        }
        wake_waiters(&self.shared);
        Ok(true)
    }

    /// Removes the timer's waiter and marks the handle disposed. Idempotent,
    /// and safe to call from inside the timer's own callback: the current
    /// fire completes, but no further fires happen in this or any later
    /// drain pass.
    pub fn dispose(&self) {
        let mut inner = self.inner.lock();
        if let Some(id) = inner.waiter.take() {
            self.shared.state.lock().registry.remove(id);
            debug!(waiter = ?id, "timer disposed");
        }
    }

    /// Whether [`TimerHandle::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.lock().waiter.is_none()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}
