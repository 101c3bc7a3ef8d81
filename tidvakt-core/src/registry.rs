//! ## tidvakt-core::registry
//! **Generational slab of pending timer registrations**
//!
//! The registry is the unordered set of live waiters. Slots are reused
//! through a free list; ids carry a generation so a stale id (from a waiter
//! removed by dispose or reconfigure) can never reach a recycled slot.
//!
//! Selection is a linear scan. The set is small in practice (one entry per
//! live timer), and a scan keeps removal O(1) with no heap order to repair.

use std::sync::Arc;

use parking_lot::Mutex;

/// Stored callback plus captured state, invoked with no arguments.
///
/// The `Mutex` serializes invocation against reconfiguration; the wake loop
/// holds it only while the callback runs, never while the registry is locked.
pub(crate) type Callback = Arc<Mutex<Box<dyn FnMut() + Send>>>;

/// One pending timer registration.
pub(crate) struct Waiter {
    pub callback: Callback,
    /// Absolute instant at which the waiter next becomes eligible.
    /// `None` means "never" (infinite due time).
    pub wakeup_ns: Option<u64>,
    /// Interval between subsequent fires. `None` or `Some(0)` is one-shot.
    pub period_ns: Option<u64>,
    /// Instant at which the waiter was last (re)armed. Tie-breaker only.
    pub scheduled_ns: u64,
}

/// Stable handle into the slab: slot index plus generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WaiterId {
    index: u32,
    generation: u32,
}

struct Slot {
    generation: u32,
    waiter: Option<Waiter>,
}

/// Unordered collection of live waiters.
///
/// Mutated only while the owning clock's state lock is held.
pub(crate) struct WaiterRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl WaiterRegistry {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, waiter: Waiter) -> WaiterId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                debug_assert!(slot.waiter.is_none());
                slot.waiter = Some(waiter);
                WaiterId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    waiter: Some(waiter),
                });
                WaiterId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Removes the waiter behind `id`. Idempotent: a stale or already-removed
    /// id is a no-op returning `false`.
    pub fn remove(&mut self, id: WaiterId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return false;
        };
        if slot.generation != id.generation || slot.waiter.is_none() {
            return false;
        }
        slot.waiter = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        true
    }

    pub fn get(&self, id: WaiterId) -> Option<&Waiter> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.waiter.as_ref()
    }

    pub fn get_mut(&mut self, id: WaiterId) -> Option<&mut Waiter> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.waiter.as_mut()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Selects the waiter to fire next: among those with
    /// `wakeup_ns <= now_ns`, the smallest `wakeup_ns`, ties broken by the
    /// smallest `scheduled_ns` (earliest armed or rearmed wins). Returns
    /// `None` when nothing is due, ending the current drain pass.
    pub fn select_due(&self, now_ns: u64) -> Option<WaiterId> {
        let mut best: Option<(u64, u64, WaiterId)> = None;
        for (index, slot) in self.slots.iter().enumerate() {
            let Some(waiter) = slot.waiter.as_ref() else {
                continue;
            };
            let Some(wakeup) = waiter.wakeup_ns else {
                continue;
            };
            if wakeup > now_ns {
                continue;
            }
            let key = (wakeup, waiter.scheduled_ns);
            if best.map_or(true, |(w, s, _)| key < (w, s)) {
                best = Some((
                    wakeup,
                    waiter.scheduled_ns,
                    WaiterId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                ));
            }
        }
        best.map(|(_, _, id)| id)
    }
}
