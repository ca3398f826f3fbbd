//! Single-slot hand-off between the delivery and tick timelines.
//!
//! `HandoffQueue` holds at most one item. Enqueuing into an occupied slot
//! replaces the held item and drops (releases) the old one, so the queue always
//! reflects the most recent delivery and the producer never blocks on the consumer.
//!
//! Slot transitions happen under one mutex: a poll never observes a
//! half-installed enqueue, and an item is never both handed to the consumer
//! and released by an overwrite.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Capacity-1 overwrite queue.
pub struct HandoffQueue<T> {
    slot: Mutex<Option<T>>,
    enqueued: AtomicU64,
    overwritten: AtomicU64,
    polled: AtomicU64,
}

/// Counters for a hand-off queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub overwritten: u64,
    pub polled: u64,
}

impl<T> HandoffQueue<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            enqueued: AtomicU64::new(0),
            overwritten: AtomicU64::new(0),
            polled: AtomicU64::new(0),
        }
    }

    /// Install `item`, dropping any item already held.
    ///
    /// Returns true when a pending item was replaced. Never blocks on the
    /// consumer beyond the slot swap itself.
    pub fn enqueue(&self, item: T) -> bool {
        let previous = self.lock().replace(item);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        match previous {
            Some(old) => {
                self.overwritten.fetch_add(1, Ordering::Relaxed);
                // Unreachable from the slot; released by the writer before returning.
                drop(old);
                true
            }
            None => false,
        }
    }

    /// Take the held item, leaving the queue empty.
    pub fn poll(&self) -> Option<T> {
        let item = self.lock().take();
        if item.is_some() {
            self.polled.fetch_add(1, Ordering::Relaxed);
        }
        item
    }

    pub fn is_occupied(&self) -> bool {
        self.lock().is_some()
    }

    /// Drop any held item. Returns true when one was held.
    pub fn clear(&self) -> bool {
        let previous = self.lock().take();
        previous.is_some()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            overwritten: self.overwritten.load(Ordering::Relaxed),
            polled: self.polled.load(Ordering::Relaxed),
        }
    }

    // Slot operations cannot panic while locked, so a poisoned lock still
    // guards a consistent Option.
    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for HandoffQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
