//! Cache Entry Module
//!
//! Defines the shared, in-place mutable cell stored for every key.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::cache::Tick;

// == Cache Entry ==
/// A value tagged with the tick after which it is expired.
///
/// Entries live behind an `Arc` so the map slot and any in-flight reader
/// share the same cell. Both fields can be rewritten without touching the
/// map slot, which is what the expired-replacement path of `get_or_add` does.
#[derive(Debug)]
pub struct CacheEntry<V> {
    /// Raw deadline tick
    deadline: AtomicU64,
    /// The stored value
    value: RwLock<V>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry expiring after `deadline`.
    pub fn new(value: V, deadline: Tick) -> Self {
        Self {
            deadline: AtomicU64::new(deadline.as_raw()),
            value: RwLock::new(value),
        }
    }

    /// Returns the current deadline.
    #[inline]
    pub fn deadline(&self) -> Tick {
        Tick::from_raw(self.deadline.load(Ordering::Acquire))
    }

    // == Is Expired ==
    /// Checks whether `now` is strictly past the deadline.
    #[inline]
    pub fn is_expired(&self, now: Tick) -> bool {
        now.is_later_than(self.deadline())
    }

    // == Replace ==
    /// Overwrites the entry in place.
    ///
    /// The deadline is published before the value: a concurrent reader may
    /// observe the extended deadline paired with the old value, but never a
    /// fresh value that is already reported as expired.
    pub fn replace(&self, value: V, deadline: Tick) {
        self.deadline.store(deadline.as_raw(), Ordering::Release);
        *self.value.write() = value;
    }
}

impl<V: Clone> CacheEntry<V> {
    /// Returns a copy of the stored value.
    #[inline]
    pub fn value(&self) -> V {
        self.value.read().clone()
    }
}
