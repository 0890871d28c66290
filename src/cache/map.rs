//! Concurrent Store Module
//!
//! Thin wrapper over `DashMap` exposing exactly the primitives the cache
//! needs. Every value is an `Arc<CacheEntry<V>>`, and the `Arc` pointer is
//! the entry's identity for conditional removal.
//!
//! No method here hands out a `dashmap` guard: shard locks are always
//! released before returning, so callers can never deadlock by touching the
//! map again while holding a reference into it.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry as Slot;
use dashmap::DashMap;

use crate::cache::CacheEntry;

/// Shared handle to a stored entry.
pub type EntryRef<V> = Arc<CacheEntry<V>>;

// == Concurrent Store ==
/// Thread-safe associative container of entries.
pub struct ConcurrentStore<K, V> {
    entries: DashMap<K, EntryRef<V>>,
}

impl<K, V> ConcurrentStore<K, V>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    // == Get ==
    /// Returns a handle to the entry currently stored for `key`.
    pub fn get(&self, key: &K) -> Option<EntryRef<V>> {
        self.entries.get(key).map(|slot| Arc::clone(slot.value()))
    }

    // == Upsert ==
    /// Stores `entry` for `key`, replacing whatever was there.
    pub fn upsert(&self, key: K, entry: EntryRef<V>) {
        self.entries.insert(key, entry);
    }

    // == Insert If Absent ==
    /// Stores `entry` only if `key` has no entry.
    ///
    /// Returns the existing entry when the slot is occupied.
    pub fn insert_if_absent(&self, key: K, entry: EntryRef<V>) -> Result<(), EntryRef<V>> {
        match self.entries.entry(key) {
            Slot::Occupied(occupied) => Err(Arc::clone(occupied.get())),
            Slot::Vacant(vacant) => {
                vacant.insert(entry);
                Ok(())
            }
        }
    }

    // == Insert Or Inspect ==
    /// Inserts `entry` if `key` is vacant; otherwise runs `inspect` on the
    /// occupant while the slot is held.
    ///
    /// `inspect` runs under the shard lock and must not touch this store.
    pub fn insert_or_inspect<R>(
        &self,
        key: K,
        entry: EntryRef<V>,
        inspect: impl FnOnce(&EntryRef<V>) -> R,
    ) -> Option<R> {
        match self.entries.entry(key) {
            Slot::Occupied(occupied) => Some(inspect(occupied.get())),
            Slot::Vacant(vacant) => {
                vacant.insert(entry);
                None
            }
        }
    }

    // == Remove ==
    /// Removes the entry for `key`, returning it if there was one.
    pub fn remove(&self, key: &K) -> Option<EntryRef<V>> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    // == Remove If Same ==
    /// Removes the mapping for `key` only if it still points at `expected`
    /// and `still_wanted` agrees.
    ///
    /// Returns true if this call removed it. A writer that replaced the
    /// entry in the meantime makes this a no-op.
    pub fn remove_if_same(
        &self,
        key: &K,
        expected: &EntryRef<V>,
        still_wanted: impl FnOnce(&CacheEntry<V>) -> bool,
    ) -> bool {
        self.entries
            .remove_if(key, |_, current| {
                Arc::ptr_eq(current, expected) && still_wanted(&**current)
            })
            .is_some()
    }

    // == Select ==
    /// Copies out every `(key, entry)` pair accepted by `wanted`.
    ///
    /// Weakly consistent: each shard is read at a different instant.
    pub fn select(
        &self,
        mut wanted: impl FnMut(&CacheEntry<V>) -> bool,
    ) -> Vec<(K, EntryRef<V>)> {
        self.entries
            .iter()
            .filter(|slot| wanted(&**slot.value()))
            .map(|slot| (slot.key().clone(), Arc::clone(slot.value())))
            .collect()
    }

    // == Snapshot ==
    /// Copies out every `(key, entry)` pair.
    pub fn snapshot(&self) -> Vec<(K, EntryRef<V>)> {
        self.select(|_| true)
    }

    // == Clear ==
    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    // == Length ==
    /// Returns the number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for ConcurrentStore<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for ConcurrentStore<K, V>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentStore")
            .field("len", &self.len())
            .finish()
    }
}
