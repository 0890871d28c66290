//! Cache Store Module
//!
//! The public cache: a concurrent map of TTL-tagged entries with lazy
//! eviction on read, a background sweeper and eviction notifications.
//!
//! No operation here takes a lock that spans more than a single map shard.
//! Expired entries found by readers are removed with a conditional remove
//! that only succeeds if the slot still holds the exact entry the reader
//! saw, so a concurrent writer's fresh entry is never thrown away.

use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use std::vec;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, trace};

use super::stats::StatsCounters;
use crate::cache::{CacheEntry, CacheStats, Clock, ConcurrentStore, EntryRef, Tick};
use crate::config::{CacheConfig, MAX_SWEEP_INTERVAL};
use crate::error::{CacheError, Result};
use crate::tasks::{
    spawn_sweeper, EvictionCallback, Notifier, Sweep, SweepThrottle, SweeperHandle,
};

// == Shared State ==
/// Everything the cache handle and the sweeper task share.
struct Shared<K, V> {
    store: ConcurrentStore<K, V>,
    clock: Clock,
    notifier: Option<Notifier<K>>,
    /// Held for the duration of one sweep pass; never waited on
    sweep_guard: Mutex<()>,
    stats: StatsCounters,
}

/// What `install` found in an occupied slot.
enum Occupant<V> {
    /// A live entry, left untouched
    Live(V),
    /// An expired entry, overwritten in place
    Replaced,
}

impl<K, V> Shared<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn notify(&self, key: K) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(key);
        }
    }

    // == Live Entry ==
    /// Returns the live entry for `key`, lazily evicting an expired one.
    fn live_entry(&self, key: &K) -> Option<EntryRef<V>> {
        let Some(entry) = self.store.get(key) else {
            self.stats.record_miss();
            return None;
        };

        let now = self.clock.now();
        if !entry.is_expired(now) {
            self.stats.record_hit();
            return Some(entry);
        }

        self.stats.record_miss();
        // Re-checking expiry under the slot lock keeps an entry that was
        // refreshed in place after we read it
        if self
            .store
            .remove_if_same(key, &entry, |current| current.is_expired(now))
        {
            self.stats.record_evictions(1);
            self.notify(key.clone());
        }
        None
    }

    // == Install ==
    /// Inserts `value` for a key that had no live entry when last checked.
    ///
    /// If a racing writer filled the slot with a live entry, that entry wins
    /// and its value is returned. If the slot holds an expired entry, it is
    /// overwritten in place and counted as an eviction.
    fn install(&self, key: K, value: V, ttl: Duration) -> V {
        let now = self.clock.now();
        let deadline = now.after(ttl);
        let notify_key = self.notifier.as_ref().map(|_| key.clone());
        let fresh = Arc::new(CacheEntry::new(value, deadline));

        let occupant = self
            .store
            .insert_or_inspect(key, Arc::clone(&fresh), |existing| {
                if existing.is_expired(now) {
                    existing.replace(fresh.value(), deadline);
                    Occupant::Replaced
                } else {
                    Occupant::Live(existing.value())
                }
            });

        match occupant {
            None => fresh.value(),
            Some(Occupant::Replaced) => {
                self.stats.record_evictions(1);
                if let Some(key) = notify_key {
                    self.notify(key);
                }
                fresh.value()
            }
            Some(Occupant::Live(value)) => value,
        }
    }

    // == Evict Expired ==
    /// Removes every entry expired at the start of the pass.
    ///
    /// Returns immediately if another pass on this cache is in progress.
    /// Evicted keys go to the notifier as a single batch.
    fn evict_expired(&self) {
        let Some(_guard) = self.sweep_guard.try_lock() else {
            trace!("Sweep already in progress, skipping");
            return;
        };

        let now = self.clock.now();
        let mut removed: u64 = 0;
        let mut batch = Vec::new();

        for (key, entry) in self.store.select(|entry| entry.is_expired(now)) {
            if self
                .store
                .remove_if_same(&key, &entry, |current| current.is_expired(now))
            {
                removed += 1;
                if self.notifier.is_some() {
                    batch.push(key);
                }
            }
        }

        self.stats.record_evictions(removed);
        self.stats.record_sweep();

        if let Some(notifier) = &self.notifier {
            notifier.notify_batch(batch);
        }

        if removed > 0 {
            debug!(removed, remaining = self.store.len(), "Swept expired entries");
        } else {
            trace!("Sweep found no expired entries");
        }
    }
}

impl<K, V> Sweep for Shared<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn sweep(&self) {
        self.evict_expired();
    }
}

// == TTL Cache ==
/// Concurrent in-memory cache with a time-to-live on every entry.
///
/// All operations take `&self` and may be called from any number of threads;
/// wrap the cache in an `Arc` to share it. Dropping the cache stops its
/// background sweeper.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use ttl_cache::TtlCache;
///
/// # #[tokio::main]
/// # async fn main() -> ttl_cache::Result<()> {
/// let cache = TtlCache::new(Duration::from_secs(10))?;
/// cache.add_or_update("session", 42u32, Duration::from_secs(60));
/// assert_eq!(cache.try_get(&"session"), Some(42));
/// # Ok(())
/// # }
/// ```
pub struct TtlCache<K, V> {
    shared: Arc<Shared<K, V>>,
    sweeper: SweeperHandle,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates a cache swept every `sweep_interval`, on the current runtime.
    pub fn new(sweep_interval: Duration) -> Result<Self> {
        Self::builder().sweep_interval(sweep_interval).build()
    }

    /// Creates a cache that reports evicted keys to `callback`.
    pub fn with_eviction_callback(
        sweep_interval: Duration,
        callback: impl Fn(K) + Send + Sync + 'static,
    ) -> Result<Self> {
        Self::builder()
            .sweep_interval(sweep_interval)
            .on_eviction(callback)
            .build()
    }

    /// Creates a cache from a loaded configuration.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::builder().sweep_interval(config.sweep_interval).build()
    }

    /// Starts building a cache with non-default parts.
    pub fn builder() -> TtlCacheBuilder<K, V> {
        TtlCacheBuilder::new()
    }

    // == Add Or Update ==
    /// Stores `value` for `key`, replacing any existing entry.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Time until the entry expires
    pub fn add_or_update(&self, key: K, value: V, ttl: Duration) {
        let deadline = self.shared.clock.now().after(ttl);
        self.shared
            .store
            .upsert(key, Arc::new(CacheEntry::new(value, deadline)));
    }

    // == Try Get ==
    /// Returns a copy of the live value for `key`.
    ///
    /// An expired entry is removed on the spot and reported to the eviction
    /// callback, unless a concurrent writer replaced it first.
    pub fn try_get(&self, key: &K) -> Option<V> {
        self.shared.live_entry(key).map(|entry| entry.value())
    }

    // == Try Add ==
    /// Stores `value` only if `key` has no live entry.
    ///
    /// Returns true if this call inserted the entry.
    pub fn try_add(&self, key: K, value: V, ttl: Duration) -> bool {
        if self.shared.live_entry(&key).is_some() {
            return false;
        }

        let deadline = self.shared.clock.now().after(ttl);
        self.shared
            .store
            .insert_if_absent(key, Arc::new(CacheEntry::new(value, deadline)))
            .is_ok()
    }

    // == Get Or Add ==
    /// Returns the live value for `key`, storing `value` if there is none.
    pub fn get_or_add(&self, key: K, value: V, ttl: Duration) -> V {
        self.get_or_add_with(key, |_| value, ttl)
    }

    /// Returns the live value for `key`, computing one with `factory` if
    /// there is none.
    ///
    /// The factory is not called when a live entry exists. Concurrent
    /// callers racing on a missing key may each call their factory; exactly
    /// one of the results is kept and returned to all of them.
    pub fn get_or_add_with(&self, key: K, factory: impl FnOnce(&K) -> V, ttl: Duration) -> V {
        match self.try_get_or_add_with(key, |k| Ok::<V, Infallible>(factory(k)), ttl) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`get_or_add_with`](Self::get_or_add_with), passing `arg` to
    /// the factory so it does not have to capture it.
    pub fn get_or_add_with_arg<A>(
        &self,
        key: K,
        factory: impl FnOnce(&K, A) -> V,
        arg: A,
        ttl: Duration,
    ) -> V {
        self.get_or_add_with(key, |k| factory(k, arg), ttl)
    }

    /// Like [`get_or_add_with`](Self::get_or_add_with) with a fallible
    /// factory.
    ///
    /// The factory runs before the store is touched, so an `Err` (or a
    /// panic) leaves the cache exactly as it was for this key.
    pub fn try_get_or_add_with<E>(
        &self,
        key: K,
        factory: impl FnOnce(&K) -> std::result::Result<V, E>,
        ttl: Duration,
    ) -> std::result::Result<V, E> {
        if let Some(entry) = self.shared.live_entry(&key) {
            return Ok(entry.value());
        }

        let value = factory(&key)?;
        Ok(self.shared.install(key, value, ttl))
    }

    // == Remove ==
    /// Deletes the entry for `key`, if any. Never notifies.
    pub fn remove(&self, key: &K) {
        self.shared.store.remove(key);
    }

    // == Try Remove ==
    /// Deletes the entry for `key` and returns its value if it was live.
    ///
    /// An expired entry is still deleted, but yields `None` and is not
    /// reported to the eviction callback.
    pub fn try_remove(&self, key: &K) -> Option<V> {
        let entry = self.shared.store.remove(key)?;
        let now = self.shared.clock.now();
        (!entry.is_expired(now)).then(|| entry.value())
    }

    // == Clear ==
    /// Drops every entry without notifying.
    pub fn clear(&self) {
        self.shared.store.clear();
    }

    // == Iter ==
    /// Iterates over a snapshot of the live entries.
    ///
    /// Entries expired at the time of the call are skipped but not removed.
    pub fn iter(&self) -> Iter<K, V> {
        Iter {
            entries: self.shared.store.snapshot().into_iter(),
            now: self.shared.clock.now(),
        }
    }

    // == Length ==
    /// Returns the number of stored entries, including expired entries that
    /// have not been swept yet.
    pub fn len(&self) -> usize {
        self.shared.store.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.shared.store.is_empty()
    }

    // == Evict Expired ==
    /// Runs a sweep pass now.
    ///
    /// Does not wait for the process-wide throttle. If a pass is already
    /// running on this cache, returns without doing anything.
    pub fn evict_expired(&self) {
        self.shared.evict_expired();
    }

    // == Shutdown ==
    /// Stops the background sweeper. Idempotent.
    ///
    /// A sweep or notification already in progress runs to completion.
    pub fn shutdown(&self) {
        self.sweeper.shutdown();
    }

    /// Returns true until the sweeper has been shut down.
    pub fn is_sweeper_running(&self) -> bool {
        self.sweeper.is_running()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.shared.stats.snapshot(self.shared.store.len())
    }
}

impl<K, V> fmt::Debug for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("store", &self.shared.store)
            .field("clock", &self.shared.clock)
            .field("notifies", &self.shared.notifier.is_some())
            .field("sweeper", &self.sweeper)
            .finish()
    }
}

impl<'a, K, V> IntoIterator for &'a TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Item = (K, V);
    type IntoIter = Iter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// == Iter ==
/// Iterator over the live entries of a cache, returned by [`TtlCache::iter`].
pub struct Iter<K, V> {
    entries: vec::IntoIter<(K, EntryRef<V>)>,
    now: Tick,
}

impl<K, V: Clone> Iterator for Iter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let now = self.now;
        self.entries
            .by_ref()
            .find(|(_, entry)| !entry.is_expired(now))
            .map(|(key, entry)| (key, entry.value()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.entries.len()))
    }
}

// == Builder ==
/// Configures and builds a [`TtlCache`].
pub struct TtlCacheBuilder<K, V> {
    sweep_interval: Duration,
    callback: Option<EvictionCallback<K>>,
    clock: Option<Clock>,
    throttle: Option<Arc<SweepThrottle>>,
    runtime: Option<Handle>,
    _values: PhantomData<fn() -> V>,
}

impl<K, V> TtlCacheBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn new() -> Self {
        Self {
            sweep_interval: CacheConfig::default().sweep_interval,
            callback: None,
            clock: None,
            throttle: None,
            runtime: None,
            _values: PhantomData,
        }
    }

    /// Sets the interval between background sweeps (default 10 s).
    pub fn sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    /// Registers a callback receiving the key of every evicted entry.
    pub fn on_eviction(self, callback: impl Fn(K) + Send + Sync + 'static) -> Self {
        self.eviction_callback(Arc::new(callback))
    }

    /// Registers an already shared eviction callback.
    pub fn eviction_callback(mut self, callback: EvictionCallback<K>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Uses `clock` instead of a fresh one.
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Uses `throttle` instead of [`SweepThrottle::global`].
    pub fn throttle(mut self, throttle: Arc<SweepThrottle>) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Runs the sweeper and notifications on `runtime` instead of the
    /// runtime current at build time.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    // == Build ==
    /// Builds the cache and starts its background sweeper.
    ///
    /// # Errors
    /// * `InvalidConfig` - the sweep interval is zero or longer than
    ///   [`MAX_SWEEP_INTERVAL`]
    /// * `NoRuntime` - no runtime was given and none is running
    pub fn build(self) -> Result<TtlCache<K, V>> {
        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep interval must be non-zero".to_string(),
            ));
        }
        if self.sweep_interval > MAX_SWEEP_INTERVAL {
            return Err(CacheError::InvalidConfig(format!(
                "sweep interval must not exceed {} s",
                MAX_SWEEP_INTERVAL.as_secs()
            )));
        }

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| CacheError::NoRuntime)?,
        };
        let throttle = self.throttle.unwrap_or_else(SweepThrottle::global);

        let shared = Arc::new(Shared {
            store: ConcurrentStore::new(),
            clock: self.clock.unwrap_or_default(),
            notifier: self
                .callback
                .map(|callback| Notifier::new(callback, runtime.clone())),
            sweep_guard: Mutex::new(()),
            stats: StatsCounters::default(),
        });

        let task = spawn_sweeper(
            Arc::downgrade(&shared),
            self.sweep_interval,
            throttle,
            &runtime,
        );

        Ok(TtlCache {
            shared,
            sweeper: SweeperHandle::new(task),
        })
    }
}
