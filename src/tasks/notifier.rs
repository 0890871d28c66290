//! Eviction Notifier
//!
//! Fire-and-forget delivery of evicted keys to a user callback.
//!
//! Each dispatch becomes one blocking task on the runtime, so neither a read
//! nor a sweep ever waits on user code. A panicking callback is caught per
//! key and discarded; it never reaches the cache or kills the worker.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::runtime::Handle;

/// Callback invoked with the key of every evicted entry.
pub type EvictionCallback<K> = Arc<dyn Fn(K) + Send + Sync + 'static>;

// == Notifier ==
/// Dispatches eviction callbacks onto a runtime's blocking pool.
pub struct Notifier<K> {
    callback: EvictionCallback<K>,
    runtime: Handle,
}

impl<K> Notifier<K>
where
    K: Send + 'static,
{
    /// Creates a notifier running `callback` on `runtime`.
    pub fn new(callback: EvictionCallback<K>, runtime: Handle) -> Self {
        Self { callback, runtime }
    }

    // == Notify ==
    /// Dispatches a single evicted key.
    pub fn notify(&self, key: K) {
        self.notify_batch(vec![key]);
    }

    // == Notify Batch ==
    /// Dispatches a batch of evicted keys as one background task.
    ///
    /// Empty batches are dropped without scheduling anything.
    pub fn notify_batch(&self, keys: Vec<K>) {
        if keys.is_empty() {
            return;
        }

        let callback = Arc::clone(&self.callback);
        // The JoinHandle is dropped on purpose; nobody awaits delivery
        drop(self.runtime.spawn_blocking(move || {
            for key in keys {
                let _ = panic::catch_unwind(AssertUnwindSafe(|| callback(key)));
            }
        }));
    }
}

impl<K> fmt::Debug for Notifier<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}
