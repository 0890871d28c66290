//! Sweep Throttle
//!
//! A single gate shared by the background sweepers of many caches, so that
//! at most one timer-driven sweep runs at a time across all of them.
//!
//! The process-wide instance is created lazily by [`SweepThrottle::global`]
//! the first time a cache without an explicit throttle is built, and lives
//! for the rest of the process. Hosts that want separate groups of caches
//! (or isolated tests) construct their own with [`SweepThrottle::new`] and
//! pass it to the cache builder.

use std::sync::{Arc, OnceLock};

use tokio::sync::{Mutex, MutexGuard};

static GLOBAL: OnceLock<Arc<SweepThrottle>> = OnceLock::new();

// == Sweep Throttle ==
/// Non-reentrant gate serializing timer-driven sweeps.
#[derive(Debug, Default)]
pub struct SweepThrottle {
    gate: Mutex<()>,
}

impl SweepThrottle {
    /// Creates an independent throttle.
    pub fn new() -> Self {
        Self::default()
    }

    // == Global ==
    /// Returns the process-wide throttle, creating it on first use.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    // == Acquire ==
    /// Waits until no other sweep holds the gate.
    ///
    /// The returned guard releases the gate when dropped.
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Returns true while some sweep holds the gate.
    pub fn is_busy(&self) -> bool {
        self.gate.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_global_is_shared() {
        let a = SweepThrottle::global();
        let b = SweepThrottle::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_new_is_independent() {
        let local = Arc::new(SweepThrottle::new());
        assert!(!Arc::ptr_eq(&local, &SweepThrottle::global()));
    }

    #[tokio::test]
    async fn test_acquire_serializes_holders() {
        let throttle = Arc::new(SweepThrottle::new());

        let guard = throttle.acquire().await;
        assert!(throttle.is_busy());

        let waiter = {
            let throttle = Arc::clone(&throttle);
            tokio::spawn(async move {
                let _guard = throttle.acquire().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished(), "second holder must wait for the gate");

        drop(guard);
        waiter.await.unwrap();
        assert!(!throttle.is_busy());
    }
}
