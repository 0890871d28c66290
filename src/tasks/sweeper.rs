//! Background Sweeper
//!
//! Timer task that periodically removes expired cache entries.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::tasks::SweepThrottle;

// == Sweep Target ==
/// Something the sweeper can drive.
pub trait Sweep: Send + Sync + 'static {
    /// Runs one full eviction pass.
    fn sweep(&self);
}

/// Spawns a task that sweeps `target` every `interval`.
///
/// The first sweep fires one full interval after spawning. Before every pass
/// the task waits on `throttle`, so sweeps of caches sharing one throttle
/// never overlap. The task keeps only a weak reference to `target` and ends
/// by itself once the target is dropped.
///
/// # Arguments
/// * `target` - The cache internals to sweep
/// * `interval` - Time between sweeps; must be non-zero
/// * `throttle` - Gate shared with other sweepers
/// * `runtime` - Runtime the task is spawned on
pub fn spawn_sweeper<S: Sweep>(
    target: Weak<S>,
    interval: Duration,
    throttle: Arc<SweepThrottle>,
    runtime: &Handle,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        debug!(
            interval_ms = interval.as_millis() as u64,
            "Starting background sweeper"
        );

        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let _permit = throttle.acquire().await;
            match target.upgrade() {
                Some(target) => target.sweep(),
                None => break,
            }
        }

        debug!("Background sweeper stopped: cache dropped");
    })
}

// == Sweeper Handle ==
/// Owns the background sweep task of one cache.
#[derive(Debug)]
pub struct SweeperHandle {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SweeperHandle {
    /// Wraps a spawned sweeper task.
    pub fn new(task: JoinHandle<()>) -> Self {
        Self {
            task: Mutex::new(Some(task)),
        }
    }

    // == Shutdown ==
    /// Stops future sweeps. Safe to call any number of times.
    ///
    /// Cancellation lands on the task's next await point, and a pass runs
    /// without awaiting, so a sweep already in progress always completes.
    pub fn shutdown(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            info!("Background sweeper shut down");
        }
    }

    /// Returns true until `shutdown` has been called or the task has ended.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTarget {
        passes: AtomicUsize,
    }

    impl Sweep for CountingTarget {
        fn sweep(&self) {
            self.passes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn spawn_counting(
        target: &Arc<CountingTarget>,
        interval_ms: u64,
        throttle: Arc<SweepThrottle>,
    ) -> SweeperHandle {
        SweeperHandle::new(spawn_sweeper(
            Arc::downgrade(target),
            Duration::from_millis(interval_ms),
            throttle,
            &Handle::current(),
        ))
    }

    #[tokio::test]
    async fn test_sweeper_runs_periodically() {
        let target = Arc::new(CountingTarget::default());
        let handle = spawn_counting(&target, 20, Arc::new(SweepThrottle::new()));

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(target.passes.load(Ordering::SeqCst) >= 2);
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_sweeper_does_not_fire_immediately() {
        let target = Arc::new(CountingTarget::default());
        let handle = spawn_counting(&target, 10_000, Arc::new(SweepThrottle::new()));

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(target.passes.load(Ordering::SeqCst), 0);
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let target = Arc::new(CountingTarget::default());
        let handle = spawn_counting(&target, 20, Arc::new(SweepThrottle::new()));
        assert!(handle.is_running());

        handle.shutdown();
        handle.shutdown();
        assert!(!handle.is_running());

        let passes = target.passes.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(target.passes.load(Ordering::SeqCst), passes);
    }

    #[tokio::test]
    async fn test_sweeper_waits_for_throttle() {
        let throttle = Arc::new(SweepThrottle::new());
        let target = Arc::new(CountingTarget::default());

        let gate = throttle.acquire().await;
        let handle = spawn_counting(&target, 10, Arc::clone(&throttle));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(target.passes.load(Ordering::SeqCst), 0);

        drop(gate);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(target.passes.load(Ordering::SeqCst) >= 1);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_sweeper_exits_when_target_dropped() {
        let target = Arc::new(CountingTarget::default());
        let handle = spawn_counting(&target, 10, Arc::new(SweepThrottle::new()));

        drop(target);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!handle.is_running());
    }
}
