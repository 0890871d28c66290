//! Background Tasks Module
//!
//! Contains the work a cache performs off the caller's thread.
//!
//! # Tasks
//! - Sweeper: removes expired entries at the configured interval
//! - Throttle: keeps timer-driven sweeps of all caches from overlapping
//! - Notifier: delivers evicted keys to the user callback

mod notifier;
mod sweeper;
mod throttle;

pub use notifier::{EvictionCallback, Notifier};
pub use sweeper::{spawn_sweeper, Sweep, SweeperHandle};
pub use throttle::SweepThrottle;
