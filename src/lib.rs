//! TTL Cache - A concurrent in-memory cache with per-entry expiration
//!
//! Reads and writes never take a cache-wide lock. Expired entries are removed
//! lazily by the reads that find them and in bulk by a background sweeper;
//! both can report evicted keys to an optional callback.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheStats, Clock, TtlCache, TtlCacheBuilder};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::{EvictionCallback, SweepThrottle};
