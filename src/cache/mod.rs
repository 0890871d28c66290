//! Cache Module
//!
//! Provides the concurrent TTL cache and the pieces it is built from.

mod clock;
mod entry;
mod map;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, Tick};
pub use entry::CacheEntry;
pub use map::{ConcurrentStore, EntryRef};
pub use stats::CacheStats;
pub use store::{Iter, TtlCache, TtlCacheBuilder};
