//! Clock Module
//!
//! Monotonic millisecond tick source used for every expiry decision.
//!
//! Ticks are compared with wrapping arithmetic, so the result of an expiry
//! check depends only on the elapsed time between two readings and never on
//! where the counter sits within its range.

use std::time::{Duration, Instant};

// == Tick ==
/// A reading of the monotonic counter, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tick(u64);

impl Tick {
    /// Wraps a raw counter value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw counter value.
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    // == After ==
    /// Returns the tick `ttl` after this one, wrapping at the counter boundary.
    pub fn after(self, ttl: Duration) -> Self {
        Self(self.0.wrapping_add(ttl_to_ticks(ttl)))
    }

    // == Is Later Than ==
    /// Returns true if this tick is strictly later than `other`.
    ///
    /// Computed as `(self - other) as i64 > 0` so that a reading taken just
    /// after the counter wraps still compares as later than one taken just
    /// before it.
    #[inline]
    pub fn is_later_than(self, other: Tick) -> bool {
        (self.0.wrapping_sub(other.0) as i64) > 0
    }
}

/// Converts a TTL to ticks, clamped so the signed comparison stays valid.
///
/// Partial milliseconds round up, so a non-zero TTL is never zero ticks.
fn ttl_to_ticks(ttl: Duration) -> u64 {
    let millis = u64::try_from(ttl.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX);
    millis.min(i64::MAX as u64)
}

// == Clock ==
/// Monotonic clock with an additive offset.
///
/// The offset exists so tests can place the counter next to its maximum and
/// observe entries whose deadlines wrap past it.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
    offset: u64,
}

impl Clock {
    /// Creates a clock starting at tick zero.
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Creates a clock whose first reading is `offset`.
    pub fn with_offset(offset: u64) -> Self {
        Self {
            origin: Instant::now(),
            offset,
        }
    }

    // == Now ==
    /// Returns the current tick.
    #[inline]
    pub fn now(&self) -> Tick {
        let elapsed = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        Tick(self.offset.wrapping_add(elapsed))
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_clock_starts_at_offset() {
        let clock = Clock::with_offset(1_000);
        let now = clock.now().as_raw();
        assert!(now >= 1_000);
        assert!(now < 1_000 + 1_000);
    }

    #[test]
    fn test_clock_is_monotonic() {
        let clock = Clock::new();
        let first = clock.now();
        sleep(Duration::from_millis(5));
        let second = clock.now();
        assert!(second.is_later_than(first));
        assert!(!first.is_later_than(second));
    }

    #[test]
    fn test_is_later_than_is_strict() {
        let tick = Tick::from_raw(42);
        assert!(!tick.is_later_than(tick));
        assert!(Tick::from_raw(43).is_later_than(tick));
    }

    #[test]
    fn test_after_wraps_at_boundary() {
        let near_max = Tick::from_raw(u64::MAX - 100);
        let deadline = near_max.after(Duration::from_millis(300));

        assert_eq!(deadline.as_raw(), 199);
        assert!(deadline.is_later_than(near_max));
        assert!(!near_max.is_later_than(deadline));

        // 100 ms past the deadline, on the far side of the wrap
        let later = Tick::from_raw(299);
        assert!(later.is_later_than(deadline));
    }

    #[test]
    fn test_sub_millisecond_ttl_rounds_up() {
        let start = Tick::from_raw(10);
        let deadline = start.after(Duration::from_micros(900));

        assert_eq!(deadline.as_raw(), 11);
        assert!(!Tick::from_raw(11).is_later_than(deadline));
        assert!(Tick::from_raw(12).is_later_than(deadline));

        // Whole milliseconds are unchanged
        assert_eq!(start.after(Duration::from_millis(5)).as_raw(), 15);
        assert_eq!(start.after(Duration::ZERO).as_raw(), 10);
    }

    #[test]
    fn test_huge_ttl_is_clamped() {
        let start = Tick::from_raw(10);
        let deadline = start.after(Duration::MAX);
        assert!(deadline.is_later_than(start));
    }

    #[test]
    fn test_wrapping_clock_keeps_ordering() {
        let clock = Clock::with_offset(u64::MAX - 5);
        let before = clock.now();
        sleep(Duration::from_millis(20));
        let after = clock.now();

        assert!(after.as_raw() < before.as_raw(), "counter should have wrapped");
        assert!(after.is_later_than(before));
    }
}
