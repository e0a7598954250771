//! A leaky-bucket rate limiter with fixed-point fractional-unit precision.
//!
//! Because `fill_rate` is an integer, naive unit accounting loses precision
//! at low rates (a few tx/s or less). The convention throughout this crate
//! is to scale all logical rates by [`FIXED_POINT_SHIFT`] before
//! constructing a bucket, and to `try_leak(FIXED_POINT_SHIFT)` to consume
//! "one transaction's worth" -- this is a contract with callers, not an
//! implementation detail, and callers (see `crate::worker`) are expected to
//! follow it.

use std::time::Instant;

/// Fixed-point scale applied to all rates passed to [`LeakyBucket::new`].
pub const FIXED_POINT_SHIFT: u64 = 1024;

/// A leaky bucket: tokens accumulate at `fill_rate` units/second up to
/// `capacity`, and [`try_leak`](LeakyBucket::try_leak) admits an action only
/// if enough tokens are currently available.
#[derive(Debug)]
pub struct LeakyBucket {
    capacity: u64,
    fill_rate: u64,
    level: u64,
    last_refill: Instant,
}

impl LeakyBucket {
    /// Construct a bucket with the given `capacity`, `initial_level` and
    /// `fill_rate` (units/second), all already scaled by
    /// [`FIXED_POINT_SHIFT`] by the caller.
    pub fn new(capacity: u64, initial_level: u64, fill_rate: u64) -> Self {
        LeakyBucket {
            capacity,
            fill_rate,
            level: initial_level.min(capacity),
            last_refill: Instant::now(),
        }
    }

    /// Refill based on elapsed wall time, then attempt to consume `n`
    /// units. Returns `true` and decrements `level` by `n` on success;
    /// returns `false` and leaves `level` unchanged otherwise.
    pub fn try_leak(&mut self, n: u64) -> bool {
        self.refill();
        if self.level >= n {
            self.level -= n;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed_nanos = now.duration_since(self.last_refill).as_nanos();
        if elapsed_nanos == 0 {
            return;
        }
        let added = (elapsed_nanos * self.fill_rate as u128) / 1_000_000_000u128;
        if added == 0 {
            // Not enough elapsed time to add a whole unit yet; keep
            // `last_refill` pinned so the fractional time isn't lost.
            return;
        }
        self.level = (self.level + added as u64).min(self.capacity);
        self.last_refill = now;
    }

    /// Current token level, after lazily refilling. Exposed for tests and
    /// diagnostics.
    pub fn level(&mut self) -> u64 {
        self.refill();
        self.level
    }
}
