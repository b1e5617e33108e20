// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Token-bucket admission control for source loads.

use std::{fmt, num::NonZeroU32, time::Instant};

use governor::{
    Quota,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
};
use tick::Clock;

/// Reads time for the limiter from a [`tick::Clock`], so tests can drive refills.
#[derive(Debug, Clone)]
struct TickClock(Clock);

impl governor::clock::Clock for TickClock {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        self.0.instant()
    }
}

type Bucket = governor::RateLimiter<NotKeyed, InMemoryState, TickClock, NoOpMiddleware<Instant>>;

/// A token bucket that throttles the aggregate rate of source loads.
///
/// The bucket starts full and regains tokens continuously at the configured rate.
/// [`try_take`](Self::try_take) never waits: it either takes a token or reports that none is
/// available.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use readthru::RateLimiter;
/// use tick::ClockControl;
///
/// let control = ClockControl::new();
/// let limiter = RateLimiter::new(1, 1, control.to_clock());
///
/// assert!(limiter.try_take());
/// assert!(!limiter.try_take());
///
/// control.advance(Duration::from_secs(1));
/// assert!(limiter.try_take());
/// ```
pub struct RateLimiter {
    capacity: NonZeroU32,
    refill_per_second: NonZeroU32,
    bucket: Bucket,
}

impl RateLimiter {
    /// Creates a full bucket holding `capacity` tokens that regains `refill_per_second` tokens
    /// every second.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` or `refill_per_second` is zero.
    #[must_use]
    pub fn new(capacity: u32, refill_per_second: u32, clock: Clock) -> Self {
        let capacity = NonZeroU32::new(capacity).expect("capacity must be greater than 0");
        let refill_per_second = NonZeroU32::new(refill_per_second).expect("refill rate must be greater than 0");
        let quota = Quota::per_second(refill_per_second).allow_burst(capacity);

        Self {
            capacity,
            refill_per_second,
            bucket: governor::RateLimiter::direct_with_clock(quota, TickClock(clock)),
        }
    }

    /// Takes one token, returning `false` if the bucket is empty.
    pub fn try_take(&self) -> bool {
        self.bucket.check().is_ok()
    }

    /// Returns the maximum number of tokens the bucket holds.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity.get()
    }

    /// Returns the number of tokens regained per second.
    #[must_use]
    pub fn refill_per_second(&self) -> u32 {
        self.refill_per_second.get()
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("capacity", &self.capacity)
            .field("refill_per_second", &self.refill_per_second)
            .finish_non_exhaustive()
    }
}
