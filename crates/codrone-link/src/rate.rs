use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovRateLimiter,
};

use crate::config::DEFAULT_MIN_INTERVAL;

type DirectLimiter = GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Spaces permits at least `min_interval` apart across all threads.
///
/// Backed by a GCRA bucket with a burst of one. A zero interval disables
/// limiting.
pub struct RateLimiter {
    min_interval: Duration,
    bucket: Option<DirectLimiter>,
    clock: DefaultClock,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("min_interval", &self.min_interval)
            .finish_non_exhaustive()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        // `with_period` allows a burst of one cell.
        let bucket = Quota::with_period(min_interval).map(DirectLimiter::direct);
        Self {
            min_interval,
            bucket,
            clock: DefaultClock::default(),
        }
    }

    /// Limiter allowing `rate` permits per second. A non-positive rate
    /// disables limiting.
    pub fn per_second(rate: f64) -> Self {
        if rate.is_finite() && rate > 0.0 {
            Self::new(Duration::from_secs_f64(1.0 / rate))
        } else {
            Self::new(Duration::ZERO)
        }
    }

    /// Block until a permit is available. Returns when it was granted.
    pub fn acquire(&self) -> Instant {
        let Some(bucket) = &self.bucket else {
            return Instant::now();
        };
        loop {
            match bucket.check() {
                Ok(()) => return Instant::now(),
                Err(not_until) => thread::sleep(not_until.wait_time_from(self.clock.now())),
            }
        }
    }

    /// Take a permit only if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.bucket
            .as_ref()
            .map_or(true, |bucket| bucket.check().is_ok())
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    // The bucket runs on its own clock; grants read back through `Instant`
    // may land a hair early.
    const SLACK: Duration = Duration::from_millis(1);

    #[test]
    fn first_acquire_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        let start = Instant::now();
        limiter.acquire();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn sequential_acquires_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(30));
        let a = limiter.acquire();
        let b = limiter.acquire();
        let c = limiter.acquire();

        assert!(b - a + SLACK >= Duration::from_millis(30));
        assert!(c - b + SLACK >= Duration::from_millis(30));
    }

    #[test]
    fn concurrent_callers_never_bypass_interval() {
        let interval = Duration::from_millis(20);
        let limiter = Arc::new(RateLimiter::new(interval));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || (0..3).map(|_| limiter.acquire()).collect::<Vec<_>>())
            })
            .collect();

        let mut grants: Vec<Instant> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        grants.sort();

        assert_eq!(grants.len(), 12);
        for pair in grants.windows(2) {
            assert!(pair[1] - pair[0] + SLACK >= interval, "gap {:?}", pair[1] - pair[0]);
        }
    }

    #[test]
    fn try_acquire_respects_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        thread::sleep(Duration::from_millis(60));
        assert!(limiter.try_acquire());
    }

    #[test]
    fn zero_interval_never_blocks() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..100 {
            assert!(limiter.try_acquire());
            limiter.acquire();
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn per_second_interval() {
        assert_eq!(
            RateLimiter::per_second(4.0).min_interval(),
            Duration::from_millis(250)
        );
        assert_eq!(RateLimiter::per_second(0.0).min_interval(), Duration::ZERO);
        assert_eq!(
            RateLimiter::default().min_interval(),
            Duration::from_millis(60)
        );
    }
}
