//! Monotonic time source for the benchmark.

use std::time::Duration;

use nix::time::{ClockId, clock_gettime};

use crate::error::{Error, Result};

/// Source of monotonic timestamps.
///
/// Timestamps are offsets from an arbitrary fixed origin; only their
/// difference is meaningful.
pub trait Clock {
    fn now(&self) -> Result<Duration>;
}

/// `CLOCK_MONOTONIC`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Result<Duration> {
        let ts = clock_gettime(ClockId::CLOCK_MONOTONIC)
            .map_err(|errno| Error::Timing(format!("can't read monotonic clock: {}", errno)))?;
        let secs = u64::try_from(ts.tv_sec())
            .map_err(|_| Error::Timing(format!("negative clock value {}s", ts.tv_sec())))?;
        Ok(Duration::new(secs, ts.tv_nsec() as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_does_not_go_back() {
        let clock = MonotonicClock;
        let a = clock.now().unwrap();
        let b = clock.now().unwrap();
        assert!(b >= a);
    }
}
