// src/clock.rs

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Time source abstraction.
///
/// Everything downstream of the scheduler is a pure function of configuration
/// plus the instants observed through this trait, which is what lets every
/// node in the fleet agree on proposer eligibility:
/// - `SystemClock` for running nodes
/// - `FixedClock` for deterministic tests and simulations
pub trait Clock: Send + Sync {
    /// Current instant according to this clock.
    fn now(&self) -> SystemTime;
}

/// Wall clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Clock pinned to a programmed instant.
///
/// `now` returns the pinned instant until `set` or `advance` moves it.
/// Concurrent reads are allowed; the pin sits behind a mutex so the double
/// satisfies the same `Send + Sync` bound as the wall clock.
#[derive(Debug)]
pub struct FixedClock {
    at: Mutex<SystemTime>,
}

impl FixedClock {
    pub fn new(at: SystemTime) -> Self {
        Self { at: Mutex::new(at) }
    }

    /// Pin to `secs` seconds and `nanos` nanoseconds past the unix epoch.
    pub fn at_unix(secs: u64, nanos: u32) -> Self {
        Self::new(UNIX_EPOCH + Duration::new(secs, nanos))
    }

    pub fn set(&self, at: SystemTime) {
        *self.at.lock().unwrap() = at;
    }

    /// Move the pinned instant forward by `step`.
    pub fn advance(&self, step: Duration) {
        let mut at = self.at.lock().unwrap();
        *at += step;
    }
}

impl Clock for FixedClock {
    #[inline]
    fn now(&self) -> SystemTime {
        *self.at.lock().unwrap()
    }
}
