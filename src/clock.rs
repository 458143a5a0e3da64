use std::time::Duration;

#[cfg(target_os = "linux")]
use libc::CLOCK_MONOTONIC_RAW as PROBE_CLOCK;
#[cfg(not(target_os = "linux"))]
use libc::CLOCK_MONOTONIC as PROBE_CLOCK;

/// Source of timestamps for attempt timing and pacing.
pub trait Clock {
    /// Monotonic time since an arbitrary, fixed epoch.
    fn now(&self) -> Duration;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        // Only fails for an unknown clock id or a bad pointer; neither applies here.
        let rc = unsafe { libc::clock_gettime(PROBE_CLOCK, &mut ts) };
        debug_assert_eq!(rc, 0, "clock_gettime failed");
        Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
    }
}

#[cfg(test)]
pub use manual::ManualClock;
