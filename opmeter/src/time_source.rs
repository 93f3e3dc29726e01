//! Abstract nanosecond clock, injectable for deterministic tests.

use std::sync::Arc;
use std::time::Instant;

/// A monotonic nanosecond clock.
///
/// The production implementation reads [`Instant::now`]. Tests inject a
/// deterministic source via [`Meter::with_time_source`](crate::Meter::with_time_source)
/// before the meter is started; no other method may suspend or otherwise
/// take time.
pub trait TimeSource: Send + Sync {
    /// Returns a monotonically non-decreasing nanosecond timestamp.
    fn now_nanos(&self) -> u64;
}

/// The default, production [`TimeSource`] backed by [`Instant`].
#[derive(Debug, Default)]
pub struct SystemTimeSource {
    epoch: once_cell::sync::OnceCell<Instant>,
}

impl TimeSource for SystemTimeSource {
    fn now_nanos(&self) -> u64 {
        let epoch = self.epoch.get_or_init(Instant::now);
        epoch.elapsed().as_nanos() as u64
    }
}

pub(crate) fn system() -> Arc<dyn TimeSource> {
    Arc::new(SystemTimeSource::default())
}

/// A [`TimeSource`] that returns a fixed, caller-controlled sequence of
/// values, used to make end-to-end scenarios deterministic in tests.
#[cfg(any(test, feature = "testing"))]
pub struct FixedTimeSource {
    values: parking_lot::Mutex<std::collections::VecDeque<u64>>,
    last: std::sync::atomic::AtomicU64,
}

#[cfg(any(test, feature = "testing"))]
impl FixedTimeSource {
    /// Builds a time source that yields `values` in order on successive
    /// calls to `now_nanos`, then repeats the final value forever.
    pub fn new(values: impl IntoIterator<Item = u64>) -> Self {
        Self {
            values: parking_lot::Mutex::new(values.into_iter().collect()),
            last: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

#[cfg(any(test, feature = "testing"))]
impl TimeSource for FixedTimeSource {
    fn now_nanos(&self) -> u64 {
        let mut values = self.values.lock();
        let next = values.pop_front().unwrap_or_else(|| {
            self.last.load(std::sync::atomic::Ordering::Relaxed)
        });
        self.last.store(next, std::sync::atomic::Ordering::Relaxed);
        next
    }
}
