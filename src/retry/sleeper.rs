use crate::clock::ManualClock;
use core::fmt::Debug;
use core::time::Duration;
use std::sync::{Arc, Mutex, PoisonError};

/// Blocks the calling thread between retries.
pub trait Sleeper: Debug + Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested waits instead of blocking.
///
/// When linked to a [`ManualClock`], every wait advances that clock, so reset arithmetic
/// sees time pass exactly as it would for real.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
    clock: Option<Arc<ManualClock>>,
}

impl RecordingSleeper {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn advancing(clock: Arc<ManualClock>) -> Arc<Self> {
        Arc::new(Self {
            waits: Mutex::new(Vec::new()),
            clock: Some(clock),
        })
    }

    #[must_use]
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn total(&self) -> Duration {
        self.waits().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap_or_else(PoisonError::into_inner).push(duration);

        if let Some(clock) = &self.clock {
            clock.advance(chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX));
        }
    }
}
