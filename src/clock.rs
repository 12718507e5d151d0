// src/clock.rs
//
// Source of "now" for the engine. Production binds to wall-clock + real
// sleep (`SystemClock`); tests bind to a deterministic, test-advanced
// clock (`SimulatedClock`) so reschedule/polling scenarios don't need to
// burn real wall time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// An opaque point in time as seen by the engine, produced only by a `Clock`.
/// Stored as milliseconds since an arbitrary epoch so it can be compared,
/// ordered, and persisted without depending on `std::time::Instant`'s
/// non-constructible, non-serializable nature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_millis(ms: u64) -> Self {
        Timestamp(ms)
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    pub fn duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl std::ops::Add<Duration> for Timestamp {
    type Output = Timestamp;
    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(rhs.as_millis() as u64))
    }
}

#[async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Current time as seen by the engine.
    fn now(&self) -> Timestamp;

    /// Waits until at least `duration` has elapsed. Must resolve promptly
    /// when the underlying time source reaches the deadline; for
    /// `SimulatedClock` that means as soon as a test calls `advance`, not
    /// after any real wall time passes.
    async fn delay(&self, duration: Duration);
}

/// Production clock: wall-clock time, real async sleep.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Timestamp(ms)
    }

    async fn delay(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Deterministic clock for tests. Time only moves when `advance` is called;
/// `delay` futures resolve as soon as simulated time has crossed their
/// deadline, regardless of how much real time has elapsed.
pub struct SimulatedClock {
    now: Mutex<Timestamp>,
    notify: Notify,
}

impl SimulatedClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
            notify: Notify::new(),
        }
    }

    /// Moves simulated time forward and wakes every pending `delay`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + by;
        drop(now);
        self.notify.notify_waiters();
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new(Timestamp::ZERO)
    }
}

#[async_trait]
impl Clock for SimulatedClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap()
    }

    async fn delay(&self, duration: Duration) {
        let deadline = self.now() + duration;
        loop {
            // `notified()` alone doesn't enroll as a waiter until first
            // polled, so an `advance()` landing between the deadline check
            // and the `.await` below would otherwise be missed. `enable()`
            // registers interest immediately, before the check.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.now() >= deadline {
                return;
            }
            notified.await;
        }
    }
}
