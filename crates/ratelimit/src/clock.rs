//! Clock abstraction used by the limiter and the roll timer.

use std::{
    sync::Mutex,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use tokio::sync::Notify;

/// Monotonic millisecond clock.
///
/// Implementations supply the current time and a way to suspend the caller
/// until a given clock time is reached. Time must never go backwards.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the clock's epoch.
    fn now_millis(&self) -> u64;

    /// Suspends the caller until the clock reaches `deadline_ms`.
    ///
    /// Returns immediately if the deadline is already past.
    async fn wait_until(&self, deadline_ms: u64);
}

/// Wall-clock implementation backed by [`SystemTime`] and tokio sleeps.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }

    async fn wait_until(&self, deadline_ms: u64) {
        // Sleep in a re-check loop: tokio's timer can wake marginally early.
        loop {
            let now = self.now_millis();
            if now >= deadline_ms {
                return;
            }
            tokio::time::sleep(Duration::from_millis(deadline_ms - now)).await;
        }
    }
}

/// Manually advanced clock for tests and deterministic simulation.
///
/// `advance`/`set` wake every task parked in [`Clock::wait_until`], which
/// then re-checks its deadline against the new time.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: Mutex<u64>,
    changed: Notify,
}

impl ManualClock {
    /// Creates a manual clock starting at the given time.
    pub fn new(now_ms: u64) -> Self {
        Self { now_ms: Mutex::new(now_ms), changed: Notify::new() }
    }

    /// Sets the current time.
    pub fn set(&self, now_ms: u64) {
        *self.now_ms.lock().unwrap() = now_ms;
        self.changed.notify_waiters();
    }

    /// Advances the current time by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) {
        {
            let mut guard = self.now_ms.lock().unwrap();
            *guard += delta_ms;
        }
        self.changed.notify_waiters();
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        *self.now_ms.lock().unwrap()
    }

    async fn wait_until(&self, deadline_ms: u64) {
        loop {
            // Register for wakeups before the check so an advance between the
            // check and the await is not lost.
            let notified = self.changed.notified();
            if self.now_millis() >= deadline_ms {
                return;
            }
            notified.await;
        }
    }
}
