#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/rill-stream/rill/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use rill_ratelimit::Clock;
use tokio::task::JoinHandle;

/// A timer firing an async callback at fixed period boundaries.
///
/// Tick times are `k * period_ms` boundaries of the supplied clock, starting
/// at the first boundary after [`start`](Self::start) is called. The worker
/// never skips a boundary: when a tick runs long, the following ticks fire
/// immediately until the schedule catches up. The callback always receives
/// the scheduled tick time, not the time it actually ran.
pub struct RecurringTimer {
    name: &'static str,
    stopped: Arc<AtomicBool>,
    last_tick_ms: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl RecurringTimer {
    /// Starts the timer worker.
    ///
    /// `period_ms` must be positive; the first tick fires at the next
    /// multiple of the period after the current clock time.
    pub fn start<F, Fut>(
        clock: Arc<dyn Clock>,
        period_ms: u64,
        name: &'static str,
        mut callback: F,
    ) -> Self
    where
        F: FnMut(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let stopped = Arc::new(AtomicBool::new(false));
        let last_tick_ms = Arc::new(AtomicU64::new(0));

        let handle = tokio::spawn({
            let stopped = Arc::clone(&stopped);
            let last_tick_ms = Arc::clone(&last_tick_ms);
            async move {
                let mut next = (clock.now_millis() / period_ms + 1) * period_ms;
                tracing::debug!(timer = name, first_tick_ms = next, "Recurring timer started");
                loop {
                    clock.wait_until(next).await;
                    callback(next).await;
                    last_tick_ms.store(next, Ordering::Release);
                    next += period_ms;
                    // Checked after the callback so a non-interrupting stop
                    // always lets the pending tick fire once more.
                    if stopped.load(Ordering::Acquire) {
                        break;
                    }
                }
                tracing::debug!(timer = name, "Recurring timer loop exited");
            }
        });

        Self { name, stopped, last_tick_ms, handle }
    }

    /// Stops the timer and waits for the worker to exit.
    ///
    /// With `interrupt = false` the pending tick runs to completion before
    /// the worker exits; with `interrupt = true` the worker is aborted.
    /// Returns the last tick time that fired, or zero if none did.
    pub async fn stop(self, interrupt: bool) -> u64 {
        tracing::debug!(timer = self.name, interrupt, "Stopping recurring timer");
        self.stopped.store(true, Ordering::Release);
        if interrupt {
            self.handle.abort();
        }
        // A JoinError here is the abort we just requested.
        let _ = self.handle.await;
        self.last_tick_ms.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for RecurringTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecurringTimer")
            .field("name", &self.name)
            .field("stopped", &self.stopped.load(Ordering::Acquire))
            .field("last_tick_ms", &self.last_tick_ms.load(Ordering::Acquire))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rill_ratelimit::ManualClock;
    use rstest::rstest;
    use tokio::sync::mpsc;

    use super::*;

    fn ticking_timer(
        clock: &Arc<ManualClock>,
        period_ms: u64,
    ) -> (RecurringTimer, mpsc::UnboundedReceiver<u64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let timer = RecurringTimer::start(
            Arc::clone(clock) as Arc<dyn Clock>,
            period_ms,
            "test-timer",
            move |tick| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(tick);
                }
            },
        );
        (timer, rx)
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<u64>) -> u64 {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("expected a tick")
            .expect("tick channel closed")
    }

    #[rstest]
    #[case(0, 100, 100)]
    #[case(250, 100, 300)]
    #[case(300, 100, 400)]
    #[case(999, 1000, 1000)]
    fn first_tick_is_next_period_boundary(
        #[case] start_ms: u64,
        #[case] period_ms: u64,
        #[case] expected: u64,
    ) {
        assert_eq!((start_ms / period_ms + 1) * period_ms, expected);
    }

    #[tokio::test]
    async fn fires_at_period_boundaries() {
        let clock = Arc::new(ManualClock::new(0));
        let (timer, mut rx) = ticking_timer(&clock, 100);

        clock.advance(100);
        assert_eq!(recv(&mut rx).await, 100);

        clock.advance(100);
        assert_eq!(recv(&mut rx).await, 200);

        // Let the worker park for the next boundary before stopping, so the
        // stop is observed from inside the pending wait.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let stop = tokio::spawn(timer.stop(false));
        clock.advance(100);
        let last = stop.await.unwrap();
        assert_eq!(last, 300);
    }

    #[tokio::test]
    async fn late_ticks_catch_up_without_skipping() {
        let clock = Arc::new(ManualClock::new(0));
        let (timer, mut rx) = ticking_timer(&clock, 100);

        // Jump well past three boundaries at once.
        clock.advance(350);
        assert_eq!(recv(&mut rx).await, 100);
        assert_eq!(recv(&mut rx).await, 200);
        assert_eq!(recv(&mut rx).await, 300);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let stop = tokio::spawn(timer.stop(false));
        clock.advance(50);
        let last = stop.await.unwrap();
        assert_eq!(last, 400);
        assert_eq!(recv(&mut rx).await, 400);
    }

    #[tokio::test]
    async fn non_interrupting_stop_fires_pending_tick() {
        let clock = Arc::new(ManualClock::new(0));
        let (timer, mut rx) = ticking_timer(&clock, 100);

        let stop = tokio::spawn(timer.stop(false));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!stop.is_finished(), "stop must wait for the pending tick");

        clock.advance(100);
        let last = stop.await.unwrap();
        assert_eq!(last, 100);
        assert_eq!(recv(&mut rx).await, 100);
    }

    #[tokio::test]
    async fn interrupting_stop_aborts_pending_tick() {
        let clock = Arc::new(ManualClock::new(0));
        let (timer, mut rx) = ticking_timer(&clock, 100);

        // No advance: the worker is parked waiting for the first boundary.
        let last = tokio::time::timeout(Duration::from_secs(1), timer.stop(true))
            .await
            .expect("interrupting stop must not wait for the clock");
        assert_eq!(last, 0);
        assert!(rx.try_recv().is_err(), "no tick may fire after an interrupting stop");
    }
}
