//! Time sources for the ether
//!
//! The ether never reads time directly; it asks its [`Clock`] for "now" and
//! for a future that resolves once a deadline has passed. [`TokioClock`]
//! follows tokio's clock (which tests may pause and auto-advance), while
//! [`ManualClock`] only moves when told to.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::time::Instant;

/// A source of the current time and of wake-ups
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Resolve once `now() >= deadline`
    fn sleep_until(&self, deadline: Instant) -> BoxFuture<'static, ()>;
}

/// Wall-clock time via the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant) -> BoxFuture<'static, ()> {
        tokio::time::sleep_until(deadline).boxed()
    }
}

/// A virtual clock advanced explicitly by the test driving it
///
/// Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<watch::Sender<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        let (now, _) = watch::channel(start);
        Self { now: Arc::new(now) }
    }

    /// Move time forward, waking any sleeper whose deadline has been reached
    pub fn advance(&self, by: Duration) {
        self.now.send_modify(|now| *now += by);
    }

    /// Jump to `instant`; moving backwards is ignored
    pub fn set(&self, instant: Instant) {
        self.now.send_if_modified(|now| {
            if instant > *now {
                *now = instant;
                true
            } else {
                false
            }
        });
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.borrow()
    }

    fn sleep_until(&self, deadline: Instant) -> BoxFuture<'static, ()> {
        let mut now = self.now.subscribe();
        async move {
            loop {
                let reached = *now.borrow_and_update() >= deadline;
                if reached {
                    return;
                }
                if now.changed().await.is_err() {
                    // Time can no longer move
                    futures::future::pending::<()>().await;
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_only_moves_forward() {
        let clock = ManualClock::new();
        let start = clock.now();

        clock.advance(Duration::from_millis(10));
        assert_eq!(clock.now(), start + Duration::from_millis(10));

        clock.set(start);
        assert_eq!(clock.now(), start + Duration::from_millis(10));

        let shared = clock.clone();
        shared.advance(Duration::from_millis(5));
        assert_eq!(clock.now(), start + Duration::from_millis(15));
    }

    #[tokio::test]
    async fn test_manual_sleep_wakes_at_deadline() {
        let clock = ManualClock::new();
        let deadline = clock.now() + Duration::from_millis(50);
        let mut sleep = clock.sleep_until(deadline);

        assert!((&mut sleep).now_or_never().is_none());
        clock.advance(Duration::from_millis(49));
        assert!((&mut sleep).now_or_never().is_none());
        clock.advance(Duration::from_millis(1));
        assert!(sleep.now_or_never().is_some());
    }

    #[tokio::test]
    async fn test_past_deadline_is_immediate() {
        let clock = ManualClock::new();
        let deadline = clock.now();
        assert!(clock.sleep_until(deadline).now_or_never().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_sleeps() {
        let clock = TokioClock;
        let start = clock.now();
        clock.sleep_until(start + Duration::from_secs(5)).await;
        assert!(clock.now() >= start + Duration::from_secs(5));
    }
}
