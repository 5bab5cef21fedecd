//! Bounded, cancellable polling for blocking moves.
//!
//! A waiting `home` or `move_to` polls the raw position at a fixed cadence.
//! [`Poller`] bounds that loop with a deadline and lets another task abort it
//! through a [`CancelHandle`]; the session turns the outcome into
//! `HomingTimeout`, `MoveTimeout` or `Cancelled`.
//!
//! Cancellation is a `tokio::sync::watch` flag shared between the session's
//! [`CancelToken`] and any number of handles.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Timing of waiting operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    /// Delay between two position polls
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Upper bound for a waiting `home`
    #[serde(with = "humantime_serde")]
    pub homing_timeout: Duration,
    /// Upper bound for a waiting profiled move
    #[serde(with = "humantime_serde")]
    pub move_timeout: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            homing_timeout: Duration::from_secs(120),
            move_timeout: Duration::from_secs(600),
        }
    }
}

/// Handle used by another task to abort a wait in progress.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Abort the wait currently running on the session.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
        tracing::debug!("Wait cancellation requested");
    }
}

/// Receiving side of the cancel flag, owned by the session.
#[derive(Debug)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Create a fresh, un-cancelled token.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// A handle that cancels waits on this token.
    pub fn handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.tx),
        }
    }

    /// Whether cancellation is currently requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Withdraw any pending cancellation.
    pub fn reset(&mut self) {
        self.tx.send_replace(false);
        self.rx.borrow_and_update();
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Poll again
    Continue,
    /// Deadline passed
    TimedOut,
    /// Cancellation requested
    Cancelled,
}

/// Drives one bounded wait.
pub struct Poller<'a> {
    interval: Duration,
    timeout: Duration,
    deadline: Instant,
    cancel: &'a mut CancelToken,
    polls: u64,
}

impl<'a> Poller<'a> {
    /// Start a wait. A cancellation already pending on `cancel` ends it at
    /// the first tick.
    pub fn start(interval: Duration, timeout: Duration, cancel: &'a mut CancelToken) -> Self {
        Self {
            interval,
            timeout,
            deadline: Instant::now() + timeout,
            cancel,
            polls: 0,
        }
    }

    /// The bound this poller enforces.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of completed ticks.
    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// Sleep one interval, waking early on cancellation.
    pub async fn tick(&mut self) -> Tick {
        if self.cancel.is_cancelled() {
            return Tick::Cancelled;
        }
        if Instant::now() >= self.deadline {
            return Tick::TimedOut;
        }

        tokio::select! {
            _ = tokio::time::sleep(self.interval) => {}
            changed = self.cancel.rx.changed() => {
                if changed.is_ok() && *self.cancel.rx.borrow_and_update() {
                    return Tick::Cancelled;
                }
            }
        }
        self.polls += 1;

        if Instant::now() >= self.deadline {
            Tick::TimedOut
        } else {
            Tick::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_poller_times_out() {
        let mut token = CancelToken::new();
        let mut poller = Poller::start(
            Duration::from_millis(100),
            Duration::from_millis(350),
            &mut token,
        );

        let mut ticks = Vec::new();
        loop {
            let tick = poller.tick().await;
            ticks.push(tick);
            if tick != Tick::Continue {
                break;
            }
        }
        assert_eq!(ticks.last(), Some(&Tick::TimedOut));
        assert_eq!(poller.polls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_sleep() {
        let mut token = CancelToken::new();
        let handle = token.handle();
        let mut poller = Poller::start(
            Duration::from_secs(10),
            Duration::from_secs(3600),
            &mut token,
        );

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            handle.cancel();
        });

        assert_eq!(poller.tick().await, Tick::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_cancel_ends_first_tick() {
        let mut token = CancelToken::new();
        token.handle().cancel();
        assert!(token.is_cancelled());

        let mut poller = Poller::start(
            Duration::from_millis(10),
            Duration::from_secs(1),
            &mut token,
        );
        assert_eq!(poller.tick().await, Tick::Cancelled);
        assert_eq!(poller.polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_withdraws_cancel() {
        let mut token = CancelToken::new();
        token.handle().cancel();
        token.reset();
        assert!(!token.is_cancelled());

        let mut poller = Poller::start(
            Duration::from_millis(10),
            Duration::from_secs(1),
            &mut token,
        );
        assert_eq!(poller.tick().await, Tick::Continue);
    }
}
