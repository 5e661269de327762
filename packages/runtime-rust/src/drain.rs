//! Admission control and drain tracking for calls in flight.
//!
//! Shared by the server (inbound calls) and by channels (outbound calls).
//! State lives in an `ArcSwap` so hot-path admission never takes a lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;

/// Poll interval while waiting for in-flight calls to finish.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Serving state: `Starting -> Serving -> Draining -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServingState {
    /// Constructed but not yet accepting calls.
    Starting,
    /// Accepting calls.
    Serving,
    /// Rejecting new calls while in-flight calls finish.
    Draining,
    /// No calls remain.
    Stopped,
}

/// Gates new calls and counts the ones in flight.
#[derive(Debug)]
pub struct DrainController {
    drain_signal: watch::Sender<bool>,
    in_flight: Arc<AtomicU64>,
    state: Arc<ArcSwap<ServingState>>,
}

impl DrainController {
    /// Creates a controller in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            drain_signal: tx,
            in_flight: Arc::new(AtomicU64::new(0)),
            state: Arc::new(ArcSwap::from_pointee(ServingState::Starting)),
        }
    }

    /// Opens admission.
    pub fn set_serving(&self) {
        self.state.store(Arc::new(ServingState::Serving));
    }

    /// Returns a receiver that flips to `true` once draining begins.
    #[must_use]
    pub fn drain_receiver(&self) -> watch::Receiver<bool> {
        self.drain_signal.subscribe()
    }

    /// Closes admission and notifies drain receivers.
    ///
    /// Calling this again is harmless. A controller that already reached
    /// `Stopped` stays there.
    pub fn begin_drain(&self) {
        if self.state() != ServingState::Stopped {
            self.state.store(Arc::new(ServingState::Draining));
        }
        self.drain_signal.send_replace(true);
    }

    /// Marks the controller stopped regardless of in-flight calls.
    pub fn mark_stopped(&self) {
        self.state.store(Arc::new(ServingState::Stopped));
        self.drain_signal.send_replace(true);
    }

    #[must_use]
    pub fn state(&self) -> ServingState {
        **self.state.load()
    }

    /// Whether admission has been closed.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        matches!(self.state(), ServingState::Draining | ServingState::Stopped)
    }

    /// Admits one call, returning a guard that counts it until dropped.
    ///
    /// Returns `None` unless the controller is `Serving`. The counter is
    /// bumped before the state is checked so a concurrent drain always
    /// observes admitted calls.
    #[must_use]
    pub fn admit(&self) -> Option<CallGuard> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let guard = CallGuard {
            in_flight: Arc::clone(&self.in_flight),
        };
        (self.state() == ServingState::Serving).then_some(guard)
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Waits for in-flight calls to reach zero.
    ///
    /// `None` waits without bound. Returns `true` and moves to `Stopped`
    /// once drained; returns `false` if `timeout` expired first, leaving
    /// the state untouched.
    pub async fn wait_for_drain(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|timeout| tokio::time::Instant::now() + timeout);

        loop {
            if self.in_flight.load(Ordering::Acquire) == 0 {
                self.state.store(Arc::new(ServingState::Stopped));
                return true;
            }

            if deadline.is_some_and(|deadline| tokio::time::Instant::now() >= deadline) {
                return false;
            }

            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }
}

impl Default for DrainController {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter on drop, including during unwinding.
#[derive(Debug)]
pub struct CallGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed_to_admission() {
        let controller = DrainController::new();
        assert_eq!(controller.state(), ServingState::Starting);
        assert!(controller.admit().is_none());
        assert_eq!(controller.in_flight_count(), 0);
    }

    #[test]
    fn admission_counts_until_guard_drops() {
        let controller = DrainController::new();
        controller.set_serving();

        let first = controller.admit().unwrap();
        let second = controller.admit().unwrap();
        assert_eq!(controller.in_flight_count(), 2);

        drop(first);
        assert_eq!(controller.in_flight_count(), 1);
        drop(second);
        assert_eq!(controller.in_flight_count(), 0);
    }

    #[test]
    fn draining_rejects_new_calls() {
        let controller = DrainController::new();
        controller.set_serving();
        controller.begin_drain();
        assert!(controller.is_draining());
        assert!(controller.admit().is_none());
        assert_eq!(controller.in_flight_count(), 0);
    }

    #[test]
    fn stopped_is_terminal_for_begin_drain() {
        let controller = DrainController::new();
        controller.mark_stopped();
        controller.begin_drain();
        assert_eq!(controller.state(), ServingState::Stopped);
    }

    #[tokio::test]
    async fn drain_receiver_notified() {
        let controller = DrainController::new();
        let mut rx = controller.drain_receiver();
        assert!(!*rx.borrow());

        controller.begin_drain();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn drain_completes_when_guards_drop() {
        let controller = DrainController::new();
        controller.set_serving();
        let guard = controller.admit().unwrap();
        controller.begin_drain();

        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });

        assert!(controller.wait_for_drain(Some(Duration::from_secs(2))).await);
        assert_eq!(controller.state(), ServingState::Stopped);
        release.await.unwrap();
    }

    #[tokio::test]
    async fn unbounded_drain_waits_for_last_call() {
        let controller = DrainController::new();
        controller.set_serving();
        let guard = controller.admit().unwrap();
        controller.begin_drain();

        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            drop(guard);
        });

        assert!(controller.wait_for_drain(None).await);
        assert_eq!(controller.in_flight_count(), 0);
        release.await.unwrap();
    }

    #[tokio::test]
    async fn bounded_drain_times_out() {
        let controller = DrainController::new();
        controller.set_serving();
        let _guard = controller.admit().unwrap();
        controller.begin_drain();

        assert!(!controller.wait_for_drain(Some(Duration::from_millis(50))).await);
        assert_eq!(controller.state(), ServingState::Draining);
    }
}
