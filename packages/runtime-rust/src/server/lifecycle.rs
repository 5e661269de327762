//! Server lifecycle: `Idle -> Running -> Stopping -> Terminated`.
//!
//! `start()` builds the server through the factory, binds it, publishes
//! `Started`, and spawns a watcher that waits for the server to terminate.
//! `stop()` publishes `ShutdownInitiated`, drains per the grace period,
//! forces termination, and publishes `Terminated`.
//!
//! The server slot is a `parking_lot` mutex that is never held across an
//! `.await`; transitions are serialized by a separate async mutex.

use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use switchyard_core::GracePeriod;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::factory::ServerFactory;
use super::transport::ServerHandle;
use crate::error::StartError;
use crate::events::{LifecycleEventSink, LoggingEventSink, ServerLifecycleEvent};

/// Phase reported by [`ServerLifecycle`]: starts after, and stops before,
/// every other component.
pub const SERVER_PHASE: i32 = i32::MAX;

/// Lifecycle state of a [`ServerLifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerLifecycleState {
    Idle,
    Running,
    Stopping,
    Terminated,
}

/// Owns one server from first start to final stop. Cannot be restarted.
pub struct ServerLifecycle {
    factory: ServerFactory,
    grace: GracePeriod,
    events: Arc<dyn LifecycleEventSink>,
    state: ArcSwap<ServerLifecycleState>,
    server: Mutex<Option<ServerHandle>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    watcher_cancel: CancellationToken,
    interrupt: CancellationToken,
    transition: tokio::sync::Mutex<()>,
}

impl ServerLifecycle {
    /// Creates an idle lifecycle using the factory's configured grace period.
    #[must_use]
    pub fn new(factory: ServerFactory) -> Self {
        let grace = factory.config().shutdown_grace_period;
        Self {
            factory,
            grace,
            events: Arc::new(LoggingEventSink),
            state: ArcSwap::from_pointee(ServerLifecycleState::Idle),
            server: Mutex::new(None),
            watcher: Mutex::new(None),
            watcher_cancel: CancellationToken::new(),
            interrupt: CancellationToken::new(),
            transition: tokio::sync::Mutex::new(()),
        }
    }

    /// Replaces the event sink. Defaults to [`LoggingEventSink`].
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn LifecycleEventSink>) -> Self {
        self.events = events;
        self
    }

    /// Overrides the grace period taken from the server config.
    #[must_use]
    pub fn with_grace_period(mut self, grace: GracePeriod) -> Self {
        self.grace = grace;
        self
    }

    #[must_use]
    pub fn state(&self) -> ServerLifecycleState {
        **self.state.load()
    }

    #[must_use]
    pub fn phase(&self) -> i32 {
        SERVER_PHASE
    }

    /// Token that, once cancelled, cuts any drain wait in `stop()` short.
    ///
    /// The token stays cancelled.
    #[must_use]
    pub fn interrupt_token(&self) -> CancellationToken {
        self.interrupt.clone()
    }

    /// The bound socket address while a server exists.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.lock().as_ref().map(ServerHandle::local_addr)
    }

    /// Whether a server exists and has not begun shutting down.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.server
            .lock()
            .as_ref()
            .is_some_and(|server| !server.is_shutdown())
    }

    /// Builds, binds, and starts the server.
    ///
    /// A no-op while already running.
    ///
    /// # Errors
    ///
    /// - [`StartError::Construction`] when the factory cannot build the server
    /// - [`StartError::Bind`] when the listen address cannot be bound
    /// - [`StartError::Terminated`] after the lifecycle has been stopped
    pub async fn start(&self) -> Result<(), StartError> {
        let _transition = self.transition.lock().await;
        match self.state() {
            ServerLifecycleState::Idle => {}
            ServerLifecycleState::Running | ServerLifecycleState::Stopping => return Ok(()),
            ServerLifecycleState::Terminated => return Err(StartError::Terminated),
        }

        let server = self.factory.create_server()?;
        let handle = server.start().await?;
        let address = self.factory.config().address.clone();
        let port = handle.port();

        let terminated = handle.terminated();
        let cancel = self.watcher_cancel.clone();
        let watcher = tokio::spawn(async move {
            tokio::select! {
                () = terminated => debug!("server termination observed"),
                () = cancel.cancelled() => {}
            }
        });

        *self.server.lock() = Some(handle);
        *self.watcher.lock() = Some(watcher);
        self.state.store(Arc::new(ServerLifecycleState::Running));
        info!(%address, port, "server lifecycle started");
        self.events.publish(ServerLifecycleEvent::Started { address, port });
        Ok(())
    }

    /// Drains and terminates the server. A no-op unless running.
    ///
    /// Blocks for up to the grace period while calls drain: zero forces
    /// termination at once, a negative period waits until every call has
    /// finished. Cancelling [`ServerLifecycle::interrupt_token`] ends the
    /// wait early.
    pub async fn stop(&self) {
        let _transition = self.transition.lock().await;
        if self.state() != ServerLifecycleState::Running {
            return;
        }
        let Some(server) = self.server.lock().clone() else {
            return;
        };

        self.state.store(Arc::new(ServerLifecycleState::Stopping));
        self.events.publish(ServerLifecycleEvent::ShutdownInitiated);
        debug!(
            grace = %self.grace,
            in_flight = server.in_flight_count(),
            "server shutdown initiated"
        );
        server.shutdown();

        let wait = match self.grace {
            GracePeriod::Immediate => None,
            GracePeriod::Bounded(timeout) => Some(Some(timeout)),
            GracePeriod::Unbounded => Some(None),
        };
        if let Some(timeout) = wait {
            tokio::select! {
                drained = server.await_termination(timeout) => {
                    if !drained {
                        warn!(
                            in_flight = server.in_flight_count(),
                            "grace period expired; forcing termination"
                        );
                    }
                }
                () = self.interrupt.cancelled() => {
                    warn!("interrupted while draining; forcing termination");
                }
            }
        }

        server.shutdown_now().await;
        self.watcher_cancel.cancel();
        let watcher = self.watcher.lock().take();
        if let Some(watcher) = watcher {
            let _ = watcher.await;
        }

        *self.server.lock() = None;
        self.state.store(Arc::new(ServerLifecycleState::Terminated));
        self.events.publish(ServerLifecycleEvent::Terminated);
        info!("server lifecycle stopped");
    }
}

impl std::fmt::Debug for ServerLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerLifecycle")
            .field("state", &self.state())
            .field("grace", &self.grace)
            .field("server", &*self.server.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::server::config::ServerConfig;

    fn lifecycle() -> ServerLifecycle {
        ServerLifecycle::new(ServerFactory::new(ServerConfig::with_address("127.0.0.1:0")))
    }

    #[test]
    fn starts_idle_with_maximal_phase() {
        let lifecycle = lifecycle();
        assert_eq!(lifecycle.state(), ServerLifecycleState::Idle);
        assert_eq!(lifecycle.phase(), i32::MAX);
        assert!(!lifecycle.is_running());
        assert!(lifecycle.local_addr().is_none());
    }

    #[test]
    fn grace_period_comes_from_config() {
        let mut config = ServerConfig::with_address("127.0.0.1:0");
        config.shutdown_grace_period = GracePeriod::Immediate;
        let lifecycle = ServerLifecycle::new(ServerFactory::new(config));
        assert_eq!(lifecycle.grace, GracePeriod::Immediate);
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_is_terminal() {
        let lifecycle =
            lifecycle().with_grace_period(GracePeriod::Bounded(Duration::from_secs(1)));
        lifecycle.start().await.unwrap();
        let addr = lifecycle.local_addr().unwrap();
        lifecycle.start().await.unwrap();
        assert_eq!(lifecycle.local_addr(), Some(addr));
        assert!(lifecycle.is_running());

        lifecycle.stop().await;
        assert_eq!(lifecycle.state(), ServerLifecycleState::Terminated);
        assert!(!lifecycle.is_running());
        assert!(lifecycle.local_addr().is_none());

        assert!(matches!(lifecycle.start().await, Err(StartError::Terminated)));
        lifecycle.stop().await;
    }

    #[tokio::test]
    async fn stop_before_start_is_a_no_op() {
        let lifecycle = lifecycle();
        lifecycle.stop().await;
        assert_eq!(lifecycle.state(), ServerLifecycleState::Idle);
    }

    #[tokio::test]
    async fn bind_failure_leaves_lifecycle_idle() {
        let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = occupied.local_addr().unwrap().port();
        let lifecycle = ServerLifecycle::new(ServerFactory::new(ServerConfig::with_address(
            format!("127.0.0.1:{port}"),
        )));
        assert!(matches!(lifecycle.start().await, Err(StartError::Bind { .. })));
        assert_eq!(lifecycle.state(), ServerLifecycleState::Idle);
    }
}
