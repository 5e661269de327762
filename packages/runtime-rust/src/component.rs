use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::channel::ChannelManager;
use crate::server::{ServerLifecycle, SERVER_PHASE};

// ---------------------------------------------------------------------------
// ManagedComponent trait
// ---------------------------------------------------------------------------

/// A process component with a start/stop lifecycle.
///
/// Components are started in ascending `phase()` order and stopped in
/// descending order. Equal phases keep registration order on start and
/// reverse it on stop.
#[async_trait]
pub trait ManagedComponent: Send + Sync {
    /// Returns the name used in logs.
    fn name(&self) -> &str;

    /// Ordering key. Lower phases start first and stop last.
    fn phase(&self) -> i32 {
        0
    }

    async fn start(&self) -> anyhow::Result<()>;

    async fn stop(&self) -> anyhow::Result<()>;

    fn is_running(&self) -> bool;
}

#[async_trait]
impl ManagedComponent for ServerLifecycle {
    fn name(&self) -> &str {
        "rpc-server"
    }

    fn phase(&self) -> i32 {
        SERVER_PHASE
    }

    async fn start(&self) -> anyhow::Result<()> {
        ServerLifecycle::start(self).await?;
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        ServerLifecycle::stop(self).await;
        Ok(())
    }

    fn is_running(&self) -> bool {
        ServerLifecycle::is_running(self)
    }
}

/// Channels have nothing to start; stopping closes every built channel.
/// The lowest phase keeps them open until every other component has stopped.
#[async_trait]
impl ManagedComponent for ChannelManager {
    fn name(&self) -> &str {
        "channels"
    }

    fn phase(&self) -> i32 {
        i32::MIN
    }

    async fn start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let failures = self.close_all().await;
        if let Some(first) = failures.into_iter().next() {
            return Err(first.into());
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.channel_count() > 0
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Ordered set of lifecycle-managed components.
pub struct ComponentRegistry {
    components: RwLock<Vec<Arc<dyn ManagedComponent>>>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            components: RwLock::new(Vec::new()),
        }
    }

    pub fn register(&self, component: Arc<dyn ManagedComponent>) {
        self.components.write().push(component);
    }

    /// Components sorted by ascending phase, ties in registration order.
    fn ordered(&self) -> Vec<Arc<dyn ManagedComponent>> {
        let mut ordered = self.components.read().clone();
        ordered.sort_by_key(|component| component.phase());
        ordered
    }

    /// Starts every component in ascending phase order.
    ///
    /// # Errors
    ///
    /// Returns the first start failure. Components after it are not started.
    pub async fn start_all(&self) -> anyhow::Result<()> {
        for component in self.ordered() {
            info!(component = component.name(), phase = component.phase(), "starting");
            component.start().await?;
        }
        Ok(())
    }

    /// Stops every component in descending phase order.
    ///
    /// A failing component does not prevent the rest from stopping.
    ///
    /// # Errors
    ///
    /// Returns the first stop failure after every component was attempted.
    pub async fn stop_all(&self) -> anyhow::Result<()> {
        let mut first_failure = None;
        for component in self.ordered().into_iter().rev() {
            info!(component = component.name(), phase = component.phase(), "stopping");
            if let Err(e) = component.stop().await {
                warn!(component = component.name(), error = %e, "stop failed");
                first_failure.get_or_insert(e);
            }
        }
        first_failure.map_or(Ok(()), Err)
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
