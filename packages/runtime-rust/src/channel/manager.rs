//! Owns every channel built through it and tears them down together.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use switchyard_core::{DirectTargets, GracePeriod, VirtualTargets};
use tracing::{debug, info, warn};

use super::builder::ChannelBuilder;
use super::customizer::ChannelBuilderCustomizer;
use super::transport::Channel;
use crate::credentials::{ChannelCredentialsProvider, InsecureCredentials};
use crate::error::{ConstructionError, ShutdownError};

/// A built channel paired with the grace period it was configured with.
#[derive(Debug, Clone)]
pub(crate) struct ManagedChannel {
    pub(crate) channel: Channel,
    pub(crate) grace: GracePeriod,
}

/// Creates channel builders and tracks the channels they build.
///
/// Dropping the manager force-closes any channel not already closed by
/// [`ChannelManager::close_all`].
pub struct ChannelManager {
    targets: Arc<dyn VirtualTargets>,
    credentials: Arc<dyn ChannelCredentialsProvider>,
    customizers: Vec<Arc<dyn ChannelBuilderCustomizer>>,
    channels: Arc<Mutex<Vec<ManagedChannel>>>,
}

impl ChannelManager {
    /// Creates a manager that dials names as-is over plaintext.
    #[must_use]
    pub fn new() -> Self {
        Self {
            targets: Arc::new(DirectTargets),
            credentials: Arc::new(InsecureCredentials),
            customizers: Vec::new(),
            channels: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn with_targets(mut self, targets: Arc<dyn VirtualTargets>) -> Self {
        self.targets = targets;
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<dyn ChannelCredentialsProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Appends a customizer. Customizers run in registration order.
    #[must_use]
    pub fn with_customizer(mut self, customizer: impl ChannelBuilderCustomizer + 'static) -> Self {
        self.add_customizer(customizer);
        self
    }

    pub fn add_customizer(&mut self, customizer: impl ChannelBuilderCustomizer + 'static) {
        self.customizers.push(Arc::new(customizer));
    }

    /// Returns a builder for `name` with credentials and customizers applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::Credentials`] when the credentials
    /// provider cannot supply material for `name`.
    pub fn create_channel(&self, name: &str) -> Result<ChannelBuilder, ConstructionError> {
        let target = self.targets.target(name);
        let credentials = self.credentials.channel_credentials(name)?;
        let mut builder =
            ChannelBuilder::new(name, target, credentials, Arc::clone(&self.channels));
        for customizer in &self.customizers {
            customizer.customize(name, &mut builder);
        }
        debug!(name, target = builder.target(), "channel builder created");
        Ok(builder)
    }

    /// Number of built channels not yet closed.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    /// Closes every built channel in build order, each per its own grace period.
    ///
    /// A failing channel does not stop the rest from closing. The failures
    /// are logged and returned. Calling this again closes only channels
    /// built since the previous call.
    pub async fn close_all(&self) -> Vec<ShutdownError> {
        let entries = std::mem::take(&mut *self.channels.lock());
        if entries.is_empty() {
            return Vec::new();
        }
        info!(count = entries.len(), "closing channels");

        let mut failures = Vec::new();
        for entry in entries {
            if let Err(e) = entry.channel.close(entry.grace).await {
                warn!(target = entry.channel.target(), error = %e, "channel did not drain");
                failures.push(e);
            }
        }
        failures
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelManager")
            .field("customizers", &self.customizers.len())
            .field("channels", &self.channel_count())
            .finish_non_exhaustive()
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        for entry in self.channels.lock().drain(..) {
            entry.channel.shutdown_now();
        }
    }
}
