//! Registry of named endpoint configs plus the two shared templates.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::endpoint::EndpointConfig;
use crate::placeholder::{self, EnvPlaceholders, PlaceholderSource};
use crate::target::{self, VirtualTargets};

/// Reserved name that always resolves to the default channel.
pub const DEFAULT_CHANNEL: &str = "default";

fn env_placeholders() -> Arc<dyn PlaceholderSource> {
    Arc::new(EnvPlaceholders)
}

/// Client-side configuration surface: named channels, the default channel
/// template, and the global channel defaults.
///
/// The default channel is the template for any name without its own entry.
/// The channel defaults are overlaid onto every resolved config whose
/// `inherit_defaults` flag is set.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClientRegistry {
    /// Channels configured by name.
    pub channels: HashMap<String, EndpointConfig>,
    /// Template for unnamed channels and the `"default"` channel itself.
    pub default_channel: EndpointConfig,
    /// Values overlaid onto channels that opt into inheritance.
    pub channel_defaults: EndpointConfig,
    #[serde(skip, default = "env_placeholders")]
    placeholders: Arc<dyn PlaceholderSource>,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self {
            channels: HashMap::new(),
            default_channel: EndpointConfig::default(),
            channel_defaults: EndpointConfig::default(),
            placeholders: env_placeholders(),
        }
    }
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("channels", &self.channels)
            .field("default_channel", &self.default_channel)
            .field("channel_defaults", &self.channel_defaults)
            .finish_non_exhaustive()
    }
}

impl ClientRegistry {
    /// Creates an empty registry that expands placeholders from the environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the placeholder source used by [`ClientRegistry::target`].
    #[must_use]
    pub fn with_placeholders(mut self, source: Arc<dyn PlaceholderSource>) -> Self {
        self.placeholders = source;
        self
    }

    /// Registers (or replaces) a named channel.
    pub fn insert(&mut self, name: impl Into<String>, config: EndpointConfig) {
        self.channels.insert(name.into(), config);
    }

    /// Returns the resolved config for `name`.
    ///
    /// Precedence:
    /// 1. `"default"` resolves the default channel against the channel defaults.
    /// 2. A registered name resolves its own entry against the channel defaults.
    /// 3. Any other name copies the default channel, resolves it, and takes an
    ///    address synthesized from the name.
    #[must_use]
    pub fn endpoint(&self, name: &str) -> EndpointConfig {
        if name == DEFAULT_CHANNEL {
            let mut config = self.default_channel.clone();
            config.inherit_from(&self.channel_defaults);
            return config;
        }
        if let Some(named) = self.channels.get(name) {
            let mut config = named.clone();
            config.inherit_from(&self.channel_defaults);
            return config;
        }
        let mut config = self.default_channel.clone();
        config.inherit_from(&self.channel_defaults);
        config.address = target::synthesize_address(name, &self.default_channel.address);
        config
    }

    /// Resolves `name` to the address handed to the transport.
    ///
    /// An address that is itself a bare name is resolved with the same rule
    /// as a top-level name: registered names are followed, anything else
    /// falls back to the default channel's address. Cycles stop at the first
    /// repeat. The scheme is normalized before placeholders are expanded.
    #[must_use]
    pub fn target(&self, name: &str) -> String {
        let mut address = self.endpoint(name).address;
        let mut visited = HashSet::from([name.to_string()]);
        while target::is_bare_name(&address) && visited.insert(address.clone()) {
            address = self.endpoint(&address).address;
        }
        let normalized = target::normalize_scheme(&address);
        placeholder::expand(self.placeholders.as_ref(), &normalized)
    }
}

impl VirtualTargets for ClientRegistry {
    fn target(&self, authority: &str) -> String {
        ClientRegistry::target(self, authority)
    }
}
