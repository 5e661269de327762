//! Pre-populated channel builder returned by
//! [`ChannelManager::create_channel`](super::ChannelManager::create_channel).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use switchyard_core::endpoint::DEFAULT_LOAD_BALANCING_POLICY;
use switchyard_core::{
    ConfigError, EndpointConfig, GracePeriod, NegotiationType, ServiceConfig, Target,
};

use super::manager::ManagedChannel;
use super::transport::Channel;
use crate::credentials::ChannelCredentials;
use crate::error::ConstructionError;

/// HTTP/2 keep-alive ping settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    pub interval: Duration,
    pub timeout: Duration,
    pub while_idle: bool,
}

/// Transport settings collected on a [`ChannelBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSettings {
    pub user_agent: Option<String>,
    pub default_deadline: Option<Duration>,
    pub load_balancing_policy: String,
    pub keep_alive: Option<KeepAlive>,
    pub idle_timeout: Option<Duration>,
    pub max_inbound_message_size: usize,
    pub max_inbound_metadata_size: usize,
    pub service_config: ServiceConfig,
    pub negotiation: NegotiationType,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        let base = EndpointConfig::default();
        Self {
            user_agent: None,
            default_deadline: None,
            load_balancing_policy: DEFAULT_LOAD_BALANCING_POLICY.to_string(),
            keep_alive: None,
            idle_timeout: None,
            max_inbound_message_size: base.max_inbound_message_size.as_usize(),
            max_inbound_metadata_size: base.max_inbound_metadata_size.as_usize(),
            service_config: ServiceConfig::new(),
            negotiation: NegotiationType::Plaintext,
        }
    }
}

/// Builder for one channel. Building registers the channel with its manager.
#[derive(Debug)]
pub struct ChannelBuilder {
    name: String,
    target: String,
    credentials: ChannelCredentials,
    settings: ChannelSettings,
    shutdown_grace_period: GracePeriod,
    managed: Arc<Mutex<Vec<ManagedChannel>>>,
}

impl ChannelBuilder {
    pub(crate) fn new(
        name: &str,
        target: String,
        credentials: ChannelCredentials,
        managed: Arc<Mutex<Vec<ManagedChannel>>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            target,
            credentials,
            settings: ChannelSettings::default(),
            shutdown_grace_period: GracePeriod::DEFAULT,
            managed,
        }
    }

    /// The logical name the channel was requested under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved transport target.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn credentials(&self) -> &ChannelCredentials {
        &self.credentials
    }

    #[must_use]
    pub fn settings(&self) -> &ChannelSettings {
        &self.settings
    }

    #[must_use]
    pub fn shutdown_grace_period(&self) -> GracePeriod {
        self.shutdown_grace_period
    }

    pub fn with_shutdown_grace_period(&mut self, grace: GracePeriod) -> &mut Self {
        self.shutdown_grace_period = grace;
        self
    }

    pub fn user_agent(&mut self, agent: impl Into<String>) -> &mut Self {
        self.settings.user_agent = Some(agent.into());
        self
    }

    pub fn default_deadline(&mut self, deadline: Duration) -> &mut Self {
        self.settings.default_deadline = Some(deadline);
        self
    }

    pub fn load_balancing_policy(&mut self, policy: impl Into<String>) -> &mut Self {
        self.settings.load_balancing_policy = policy.into();
        self
    }

    pub fn keep_alive(&mut self, keep_alive: KeepAlive) -> &mut Self {
        self.settings.keep_alive = Some(keep_alive);
        self
    }

    pub fn idle_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.settings.idle_timeout = Some(timeout);
        self
    }

    pub fn max_inbound_message_size(&mut self, bytes: usize) -> &mut Self {
        self.settings.max_inbound_message_size = bytes;
        self
    }

    pub fn max_inbound_metadata_size(&mut self, bytes: usize) -> &mut Self {
        self.settings.max_inbound_metadata_size = bytes;
        self
    }

    pub fn service_config(&mut self, config: ServiceConfig) -> &mut Self {
        self.settings.service_config = config;
        self
    }

    pub fn negotiation(&mut self, negotiation: NegotiationType) -> &mut Self {
        self.settings.negotiation = negotiation;
        self
    }

    /// Copies the transport-relevant fields of a resolved endpoint config.
    pub fn apply_endpoint(&mut self, config: &EndpointConfig) -> &mut Self {
        if let Some(agent) = &config.user_agent {
            self.settings.user_agent = Some(agent.clone());
        }
        if let Some(deadline) = config.default_deadline {
            self.settings.default_deadline = Some(deadline);
        }
        if config.enable_keep_alive {
            self.settings.keep_alive = Some(KeepAlive {
                interval: config.keep_alive_time,
                timeout: config.keep_alive_timeout,
                while_idle: config.keep_alive_without_calls,
            });
        }
        self.settings.load_balancing_policy = config.default_load_balancing_policy.clone();
        self.settings.idle_timeout = Some(config.idle_timeout);
        self.settings.max_inbound_message_size = config.max_inbound_message_size.as_usize();
        self.settings.max_inbound_metadata_size = config.max_inbound_metadata_size.as_usize();
        self.settings.service_config = config.effective_service_config();
        self.settings.negotiation = config.negotiation_type;
        self
    }

    /// Builds the live channel and registers it for teardown.
    ///
    /// # Errors
    ///
    /// - [`ConstructionError::UnsupportedTarget`] for targets the HTTP client cannot dial
    /// - [`ConstructionError::Credentials`] when trust material is rejected
    /// - [`ConstructionError::Transport`] when the HTTP client cannot be built
    pub fn build(self) -> Result<Channel, ConstructionError> {
        let target = Target::parse(&self.target).map_err(|e| match e {
            ConfigError::UnsupportedAddress(target) => ConstructionError::UnsupportedTarget(target),
            other => ConstructionError::Config(other),
        })?;
        let use_tls = self.credentials.is_tls()
            || target.requires_tls()
            || self.settings.negotiation == NegotiationType::Tls;
        let client = self.http_client(use_tls)?;
        let scheme = if use_tls { "https" } else { "http" };
        let base_urls = target
            .authorities
            .iter()
            .map(|authority| format!("{scheme}://{authority}"))
            .collect();

        let channel = Channel::new(self.target.clone(), base_urls, client, &self.settings);
        self.managed.lock().push(ManagedChannel {
            channel: channel.clone(),
            grace: self.shutdown_grace_period,
        });
        tracing::debug!(
            name = %self.name,
            target = %self.target,
            grace = %self.shutdown_grace_period,
            "channel built"
        );
        Ok(channel)
    }

    fn http_client(&self, use_tls: bool) -> Result<reqwest::Client, ConstructionError> {
        let settings = &self.settings;
        let mut client = reqwest::Client::builder().pool_idle_timeout(settings.idle_timeout);
        if let Some(agent) = &settings.user_agent {
            client = client.user_agent(agent.clone());
        }
        if let Some(keep_alive) = settings.keep_alive {
            client = client
                .http2_keep_alive_interval(keep_alive.interval)
                .http2_keep_alive_timeout(keep_alive.timeout)
                .http2_keep_alive_while_idle(keep_alive.while_idle);
        }

        if !use_tls && settings.negotiation == NegotiationType::Plaintext {
            client = client.http2_prior_knowledge();
        }
        if let ChannelCredentials::Tls(tls) = &self.credentials {
            if let Some(bundle) = &tls.bundle {
                let root = reqwest::Certificate::from_pem(&bundle.ca_pem).map_err(|e| {
                    ConstructionError::Credentials {
                        target: self.target.clone(),
                        reason: e.to_string(),
                    }
                })?;
                client = client.add_root_certificate(root);
            }
            if !tls.verify_peer {
                client = client.danger_accept_invalid_certs(true);
            }
        }

        client
            .build()
            .map_err(|e| ConstructionError::Transport(e.to_string()))
    }
}
