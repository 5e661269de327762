//! Endpoint configuration model.
//!
//! Every field of [`EndpointConfig`] has a coded base value: the value held by
//! `EndpointConfig::default()`. The inheritance resolver (see [`crate::inherit`])
//! compares against that base to decide whether an owner modified a field.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration;
use crate::error::ConfigError;
use crate::size::InboundSize;

/// Address every unconfigured endpoint points at.
pub const DEFAULT_ADDRESS: &str = "static://localhost:9090";

/// Load-balancing policy used when none is configured.
pub const DEFAULT_LOAD_BALANCING_POLICY: &str = "round_robin";

/// Default inbound message cap (4 MiB).
pub const DEFAULT_MAX_INBOUND_MESSAGE_SIZE: u64 = 4 * 1024 * 1024;

/// Default inbound metadata cap (8 KiB).
pub const DEFAULT_MAX_INBOUND_METADATA_SIZE: u64 = 8 * 1024;

/// Free-form service config, kept as JSON so it can be handed to a transport verbatim.
pub type ServiceConfig = BTreeMap<String, serde_json::Value>;

/// How the channel negotiates its transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NegotiationType {
    /// HTTP/2 with prior knowledge, no TLS.
    #[default]
    Plaintext,
    /// Plaintext HTTP/1.1 that may be upgraded.
    PlaintextUpgrade,
    /// HTTP/2 over TLS.
    Tls,
}

/// Client-side health checking for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HealthConfig {
    /// Whether the channel runs client-side health checks.
    pub enabled: bool,
    /// Service whose health is checked. `None` checks the server as a whole.
    pub service_name: Option<String>,
}

/// Transport security for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SecurityConfig {
    /// Tri-state switch. `None` means "enabled iff a bundle is named".
    pub enabled: Option<bool>,
    /// Name of the credential bundle to use.
    pub bundle: Option<String>,
}

impl SecurityConfig {
    /// Effective enablement after applying the bundle rule for an unset flag.
    #[must_use]
    pub fn determine_enabled(&self) -> bool {
        self.enabled.unwrap_or(self.bundle.is_some())
    }
}

/// Settings for one logical client channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EndpointConfig {
    /// Scheme-qualified target address.
    pub address: String,
    /// Deadline applied to every call on the channel.
    #[serde(with = "duration::opt_secs")]
    pub default_deadline: Option<Duration>,
    /// Load-balancing policy name (`round_robin`, `pick_first`).
    pub default_load_balancing_policy: String,
    /// Whether HTTP/2 keep-alive pings are sent.
    pub enable_keep_alive: bool,
    /// Interval between keep-alive pings.
    #[serde(with = "duration::secs")]
    pub keep_alive_time: Duration,
    /// How long to wait for a keep-alive acknowledgement.
    #[serde(with = "duration::secs")]
    pub keep_alive_timeout: Duration,
    /// Whether keep-alive pings are sent with no active calls.
    pub keep_alive_without_calls: bool,
    /// How long a connection may sit without calls before it is released.
    #[serde(with = "duration::secs")]
    pub idle_timeout: Duration,
    /// Largest response message accepted.
    pub max_inbound_message_size: InboundSize,
    /// Largest response metadata block accepted.
    pub max_inbound_metadata_size: InboundSize,
    /// Transport negotiation mode.
    pub negotiation_type: NegotiationType,
    /// When `false`, peer certificates are not verified.
    pub secure: bool,
    /// Service config handed to the transport.
    pub service_config: ServiceConfig,
    /// Custom `User-Agent` for the channel.
    pub user_agent: Option<String>,
    /// Whether the shared channel defaults are overlaid onto this config.
    pub inherit_defaults: bool,
    /// Client-side health checking.
    pub health: HealthConfig,
    /// Transport security.
    #[serde(alias = "ssl")]
    pub security: SecurityConfig,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            default_deadline: None,
            default_load_balancing_policy: DEFAULT_LOAD_BALANCING_POLICY.to_string(),
            enable_keep_alive: false,
            keep_alive_time: Duration::from_secs(5 * 60),
            keep_alive_timeout: Duration::from_secs(20),
            keep_alive_without_calls: false,
            idle_timeout: Duration::from_secs(20),
            max_inbound_message_size: InboundSize::from_bytes(DEFAULT_MAX_INBOUND_MESSAGE_SIZE),
            max_inbound_metadata_size: InboundSize::from_bytes(DEFAULT_MAX_INBOUND_METADATA_SIZE),
            negotiation_type: NegotiationType::Plaintext,
            secure: true,
            service_config: ServiceConfig::new(),
            user_agent: None,
            inherit_defaults: false,
            health: HealthConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl EndpointConfig {
    /// Creates a config holding only coded base values, pointed at `address`.
    #[must_use]
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Sets the inbound message cap from a signed byte count (`-1` = maximum).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidInboundSize`] for other negative values.
    pub fn set_max_inbound_message_size(&mut self, bytes: i64) -> Result<(), ConfigError> {
        self.max_inbound_message_size =
            InboundSize::from_signed(bytes, "max-inbound-message-size")?;
        Ok(())
    }

    /// Sets the inbound metadata cap from a signed byte count (`-1` = maximum).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidInboundSize`] for other negative values.
    pub fn set_max_inbound_metadata_size(&mut self, bytes: i64) -> Result<(), ConfigError> {
        self.max_inbound_metadata_size =
            InboundSize::from_signed(bytes, "max-inbound-metadata-size")?;
        Ok(())
    }

    /// Service config with the health-check stanza merged in when health checks are enabled.
    #[must_use]
    pub fn effective_service_config(&self) -> ServiceConfig {
        let mut config = self.service_config.clone();
        if self.health.enabled {
            let service_name = self.health.service_name.clone().unwrap_or_default();
            config.insert(
                "healthCheckConfig".to_string(),
                serde_json::json!({ "serviceName": service_name }),
            );
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::size::MAX_INBOUND_SIZE;

    #[test]
    fn coded_base_values() {
        let config = EndpointConfig::default();
        assert_eq!(config.address, "static://localhost:9090");
        assert_eq!(config.default_load_balancing_policy, "round_robin");
        assert_eq!(config.idle_timeout, Duration::from_secs(20));
        assert_eq!(config.keep_alive_time, Duration::from_secs(300));
        assert_eq!(config.max_inbound_message_size.bytes(), 4_194_304);
        assert_eq!(config.max_inbound_metadata_size.bytes(), 8192);
        assert_eq!(config.negotiation_type, NegotiationType::Plaintext);
        assert!(config.secure);
        assert!(!config.inherit_defaults);
        assert!(config.security.enabled.is_none());
    }

    #[test]
    fn size_setters_normalize_sentinel() {
        let mut config = EndpointConfig::default();
        config.set_max_inbound_message_size(-1).unwrap();
        assert_eq!(config.max_inbound_message_size.bytes(), MAX_INBOUND_SIZE);
        let err = config.set_max_inbound_metadata_size(-3).unwrap_err();
        assert!(err.to_string().contains("max-inbound-metadata-size"));
        assert_eq!(config.max_inbound_metadata_size.bytes(), 8192);
    }

    #[test]
    fn security_enabled_follows_bundle_when_unset() {
        let mut security = SecurityConfig::default();
        assert!(!security.determine_enabled());
        security.bundle = Some("client".to_string());
        assert!(security.determine_enabled());
        security.enabled = Some(false);
        assert!(!security.determine_enabled());
    }

    #[test]
    fn deserializes_kebab_case_with_defaults() {
        let json = r#"{
            "address": "static://orders:7070",
            "default-deadline": "1500ms",
            "idle-timeout": 45,
            "max-inbound-message-size": -1,
            "negotiation-type": "tls",
            "ssl": { "bundle": "orders" },
            "health": { "enabled": true, "service-name": "orders.v1" }
        }"#;
        let config: EndpointConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.address, "static://orders:7070");
        assert_eq!(config.default_deadline, Some(Duration::from_millis(1500)));
        assert_eq!(config.idle_timeout, Duration::from_secs(45));
        assert_eq!(config.max_inbound_message_size.bytes(), MAX_INBOUND_SIZE);
        assert_eq!(config.negotiation_type, NegotiationType::Tls);
        assert_eq!(config.security.bundle.as_deref(), Some("orders"));
        assert_eq!(config.keep_alive_timeout, Duration::from_secs(20));
    }

    #[test]
    fn effective_service_config_adds_health_stanza() {
        let mut config = EndpointConfig::default();
        assert!(config.effective_service_config().is_empty());
        config.health.enabled = true;
        config.health.service_name = Some("orders.v1".to_string());
        let effective = config.effective_service_config();
        assert_eq!(
            effective["healthCheckConfig"],
            serde_json::json!({ "serviceName": "orders.v1" })
        );
    }
}
