//! Server configuration.

use serde::{Deserialize, Serialize};
use switchyard_core::endpoint::{
    DEFAULT_MAX_INBOUND_MESSAGE_SIZE, DEFAULT_MAX_INBOUND_METADATA_SIZE,
};
use switchyard_core::{GracePeriod, InboundSize};

/// Listen address used when none is configured.
pub const DEFAULT_SERVER_ADDRESS: &str = "*:9090";

/// Settings for the RPC server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Listen address (`host:port`, `:port`, `*`, `*:port`).
    pub address: String,
    /// How long `stop()` waits for in-flight calls.
    pub shutdown_grace_period: GracePeriod,
    /// Largest request message accepted.
    pub max_inbound_message_size: InboundSize,
    /// Largest request metadata block accepted.
    pub max_inbound_metadata_size: InboundSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_SERVER_ADDRESS.to_string(),
            shutdown_grace_period: GracePeriod::DEFAULT,
            max_inbound_message_size: InboundSize::from_bytes(DEFAULT_MAX_INBOUND_MESSAGE_SIZE),
            max_inbound_metadata_size: InboundSize::from_bytes(DEFAULT_MAX_INBOUND_METADATA_SIZE),
        }
    }
}

impl ServerConfig {
    /// Default settings listening on `address`.
    #[must_use]
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address, "*:9090");
        assert_eq!(
            config.shutdown_grace_period,
            GracePeriod::Bounded(Duration::from_secs(30))
        );
        assert_eq!(config.max_inbound_message_size.bytes(), 4_194_304);
        assert_eq!(config.max_inbound_metadata_size.bytes(), 8_192);
    }

    #[test]
    fn deserializes_signed_values() {
        let config: ServerConfig = serde_json::from_str(
            r#"{ "address": "localhost:0", "shutdown-grace-period": -1,
                 "max-inbound-message-size": -1 }"#,
        )
        .unwrap();
        assert_eq!(config.address, "localhost:0");
        assert_eq!(config.shutdown_grace_period, GracePeriod::Unbounded);
        assert_eq!(config.max_inbound_message_size.bytes(), 2_147_483_647);
        assert_eq!(config.max_inbound_metadata_size.bytes(), 8_192);
    }

    #[test]
    fn rejects_negative_sizes_other_than_sentinel() {
        let parsed: Result<ServerConfig, _> =
            serde_json::from_str(r#"{ "max-inbound-message-size": -5 }"#);
        assert!(parsed.is_err());
    }
}
