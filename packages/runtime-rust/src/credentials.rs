//! Transport credentials for channels and servers.
//!
//! This module never parses key or trust material itself: PEM bytes are
//! handed to the HTTP client, and server TLS arrives as a ready
//! [`RustlsConfig`].

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use switchyard_core::{ClientRegistry, NegotiationType};

use crate::error::ConstructionError;

/// Named trust material, PEM encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsBundle {
    /// CA certificates used to verify the peer.
    pub ca_pem: Vec<u8>,
}

/// Lookup of TLS bundles by name.
pub trait TlsBundles: Send + Sync {
    fn bundle(&self, name: &str) -> Option<TlsBundle>;
}

/// In-memory bundle table.
#[derive(Debug, Clone, Default)]
pub struct StaticTlsBundles(HashMap<String, TlsBundle>);

impl StaticTlsBundles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, bundle: TlsBundle) -> Self {
        self.0.insert(name.into(), bundle);
        self
    }
}

impl TlsBundles for StaticTlsBundles {
    fn bundle(&self, name: &str) -> Option<TlsBundle> {
        self.0.get(name).cloned()
    }
}

/// TLS settings for an outbound channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsChannelCredentials {
    /// Extra trust roots. `None` uses the platform roots.
    pub bundle: Option<TlsBundle>,
    /// When `false`, peer certificates are accepted without verification.
    pub verify_peer: bool,
}

/// How a channel authenticates the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChannelCredentials {
    /// Plaintext.
    #[default]
    Insecure,
    Tls(TlsChannelCredentials),
}

impl ChannelCredentials {
    #[must_use]
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

/// How a server authenticates the transport.
#[derive(Clone, Default)]
pub enum ServerCredentials {
    /// Plaintext.
    #[default]
    Insecure,
    Tls(RustlsConfig),
}

impl ServerCredentials {
    /// Loads a PEM certificate chain and private key.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::Credentials`] if either file cannot be read or parsed.
    pub async fn from_pem_files(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<Self, ConstructionError> {
        let cert_path = cert_path.as_ref();
        let config = RustlsConfig::from_pem_file(cert_path, key_path.as_ref())
            .await
            .map_err(|e| ConstructionError::Credentials {
                target: cert_path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::Tls(config))
    }
}

impl fmt::Debug for ServerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insecure => f.write_str("Insecure"),
            Self::Tls(_) => f.write_str("Tls(..)"),
        }
    }
}

/// Supplies credentials for a channel target.
pub trait ChannelCredentialsProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ConstructionError::Credentials`] when material for `target`
    /// is configured but unavailable.
    fn channel_credentials(&self, target: &str) -> Result<ChannelCredentials, ConstructionError>;
}

/// Plaintext for every target.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsecureCredentials;

impl ChannelCredentialsProvider for InsecureCredentials {
    fn channel_credentials(&self, _target: &str) -> Result<ChannelCredentials, ConstructionError> {
        Ok(ChannelCredentials::Insecure)
    }
}

/// Derives credentials from the named endpoint's security settings.
///
/// Plaintext only when security is disabled and negotiation is
/// `plaintext`. Otherwise TLS, trusting the endpoint's bundle when
/// security is enabled, and skipping verification when `secure` is off.
pub struct NamedChannelCredentialsProvider {
    registry: Arc<ClientRegistry>,
    bundles: Arc<dyn TlsBundles>,
}

impl NamedChannelCredentialsProvider {
    #[must_use]
    pub fn new(registry: Arc<ClientRegistry>, bundles: Arc<dyn TlsBundles>) -> Self {
        Self { registry, bundles }
    }
}

impl fmt::Debug for NamedChannelCredentialsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedChannelCredentialsProvider")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl ChannelCredentialsProvider for NamedChannelCredentialsProvider {
    fn channel_credentials(&self, target: &str) -> Result<ChannelCredentials, ConstructionError> {
        let endpoint = self.registry.endpoint(target);
        let security_enabled = endpoint.security.determine_enabled();
        if !security_enabled && endpoint.negotiation_type == NegotiationType::Plaintext {
            return Ok(ChannelCredentials::Insecure);
        }

        let bundle = match (security_enabled, endpoint.security.bundle.as_deref()) {
            (true, Some(name)) => Some(self.bundles.bundle(name).ok_or_else(|| {
                ConstructionError::Credentials {
                    target: target.to_string(),
                    reason: format!("no TLS bundle named '{name}'"),
                }
            })?),
            _ => None,
        };

        Ok(ChannelCredentials::Tls(TlsChannelCredentials {
            bundle,
            verify_peer: endpoint.secure,
        }))
    }
}
