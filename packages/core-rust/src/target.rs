//! Target resolution: logical endpoint names to connectable addresses.
//!
//! Address grammar:
//! - `<scheme>://<authority>`: fully qualified, used as-is
//! - `unix:<path>`: bare-scheme form, used as-is
//! - `host:port`: shorthand for `static://host:port`
//! - bare name: a named-endpoint reference, or the default template's address

use crate::error::ConfigError;

/// Schemes whose prefix is stripped before the address reaches the transport.
const STRIPPED_SCHEMES: [&str; 2] = ["static:", "tcp:"];

/// Maps a logical endpoint name to the target string handed to the transport.
pub trait VirtualTargets: Send + Sync {
    /// Resolves `authority` to a connectable target.
    fn target(&self, authority: &str) -> String;
}

/// Passes targets through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectTargets;

impl VirtualTargets for DirectTargets {
    fn target(&self, authority: &str) -> String {
        authority.to_string()
    }
}

/// Whether `name` already carries a scheme (`scheme://…` or a recognized bare scheme).
#[must_use]
pub fn is_qualified(name: &str) -> bool {
    name.contains(":/") || name.starts_with("unix:")
}

/// Whether `name` can only be a named-endpoint reference.
#[must_use]
pub fn is_bare_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(':')
}

/// Builds the address for a name that has no registry entry.
///
/// Qualified names pass through, `host:port` becomes `static://host:port`,
/// and anything else falls back to `default_address`.
#[must_use]
pub fn synthesize_address(name: &str, default_address: &str) -> String {
    if is_qualified(name) {
        name.to_string()
    } else if name.contains(':') {
        format!("static://{name}")
    } else if default_address.contains(":/") {
        default_address.to_string()
    } else {
        format!("static://{default_address}")
    }
}

/// Strips a `static:` or `tcp:` scheme and any leading slashes.
///
/// Other schemes are left for the transport to interpret.
#[must_use]
pub fn normalize_scheme(address: &str) -> String {
    if STRIPPED_SCHEMES.iter().any(|scheme| address.starts_with(scheme)) {
        let rest = address
            .split_once(':')
            .map_or(address, |(_, rest)| rest);
        rest.trim_start_matches('/').to_string()
    } else {
        address.to_string()
    }
}

/// How the transport reaches the authorities of a [`Target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetScheme {
    /// A static list of `host:port` authorities.
    Direct,
    /// Hostnames resolved through DNS by the transport.
    Dns,
    /// Plain URL passed straight to the HTTP client.
    Http,
    /// TLS URL passed straight to the HTTP client.
    Https,
}

/// A normalized target split into its scheme and authorities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// How the authorities are reached.
    pub scheme: TargetScheme,
    /// One or more `host:port` authorities, in configured order.
    pub authorities: Vec<String>,
}

impl Target {
    /// Parses a normalized target (the output of [`normalize_scheme`]).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedAddress`] for schemes the transport
    /// cannot dial, such as `unix:`, or for targets with no authority.
    pub fn parse(target: &str) -> Result<Self, ConfigError> {
        let unsupported = || ConfigError::UnsupportedAddress(target.to_string());
        let (scheme, rest) = match target.split_once("://") {
            Some(("dns", rest)) => (TargetScheme::Dns, rest.trim_start_matches('/')),
            Some(("http", rest)) => (TargetScheme::Http, rest),
            Some(("https", rest)) => (TargetScheme::Https, rest),
            Some(("static" | "tcp", rest)) => (TargetScheme::Direct, rest),
            Some(_) => return Err(unsupported()),
            None if target.starts_with("unix:") || target.starts_with("in-process:") => {
                return Err(unsupported())
            }
            None => (TargetScheme::Direct, target),
        };
        let authorities: Vec<String> = rest
            .trim_end_matches('/')
            .split(',')
            .map(str::trim)
            .filter(|authority| !authority.is_empty())
            .map(str::to_string)
            .collect();
        if authorities.is_empty() {
            return Err(unsupported());
        }
        Ok(Self {
            scheme,
            authorities,
        })
    }

    /// Whether the scheme itself mandates TLS.
    #[must_use]
    pub fn requires_tls(&self) -> bool {
        self.scheme == TargetScheme::Https
    }
}
