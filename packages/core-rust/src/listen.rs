//! Server listen-address parsing.

use std::fmt;

use crate::error::ConfigError;

/// Port used when a listen address names none.
pub const DEFAULT_PORT: u16 = 9090;

/// Where a server binds its listening socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListenAddress {
    /// All interfaces.
    Wildcard { port: u16 },
    /// A specific host name or IP literal.
    Host { host: String, port: u16 },
}

impl ListenAddress {
    /// Parses `host:port`, `:port`, `*:port`, `host`, `*` or `""`.
    ///
    /// Bracketed IPv6 literals (`[::1]:9090`) and a `static://` / `tcp://`
    /// prefix are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedAddress`] for non-socket forms such as
    /// `unix:` and `in-process:`, and [`ConfigError::InvalidPort`] when the
    /// port does not fit a `u16`.
    pub fn parse(address: &str) -> Result<Self, ConfigError> {
        let trimmed = address.trim();
        let unsupported = || ConfigError::UnsupportedAddress(address.to_string());
        if trimmed.starts_with("unix:") || trimmed.starts_with("in-process:") {
            return Err(unsupported());
        }
        let authority = match trimmed.split_once("://") {
            Some(("static" | "tcp", rest)) => rest.trim_end_matches('/'),
            Some(_) => return Err(unsupported()),
            None => trimmed,
        };

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, rest) = bracketed.split_once(']').ok_or_else(unsupported)?;
            (host, rest.strip_prefix(':'))
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            }
        };

        let port = match port {
            None | Some("") => DEFAULT_PORT,
            Some(port) => port.parse().map_err(|_| ConfigError::InvalidPort {
                address: address.to_string(),
            })?,
        };

        if host.is_empty() || host == "*" {
            Ok(Self::Wildcard { port })
        } else {
            Ok(Self::Host {
                host: host.to_string(),
                port,
            })
        }
    }

    /// The port to bind.
    #[must_use]
    pub fn port(&self) -> u16 {
        match self {
            Self::Wildcard { port } | Self::Host { port, .. } => *port,
        }
    }

    /// The host to bind, `None` for all interfaces.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Wildcard { .. } => None,
            Self::Host { host, .. } => Some(host),
        }
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard { port } => write!(f, "0.0.0.0:{port}"),
            Self::Host { host, port } if host.contains(':') => write!(f, "[{host}]:{port}"),
            Self::Host { host, port } => write!(f, "{host}:{port}"),
        }
    }
}
