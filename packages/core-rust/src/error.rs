//! Errors raised while building or interpreting endpoint configuration.

/// Configuration values that cannot be turned into a usable endpoint setting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A negative inbound size other than the `-1` "maximum" sentinel.
    #[error("unsupported {property}: {value}")]
    InvalidInboundSize { property: &'static str, value: i64 },
    /// The address names a transport this crate cannot bind or dial (e.g. `unix:`).
    #[error("unsupported address: {0}")]
    UnsupportedAddress(String),
    /// The port segment of an address is not a valid `u16`.
    #[error("invalid port in address: {address}")]
    InvalidPort { address: String },
    /// A duration string that does not follow `<n>[ms|s|m|h]`.
    #[error("invalid duration: {0}")]
    InvalidDuration(String),
}
