//! Inbound message and metadata size caps.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Sentinel accepted from configuration meaning "use the largest cap the transport supports".
pub const MAX_SIZE_SENTINEL: i64 = -1;

/// Largest cap the transport accepts, in bytes.
pub const MAX_INBOUND_SIZE: u64 = 2_147_483_647;

/// A normalized inbound size cap in bytes. Always `>= 0`.
///
/// Construction goes through [`InboundSize::from_signed`], which maps the
/// `-1` sentinel to [`MAX_INBOUND_SIZE`] and rejects every other negative.
/// Values above [`MAX_INBOUND_SIZE`] are clamped to it, so the sentinel and
/// any larger explicit cap resolve to the same limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct InboundSize(u64);

impl InboundSize {
    /// Creates a cap from a non-negative byte count, clamped to [`MAX_INBOUND_SIZE`].
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Self {
        if bytes > MAX_INBOUND_SIZE {
            Self(MAX_INBOUND_SIZE)
        } else {
            Self(bytes)
        }
    }

    /// Normalizes a signed byte count for the named property.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidInboundSize`] for negative values other
    /// than [`MAX_SIZE_SENTINEL`].
    pub fn from_signed(value: i64, property: &'static str) -> Result<Self, ConfigError> {
        match u64::try_from(value) {
            Ok(bytes) => Ok(Self::from_bytes(bytes)),
            Err(_) if value == MAX_SIZE_SENTINEL => Ok(Self(MAX_INBOUND_SIZE)),
            Err(_) => Err(ConfigError::InvalidInboundSize { property, value }),
        }
    }

    /// The cap in bytes.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.0
    }

    /// The cap as a `usize`, saturating on 32-bit targets.
    #[must_use]
    pub fn as_usize(self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

impl TryFrom<i64> for InboundSize {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_signed(value, "inbound size")
    }
}

impl From<InboundSize> for i64 {
    fn from(size: InboundSize) -> Self {
        i64::try_from(size.0).unwrap_or(i64::MAX)
    }
}
