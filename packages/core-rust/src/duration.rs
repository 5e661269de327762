//! Duration values as they appear in configuration files.
//!
//! Durations are written either as a bare integer (whole seconds) or as a
//! string with a unit suffix: `"500ms"`, `"20s"`, `"5m"`, `"1h"`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// Either representation accepted for a configured duration.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(i64),
    Text(String),
}

/// Parses a signed duration into milliseconds.
fn parse_signed_millis(text: &str) -> Result<i64, ConfigError> {
    let text = text.trim();
    let invalid = || ConfigError::InvalidDuration(text.to_string());
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '-'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let value: i64 = number.parse().map_err(|_| invalid())?;
    let factor = match unit.trim() {
        "ms" => 1,
        "" | "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        _ => return Err(invalid()),
    };
    value.checked_mul(factor).ok_or_else(invalid)
}

impl RawDuration {
    fn into_signed_millis(self) -> Result<i64, ConfigError> {
        match self {
            Self::Seconds(secs) => secs
                .checked_mul(1_000)
                .ok_or_else(|| ConfigError::InvalidDuration(secs.to_string())),
            Self::Text(text) => parse_signed_millis(&text),
        }
    }

    fn into_duration(self) -> Result<Duration, ConfigError> {
        let millis = self.into_signed_millis()?;
        u64::try_from(millis)
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidDuration(millis.to_string()))
    }
}

/// Parses a non-negative duration such as `"20s"` or `"250ms"`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidDuration`] for malformed or negative input.
pub fn parse_duration(text: &str) -> Result<Duration, ConfigError> {
    RawDuration::Text(text.to_string()).into_duration()
}

fn serialize_duration<S: Serializer>(duration: Duration, serializer: S) -> Result<S::Ok, S::Error> {
    if duration.subsec_millis() == 0 {
        serializer.serialize_u64(duration.as_secs())
    } else {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }
}

/// `#[serde(with = "duration::secs")]` for `Duration` fields.
pub mod secs {
    use super::{serialize_duration, Deserialize, Deserializer, Duration, RawDuration, Serializer};

    /// Serializes whole seconds as an integer, anything finer as `"<n>ms"`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_duration(*duration, serializer)
    }

    /// # Errors
    ///
    /// Fails on malformed or negative durations.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        RawDuration::deserialize(deserializer)?
            .into_duration()
            .map_err(serde::de::Error::custom)
    }
}

/// `#[serde(with = "duration::opt_secs")]` for `Option<Duration>` fields.
pub mod opt_secs {
    use super::{serialize_duration, Deserialize, Deserializer, Duration, RawDuration, Serializer};

    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match duration {
            Some(duration) => serialize_duration(*duration, serializer),
            None => serializer.serialize_none(),
        }
    }

    /// # Errors
    ///
    /// Fails on malformed or negative durations.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<RawDuration>::deserialize(deserializer)?
            .map(RawDuration::into_duration)
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}

/// How long a shutdown waits for in-flight work before forcing termination.
///
/// Configured as a signed duration: negative waits without bound, zero
/// forces termination immediately, positive bounds the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GracePeriod {
    /// Force termination without waiting.
    Immediate,
    /// Wait up to the duration, then force termination.
    Bounded(Duration),
    /// Wait until all in-flight work has finished.
    Unbounded,
}

impl GracePeriod {
    /// Grace period applied when none is configured.
    pub const DEFAULT: Self = Self::Bounded(Duration::from_secs(30));

    /// Interprets a signed millisecond count.
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        match u64::try_from(millis) {
            Ok(0) => Self::Immediate,
            Ok(millis) => Self::Bounded(Duration::from_millis(millis)),
            Err(_) => Self::Unbounded,
        }
    }

    /// Interprets a signed second count.
    #[must_use]
    pub fn from_secs(secs: i64) -> Self {
        Self::from_millis(secs.saturating_mul(1_000))
    }

    /// The bounded wait, if any. `None` for both `Immediate` and `Unbounded`.
    #[must_use]
    pub fn bound(self) -> Option<Duration> {
        match self {
            Self::Bounded(duration) => Some(duration),
            Self::Immediate | Self::Unbounded => None,
        }
    }

    fn signed_millis(self) -> i64 {
        match self {
            Self::Immediate => 0,
            Self::Bounded(duration) => i64::try_from(duration.as_millis()).unwrap_or(i64::MAX),
            Self::Unbounded => -1,
        }
    }
}

impl Default for GracePeriod {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<Duration> for GracePeriod {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Self::Immediate
        } else {
            Self::Bounded(duration)
        }
    }
}

impl fmt::Display for GracePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => f.write_str("immediate"),
            Self::Bounded(duration) => write!(f, "{}ms", duration.as_millis()),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}

impl Serialize for GracePeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = self.signed_millis();
        if millis % 1_000 == 0 {
            serializer.serialize_i64(millis / 1_000)
        } else {
            serializer.serialize_str(&format!("{millis}ms"))
        }
    }
}

impl<'de> Deserialize<'de> for GracePeriod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawDuration::deserialize(deserializer)?
            .into_signed_millis()
            .map(Self::from_millis)
            .map_err(serde::de::Error::custom)
    }
}
