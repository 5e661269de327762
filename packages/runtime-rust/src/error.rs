//! Error types for channel construction, server startup and settings loading.

use std::io;
use std::path::PathBuf;

use switchyard_core::ConfigError;
use thiserror::Error;

/// Building a channel or server failed. Never retried.
#[derive(Debug, Error)]
pub enum ConstructionError {
    /// Two registered services share a name.
    #[error("found duplicate service implementation: {0}")]
    DuplicateService(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Credential material for a target could not be assembled.
    #[error("cannot build credentials for {target}: {reason}")]
    Credentials { target: String, reason: String },
    /// The target uses a scheme the transport cannot dial.
    #[error("unsupported target: {0}")]
    UnsupportedTarget(String),
    /// The underlying HTTP client or server refused the configuration.
    #[error("transport construction failed: {0}")]
    Transport(String),
}

/// `start()` did not reach the running state.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Construction(#[from] ConstructionError),
    /// The listening socket could not be bound.
    #[error("failed to bind {address}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
    /// The lifecycle has already been stopped and cannot be restarted.
    #[error("server lifecycle already terminated")]
    Terminated,
}

/// A graceful shutdown did not complete cleanly.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// In-flight calls were still running when the grace period expired.
    #[error("{target} still had {in_flight} calls in flight when the grace period expired")]
    DrainTimeout { target: String, in_flight: u64 },
}

/// Settings could not be loaded.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse settings file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
