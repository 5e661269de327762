//! File-backed settings for the client registry and the server.

use std::path::Path;

use serde::{Deserialize, Serialize};
use switchyard_core::ClientRegistry;

use crate::error::SettingsError;
use crate::server::ServerConfig;

/// Top-level settings document.
///
/// ```json
/// {
///   "client": { "default-channel": { "address": "static://localhost:9090" } },
///   "server": { "address": "*:9090", "shutdown-grace-period": 30 }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    pub client: ClientRegistry,
    pub server: ServerConfig,
}

impl Settings {
    /// Reads settings from a JSON file. Missing sections take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Io`] if the file cannot be read and
    /// [`SettingsError::Parse`] if it is not valid settings JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use switchyard_core::GracePeriod;

    use super::*;

    #[test]
    fn loads_partial_documents_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "client": {{
                    "channels": {{ "orders": {{ "address": "static://orders:7070" }} }}
                }},
                "server": {{ "address": "127.0.0.1:0", "shutdown-grace-period": 0 }}
            }}"#
        )
        .unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.client.target("orders"), "orders:7070");
        assert_eq!(settings.client.target("unknown"), "localhost:9090");
        assert_eq!(settings.server.address, "127.0.0.1:0");
        assert_eq!(settings.server.shutdown_grace_period, GracePeriod::Immediate);
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.server, ServerConfig::default());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ \"server\": {{ \"max-inbound-message-size\": -7 }} }}").unwrap();
        let err = Settings::load(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }
}
