//! Configuration management for qrtrack.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "qrtrack";

/// Default item file name for the JSON backend.
const JSON_FILE_NAME: &str = "items.json";

/// Default database file name for the `SQLite` backend.
const DATABASE_FILE_NAME: &str = "items.db";

/// Default directory name for rendered codes.
const CODES_DIR_NAME: &str = "qrcodes";

/// File holding the generated signing key when none is configured.
const SIGNING_KEY_FILE_NAME: &str = "signing.key";

/// Shortest accepted signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 16;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `QRTRACK_`, sections split on `__`)
/// 2. TOML config file at `~/.config/qrtrack/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Code image and token configuration.
    pub codes: CodesConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
    /// Externally reachable base URL written into codes.
    /// Derived from the request `Host` header when unset.
    pub public_url: Option<String>,
}

/// Which storage engine holds the items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// A single JSON array file.
    #[default]
    Json,
    /// An embedded `SQLite` database.
    Sqlite,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage engine.
    pub backend: StorageBackend,
    /// Path to the item file or database.
    /// Defaults to `~/.local/share/qrtrack/items.json` (or `items.db`).
    pub data_path: Option<PathBuf>,
    /// Directory holding rendered code images.
    /// Defaults to `~/.local/share/qrtrack/qrcodes`.
    pub codes_dir: Option<PathBuf>,
}

/// Code image and deletion token configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodesConfig {
    /// Lifetime of a deletion token in days. 0 means tokens never expire.
    pub token_ttl_days: u32,
    /// Secret used to sign deletion tokens.
    /// A random key is generated and kept next to the data when unset.
    pub signing_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            public_url: None,
        }
    }
}

impl Default for CodesConfig {
    fn default() -> Self {
        Self {
            token_ttl_days: 365,
            signing_secret: None,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing, or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("QRTRACK_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        if let Some(url) = &self.server.public_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::ConfigValidation {
                    message: format!("public_url must start with http:// or https://: {url}"),
                });
            }
        }

        if let Some(secret) = &self.codes.signing_secret {
            if secret.len() < MIN_SECRET_LEN {
                return Err(Error::ConfigValidation {
                    message: format!(
                        "signing_secret must be at least {MIN_SECRET_LEN} bytes (got {})",
                        secret.len()
                    ),
                });
            }
        }

        Ok(())
    }

    /// Parse the configured bind address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not a valid socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|_| Error::ConfigValidation {
                message: format!("invalid bind address: {}", self.server.bind),
            })
    }

    /// Base URL for codes rendered outside a request (CLI commands).
    ///
    /// Uses `public_url` when set, otherwise the bind address.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.server
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.server.bind))
            .trim_end_matches('/')
            .to_string()
    }

    /// Get the item file or database path, resolving defaults if not set.
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        self.storage.data_path.clone().unwrap_or_else(|| {
            let file = match self.storage.backend {
                StorageBackend::Json => JSON_FILE_NAME,
                StorageBackend::Sqlite => DATABASE_FILE_NAME,
            };
            self.data_dir().join(file)
        })
    }

    /// Get the code image directory, resolving defaults if not set.
    #[must_use]
    pub fn codes_dir(&self) -> PathBuf {
        self.storage
            .codes_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join(CODES_DIR_NAME))
    }

    /// Path of the generated signing key file.
    #[must_use]
    pub fn signing_key_path(&self) -> PathBuf {
        self.data_dir().join(SIGNING_KEY_FILE_NAME)
    }

    /// Directory that holds the data file, falling back to the default.
    fn data_dir(&self) -> PathBuf {
        self.storage
            .data_path
            .as_ref()
            .and_then(|p| p.parent().map(PathBuf::from))
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Token lifetime, or `None` when tokens never expire.
    #[must_use]
    pub fn token_ttl(&self) -> Option<Duration> {
        if self.codes.token_ttl_days == 0 {
            None
        } else {
            Some(Duration::from_secs(
                u64::from(self.codes.token_ttl_days) * 24 * 60 * 60,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind, "127.0.0.1:5000");
        assert!(config.server.public_url.is_none());
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert_eq!(config.codes.token_ttl_days, 365);
        assert!(config.codes.signing_secret.is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_bind() {
        let mut config = Config::default();
        config.server.bind = "not-an-address".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("invalid bind address"));
    }

    #[test]
    fn test_validate_bad_public_url() {
        let mut config = Config::default();
        config.server.public_url = Some("ftp://example.com".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("public_url"));
    }

    #[test]
    fn test_validate_short_secret() {
        let mut config = Config::default();
        config.codes.signing_secret = Some("short".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("signing_secret"));
    }

    #[test]
    fn test_base_url() {
        let mut config = Config::default();
        assert_eq!(config.base_url(), "http://127.0.0.1:5000");

        config.server.public_url = Some("https://stock.example.com/".to_string());
        assert_eq!(config.base_url(), "https://stock.example.com");
    }

    #[test]
    fn test_data_path_follows_backend() {
        let mut config = Config::default();
        assert!(config.data_path().ends_with("items.json"));

        config.storage.backend = StorageBackend::Sqlite;
        assert!(config.data_path().ends_with("items.db"));
    }

    #[test]
    fn test_custom_data_path_moves_derived_paths() {
        let mut config = Config::default();
        config.storage.data_path = Some(PathBuf::from("/srv/inventory/data.json"));

        assert_eq!(config.data_path(), PathBuf::from("/srv/inventory/data.json"));
        assert_eq!(config.codes_dir(), PathBuf::from("/srv/inventory/qrcodes"));
        assert_eq!(
            config.signing_key_path(),
            PathBuf::from("/srv/inventory/signing.key")
        );
    }

    #[test]
    fn test_bare_file_name_uses_default_dir() {
        let mut config = Config::default();
        config.storage.data_path = Some(PathBuf::from("data.json"));

        assert!(config.codes_dir().starts_with(Config::default_data_dir()));
    }

    #[test]
    fn test_token_ttl() {
        let mut config = Config::default();
        assert_eq!(
            config.token_ttl(),
            Some(Duration::from_secs(365 * 24 * 60 * 60))
        );

        config.codes.token_ttl_days = 0;
        assert!(config.token_ttl().is_none());
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("qrtrack"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nbind = \"0.0.0.0:8080\"\n\n[storage]\nbackend = \"sqlite\"\n\n[codes]\ntoken_ttl_days = 7\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.codes.token_ttl_days, 7);
        assert!(config.codes.signing_secret.is_none());
    }

    #[test]
    fn test_storage_backend_serde() {
        let json = serde_json::to_string(&StorageBackend::Sqlite).unwrap();
        assert_eq!(json, "\"sqlite\"");
        assert_eq!(StorageBackend::Json.to_string(), "json");
    }
}
