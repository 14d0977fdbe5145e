//! Configuration management for the tally-rs rating service
//!
//! Bootstrap configuration comes from a TOML file (all keys optional) with
//! command-line / environment overrides on top:
//!
//! ```toml
//! port = 5730
//! bind_address = "127.0.0.1"
//! root_folder = "/var/lib/tally"
//!
//! [storage]
//! backend = "embedded"          # or "relational"
//! database_path = "tally.db"    # embedded only, relative to root_folder
//! database_url = "postgres://tally@localhost/tally"   # relational only
//! max_connections = 10
//! timeout_ms = 5000
//!
//! [logging]
//! level = "info"
//! ```
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments / environment (`TALLY_*`)
//! 2. TOML configuration file
//! 3. Built-in defaults

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tally_common::config::{resolve_root_folder, LoggingConfig, EMBEDDED_DB_FILE};
use tally_common::db::PoolSettings;
use tally_common::{Error, Result, StorageBackend};

/// Module name used for the default TOML location
pub const MODULE_NAME: &str = "tally-rs";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Root folder holding the embedded database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            root_folder: None,
            storage: StorageSection::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// `[storage]` table
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Embedded database file; relative paths resolve against the root folder
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Relational connection string
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Bound on every store call and on waiting for a pooled connection
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_path: None,
            database_url: None,
            max_connections: default_max_connections(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_port() -> u16 {
    5730
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_backend() -> StorageBackend {
    StorageBackend::Embedded
}

fn default_max_connections() -> u32 {
    10
}

fn default_timeout_ms() -> u64 {
    5000
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub root_folder: Option<PathBuf>,
    pub backend: Option<StorageBackend>,
    pub database_url: Option<String>,
}

/// Where the ratings live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTarget {
    Embedded(PathBuf),
    Relational(String),
}

impl StorageTarget {
    pub fn backend(&self) -> StorageBackend {
        match self {
            StorageTarget::Embedded(_) => StorageBackend::Embedded,
            StorageTarget::Relational(_) => StorageBackend::Relational,
        }
    }
}

/// Resolved storage settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub target: StorageTarget,
    pub pool: PoolSettings,
    /// Bound on each store call made by the rating service
    pub operation_timeout: Duration,
}

/// Complete service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub storage: StorageConfig,
    pub log_level: String,
}

impl Config {
    /// Load the TOML file (explicit path, platform default, or none) and
    /// apply overrides
    pub fn load(toml_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let toml_config: TomlConfig =
            tally_common::config::load_toml_or_default(toml_path, MODULE_NAME)?;
        Self::resolve(toml_config, overrides)
    }

    /// Combine TOML values and overrides into a validated configuration
    pub fn resolve(toml_config: TomlConfig, overrides: ConfigOverrides) -> Result<Self> {
        let storage = toml_config.storage;

        if storage.max_connections == 0 {
            return Err(Error::Config("storage.max_connections must be at least 1".into()));
        }
        if storage.timeout_ms == 0 {
            return Err(Error::Config("storage.timeout_ms must be positive".into()));
        }

        let backend = overrides.backend.unwrap_or(storage.backend);
        let target = match backend {
            StorageBackend::Embedded => {
                let root = resolve_root_folder(
                    overrides.root_folder.as_deref(),
                    toml_config.root_folder.as_deref(),
                );
                let path = match storage.database_path {
                    Some(path) if path.is_absolute() => path,
                    Some(path) => root.join(path),
                    None => root.join(EMBEDDED_DB_FILE),
                };
                StorageTarget::Embedded(path)
            }
            StorageBackend::Relational => {
                let url = overrides
                    .database_url
                    .or(storage.database_url)
                    .filter(|url| !url.trim().is_empty())
                    .ok_or_else(|| {
                        Error::Config(
                            "relational backend requires storage.database_url or TALLY_DATABASE_URL"
                                .into(),
                        )
                    })?;
                StorageTarget::Relational(url)
            }
        };

        let timeout = Duration::from_millis(storage.timeout_ms);

        Ok(Config {
            port: overrides.port.unwrap_or(toml_config.port),
            bind_address: toml_config.bind_address,
            storage: StorageConfig {
                target,
                pool: PoolSettings {
                    max_connections: storage.max_connections,
                    acquire_timeout: timeout,
                },
                operation_timeout: timeout,
            },
            log_level: toml_config.logging.level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_select_embedded_store() {
        let overrides = ConfigOverrides {
            root_folder: Some(PathBuf::from("/srv/tally")),
            ..Default::default()
        };
        let config = Config::resolve(TomlConfig::default(), overrides).unwrap();

        assert_eq!(config.port, 5730);
        assert_eq!(
            config.storage.target,
            StorageTarget::Embedded(PathBuf::from("/srv/tally/tally.db"))
        );
        assert_eq!(config.storage.pool.max_connections, 10);
        assert_eq!(config.storage.operation_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_relational_from_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            port = 6000
            [storage]
            backend = "relational"
            database_url = "postgres://tally@db/tally"
            max_connections = 4
            timeout_ms = 750
            "#,
        )
        .unwrap();

        let config = Config::resolve(toml_config, ConfigOverrides::default()).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(
            config.storage.target,
            StorageTarget::Relational("postgres://tally@db/tally".into())
        );
        assert_eq!(config.storage.pool.max_connections, 4);
        assert_eq!(config.storage.pool.acquire_timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_relational_without_url_is_config_error() {
        let overrides = ConfigOverrides {
            backend: Some(StorageBackend::Relational),
            ..Default::default()
        };
        let err = Config::resolve(TomlConfig::default(), overrides).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_cli_overrides_beat_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            port = 6000
            [storage]
            backend = "embedded"
            database_path = "/data/ratings.db"
            "#,
        )
        .unwrap();
        let overrides = ConfigOverrides {
            port: Some(7000),
            backend: Some(StorageBackend::Relational),
            database_url: Some("postgres://override/tally".into()),
            ..Default::default()
        };

        let config = Config::resolve(toml_config, overrides).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.storage.target.backend(), StorageBackend::Relational);
    }

    #[test]
    fn test_absolute_database_path_kept() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [storage]
            database_path = "/data/ratings.db"
            "#,
        )
        .unwrap();

        let config = Config::resolve(toml_config, ConfigOverrides::default()).unwrap();
        assert_eq!(
            config.storage.target,
            StorageTarget::Embedded(PathBuf::from("/data/ratings.db"))
        );
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let toml_config: TomlConfig = toml::from_str("[storage]\nmax_connections = 0\n").unwrap();
        assert!(Config::resolve(toml_config, ConfigOverrides::default()).is_err());
    }
}
