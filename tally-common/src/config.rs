//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable that overrides the root folder
pub const ROOT_FOLDER_ENV: &str = "TALLY_ROOT_FOLDER";

/// Database file name inside the root folder (embedded backend)
pub const EMBEDDED_DB_FILE: &str = "tally.db";

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable `TALLY_ROOT_FOLDER`
/// 3. `root_folder` key of the TOML config file, if one was given
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_root: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_root {
        return path.to_path_buf();
    }

    get_default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/tally (or /var/lib/tally for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("tally"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/tally"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("tally"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/tally"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("tally"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\tally"))
    } else {
        PathBuf::from("./tally_data")
    }
}

/// Default platform location of a module's TOML file
///
/// `~/.config/tally/<module>.toml` on Linux, falling back to
/// `/etc/tally/<module>.toml`.
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", module_name);
    let user_config = dirs::config_dir().map(|d| d.join("tally").join(&file_name));

    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/tally").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Parse a TOML file into `T`
pub fn load_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    let parsed = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!("Loaded TOML configuration from {}", path.display());
    Ok(parsed)
}

/// Load a module's TOML config, or defaults when none exists
///
/// A missing file is not an error: the module starts with built-in defaults.
/// A file that exists but cannot be parsed is.
pub fn load_toml_or_default<T: DeserializeOwned + Default>(
    explicit: Option<&Path>,
    module_name: &str,
) -> Result<T> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path(module_name) {
            Some(path) => path,
            None => {
                warn!("No config file found for {}, using defaults", module_name);
                return Ok(T::default());
            }
        },
    };

    load_toml_file(&path)
}
