//! Tests for configuration loading and root folder resolution
//!
//! Uses serial_test: tests that set or clear TALLY_ROOT_FOLDER are marked
//! #[serial] so they never observe each other's environment.

use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tally_common::config::{
    get_default_root_folder, load_toml_file, load_toml_or_default, resolve_root_folder,
    LoggingConfig, ROOT_FOLDER_ENV,
};
use tempfile::TempDir;

#[derive(Debug, Default, Deserialize)]
struct SampleConfig {
    #[serde(default)]
    port: u16,
    #[serde(default)]
    logging: LoggingConfig,
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolve_root_folder(None, None), get_default_root_folder());
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let resolved = resolve_root_folder(None, Some(Path::new("/from/toml")));
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_toml_used_when_env_unset() {
    env::remove_var(ROOT_FOLDER_ENV);
    let resolved = resolve_root_folder(None, Some(Path::new("/from/toml")));
    assert_eq!(resolved, PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_cli_beats_env() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let resolved = resolve_root_folder(Some(Path::new("/from/cli")), None);
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/cli"));
}

#[test]
fn test_load_toml_file_parses_nested_tables() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sample.toml");
    std::fs::write(&path, "port = 5730\n[logging]\nlevel = \"debug\"\n").unwrap();

    let config: SampleConfig = load_toml_file(&path).unwrap();
    assert_eq!(config.port, 5730);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_invalid_toml_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "port = [unclosed").unwrap();

    let err = load_toml_file::<SampleConfig>(&path).unwrap_err();
    assert!(matches!(err, tally_common::Error::Config(_)));
}

#[test]
fn test_explicit_missing_file_is_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");

    let result = load_toml_or_default::<SampleConfig>(Some(&missing), "tally-test");
    assert!(result.is_err());
}

#[test]
fn test_no_config_file_uses_defaults() {
    let config: SampleConfig =
        load_toml_or_default(None, "tally-module-that-has-no-config-file").unwrap();
    assert_eq!(config.port, 0);
    assert_eq!(config.logging.level, "info");
}
