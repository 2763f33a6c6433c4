//! Tests for bootstrap config resolution and graceful degradation
//!
//! Tests that manipulate DOCAI_CONFIG are marked with #[serial]
//! so they never race each other on the process environment.

use docai_common::config::{ConfigResolver, ConfigSource, TomlConfig, CONFIG_ENV_VAR};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_cli_path_takes_precedence_over_env() {
    let cli = write_config("workers = 7\n");
    let env_file = write_config("workers = 3\n");
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let resolver = ConfigResolver::new(Some(cli.path().to_path_buf()));
    assert_eq!(resolver.resolve_path(), Some(cli.path().to_path_buf()));
    let loaded = resolver.load().unwrap();
    assert_eq!(loaded.config.workers, 7);
    assert_eq!(loaded.source, ConfigSource::File(cli.path().to_path_buf()));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_path() {
    let env_file = write_config(
        r#"
dealer_master_path = "/srv/lists/dealers.txt"

[logging]
level = "debug"
"#,
    );
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let config = ConfigResolver::new(None).load().unwrap().config;
    assert_eq!(config.dealer_master_path, PathBuf::from("/srv/lists/dealers.txt"));
    assert_eq!(config.logging.level, "debug");

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    env::remove_var(CONFIG_ENV_VAR);
    let missing = PathBuf::from("/nonexistent/docai/docai.toml");
    let resolver = ConfigResolver::new(Some(missing.clone()));

    let loaded = resolver.load().expect("missing config must not be fatal");
    assert_eq!(loaded.config.workers, 4);
    assert_eq!(loaded.config.asset_master_path, PathBuf::from("data/asset_master.txt"));
    // Reported to the caller so it can be logged once logging is up
    assert_eq!(loaded.source, ConfigSource::Missing(missing));
}

#[test]
#[serial]
fn test_invalid_file_is_fatal() {
    env::remove_var(CONFIG_ENV_VAR);
    let bad = write_config("workers = \"many\"\n");

    let err = ConfigResolver::new(Some(bad.path().to_path_buf()))
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

#[test]
fn test_logging_file_parsed() {
    let config = TomlConfig::from_toml(
        r#"
[logging]
level = "warn"
file = "/var/log/docai.log"
"#,
    )
    .unwrap();
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/docai.log")));
}
