//! Bootstrap configuration loading and config file resolution
//!
//! Bootstrap settings (reference list paths, worker count, logging) live in a
//! single TOML file. The engine-specific `[reconcile]` table is carried through
//! untouched and interpreted by the extraction crate.
//!
//! # Config File Priority
//!
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `DOCAI_CONFIG`
//! 3. `<config dir>/docai/docai.toml`
//! 4. Compiled defaults (no file)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "DOCAI_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Dealer master list (one entry per line)
    #[serde(default = "default_dealer_master_path")]
    pub dealer_master_path: PathBuf,

    /// Asset (tractor model) master list (one entry per line)
    #[serde(default = "default_asset_master_path")]
    pub asset_master_path: PathBuf,

    /// Number of documents reconciled concurrently in a batch
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Reconciliation engine settings, validated by the engine crate
    #[serde(default)]
    pub reconcile: toml::Table,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            dealer_master_path: default_dealer_master_path(),
            asset_master_path: default_asset_master_path(),
            workers: default_workers(),
            logging: LoggingConfig::default(),
            reconcile: toml::Table::new(),
        }
    }
}

fn default_dealer_master_path() -> PathBuf {
    PathBuf::from("data/dealer_master.txt")
}

fn default_asset_master_path() -> PathBuf {
    PathBuf::from("data/asset_master.txt")
}

fn default_workers() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse bootstrap config from a TOML string
    pub fn from_toml(input: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(input).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Where a loaded config came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// Configured file does not exist; compiled defaults in use
    Missing(PathBuf),
    /// No file configured and no platform default present
    Defaults,
}

impl ConfigSource {
    /// Report the source. Call once logging is initialized.
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::Missing(path) => warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            ),
            ConfigSource::Defaults => info!("No config file found, using compiled defaults"),
        }
    }
}

/// A resolved bootstrap config and its origin
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    pub source: ConfigSource,
}

/// Resolves which config file (if any) to load
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Locate the config file following the priority order.
    ///
    /// Returns `None` when no file is configured and the platform default
    /// does not exist.
    pub fn resolve_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        default_config_path().filter(|p| p.exists())
    }

    /// Load the resolved config, falling back to compiled defaults.
    ///
    /// A missing file is not fatal; an unreadable or invalid one is. Nothing
    /// is logged here since logging is configured from the result; report
    /// the returned `ConfigSource` after initializing it.
    pub fn load(&self) -> Result<LoadedConfig> {
        match self.resolve_path() {
            Some(path) if path.exists() => Ok(LoadedConfig {
                config: TomlConfig::load(&path)?,
                source: ConfigSource::File(path),
            }),
            Some(path) => Ok(LoadedConfig {
                config: TomlConfig::default(),
                source: ConfigSource::Missing(path),
            }),
            None => Ok(LoadedConfig {
                config: TomlConfig::default(),
                source: ConfigSource::Defaults,
            }),
        }
    }
}

/// Platform config location: `<config dir>/docai/docai.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("docai").join("docai.toml"))
}
