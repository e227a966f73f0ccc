//! Configuration management for Data Tools.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Only application shells read this;
//! the permission evaluator never depends on configuration.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/datatools/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Logging settings
    pub logging: LoggingConfig,
    /// Organization/project catalog location
    pub catalog: CatalogConfig,
    /// Session grant list location
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file path.
    ///
    /// Unlike [`AppConfig::load`], a missing file is an error.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `DATATOOLS_LOG`: Override the log filter directive
    /// - `DATATOOLS_CATALOG`: Override the catalog file path
    /// - `DATATOOLS_GRANTS`: Override the grant list file path
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("DATATOOLS_LOG") {
            if !val.trim().is_empty() {
                tracing::debug!("Override logging.filter from env: {}", val);
                self.logging.filter = val;
            }
        }

        if let Ok(val) = std::env::var("DATATOOLS_CATALOG") {
            if !val.trim().is_empty() {
                tracing::debug!("Override catalog.path from env: {}", val);
                self.catalog.path = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("DATATOOLS_GRANTS") {
            if !val.trim().is_empty() {
                tracing::debug!("Override session.grants_path from env: {}", val);
                self.session.grants_path = Some(PathBuf::from(val));
            }
        }

        self
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> ConfigResult<Self> {
        Ok(Self::load()?.with_env_overrides())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit file path.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let config_dir = path.parent().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_path".to_string(),
            reason: "no parent directory".to_string(),
        })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/datatools/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "datatools", "datatools").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `info,datatools=debug`
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Catalog settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON file with `organizations` and `projects` arrays
    pub path: Option<PathBuf>,
}

/// Session settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// JSON file holding the principal's grant list
    pub grants_path: Option<PathBuf>,
}
