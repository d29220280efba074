//! Configuration management for the structure type host.
//!
//! This module handles loading, validation, and conversion of host configuration
//! from TOML files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use type_loader::{CompatibilityConfig, LoaderConfig, DEFAULT_MANIFEST_SECTION};

fn default_directory() -> String {
    "extensions".to_string()
}

fn default_manifest_section() -> String {
    DEFAULT_MANIFEST_SECTION.to_string()
}

fn default_level() -> String {
    "info".to_string()
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Extension loading settings
    #[serde(default)]
    pub loader: LoaderSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Where extensions come from and how strictly they are checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderSettings {
    /// Directory scanned for extension archives
    #[serde(default = "default_directory")]
    pub directory: String,
    /// Manifest section describing the structure type
    #[serde(default = "default_manifest_section")]
    pub manifest_section: String,
    /// Fail the whole load on a dependency cycle
    #[serde(default)]
    pub debug_graph: bool,
    /// ABI compatibility overrides
    #[serde(default)]
    pub compatibility: CompatibilityConfig,
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            manifest_section: default_manifest_section(),
            debug_graph: false,
            compatibility: CompatibilityConfig::default(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the
    /// specified path and returns the default configuration.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn extension_directory(&self) -> PathBuf {
        PathBuf::from(&self.loader.directory)
    }

    /// Builds the loader configuration. Each override flag that is set in
    /// `overrides` wins over the file.
    pub fn to_loader_config(&self, overrides: CompatibilityConfig) -> LoaderConfig {
        let file = self.loader.compatibility;
        LoaderConfig {
            manifest_section: self.loader.manifest_section.clone(),
            fail_fast: self.loader.debug_graph,
            compatibility: CompatibilityConfig {
                allow_rustc_mismatch: file.allow_rustc_mismatch || overrides.allow_rustc_mismatch,
                allow_abi_mismatch: file.allow_abi_mismatch || overrides.allow_abi_mismatch,
                strict_versioning: file.strict_versioning || overrides.strict_versioning,
            },
        }
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.loader.directory.trim().is_empty() {
            return Err("Extension directory cannot be empty".to_string());
        }

        let section = &self.loader.manifest_section;
        if section.is_empty()
            || !section
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(format!(
                "Invalid manifest section '{}': use letters, digits, '_' or '-'",
                section
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
