//! Configuration management for BESST services.
//!
//! Configuration lives under `~/.besst/` and is split across modular files
//! (see [`crate::config_loader`]). This module holds the sections shared by
//! every service; the screener reads its own `screener` section from the same
//! merged document.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Modular files (`secrets.json`, `screener.json`)
//! 3. Base `config.json`
//! 4. Default values
//!
//! # Environment Variable Mapping
//!
//! - `FINNHUB_API_KEY` → secrets.external.finnhub
//! - `BESST_LOG_LEVEL` → observability.log_level
//! - `BESST_LOG_FORMAT` → observability.log_format
//! - `BESST_DB_PATH` → storage.db_path

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".besst"),
        |dirs| dirs.home_dir().join(".besst"),
    )
}

// ============================================================================
// Secrets
// ============================================================================

/// Grouped credentials.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecretsConfig {
    /// External service credentials
    #[serde(default)]
    pub external: ExternalSecretsConfig,
}

/// Credentials for external market data services.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExternalSecretsConfig {
    /// Finnhub API token (symbol directory, profiles, quotes, metrics)
    #[serde(default)]
    pub finnhub: Option<String>,
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets pinned to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Storage
// ============================================================================

/// Local persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path (`~` is expanded)
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.besst/besst.db".into()
}

impl StorageConfig {
    /// Database path with `~` expanded.
    pub fn resolved_db_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.db_path).into_owned())
    }
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure shared by BESST services.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Credentials
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Local persistence
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Build configuration from an already merged document, with env overrides.
    pub fn from_document(document: &Value) -> Result<Self> {
        let mut config: Self = serde_json::from_value(document.clone())
            .context("Failed to parse configuration document")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("FINNHUB_API_KEY") {
            if !key.trim().is_empty() {
                self.secrets.external.finnhub = Some(key);
            }
        }

        if let Ok(level) = std::env::var("BESST_LOG_LEVEL") {
            self.observability.log_level = level;
        }

        if let Ok(format) = std::env::var("BESST_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        if let Ok(path) = std::env::var("BESST_DB_PATH") {
            self.storage.db_path = path;
        }
    }

    /// Get the Finnhub API token, ignoring blank values.
    pub fn finnhub_api_key(&self) -> Option<String> {
        self.secrets
            .external
            .finnhub
            .as_ref()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}
