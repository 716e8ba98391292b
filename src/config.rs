//! Configuration management.
//!
//! Settings live in a TOML file organized into sections:
//!
//! - [`EngineConfig`] - timezone and reward balancing toggles
//! - [`StorageConfig`] - data persistence settings
//! - [`CatalogConfig`] - seed file locations
//! - [`LoggingConfig`] - logging settings
//!
//! ```toml
//! [engine]
//! timezone = "+09:00"
//! dynamic_balancing = false
//!
//! [storage]
//! data_dir = "data"
//!
//! [catalog]
//! seeds_dir = "data/seeds"
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::engine::clock::parse_offset;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed UTC offset applied to all users, e.g. `"+09:00"`.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Scale session payouts by the per-user balancer multiplier.
    #[serde(default)]
    pub dynamic_balancing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Directory holding achievements.json / templates.json seed files.
    /// Missing files fall back to the compiled-in starter catalogs.
    #[serde(default = "default_seeds_dir")]
    pub seeds_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

fn default_timezone() -> String {
    "+00:00".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_seeds_dir() -> String {
    "data/seeds".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            dynamic_balancing: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            seeds_dir: default_seeds_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            storage: StorageConfig::default(),
            catalog: CatalogConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file.
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if parse_offset(&self.engine.timezone).is_none() {
            return Err(anyhow!(
                "Invalid engine.timezone '{}': expected an offset like +09:00",
                self.engine.timezone
            ));
        }
        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            other => return Err(anyhow!("Invalid logging.level '{}'", other)),
        }
        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        Ok(())
    }

    /// Database location under the data directory.
    pub fn db_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.storage.data_dir).join("game")
    }
}
