//! Panel configuration
//!
//! Loaded from an optional TOML file:
//!
//! ```toml
//! [panel]
//! model = "1841A"
//! firmware_version = "1.2.0"
//!
//! [store]
//! max_entities = 512
//!
//! [console]
//! prompt = "> "
//! echo = true
//!
//! [refresh]
//! interval_ms = 100
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use snon::StoreConfig;

use crate::error::{Error, Result};
use crate::profiles::Model;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default)]
    pub panel: PanelInfo,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub clock: ClockConfig,
}

/// Which panel this host emulates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelInfo {
    #[serde(default)]
    pub model: Model,
    /// Overrides the model's device name
    pub device_name: Option<String>,
    #[serde(default = "default_firmware_version")]
    pub firmware_version: String,
}

impl Default for PanelInfo {
    fn default() -> Self {
        Self {
            model: Model::default(),
            device_name: None,
            firmware_version: default_firmware_version(),
        }
    }
}

impl PanelInfo {
    pub fn device_name(&self) -> &str {
        self.device_name
            .as_deref()
            .unwrap_or_else(|| self.model.device_name())
    }
}

fn default_firmware_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Serial console settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Written after every reply
    #[serde(default)]
    pub prompt: String,
    /// Echo received lines back before the reply
    #[serde(default)]
    pub echo: bool,
}

/// Display/indicator refresh timer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

fn default_interval_ms() -> u64 {
    100
}

/// Real-time clock settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Start the clock from the host's system time instead of waiting for
    /// `set time`
    #[serde(default = "default_system_time")]
    pub system_time: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            system_time: default_system_time(),
        }
    }
}

fn default_system_time() -> bool {
    true
}

impl PanelConfig {
    /// Load from `path`, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| Error::ParseConfig {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        if self.refresh.interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "refresh.interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
