//! Gamepad service configuration
//!
//! Stored as TOML under the user's configuration directory. A file with the
//! defaults is written on first start; keys missing from an existing file fall
//! back to their defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_DIR: &str = "driverstation-input";
const CONFIG_FILE: &str = "gamepad.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No configuration directory available on this platform")]
    NoConfigDir,

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Native library used to read devices
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Gilrs,
    Sdl2,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GamepadConfig {
    pub backend: BackendKind,

    /// Delay between the end of one poll tick and the start of the next
    pub update_interval_ms: u64,

    /// Delay before the first poll tick
    pub startup_delay_ms: u64,

    /// Keep reporting input while the application is not focused
    pub allow_background_events: bool,

    /// Community mapping database, one mapping per line
    pub mapping_database: Option<PathBuf>,

    /// Replaces the generic mapping template bundled for this platform
    pub generic_mapping: Option<PathBuf>,

    /// Capacity of the event broadcast channel
    pub event_buffer: usize,
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            update_interval_ms: 20,
            startup_delay_ms: 500,
            allow_background_events: true,
            mapping_database: None,
            generic_mapping: None,
            event_buffer: 256,
        }
    }
}

impl GamepadConfig {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        debug!("Loaded gamepad configuration from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the configuration at `path`, writing the defaults there first if
    /// the file does not exist yet.
    pub fn ensure_default_config(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("Creating default gamepad configuration at {}", path.display());
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }
        Self::load(path)
    }
}
