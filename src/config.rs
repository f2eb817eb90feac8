//! Store configuration.
//!
//! Defaults are usable as-is. With the `config` feature the same settings can
//! be read from a TOML file; command-line flags override whatever the file says.
//!
//! ```toml
//! pool_size = 8
//! eviction = "lru"
//! data_dir = "/games/oblivion/Data"
//! ```

use crate::error::{Result, StoreError};
use std::path::PathBuf;
use std::str::FromStr;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// Default number of simultaneously open plugin files.
pub const DEFAULT_POOL_SIZE: usize = 16;

/// How the pool picks a slot to reclaim when every slot is busy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "lowercase"))]
pub enum EvictionPolicy {
    /// Uniformly random slot
    #[default]
    Random,
    /// Least recently used slot
    Lru,
}

impl FromStr for EvictionPolicy {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "lru" => Ok(Self::Lru),
            other => Err(StoreError::config(format!(
                "unknown eviction policy '{other}', expected 'random' or 'lru'"
            ))),
        }
    }
}

/// Settings for a [`Coordinator`](crate::pool::Coordinator) and the CLI
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct StoreConfig {
    /// Maximum number of open plugin file handles
    pub pool_size: usize,

    pub eviction: EvictionPolicy,

    /// Seed for random eviction; `None` seeds from the OS
    pub seed: Option<u64>,

    /// Directory scanned when no plugin paths are given
    pub data_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            eviction: EvictionPolicy::default(),
            seed: None,
            data_dir: None,
        }
    }
}

impl StoreConfig {
    /// Check the values make sense together
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(StoreError::config("pool_size must be at least 1"));
        }
        Ok(())
    }

    /// Read a configuration file
    #[cfg(feature = "config")]
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| StoreError::FileOpen {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| StoreError::config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Per-user configuration file location, if the platform has one
    #[cfg(feature = "config")]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("plugin-store").join("config.toml"))
    }
}
