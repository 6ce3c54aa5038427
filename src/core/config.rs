//! Engine configuration
//!
//! Read from TOML, e.g.
//!
//! ```toml
//! sort_prefix_len = 9
//! refresh_depth_on_remove = true
//! keep_backup = false
//! ```

use crate::core::tree::DEFAULT_SORT_PREFIX;
use crate::error::{ForestError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use validator::Validate;

/// Tunables for a [`TreeEngine`](crate::TreeEngine)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of sort-key units compared between siblings
    #[validate(range(min = 1, max = 64))]
    pub sort_prefix_len: usize,

    /// Write refreshed depth for promoted children as part of `remove_node`
    ///
    /// When off, promoted rows keep their old depth until `refresh_depth`,
    /// and loading does not correct stored depth either.
    pub refresh_depth_on_remove: bool,

    /// Keep `F.bak` after a successful commit
    pub keep_backup: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sort_prefix_len: DEFAULT_SORT_PREFIX,
            refresh_depth_on_remove: true,
            keep_backup: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(text).map_err(|e| ForestError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Read and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ForestError::Config(e.to_string()))
    }

    /// Validate field ranges
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| ForestError::Config(e.to_string()))
    }
}
