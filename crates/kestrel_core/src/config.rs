//! # World Configuration
//!
//! Loaded once at startup, usually from a TOML file:
//!
//! ```toml
//! name = "arena"
//! block_size = 4096
//! max_blocks = 16384
//! simulation_enabled = true
//! ```
//!
//! Every key is optional; missing keys fall back to [`WorldConfig::default`].

use serde::Deserialize;

use crate::error::{WorldError, WorldResult};

/// Default size of a storage block in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Default number of blocks a world may check out (64 MiB at 4 KiB blocks).
pub const DEFAULT_MAX_BLOCKS: usize = 16_384;

/// Smallest block size accepted by [`WorldConfig::validate`].
pub const MIN_BLOCK_SIZE: usize = 64;

/// Construction parameters of a world.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Human readable world name, used in logs.
    pub name: String,
    /// Size of one storage block in bytes. Must be a power of two.
    pub block_size: usize,
    /// Maximum number of blocks the world's allocator hands out.
    pub max_blocks: usize,
    /// Whether components get their simulation-start callback.
    pub simulation_enabled: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: String::from("world"),
            block_size: DEFAULT_BLOCK_SIZE,
            max_blocks: DEFAULT_MAX_BLOCKS,
            simulation_enabled: true,
        }
    }
}

impl WorldConfig {
    /// Creates the default configuration with a custom name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidConfig`] if the document does not parse or
    /// fails [`WorldConfig::validate`].
    pub fn from_toml_str(source: &str) -> WorldResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|err| WorldError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidConfig`] if the block size is not a power
    /// of two of at least [`MIN_BLOCK_SIZE`] bytes, or if `max_blocks` is zero.
    pub fn validate(&self) -> WorldResult<()> {
        if self.block_size < MIN_BLOCK_SIZE || !self.block_size.is_power_of_two() {
            return Err(WorldError::InvalidConfig(format!(
                "block_size must be a power of two >= {MIN_BLOCK_SIZE}, got {}",
                self.block_size
            )));
        }
        if self.max_blocks == 0 {
            return Err(WorldError::InvalidConfig(String::from(
                "max_blocks must be greater than zero",
            )));
        }
        Ok(())
    }
}
