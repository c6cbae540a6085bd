//! Loader configuration.

use bevy::prelude::*;
use serde::Deserialize;

/// What to do when a tileset texture cannot be bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFailurePolicy {
    /// Fail the load with `TextureLoadFailure`
    #[default]
    Abort,
    /// Bind the provider's placeholder texture and log a warning
    Placeholder,
}

/// Configuration for `MapLoader` and its caches.
///
/// Every field has a default, so a JSON config only needs the fields it changes.
///
/// # Example
///
/// ```rust
/// use tilestream_core::config::{LoaderConfig, TextureFailurePolicy};
///
/// let config = LoaderConfig::from_json(r#"{"hot_capacity": 2, "texture_failure": "placeholder"}"#)
///     .unwrap();
/// assert_eq!(config.hot_capacity, 2);
/// assert_eq!(config.warm_capacity, 32);
/// assert_eq!(config.texture_failure, TextureFailurePolicy::Placeholder);
/// ```
#[derive(Resource, Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Tilesets kept with a bound texture
    pub hot_capacity: usize,
    /// Tilesets kept as metadata only
    pub warm_capacity: usize,
    /// Decoded map documents held strongly
    pub map_cache_capacity: usize,
    /// Tileset loads in flight per batch
    pub max_parallel_tilesets: usize,
    /// Layers collected in parallel per batch
    pub max_parallel_layers: usize,
    pub texture_failure: TextureFailurePolicy,
    /// Tile buffers kept for reuse
    pub pool_retain: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            hot_capacity: 8,
            warm_capacity: 32,
            map_cache_capacity: 4,
            max_parallel_tilesets: 4,
            max_parallel_layers: 4,
            texture_failure: TextureFailurePolicy::Abort,
            pool_retain: 16,
        }
    }
}

impl LoaderConfig {
    /// Parse a JSON configuration; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
