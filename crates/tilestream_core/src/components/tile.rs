//! Tile entity components.
//!
//! Every non-empty cell of a tile layer becomes one entity carrying
//! [`TilePosition`], [`TileGid`], a shared [`TileVisualRef`] and its own
//! [`TileInstance`]. Gameplay components are added by property mappers.

use std::sync::Arc;

use bevy::prelude::*;
use tilestream_assets::prelude::{FlipFlags, TileRect};

use crate::cache::TilesetKey;

/// Grid position of a tile.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TilePosition {
    /// Index of the layer in the map document
    pub layer: u32,
    pub x: u32,
    pub y: u32,
}

/// Global tile id of a tile, without flip flags.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileGid(pub u32);

/// Rendering data shared by every tile showing the same tileset tile.
///
/// Stored once per (tileset, local id) in the visual cache and shared by `Arc`,
/// including across maps that use the same tileset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileVisual {
    /// Texture id; the texture handle is looked up through the `TextureProvider`
    pub texture: TilesetKey,
    /// Atlas rectangle of the unflipped tile
    pub source: TileRect,
    /// Elevation from the tile's `elevation` property
    pub default_elevation: i32,
}

/// Flyweight reference to a [`TileVisual`].
#[derive(Component, Debug, Clone)]
pub struct TileVisualRef(pub Arc<TileVisual>);

impl TileVisualRef {
    pub fn visual(&self) -> &TileVisual {
        &self.0
    }
}

/// Per-instance tile data.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileInstance {
    pub flip: FlipFlags,
    /// Layer-level `elevation` property, overriding the tile default
    pub elevation_override: Option<i32>,
}

impl TileInstance {
    /// Effective elevation of this tile.
    pub fn elevation(&self, visual: &TileVisual) -> i32 {
        self.elevation_override.unwrap_or(visual.default_elevation)
    }
}
