use std::path::PathBuf;
use std::sync::Arc;

use bevy::prelude::*;

use crate::assets::tileset::Tileset;
use crate::properties::Properties;

/// A decoded map document.
///
/// Immutable once decoded. Documents are shared as `Arc<MapDocument>` between the
/// parsed-map cache and any load currently using them.
#[derive(Debug, Clone)]
pub struct MapDocument {
    /// Map width in tiles
    pub width: u32,
    /// Map height in tiles
    pub height: u32,
    /// Tile width in pixels
    pub tile_width: u32,
    /// Tile height in pixels
    pub tile_height: u32,
    /// Layers in document order
    pub layers: Vec<Layer>,
    /// Tileset references, sorted by `first_gid`
    pub tilesets: Vec<TilesetRef>,
    /// Custom properties set on the map
    pub properties: Properties,
}

impl MapDocument {
    /// Number of tile-grid layers.
    pub fn tile_layer_count(&self) -> usize {
        self.layers
            .iter()
            .filter(|layer| matches!(layer.kind, LayerKind::Tiles(_)))
            .count()
    }

    /// The tileset reference whose range contains `gid`, if any.
    ///
    /// External tilesets without a tile count hint extend to the next `first_gid`.
    pub fn tileset_for_gid(&self, gid: u32) -> Option<&TilesetRef> {
        if gid == 0 {
            return None;
        }
        let idx = self.tilesets.partition_point(|ts| ts.first_gid <= gid);
        let candidate = self.tilesets.get(idx.checked_sub(1)?)?;
        let next_first = self.tilesets.get(idx).map(|ts| ts.first_gid);
        let end = candidate.declared_end().or(next_first);
        match end {
            Some(end) if gid >= end => None,
            _ => Some(candidate),
        }
    }
}

/// One layer of a map document.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Layer name (not required to be unique)
    pub name: String,
    /// Layer payload
    pub kind: LayerKind,
    /// Width in tiles (0 for non-tile layers without a declared size)
    pub width: u32,
    /// Height in tiles
    pub height: u32,
    /// Visibility flag; invisible layers are still materialized
    pub visible: bool,
    /// Opacity in `0.0..=1.0`
    pub opacity: f32,
    /// Pixel offset of the layer
    pub offset: Vec2,
    /// Custom properties set on the layer
    pub properties: Properties,
}

impl Layer {
    /// Raw tile grid of a tile layer.
    pub fn tiles(&self) -> Option<&[u32]> {
        match &self.kind {
            LayerKind::Tiles(data) => Some(data),
            _ => None,
        }
    }
}

/// Payload of a [`Layer`].
#[derive(Debug, Clone)]
pub enum LayerKind {
    /// Row-major raw cell values (`width * height` entries)
    Tiles(Vec<u32>),
    /// A single image
    Image(LayerImage),
    /// Free-form objects
    Objects(Vec<MapObject>),
}

/// Image reference of an image layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerImage {
    /// Image path relative to the map document
    pub source: PathBuf,
    /// Pixel width, when known
    pub width: Option<u32>,
    /// Pixel height, when known
    pub height: Option<u32>,
}

/// An object of an object-group layer.
#[derive(Debug, Clone)]
pub struct MapObject {
    /// Object id, unique per map
    pub id: u32,
    /// Object name
    pub name: String,
    /// Class (or legacy `type`) of the object, empty when unset
    pub class: String,
    /// Pixel x position
    pub x: f32,
    /// Pixel y position
    pub y: f32,
    /// Pixel width
    pub width: f32,
    /// Pixel height
    pub height: f32,
    /// Rotation in degrees, clockwise
    pub rotation: f32,
    /// Visibility flag
    pub visible: bool,
    /// Raw cell value for tile objects
    pub gid: Option<u32>,
    /// Custom properties set on the object
    pub properties: Properties,
}

/// A tileset as referenced from a map.
#[derive(Debug, Clone)]
pub struct TilesetRef {
    /// First global id of the tileset in this map
    pub first_gid: u32,
    /// Where the definition lives
    pub source: TilesetSourceRef,
}

impl TilesetRef {
    /// Exclusive end of the global id range, when the tile count is known up front.
    ///
    /// Saturates at `u32::MAX`; `decode_map` rejects ranges that would overflow.
    pub fn declared_end(&self) -> Option<u32> {
        let count = match &self.source {
            TilesetSourceRef::Embedded(tileset) => tileset.tile_count,
            TilesetSourceRef::External { tile_count, .. } => (*tile_count)?,
        };
        Some(self.first_gid.saturating_add(count))
    }
}

/// Definition location of a [`TilesetRef`].
#[derive(Debug, Clone)]
pub enum TilesetSourceRef {
    /// Full definition inline in the map document
    Embedded(Arc<Tileset>),
    /// Separate tileset document
    External {
        /// Path relative to the map document
        source: PathBuf,
        /// Optional tile count hint
        tile_count: Option<u32>,
    },
}
