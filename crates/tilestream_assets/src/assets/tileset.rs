use std::path::PathBuf;
use std::sync::Arc;

use bevy::platform::collections::HashMap;

use crate::properties::Properties;

/// Tileset metadata shared by every map that references it.
///
/// Only texture-atlas tilesets (a single spritesheet) are supported.
#[derive(Debug, Clone)]
pub struct Tileset {
    /// Tileset name
    pub name: String,
    /// Tile width in pixels
    pub tile_width: u32,
    /// Tile height in pixels
    pub tile_height: u32,
    /// Margin around the atlas in pixels
    pub margin: u32,
    /// Spacing between tiles in pixels
    pub spacing: u32,
    /// Number of tiles in the tileset
    pub tile_count: u32,
    /// Number of columns in the atlas
    pub columns: u32,
    /// The atlas image
    pub image: TilesetImage,
    /// Custom properties set on individual tiles
    /// Key: Local tile ID (0-based, NOT GID)
    pub tile_properties: HashMap<u32, Arc<Properties>>,
    /// Animations of individual tiles
    /// Key: Local tile ID (0-based, NOT GID)
    pub animations: HashMap<u32, AnimationDef>,
    /// Custom properties set on the tileset
    pub properties: Properties,
}

impl Tileset {
    /// Number of tiles per atlas row.
    ///
    /// Derived from the image width when it is known, otherwise from `columns`.
    /// Never below 1.
    pub fn tiles_per_row(&self) -> u32 {
        let stride = self.tile_width + self.spacing;
        let derived = match self.image.width {
            Some(width) if stride > 0 => {
                (width.saturating_sub(2 * self.margin) + self.spacing) / stride
            }
            _ => self.columns,
        };
        derived.max(1)
    }

    /// Atlas rectangle of a local tile id.
    ///
    /// # Arguments
    /// * `local_id` - The local tile ID (0-based, NOT a GID)
    pub fn tile_rect(&self, local_id: u32) -> TileRect {
        let per_row = self.tiles_per_row();
        TileRect {
            x: self.margin + (local_id % per_row) * (self.tile_width + self.spacing),
            y: self.margin + (local_id / per_row) * (self.tile_height + self.spacing),
            width: self.tile_width,
            height: self.tile_height,
        }
    }

    /// Properties of a local tile id, if it has any.
    pub fn tile_properties(&self, local_id: u32) -> Option<&Arc<Properties>> {
        self.tile_properties.get(&local_id)
    }
}

/// Atlas image reference of a [`Tileset`].
#[derive(Debug, Clone, PartialEq)]
pub struct TilesetImage {
    /// Image path relative to the tileset document
    pub source: PathBuf,
    /// Pixel width, when known
    pub width: Option<u32>,
    /// Pixel height, when known
    pub height: Option<u32>,
}

/// Pixel rectangle inside a tileset atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Animation of a single tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationDef {
    /// Frames in playback order
    pub frames: Vec<AnimationFrame>,
}

impl AnimationDef {
    /// Total duration of one loop in milliseconds.
    pub fn total_duration_ms(&self) -> u32 {
        self.frames.iter().map(|f| f.duration_ms).sum()
    }
}

/// A single animation frame.
///
/// `tile_id` is local to the owning tileset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationFrame {
    pub tile_id: u32,
    pub duration_ms: u32,
}
