//! Components of object and image layer entities.

use std::path::PathBuf;

use bevy::prelude::*;
use tilestream_assets::prelude::Properties;

/// An object from an object-group layer.
#[derive(Component, Debug, Clone)]
pub struct MapObjectData {
    /// Index of the layer in the map document
    pub layer: u32,
    pub id: u32,
    pub name: String,
    pub class: String,
    /// Pixel position
    pub position: Vec2,
    /// Pixel size
    pub size: Vec2,
    /// Rotation in degrees, clockwise
    pub rotation: f32,
    pub visible: bool,
    /// Global tile id for tile objects, without flip flags
    pub gid: Option<u32>,
    pub properties: Properties,
}

/// The image of an image layer.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct ImageLayerData {
    /// Index of the layer in the map document
    pub layer: u32,
    pub name: String,
    /// Image path, resolved against the map document
    pub source: PathBuf,
    pub offset: Vec2,
    pub opacity: f32,
    pub visible: bool,
}
