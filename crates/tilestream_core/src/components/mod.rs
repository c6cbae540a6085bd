//! Components attached to materialized entities.

pub mod animation;
pub mod gameplay;
pub mod layer;
pub mod map;
pub mod tile;

pub use animation::{AnimationIndex, TileAnimation, advance_tile_animations};
pub use gameplay::{
    Collision, EncounterZone, Interactable, LedgeDirection, LedgeJump, ScriptTrigger, TerrainType,
};
pub use layer::{ImageLayerData, MapObjectData};
pub use map::{MapId, MapMember};
pub use tile::{TileGid, TileInstance, TilePosition, TileVisual, TileVisualRef};
