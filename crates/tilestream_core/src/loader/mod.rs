//! Asynchronous map loading.
//!
//! [`MapLoader`] drives a load through its phases: document, tilesets, layer
//! collection and materialization. The first three run on task pools without
//! touching the `World`; materialization runs on the caller's thread.

pub mod collect;
pub mod orchestrator;

pub use collect::{
    ClassifiedTile, CollectContext, LayerBatch, ResolvedTileset, TileClass, TilesetTable,
    collect_layer,
};
pub use orchestrator::{LoadProgress, LoadStage, MapLoader, PreparedMap, ProgressCallback};
