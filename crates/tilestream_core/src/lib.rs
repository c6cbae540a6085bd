//! # `tilestream_core`
//!
//! Loading backbone of `tilestream`. Turns Tiled map documents decoded by
//! `tilestream_assets` into flat ECS entities: one entity per non-empty tile,
//! one per object and one per image layer.
//!
//! **This crate does NOT render anything** - tiles carry a shared
//! [`TileVisual`](components::TileVisual) (texture key plus atlas rectangle)
//! that a renderer can draw from.
//!
//! ## Architecture
//!
//! - **Caches** ([`cache`]): tilesets (hot/warm/cold tiers), parsed maps
//!   (strong/weak tiers), source rectangles and tile visuals, owned by one
//!   [`TileCaches`](cache::TileCaches)
//! - **Loader** ([`loader`]): asynchronous phases on Bevy's task pools with
//!   cooperative cancellation and progress reporting
//! - **Materializer** ([`spawn`]): bulk entity creation per archetype bucket
//! - **Property mappers** ([`properties`]): tile properties to gameplay components
//! - **Streaming** ([`systems`], [`plugin`]): background loads finished each frame
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use bevy::prelude::*;
//! use bevy::tasks::block_on;
//! use tilestream_assets::prelude::{FileAssetReader, HeadlessTextureProvider};
//! use tilestream_core::prelude::*;
//!
//! let reader = FileAssetReader::new("assets");
//! let textures = HeadlessTextureProvider::new(reader.clone());
//! let loader = MapLoader::new(LoaderConfig::default(), reader, textures);
//!
//! let mut world = World::new();
//! let token = CancellationToken::new();
//! match block_on(loader.load_map(&mut world, &MapId::from("maps/town.json"), &token, None)) {
//!     Ok(LoadOutcome::Loaded(map)) => info!("{} entities", map.entity_count),
//!     Ok(LoadOutcome::Cancelled) => {}
//!     Err(err) => error!("{err}"),
//! }
//! ```

pub mod cache;
pub mod cancel;
pub mod components;
pub mod config;
pub mod error;
pub mod loader;
pub mod plugin;
pub mod pool;
pub mod properties;
pub mod spawn;
pub mod systems;

pub mod prelude {
    //! Common imports for `tilestream_core` users.

    pub use crate::cache::{CacheStats, TileCaches, TilesetKey};
    pub use crate::cancel::CancellationToken;
    pub use crate::components::{
        Collision, EncounterZone, ImageLayerData, Interactable, LedgeDirection, LedgeJump, MapId,
        MapMember, MapObjectData, ScriptTrigger, TerrainType, TileAnimation, TileGid,
        TileInstance, TilePosition, TileVisual, TileVisualRef,
    };
    pub use crate::config::{LoaderConfig, TextureFailurePolicy};
    pub use crate::error::{LoadError, LoadOutcome};
    pub use crate::loader::{LoadProgress, LoadStage, MapLoader, PreparedMap, ProgressCallback};
    pub use crate::plugin::TilestreamCorePlugin;
    pub use crate::properties::{PropertyMapper, PropertyMapperRegistry, TileArchetype};
    pub use crate::spawn::{MaterializedMap, TemplateContext, TemplateFactory, unload_map};
    pub use crate::systems::{MapLoadResult, MapLoadResults, PendingMapLoads};
}

pub use plugin::TilestreamCorePlugin;
