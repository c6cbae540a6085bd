//! # tilestream
//!
//! Cached, asynchronous tile-map streaming into the Bevy ECS.
//!
//! This is a meta-crate that re-exports the `tilestream_*` sub-crates.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bevy::prelude::*;
//! use tilestream::prelude::*;
//!
//! type Loader = MapLoader<FileAssetReader, HeadlessTextureProvider<FileAssetReader>>;
//!
//! fn main() {
//!     let reader = FileAssetReader::new("assets");
//!     let textures = HeadlessTextureProvider::new(reader.clone());
//!
//!     App::new()
//!         .add_plugins(MinimalPlugins)
//!         .add_plugins(TilestreamCorePlugin::new(LoaderConfig::default(), reader, textures))
//!         .add_systems(Startup, load_town)
//!         .run();
//! }
//!
//! fn load_town(loader: Res<Loader>, mut pending: ResMut<PendingMapLoads>) {
//!     loader.request(&mut pending, "maps/town.json", None);
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Layer 1** ([`assets`]): document model, JSON/base64/compression decoding,
//!   asset reader and texture provider interfaces
//! - **Layer 2** ([`core`]): caches, asynchronous loader, bulk materialization,
//!   property mappers and the streaming plugin

// Re-export sub-crates for advanced usage
pub use tilestream_assets as assets;
pub use tilestream_core as core;

/// Unified prelude for tilestream
pub mod prelude {
    pub use crate::assets::prelude::*;
    pub use crate::core::prelude::*;
}
