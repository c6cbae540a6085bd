//! # `tilestream_assets`
//!
//! Pure data layer of `tilestream`. Decodes Tiled JSON map and tileset documents
//! into an immutable document model and defines the I/O interfaces the loading
//! pipeline talks to.
//!
//! **This crate does NOT touch the ECS** - caching, loading and entity creation
//! live in `tilestream_core`.
//!
//! ## Architecture
//!
//! - **Layer 1** (this crate): document model, decoders, readers
//! - **Layer 2** (`tilestream_core`): caches, orchestrator, materializer
//!
//! ## Example Usage
//!
//! ```rust
//! use tilestream_assets::prelude::*;
//!
//! let json = br#"{
//!     "width": 2, "height": 1, "tilewidth": 16, "tileheight": 16,
//!     "layers": [{"name": "ground", "type": "tilelayer", "width": 2, "height": 1, "data": [1, 0]}],
//!     "tilesets": [{"firstgid": 1, "source": "terrain.json"}]
//! }"#;
//! let map = decode_map(json).unwrap();
//! assert_eq!(map.layers[0].tiles(), Some(&[1, 0][..]));
//! ```

pub mod assets;
pub mod gid;
pub mod io;
pub mod loaders;
pub mod properties;

pub mod prelude {
    //! Common imports for `tilestream_assets` users.

    pub use crate::assets::map::{
        Layer, LayerImage, LayerKind, MapDocument, MapObject, TilesetRef, TilesetSourceRef,
    };
    pub use crate::assets::tileset::{AnimationDef, AnimationFrame, TileRect, Tileset, TilesetImage};
    pub use crate::gid::{FlipFlags, Gid};
    pub use crate::io::{
        AssetReader, FileAssetReader, HeadlessTextureProvider, MemoryAssetReader, ReadError,
        TextureError, TextureHandle, TextureProvider,
    };
    pub use crate::loaders::{DecodeError, decode_map, decode_tileset, resolve_relative_path};
    pub use crate::properties::{FromTiledProperty, Properties, PropertyValue};
}
