//! Process-wide caches shared by every load.
//!
//! [`TileCaches`] owns all of them and is injected into the `MapLoader`, so two
//! loaders can share caches by sharing the same `Arc<TileCaches>`.

use tilestream_assets::prelude::TextureProvider;

use crate::config::LoaderConfig;

mod key;
pub mod map;
pub mod source_rect;
pub mod tileset;
pub mod visual;

pub use key::TilesetKey;
pub use map::{MapCacheStats, ParsedMapCache};
pub use source_rect::{SourceRectCache, SourceRectStats};
pub use tileset::{LoadedTileset, TilesetCache, TilesetCacheStats, TilesetSource};
pub use visual::TileVisualCache;

/// All caches used by the loading pipeline.
pub struct TileCaches {
    pub tilesets: TilesetCache,
    pub maps: ParsedMapCache,
    pub source_rects: SourceRectCache,
    pub visuals: TileVisualCache,
}

/// Snapshot of every cache's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub tilesets: TilesetCacheStats,
    pub maps: MapCacheStats,
    pub source_rects: SourceRectStats,
    pub visuals: usize,
}

impl TileCaches {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            tilesets: TilesetCache::new(config.hot_capacity, config.warm_capacity),
            maps: ParsedMapCache::new(config.map_cache_capacity),
            source_rects: SourceRectCache::new(),
            visuals: TileVisualCache::new(),
        }
    }

    /// Drop everything derived from one tileset (hot reload, texture change).
    pub fn invalidate_tileset<T: TextureProvider>(&self, key: &TilesetKey, textures: &T) {
        self.tilesets.invalidate(key, textures);
        self.source_rects.invalidate(key);
        self.visuals.invalidate(key);
    }

    /// Empty every cache, releasing all bound textures.
    pub fn clear_all<T: TextureProvider>(&self, textures: &T) {
        self.tilesets.clear(textures);
        self.maps.clear();
        self.source_rects.clear();
        self.visuals.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            tilesets: self.tilesets.stats(),
            maps: self.maps.stats(),
            source_rects: self.source_rects.stats(),
            visuals: self.visuals.len(),
        }
    }
}
