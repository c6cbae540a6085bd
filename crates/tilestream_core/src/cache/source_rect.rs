use std::sync::atomic::{AtomicU64, Ordering};

use bevy::platform::collections::HashMap;
use parking_lot::RwLock;
use tilestream_assets::prelude::{TileRect, Tileset};

use crate::cache::TilesetKey;

/// Memoized atlas rectangles.
///
/// Entries are grouped per tileset and keyed by local tile id, since the same
/// tileset can start at a different `firstgid` in every map. A tileset's
/// entries only go away through [`SourceRectCache::invalidate`].
#[derive(Debug, Default)]
pub struct SourceRectCache {
    entries: RwLock<HashMap<TilesetKey, HashMap<u32, TileRect>>>,
    hits: AtomicU64,
    computed: AtomicU64,
}

/// Snapshot of [`SourceRectCache`] counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceRectStats {
    pub hits: u64,
    pub computed: u64,
    pub entries: usize,
}

impl SourceRectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rectangle of `gid` inside `tileset`, computing it on first use.
    ///
    /// # Arguments
    /// * `key` - Cache key of the tileset
    /// * `gid` - Global tile id without flip flags
    /// * `first_gid` - First global id of the tileset in the current map
    /// * `tileset` - The tileset metadata
    pub fn get_or_compute(
        &self,
        key: &TilesetKey,
        gid: u32,
        first_gid: u32,
        tileset: &Tileset,
    ) -> TileRect {
        let local = gid.saturating_sub(first_gid);
        if let Some(rect) = self
            .entries
            .read()
            .get(key)
            .and_then(|rects| rects.get(&local))
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return *rect;
        }

        let rect = tileset.tile_rect(local);
        self.computed.fetch_add(1, Ordering::Relaxed);
        self.entries
            .write()
            .entry(key.clone())
            .or_default()
            .insert(local, rect);
        rect
    }

    /// Drop every rectangle of a tileset (hot reload or texture change).
    pub fn invalidate(&self, key: &TilesetKey) {
        self.entries.write().remove(key);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn stats(&self) -> SourceRectStats {
        SourceRectStats {
            hits: self.hits.load(Ordering::Relaxed),
            computed: self.computed.load(Ordering::Relaxed),
            entries: self.entries.read().values().map(HashMap::len).sum(),
        }
    }
}
