use std::sync::Arc;

use bevy::platform::collections::HashMap;
use parking_lot::RwLock;

use crate::cache::TilesetKey;
use crate::components::tile::TileVisual;

/// Flyweight store of [`TileVisual`]s, one per (tileset, local id).
#[derive(Debug, Default)]
pub struct TileVisualCache {
    entries: RwLock<HashMap<TilesetKey, HashMap<u32, Arc<TileVisual>>>>,
}

impl TileVisualCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared visual of a tile, created with `make` on first use.
    ///
    /// When two loads race, the first inserted visual wins and both get it.
    pub fn get_or_insert(
        &self,
        key: &TilesetKey,
        local_id: u32,
        make: impl FnOnce() -> TileVisual,
    ) -> Arc<TileVisual> {
        if let Some(visual) = self
            .entries
            .read()
            .get(key)
            .and_then(|visuals| visuals.get(&local_id))
        {
            return visual.clone();
        }

        let visual = Arc::new(make());
        self.entries
            .write()
            .entry(key.clone())
            .or_default()
            .entry(local_id)
            .or_insert(visual)
            .clone()
    }

    pub fn invalidate(&self, key: &TilesetKey) {
        self.entries.write().remove(key);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of distinct visuals.
    pub fn len(&self) -> usize {
        self.entries.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
