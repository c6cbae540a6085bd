//! Three-tier tileset cache.
//!
//! - **Hot**: tileset metadata plus a bound texture, bounded and evicted in LRU order
//! - **Warm**: metadata only, bounded and evicted in LRU order
//! - **Cold**: the source path of every external tileset ever seen, unbounded
//!
//! A hot eviction removes the entry from the hot tier first, then releases its
//! texture and demotes the metadata to warm. Entries still referenced outside the
//! cache (by a load in progress) are pinned and never chosen as victims, so the hot
//! tier may exceed its capacity until those loads finish.
//!
//! Concurrent loads of the same key are single-flighted: later callers sleep on
//! the key's event and read the first caller's result once it is published.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bevy::{platform::collections::HashMap, prelude::*};
use event_listener::Event;
use parking_lot::{Mutex, RwLock};
use tilestream_assets::prelude::{
    AssetReader, ReadError, TextureHandle, TextureProvider, Tileset, decode_tileset,
    resolve_relative_path,
};

use crate::cache::TilesetKey;
use crate::config::TextureFailurePolicy;
use crate::error::LoadError;

/// Where a tileset definition comes from.
#[derive(Debug, Clone)]
pub enum TilesetSource {
    /// A separate tileset document, relative to the reader root
    External { path: PathBuf },
    /// A definition embedded in a map; `base_dir` is the map's directory
    Embedded {
        tileset: Arc<Tileset>,
        base_dir: PathBuf,
    },
}

/// A tileset with its texture bound.
///
/// Only handed out while resident in the hot tier. Holding the `Arc` pins the
/// entry there.
#[derive(Debug)]
pub struct LoadedTileset {
    pub key: TilesetKey,
    pub tileset: Arc<Tileset>,
    pub texture: TextureHandle,
    /// Atlas image path relative to the reader root
    pub image_path: PathBuf,
    /// Whether `texture` is the provider's placeholder
    pub placeholder: bool,
}

struct HotEntry {
    loaded: Arc<LoadedTileset>,
    last_used: AtomicU64,
}

struct WarmEntry {
    tileset: Arc<Tileset>,
    image_path: PathBuf,
    last_used: u64,
}

#[derive(Default)]
struct Counters {
    hot_hits: AtomicU64,
    warm_hits: AtomicU64,
    misses: AtomicU64,
    hot_evictions: AtomicU64,
    warm_evictions: AtomicU64,
}

/// Snapshot of [`TilesetCache`] counters and tier sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TilesetCacheStats {
    pub hot_hits: u64,
    pub warm_hits: u64,
    pub misses: u64,
    pub hot_evictions: u64,
    pub warm_evictions: u64,
    pub hot_len: usize,
    pub warm_len: usize,
    pub cold_len: usize,
}

pub struct TilesetCache {
    hot_capacity: usize,
    warm_capacity: usize,
    hot: RwLock<HashMap<TilesetKey, HotEntry>>,
    warm: Mutex<HashMap<TilesetKey, WarmEntry>>,
    cold: RwLock<HashMap<TilesetKey, PathBuf>>,
    /// Keys being loaded, with the event their waiters sleep on
    in_flight: Mutex<HashMap<TilesetKey, Event>>,
    clock: AtomicU64,
    counters: Counters,
}

/// Clears the in-flight marker of a key and wakes its waiters when the owning
/// load ends, including on error.
struct FlightGuard<'a> {
    cache: &'a TilesetCache,
    key: TilesetKey,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(event) = self.cache.in_flight.lock().remove(&self.key) {
            event.notify(usize::MAX);
        }
    }
}

impl TilesetCache {
    /// Create a cache. Capacities below 1 are raised to 1.
    pub fn new(hot_capacity: usize, warm_capacity: usize) -> Self {
        Self {
            hot_capacity: hot_capacity.max(1),
            warm_capacity: warm_capacity.max(1),
            hot: RwLock::new(HashMap::new()),
            warm: Mutex::new(HashMap::new()),
            cold: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Resolve a tileset through the tiers, loading it on a full miss.
    ///
    /// # Arguments
    /// * `key` - Cache key of the tileset
    /// * `source` - Where to find the definition on a cold miss
    /// * `reader` - Reader for external tileset documents
    /// * `textures` - Provider that binds the atlas image
    /// * `policy` - What to do when binding the texture fails
    ///
    /// # Returns
    /// * `Ok(Arc<LoadedTileset>)` - The hot entry
    /// * `Err(LoadError)` - `MissingTileset`, `MalformedDocument`, `Io` or `TextureLoadFailure`
    pub async fn get_or_load<R: AssetReader, T: TextureProvider>(
        &self,
        key: &TilesetKey,
        source: &TilesetSource,
        reader: &R,
        textures: &T,
        policy: TextureFailurePolicy,
    ) -> Result<Arc<LoadedTileset>, LoadError> {
        let _guard = loop {
            if let Some(loaded) = self.hot_lookup(key) {
                self.counters.hot_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(loaded);
            }
            // Registered under the lock, so the owner's notify cannot be missed
            let listener = {
                let mut in_flight = self.in_flight.lock();
                match in_flight.get(key) {
                    Some(event) => event.listen(),
                    None => {
                        in_flight.insert(key.clone(), Event::new());
                        break FlightGuard {
                            cache: self,
                            key: key.clone(),
                        };
                    }
                }
            };
            trace!("Waiting for tileset {} loaded by another caller", key);
            listener.await;
        };

        // The previous owner may have published between our lookup and insert
        if let Some(loaded) = self.hot_lookup(key) {
            self.counters.hot_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(loaded);
        }

        let (tileset, image_path) = match self.take_warm(key) {
            Some(entry) => {
                self.counters.warm_hits.fetch_add(1, Ordering::Relaxed);
                (entry.tileset, entry.image_path)
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.load_metadata(key, source, reader).await?
            }
        };

        let (texture, placeholder) = match textures.load_texture(key.as_str(), &image_path).await {
            Ok(handle) => (handle, false),
            Err(err) => match policy {
                TextureFailurePolicy::Abort => {
                    self.insert_warm(key.clone(), tileset, image_path.clone());
                    return Err(LoadError::TextureLoadFailure {
                        tileset: key.to_string(),
                        path: image_path,
                        source: err,
                    });
                }
                TextureFailurePolicy::Placeholder => {
                    warn!(
                        "Texture {} of tileset {} failed to load ({}), using placeholder",
                        image_path.display(),
                        key,
                        err
                    );
                    (textures.placeholder(), true)
                }
            },
        };

        let loaded = Arc::new(LoadedTileset {
            key: key.clone(),
            tileset,
            texture,
            image_path,
            placeholder,
        });
        self.insert_hot(loaded.clone(), textures);
        Ok(loaded)
    }

    async fn load_metadata<R: AssetReader>(
        &self,
        key: &TilesetKey,
        source: &TilesetSource,
        reader: &R,
    ) -> Result<(Arc<Tileset>, PathBuf), LoadError> {
        match source {
            TilesetSource::External { path } => {
                self.cold.write().insert(key.clone(), path.clone());
                debug!("Reading tileset {}", path.display());
                let bytes = reader.read(path).await.map_err(|err| match err {
                    ReadError::NotFound(path) => LoadError::MissingTileset {
                        tileset: key.to_string(),
                        path,
                    },
                    other => LoadError::Io {
                        document: key.to_string(),
                        source: other,
                    },
                })?;
                let tileset = decode_tileset(&bytes)
                    .map_err(|err| LoadError::from_decode(key.as_str(), err))?;
                let base_dir = path.parent().unwrap_or(Path::new(""));
                let image_path =
                    resolve_relative_path(base_dir, &tileset.image.source.to_string_lossy());
                Ok((Arc::new(tileset), image_path))
            }
            TilesetSource::Embedded { tileset, base_dir } => {
                let image_path =
                    resolve_relative_path(base_dir, &tileset.image.source.to_string_lossy());
                Ok((tileset.clone(), image_path))
            }
        }
    }

    fn hot_lookup(&self, key: &TilesetKey) -> Option<Arc<LoadedTileset>> {
        let hot = self.hot.read();
        let entry = hot.get(key)?;
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(entry.loaded.clone())
    }

    fn take_warm(&self, key: &TilesetKey) -> Option<WarmEntry> {
        self.warm.lock().remove(key)
    }

    fn insert_hot<T: TextureProvider>(&self, loaded: Arc<LoadedTileset>, textures: &T) {
        let key = loaded.key.clone();
        let evicted = {
            let mut hot = self.hot.write();
            hot.insert(
                key.clone(),
                HotEntry {
                    loaded,
                    last_used: AtomicU64::new(self.tick()),
                },
            );
            let mut evicted = Vec::new();
            while hot.len() > self.hot_capacity {
                // Only the hot tier holds an unpinned entry
                let Some(victim) = hot
                    .iter()
                    .filter(|(k, entry)| **k != key && Arc::strong_count(&entry.loaded) == 1)
                    .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                    .map(|(k, _)| k.clone())
                else {
                    debug!(
                        "Hot tier over capacity ({} > {}), remaining tilesets are in use",
                        hot.len(),
                        self.hot_capacity
                    );
                    break;
                };
                if let Some(entry) = hot.remove(&victim) {
                    evicted.push(entry.loaded);
                }
            }
            evicted
        };

        // Released only after leaving the hot tier
        for loaded in evicted {
            self.counters.hot_evictions.fetch_add(1, Ordering::Relaxed);
            debug!("Evicting tileset {} from hot tier", loaded.key);
            if !loaded.placeholder {
                textures.unload_texture(loaded.key.as_str());
            }
            self.insert_warm(
                loaded.key.clone(),
                loaded.tileset.clone(),
                loaded.image_path.clone(),
            );
        }
    }

    fn insert_warm(&self, key: TilesetKey, tileset: Arc<Tileset>, image_path: PathBuf) {
        let last_used = self.tick();
        let mut warm = self.warm.lock();
        warm.insert(
            key.clone(),
            WarmEntry {
                tileset,
                image_path,
                last_used,
            },
        );
        while warm.len() > self.warm_capacity {
            let Some(victim) = warm
                .iter()
                .filter(|(k, _)| **k != key)
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            warm.remove(&victim);
            self.counters.warm_evictions.fetch_add(1, Ordering::Relaxed);
            debug!("Evicting tileset {} from warm tier", victim);
        }
    }

    /// Whether `key` is resident in the hot tier. Does not touch the LRU order.
    pub fn is_hot(&self, key: &TilesetKey) -> bool {
        self.hot.read().contains_key(key)
    }

    /// Metadata held in the warm tier, without promoting it.
    pub fn warm_tileset(&self, key: &TilesetKey) -> Option<Arc<Tileset>> {
        self.warm.lock().get(key).map(|entry| entry.tileset.clone())
    }

    /// Source path recorded in the cold tier.
    pub fn cold_path(&self, key: &TilesetKey) -> Option<PathBuf> {
        self.cold.read().get(key).cloned()
    }

    /// Drop the hot and warm entries of `key`, releasing its texture.
    ///
    /// The cold path is kept so the next load reads the document again.
    pub fn invalidate<T: TextureProvider>(&self, key: &TilesetKey, textures: &T) {
        let removed = self.hot.write().remove(key);
        if removed.is_some_and(|entry| !entry.loaded.placeholder) {
            textures.unload_texture(key.as_str());
        }
        self.warm.lock().remove(key);
    }

    /// Empty every tier, releasing all bound textures.
    pub fn clear<T: TextureProvider>(&self, textures: &T) {
        let drained: Vec<HotEntry> = self.hot.write().drain().map(|(_, entry)| entry).collect();
        for entry in drained {
            if !entry.loaded.placeholder {
                textures.unload_texture(entry.loaded.key.as_str());
            }
        }
        self.warm.lock().clear();
        self.cold.write().clear();
    }

    pub fn stats(&self) -> TilesetCacheStats {
        TilesetCacheStats {
            hot_hits: self.counters.hot_hits.load(Ordering::Relaxed),
            warm_hits: self.counters.warm_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            hot_evictions: self.counters.hot_evictions.load(Ordering::Relaxed),
            warm_evictions: self.counters.warm_evictions.load(Ordering::Relaxed),
            hot_len: self.hot.read().len(),
            warm_len: self.warm.lock().len(),
            cold_len: self.cold.read().len(),
        }
    }
}
