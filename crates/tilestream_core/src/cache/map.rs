//! Parsed-map cache: a bounded strong LRU backed by an unbounded weak tier.
//!
//! Documents demoted from the strong tier stay reachable for as long as some
//! other owner (a running load, a `MaterializedMap`) keeps them alive. A weak
//! entry whose document was dropped counts as reclaimed and is a miss.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bevy::{platform::collections::HashMap, prelude::*};
use parking_lot::RwLock;
use tilestream_assets::prelude::{DecodeError, MapDocument};

use crate::components::map::MapId;

struct StrongEntry {
    document: Arc<MapDocument>,
    last_used: AtomicU64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    weak_hits: AtomicU64,
    misses: AtomicU64,
    reclaimed: AtomicU64,
}

/// Snapshot of [`ParsedMapCache`] counters and tier sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MapCacheStats {
    pub hits: u64,
    pub weak_hits: u64,
    /// Lookups that ended in a decode
    pub misses: u64,
    pub reclaimed: u64,
    pub strong_len: usize,
    pub weak_len: usize,
}

pub struct ParsedMapCache {
    capacity: usize,
    strong: RwLock<HashMap<MapId, StrongEntry>>,
    weak: RwLock<HashMap<MapId, Weak<MapDocument>>>,
    clock: AtomicU64,
    counters: Counters,
}

impl ParsedMapCache {
    /// Create a cache holding at most `capacity` (at least 1) documents strongly.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            strong: RwLock::new(HashMap::new()),
            weak: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Look a document up without decoding anything.
    ///
    /// A live weak entry is promoted back into the strong tier.
    pub fn get(&self, map_id: &MapId) -> Option<Arc<MapDocument>> {
        if let Some(entry) = self.strong.read().get(map_id) {
            entry.last_used.store(self.tick(), Ordering::Relaxed);
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.document.clone());
        }

        let upgraded = self.weak.read().get(map_id).map(Weak::upgrade);
        match upgraded {
            Some(Some(document)) => {
                self.counters.weak_hits.fetch_add(1, Ordering::Relaxed);
                self.weak.write().remove(map_id);
                Some(self.insert_strong(map_id.clone(), document))
            }
            Some(None) => {
                self.counters.reclaimed.fetch_add(1, Ordering::Relaxed);
                self.weak.write().remove(map_id);
                None
            }
            None => None,
        }
    }

    /// Return the cached document or decode `bytes` with `decode`.
    ///
    /// If another load inserted the same id while this one was decoding, the
    /// earlier document is returned and this decode is discarded.
    pub fn get_or_parse(
        &self,
        map_id: &MapId,
        bytes: &[u8],
        decode: impl FnOnce(&[u8]) -> Result<MapDocument, DecodeError>,
    ) -> Result<Arc<MapDocument>, DecodeError> {
        if let Some(document) = self.get(map_id) {
            return Ok(document);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let document = Arc::new(decode(bytes)?);
        Ok(self.insert_strong(map_id.clone(), document))
    }

    fn insert_strong(&self, map_id: MapId, document: Arc<MapDocument>) -> Arc<MapDocument> {
        let mut demoted = Vec::new();
        let result = {
            let mut strong = self.strong.write();
            if let Some(existing) = strong.get(&map_id) {
                existing.last_used.store(self.tick(), Ordering::Relaxed);
                return existing.document.clone();
            }
            strong.insert(
                map_id.clone(),
                StrongEntry {
                    document: document.clone(),
                    last_used: AtomicU64::new(self.tick()),
                },
            );
            while strong.len() > self.capacity {
                let Some(victim) = strong
                    .iter()
                    .filter(|(id, _)| **id != map_id)
                    .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                    .map(|(id, _)| id.clone())
                else {
                    break;
                };
                if let Some(entry) = strong.remove(&victim) {
                    demoted.push((victim, Arc::downgrade(&entry.document)));
                }
            }
            document
        };

        if !demoted.is_empty() {
            let mut weak = self.weak.write();
            for (id, doc) in demoted {
                debug!("Demoting map {} to weak tier", id);
                weak.insert(id, doc);
            }
        }
        result
    }

    /// Forget a map in both tiers.
    pub fn invalidate(&self, map_id: &MapId) {
        self.strong.write().remove(map_id);
        self.weak.write().remove(map_id);
    }

    /// Demote every strong entry to the weak tier.
    ///
    /// Call under memory pressure: documents nobody else holds are freed.
    pub fn trim(&self) {
        let drained: Vec<(MapId, StrongEntry)> = self.strong.write().drain().collect();
        let mut weak = self.weak.write();
        for (id, entry) in drained {
            weak.insert(id, Arc::downgrade(&entry.document));
        }
        weak.retain(|_, doc| doc.strong_count() > 0);
    }

    pub fn clear(&self) {
        self.strong.write().clear();
        self.weak.write().clear();
    }

    pub fn stats(&self) -> MapCacheStats {
        MapCacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            weak_hits: self.counters.weak_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            reclaimed: self.counters.reclaimed.load(Ordering::Relaxed),
            strong_len: self.strong.read().len(),
            weak_len: self.weak.read().len(),
        }
    }
}
