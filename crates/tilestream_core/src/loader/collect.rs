//! Layer collection: classify every non-empty cell of a tile layer.
//!
//! Runs on the compute task pool and never touches the `World`. Work that
//! depends only on the gid (tileset lookup, source rectangle, flyweight,
//! mapper classification) runs once per distinct gid and is shared by `Arc`.

use std::sync::Arc;

use bevy::{platform::collections::HashMap, prelude::*};
use tilestream_assets::prelude::{FlipFlags, Gid, LayerKind, MapDocument, Properties};

use crate::cache::{LoadedTileset, TileCaches};
use crate::components::map::MapId;
use crate::components::tile::TileVisual;
use crate::error::LoadError;
use crate::pool::BufferPool;
use crate::properties::{PropertyMapperRegistry, TileArchetype};

/// A tileset bound to its position in one map's gid space.
#[derive(Debug, Clone)]
pub struct ResolvedTileset {
    pub first_gid: u32,
    pub loaded: Arc<LoadedTileset>,
}

impl ResolvedTileset {
    /// Exclusive end of the gid range, from the real tile count. Saturates at `u32::MAX`.
    pub fn end_gid(&self) -> u32 {
        self.first_gid.saturating_add(self.loaded.tileset.tile_count)
    }
}

/// Loaded tilesets of one map, sorted by `first_gid`.
#[derive(Debug, Clone, Default)]
pub struct TilesetTable {
    entries: Vec<ResolvedTileset>,
}

impl TilesetTable {
    pub fn new(mut entries: Vec<ResolvedTileset>) -> Self {
        entries.sort_by_key(|entry| entry.first_gid);
        Self { entries }
    }

    /// Tileset whose real range contains `gid`.
    pub fn lookup(&self, gid: u32) -> Option<&ResolvedTileset> {
        let idx = self.entries.partition_point(|entry| entry.first_gid <= gid);
        let entry = self.entries.get(idx.checked_sub(1)?)?;
        (gid < entry.end_gid()).then_some(entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedTileset> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything known about one gid, shared by all its cells.
#[derive(Debug)]
pub struct TileClass {
    /// Global id without flip flags
    pub gid: u32,
    pub visual: Arc<TileVisual>,
    pub archetype: TileArchetype,
    /// Indices of the mappers that apply, in registration order
    pub mappers: Vec<usize>,
    pub properties: Option<Arc<Properties>>,
}

/// One non-empty cell.
#[derive(Debug, Clone)]
pub struct ClassifiedTile {
    pub x: u32,
    pub y: u32,
    pub flip: FlipFlags,
    pub class: Arc<TileClass>,
}

/// Collected form of one layer.
///
/// Tile layers carry one buffer per [`TileArchetype`]; object and image layers
/// carry empty buffers and are materialized straight from the document.
#[derive(Debug)]
pub struct LayerBatch {
    pub layer_index: usize,
    /// Layer-level `elevation` property
    pub elevation_override: Option<i32>,
    pub buckets: [Vec<ClassifiedTile>; 5],
}

impl LayerBatch {
    pub fn tile_count(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Hand the bucket buffers back to the pool.
    pub fn recycle(self, pool: &BufferPool<ClassifiedTile>) {
        for bucket in self.buckets {
            pool.release(bucket);
        }
    }
}

/// Shared inputs of every layer collection task of one load.
pub struct CollectContext {
    pub map_id: MapId,
    pub document: Arc<MapDocument>,
    pub tilesets: TilesetTable,
    pub caches: Arc<TileCaches>,
    pub mappers: PropertyMapperRegistry,
    pub pool: Arc<BufferPool<ClassifiedTile>>,
}

/// Collect one layer of the document.
///
/// # Returns
/// * `Ok(LayerBatch)` - Cells grouped by archetype bucket, in row-major order
/// * `Err(LoadError::InvalidGidRange)` - A gid is outside its loaded tileset's real tile count
pub fn collect_layer(ctx: &CollectContext, layer_index: usize) -> Result<LayerBatch, LoadError> {
    let mut batch = LayerBatch {
        layer_index,
        elevation_override: None,
        buckets: Default::default(),
    };
    let Some(layer) = ctx.document.layers.get(layer_index) else {
        return Ok(batch);
    };
    batch.elevation_override = layer
        .properties
        .get_as::<i64>("elevation")
        .and_then(|e| i32::try_from(e).ok());
    let LayerKind::Tiles(cells) = &layer.kind else {
        return Ok(batch);
    };

    let width = layer.width.max(1);
    let mut classes: HashMap<u32, Arc<TileClass>> = HashMap::new();
    let mut buckets: [Vec<ClassifiedTile>; 5] = std::array::from_fn(|_| ctx.pool.acquire(0));

    for (index, &raw) in cells.iter().enumerate() {
        let cell = Gid(raw);
        if cell.is_empty() {
            continue;
        }
        let x = index as u32 % width;
        let y = index as u32 / width;
        let gid = cell.id();

        let class = match classes.get(&gid) {
            Some(class) => class.clone(),
            None => {
                let Some(class) = classify_gid(ctx, gid) else {
                    for bucket in buckets {
                        ctx.pool.release(bucket);
                    }
                    return Err(LoadError::InvalidGidRange {
                        document: ctx.map_id.to_string(),
                        layer: layer.name.clone(),
                        x,
                        y,
                        gid,
                    });
                };
                classes.insert(gid, class.clone());
                class
            }
        };

        buckets[class.archetype.index()].push(ClassifiedTile {
            x,
            y,
            flip: cell.flip(),
            class,
        });
    }

    trace!(
        "Collected layer `{}` of {}: {} tiles, {} distinct gids",
        layer.name,
        ctx.map_id,
        buckets.iter().map(Vec::len).sum::<usize>(),
        classes.len()
    );
    batch.buckets = buckets;
    Ok(batch)
}

fn classify_gid(ctx: &CollectContext, gid: u32) -> Option<Arc<TileClass>> {
    let resolved = ctx.tilesets.lookup(gid)?;
    let loaded = &resolved.loaded;
    let local = gid - resolved.first_gid;
    let properties = loaded.tileset.tile_properties(local).cloned();

    let visual = ctx.caches.visuals.get_or_insert(&loaded.key, local, || {
        let source = ctx.caches.source_rects.get_or_compute(
            &loaded.key,
            gid,
            resolved.first_gid,
            &loaded.tileset,
        );
        TileVisual {
            texture: loaded.key.clone(),
            source,
            default_elevation: properties
                .as_ref()
                .and_then(|p| p.get_as::<i32>("elevation"))
                .unwrap_or(0),
        }
    });

    let classification = ctx.mappers.classify(properties.as_deref());
    Some(Arc::new(TileClass {
        gid,
        visual,
        archetype: classification.archetype,
        mappers: classification.mappers,
        properties,
    }))
}

#[cfg(test)]
mod tests {
    use tilestream_assets::prelude::{TextureHandle, TileRect, TilesetSourceRef, decode_map};

    use super::*;
    use crate::cache::TilesetKey;
    use crate::config::LoaderConfig;

    const MAP: &str = r#"{
        "width": 3, "height": 2, "tilewidth": 16, "tileheight": 16,
        "layers": [
            {"name": "ground", "type": "tilelayer", "width": 3, "height": 2,
             "data": [1, 2, 0, 2, 2147483651, 4],
             "properties": [{"name": "elevation", "type": "int", "value": 2}]},
            {"name": "things", "type": "objectgroup", "objects": []}
        ],
        "tilesets": [{
            "firstgid": 1, "name": "atlas", "tilewidth": 16, "tileheight": 16,
            "tilecount": 4, "columns": 2, "image": "atlas.png",
            "imagewidth": 32, "imageheight": 32,
            "tiles": [
                {"id": 1, "properties": [{"name": "solid", "type": "bool", "value": true},
                                         {"name": "elevation", "type": "int", "value": 1}]},
                {"id": 3, "properties": [{"name": "terrain", "type": "string", "value": "sand"}]}
            ]
        }]
    }"#;

    fn context(tile_count_override: Option<u32>) -> CollectContext {
        let map_id = MapId::from("maps/test.json");
        let document = Arc::new(decode_map(MAP.as_bytes()).unwrap());
        let TilesetSourceRef::Embedded(tileset) = &document.tilesets[0].source else {
            panic!("expected embedded tileset");
        };
        let mut tileset = (**tileset).clone();
        if let Some(count) = tile_count_override {
            tileset.tile_count = count;
        }
        let key = TilesetKey::embedded(&map_id, 1);
        let loaded = Arc::new(LoadedTileset {
            key,
            tileset: Arc::new(tileset),
            texture: TextureHandle(1),
            image_path: "maps/atlas.png".into(),
            placeholder: false,
        });
        CollectContext {
            map_id,
            document,
            tilesets: TilesetTable::new(vec![ResolvedTileset {
                first_gid: 1,
                loaded,
            }]),
            caches: Arc::new(TileCaches::new(&LoaderConfig::default())),
            mappers: PropertyMapperRegistry::with_defaults(),
            pool: Arc::new(BufferPool::new(4)),
        }
    }

    #[test]
    fn test_cells_are_bucketed_and_shared() {
        let ctx = context(None);
        let batch = collect_layer(&ctx, 0).unwrap();
        assert_eq!(batch.tile_count(), 5);
        assert_eq!(batch.elevation_override, Some(2));

        let ground = &batch.buckets[TileArchetype::Ground.index()];
        let solid = &batch.buckets[TileArchetype::Solid.index()];
        let other = &batch.buckets[TileArchetype::Other.index()];
        assert_eq!(ground.len(), 2);
        assert_eq!(solid.len(), 2);
        assert_eq!(other.len(), 1);

        // Both cells of gid 2 share one class and one flyweight
        assert!(Arc::ptr_eq(&solid[0].class, &solid[1].class));
        assert_eq!((solid[0].x, solid[0].y), (1, 0));
        assert_eq!((solid[1].x, solid[1].y), (0, 1));
        assert_eq!(solid[0].class.visual.default_elevation, 1);
        assert_eq!(solid[0].class.visual.source, TileRect::new(16, 0, 16, 16));

        // The flipped cell keeps its flags and resolves gid 3
        let flipped = ground.iter().find(|t| t.class.gid == 3).unwrap();
        assert!(flipped.flip.horizontal);
        assert_eq!((flipped.x, flipped.y), (1, 1));

        assert_eq!(ctx.caches.visuals.len(), 4);
    }

    #[test]
    fn test_non_tile_layer_is_empty() {
        let ctx = context(None);
        let batch = collect_layer(&ctx, 1).unwrap();
        assert_eq!(batch.tile_count(), 0);
    }

    #[test]
    fn test_gid_beyond_real_tile_count() {
        let ctx = context(Some(3));
        let err = collect_layer(&ctx, 0).unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidGidRange { gid: 4, x: 2, y: 1, .. }
        ));
    }

    #[test]
    fn test_range_end_saturates() {
        let ctx = context(None);
        let loaded = ctx.tilesets.lookup(1).unwrap().loaded.clone();
        let table = TilesetTable::new(vec![ResolvedTileset {
            first_gid: u32::MAX - 1,
            loaded,
        }]);
        let entry = table.lookup(u32::MAX - 1).unwrap();
        assert_eq!(entry.end_gid(), u32::MAX);
        assert!(table.lookup(u32::MAX - 2).is_none());
    }
}
