//! The load orchestrator.
//!
//! A load runs in four phases:
//!
//! 1. **Document**: resolved through the parsed-map cache, read only on a miss
//! 2. **Tilesets**: every tileset resolved through the tileset cache on the
//!    I/O pool, `max_parallel_tilesets` at a time
//! 3. **Layers**: every layer collected on the compute pool,
//!    `max_parallel_layers` at a time
//! 4. **Materializing**: entities created in one sequential pass
//!
//! The cancellation token is checked between phases and between batches. A
//! cancelled load returns [`LoadOutcome::Cancelled`] and leaves no entities.

use std::sync::Arc;

use bevy::{
    prelude::*,
    tasks::{AsyncComputeTaskPool, IoTaskPool, Task, TaskPool},
};
use tilestream_assets::prelude::{
    AssetReader, MapDocument, ReadError, TextureProvider, TilesetSourceRef, decode_map,
    resolve_relative_path,
};

use crate::cache::{TileCaches, TilesetKey, TilesetSource};
use crate::cancel::CancellationToken;
use crate::components::map::MapId;
use crate::config::LoaderConfig;
use crate::error::{LoadError, LoadOutcome};
use crate::loader::collect::{
    ClassifiedTile, CollectContext, LayerBatch, ResolvedTileset, TilesetTable, collect_layer,
};
use crate::pool::BufferPool;
use crate::properties::PropertyMapperRegistry;
use crate::spawn::{MaterializedMap, TemplateFactory, despawn_entities, materialize_map};
use crate::systems::{PendingLoad, PendingMapLoads};

/// Phase a load is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStage {
    Document,
    Tilesets,
    Layers,
    Materializing,
}

/// Progress report: `fraction` is the completed share of `stage`, in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadProgress {
    pub stage: LoadStage,
    pub fraction: f32,
}

/// Receives progress reports. May be called from task pool threads.
pub type ProgressCallback = Arc<dyn Fn(LoadProgress) + Send + Sync>;

fn report(progress: Option<&ProgressCallback>, stage: LoadStage, fraction: f32) {
    if let Some(callback) = progress {
        callback(LoadProgress { stage, fraction });
    }
}

/// A map whose document, tilesets and layers are ready to be materialized.
#[derive(Debug)]
pub struct PreparedMap {
    pub map_id: MapId,
    pub document: Arc<MapDocument>,
    pub tilesets: TilesetTable,
    /// One batch per document layer, in document order
    pub layers: Vec<LayerBatch>,
}

impl PreparedMap {
    /// Tile entities this map will create.
    pub fn tile_count(&self) -> usize {
        self.layers.iter().map(LayerBatch::tile_count).sum()
    }

    /// Drop the prepared data, returning its buffers to the pool.
    pub fn recycle(self, pool: &BufferPool<ClassifiedTile>) {
        for batch in self.layers {
            batch.recycle(pool);
        }
    }
}

/// Loads maps into a `World`.
///
/// Cloning is cheap: clones share the reader, texture provider, caches and pool.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use bevy::tasks::block_on;
/// use tilestream_assets::prelude::{HeadlessTextureProvider, MemoryAssetReader};
/// use tilestream_core::prelude::*;
///
/// let reader = MemoryAssetReader::new();
/// reader.insert("maps/tiny.json", r#"{
///     "width": 1, "height": 1, "tilewidth": 8, "tileheight": 8,
///     "layers": [{"name": "ground", "type": "tilelayer", "width": 1, "height": 1, "data": [1]}],
///     "tilesets": [{"firstgid": 1, "name": "t", "tilewidth": 8, "tileheight": 8,
///                   "tilecount": 1, "columns": 1, "image": "t.png"}]
/// }"#);
/// reader.insert("maps/t.png", vec![0u8; 4]);
///
/// let textures = HeadlessTextureProvider::new(reader.clone());
/// let loader = MapLoader::new(LoaderConfig::default(), reader, textures);
///
/// let mut world = World::new();
/// let outcome = block_on(loader.load_map(
///     &mut world,
///     &MapId::from("maps/tiny.json"),
///     &CancellationToken::new(),
///     None,
/// ))
/// .unwrap();
/// assert_eq!(outcome.loaded().unwrap().entity_count, 1);
/// ```
#[derive(Resource)]
pub struct MapLoader<R: AssetReader, T: TextureProvider> {
    reader: Arc<R>,
    textures: Arc<T>,
    caches: Arc<TileCaches>,
    mappers: PropertyMapperRegistry,
    templates: Option<Arc<dyn TemplateFactory>>,
    config: LoaderConfig,
    pool: Arc<BufferPool<ClassifiedTile>>,
}

impl<R: AssetReader, T: TextureProvider> Clone for MapLoader<R, T> {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.clone(),
            textures: self.textures.clone(),
            caches: self.caches.clone(),
            mappers: self.mappers.clone(),
            templates: self.templates.clone(),
            config: self.config.clone(),
            pool: self.pool.clone(),
        }
    }
}

impl<R: AssetReader, T: TextureProvider> MapLoader<R, T> {
    /// Create a loader with fresh caches and the built-in property mappers.
    pub fn new(config: LoaderConfig, reader: R, textures: T) -> Self {
        Self {
            reader: Arc::new(reader),
            textures: Arc::new(textures),
            caches: Arc::new(TileCaches::new(&config)),
            mappers: PropertyMapperRegistry::with_defaults(),
            templates: None,
            pool: Arc::new(BufferPool::new(config.pool_retain)),
            config,
        }
    }

    /// Replace the property mapper registry.
    pub fn with_mappers(mut self, mappers: PropertyMapperRegistry) -> Self {
        self.mappers = mappers;
        self
    }

    /// Spawn objects whose class names a known template through `templates`.
    pub fn with_templates(mut self, templates: impl TemplateFactory) -> Self {
        self.templates = Some(Arc::new(templates));
        self
    }

    /// Share caches with another loader.
    pub fn with_caches(mut self, caches: Arc<TileCaches>) -> Self {
        self.caches = caches;
        self
    }

    pub fn caches(&self) -> &Arc<TileCaches> {
        &self.caches
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn textures(&self) -> &T {
        &self.textures
    }

    pub fn mappers(&self) -> &PropertyMapperRegistry {
        &self.mappers
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn pool(&self) -> &BufferPool<ClassifiedTile> {
        &self.pool
    }

    /// Drop everything cached for one tileset, releasing its texture.
    pub fn invalidate_tileset(&self, key: &TilesetKey) {
        self.caches.invalidate_tileset(key, &*self.textures);
    }

    /// Load a map and materialize it into `world`.
    ///
    /// # Arguments
    /// * `world` - World the entities are created in
    /// * `map_id` - Document path relative to the reader root
    /// * `token` - Checked at every phase boundary
    /// * `progress` - Optional progress callback
    ///
    /// # Returns
    /// * `Ok(LoadOutcome::Loaded(map))` - Every entity of the map
    /// * `Ok(LoadOutcome::Cancelled)` - The token fired; no entities remain
    /// * `Err(LoadError)` - The load failed before any entity was created
    pub async fn load_map(
        &self,
        world: &mut World,
        map_id: &MapId,
        token: &CancellationToken,
        progress: Option<&ProgressCallback>,
    ) -> Result<LoadOutcome<MaterializedMap>, LoadError> {
        match self.prepare_map(map_id, token, progress).await? {
            LoadOutcome::Loaded(prepared) => Ok(self.materialize(world, prepared, token, progress)),
            LoadOutcome::Cancelled => Ok(LoadOutcome::Cancelled),
        }
    }

    /// Run every phase that does not touch the `World`.
    pub async fn prepare_map(
        &self,
        map_id: &MapId,
        token: &CancellationToken,
        progress: Option<&ProgressCallback>,
    ) -> Result<LoadOutcome<PreparedMap>, LoadError> {
        debug!("Loading map {}", map_id);
        report(progress, LoadStage::Document, 0.0);
        let document = self.load_document(map_id).await?;
        report(progress, LoadStage::Document, 1.0);
        if token.is_cancelled() {
            debug!("Load of {} cancelled after the document", map_id);
            return Ok(LoadOutcome::Cancelled);
        }

        let tilesets = match self.load_tilesets(map_id, &document, token, progress).await? {
            LoadOutcome::Loaded(tilesets) => tilesets,
            LoadOutcome::Cancelled => {
                debug!("Load of {} cancelled during tilesets", map_id);
                return Ok(LoadOutcome::Cancelled);
            }
        };

        let layers = match self
            .collect_layers(map_id, &document, &tilesets, token, progress)
            .await?
        {
            LoadOutcome::Loaded(layers) => layers,
            LoadOutcome::Cancelled => {
                debug!("Load of {} cancelled during layer collection", map_id);
                return Ok(LoadOutcome::Cancelled);
            }
        };

        Ok(LoadOutcome::Loaded(PreparedMap {
            map_id: map_id.clone(),
            document,
            tilesets,
            layers,
        }))
    }

    /// Create the entities of a prepared map.
    ///
    /// The token is checked before and after; a cancellation observed after
    /// materialization despawns everything just created.
    pub fn materialize(
        &self,
        world: &mut World,
        prepared: PreparedMap,
        token: &CancellationToken,
        progress: Option<&ProgressCallback>,
    ) -> LoadOutcome<MaterializedMap> {
        if token.is_cancelled() {
            debug!("Load of {} cancelled before materialization", prepared.map_id);
            prepared.recycle(&self.pool);
            return LoadOutcome::Cancelled;
        }

        report(progress, LoadStage::Materializing, 0.0);
        let map = materialize_map(
            world,
            prepared,
            &self.mappers,
            self.templates.as_deref(),
            &self.pool,
        );

        if token.is_cancelled() {
            debug!(
                "Load of {} cancelled after materialization, despawning {} entities",
                map.map_id, map.entity_count
            );
            despawn_entities(world, &map.entities);
            return LoadOutcome::Cancelled;
        }
        report(progress, LoadStage::Materializing, 1.0);
        info!("Loaded map {} ({} entities)", map.map_id, map.entity_count);
        LoadOutcome::Loaded(map)
    }

    /// Start preparing a map in the background.
    ///
    /// The finished load is materialized by `finish_pending_loads` and its
    /// outcome pushed into `MapLoadResults`. Cancel the returned token to
    /// abandon the load.
    pub fn request(
        &self,
        pending: &mut PendingMapLoads,
        map_id: impl Into<MapId>,
        progress: Option<ProgressCallback>,
    ) -> CancellationToken {
        let map_id = map_id.into();
        let token = CancellationToken::new();
        let task = {
            let loader = self.clone();
            let map_id = map_id.clone();
            let token = token.clone();
            let progress = progress.clone();
            IoTaskPool::get_or_init(TaskPool::new).spawn(async move {
                loader.prepare_map(&map_id, &token, progress.as_ref()).await
            })
        };
        debug!("Requested map {}", map_id);
        pending.push(PendingLoad {
            map_id,
            token: token.clone(),
            progress,
            task,
        });
        token
    }

    async fn load_document(&self, map_id: &MapId) -> Result<Arc<MapDocument>, LoadError> {
        if let Some(document) = self.caches.maps.get(map_id) {
            trace!("Map {} served from cache", map_id);
            return Ok(document);
        }
        let bytes = self
            .reader
            .read(map_id.path())
            .await
            .map_err(|err| match err {
                ReadError::NotFound(path) => LoadError::DocumentNotFound {
                    map_id: map_id.to_string(),
                    path,
                },
                other => LoadError::Io {
                    document: map_id.to_string(),
                    source: other,
                },
            })?;
        self.caches
            .maps
            .get_or_parse(map_id, &bytes, decode_map)
            .map_err(|err| LoadError::from_decode(map_id.as_str(), err))
    }

    async fn load_tilesets(
        &self,
        map_id: &MapId,
        document: &MapDocument,
        token: &CancellationToken,
        progress: Option<&ProgressCallback>,
    ) -> Result<LoadOutcome<TilesetTable>, LoadError> {
        let jobs: Vec<(u32, TilesetKey, TilesetSource)> = document
            .tilesets
            .iter()
            .map(|tileset_ref| match &tileset_ref.source {
                TilesetSourceRef::External { source, .. } => {
                    let path =
                        resolve_relative_path(map_id.base_dir(), &source.to_string_lossy());
                    (
                        tileset_ref.first_gid,
                        TilesetKey::external(&path),
                        TilesetSource::External { path },
                    )
                }
                TilesetSourceRef::Embedded(tileset) => (
                    tileset_ref.first_gid,
                    TilesetKey::embedded(map_id, tileset_ref.first_gid),
                    TilesetSource::Embedded {
                        tileset: tileset.clone(),
                        base_dir: map_id.base_dir().to_path_buf(),
                    },
                ),
            })
            .collect();

        let total = jobs.len();
        debug!("Resolving {} tilesets of {}", total, map_id);
        report(progress, LoadStage::Tilesets, 0.0);

        let task_pool = IoTaskPool::get_or_init(TaskPool::new);
        let policy = self.config.texture_failure;
        let mut resolved = Vec::with_capacity(total);
        for batch in jobs.chunks(self.config.max_parallel_tilesets.max(1)) {
            let tasks: Vec<Task<Result<ResolvedTileset, LoadError>>> = batch
                .iter()
                .cloned()
                .map(|(first_gid, key, source)| {
                    let caches = self.caches.clone();
                    let reader = self.reader.clone();
                    let textures = self.textures.clone();
                    task_pool.spawn(async move {
                        let loaded = caches
                            .tilesets
                            .get_or_load(&key, &source, &*reader, &*textures, policy)
                            .await?;
                        Ok(ResolvedTileset { first_gid, loaded })
                    })
                })
                .collect();

            // Every task of the batch is awaited so none outlives the load
            let mut failure = None;
            for task in tasks {
                match task.await {
                    Ok(tileset) => resolved.push(tileset),
                    Err(err) => {
                        failure.get_or_insert(err);
                    }
                }
            }
            if let Some(err) = failure {
                return Err(err);
            }

            report(progress, LoadStage::Tilesets, resolved.len() as f32 / total as f32);
            if token.is_cancelled() {
                return Ok(LoadOutcome::Cancelled);
            }
        }

        report(progress, LoadStage::Tilesets, 1.0);
        Ok(LoadOutcome::Loaded(TilesetTable::new(resolved)))
    }

    async fn collect_layers(
        &self,
        map_id: &MapId,
        document: &Arc<MapDocument>,
        tilesets: &TilesetTable,
        token: &CancellationToken,
        progress: Option<&ProgressCallback>,
    ) -> Result<LoadOutcome<Vec<LayerBatch>>, LoadError> {
        let ctx = Arc::new(CollectContext {
            map_id: map_id.clone(),
            document: document.clone(),
            tilesets: tilesets.clone(),
            caches: self.caches.clone(),
            mappers: self.mappers.clone(),
            pool: self.pool.clone(),
        });

        let total = document.layers.len();
        debug!("Collecting {} layers of {}", total, map_id);
        report(progress, LoadStage::Layers, 0.0);

        let task_pool = AsyncComputeTaskPool::get_or_init(TaskPool::new);
        let indices: Vec<usize> = (0..total).collect();
        let mut batches: Vec<LayerBatch> = Vec::with_capacity(total);
        for chunk in indices.chunks(self.config.max_parallel_layers.max(1)) {
            let tasks: Vec<Task<Result<LayerBatch, LoadError>>> = chunk
                .iter()
                .map(|&layer_index| {
                    let ctx = ctx.clone();
                    task_pool.spawn(async move { collect_layer(&ctx, layer_index) })
                })
                .collect();

            let mut failure = None;
            for task in tasks {
                match task.await {
                    Ok(batch) => batches.push(batch),
                    Err(err) => {
                        failure.get_or_insert(err);
                    }
                }
            }
            if let Some(err) = failure {
                self.recycle(batches);
                return Err(err);
            }

            report(progress, LoadStage::Layers, batches.len() as f32 / total as f32);
            if token.is_cancelled() {
                self.recycle(batches);
                return Ok(LoadOutcome::Cancelled);
            }
        }

        report(progress, LoadStage::Layers, 1.0);
        Ok(LoadOutcome::Loaded(batches))
    }

    fn recycle(&self, batches: Vec<LayerBatch>) {
        for batch in batches {
            batch.recycle(&self.pool);
        }
    }
}
