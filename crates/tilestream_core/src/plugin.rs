//! Plugin for `tilestream_core`.

use bevy::prelude::*;
use tilestream_assets::prelude::{AssetReader, TextureProvider};

use crate::components::animation::advance_tile_animations;
use crate::config::LoaderConfig;
use crate::loader::MapLoader;
use crate::properties::PropertyMapperRegistry;
use crate::spawn::TemplateFactory;
use crate::systems::{MapLoadResults, PendingMapLoads, finish_pending_loads};

/// Plugin that installs a [`MapLoader`] and the streaming systems.
///
/// Inserts the loader, its [`LoaderConfig`] and [`PropertyMapperRegistry`] as
/// resources, finishes background loads in `PreUpdate` and advances tile
/// animations in `Update`.
///
/// # Example
///
/// ```rust,no_run
/// use bevy::prelude::*;
/// use tilestream_assets::prelude::{FileAssetReader, HeadlessTextureProvider};
/// use tilestream_core::prelude::*;
///
/// type Loader = MapLoader<FileAssetReader, HeadlessTextureProvider<FileAssetReader>>;
///
/// fn main() {
///     let config = LoaderConfig::from_json(r#"{"hot_capacity": 16}"#).unwrap();
///     let textures = HeadlessTextureProvider::new(FileAssetReader::new("assets"));
///
///     App::new()
///         .add_plugins(MinimalPlugins)
///         .add_plugins(TilestreamCorePlugin::new(
///             config,
///             FileAssetReader::new("assets"),
///             textures,
///         ))
///         .add_systems(Startup, request_town)
///         .add_systems(Update, report_loads)
///         .run();
/// }
///
/// fn request_town(loader: Res<Loader>, mut pending: ResMut<PendingMapLoads>) {
///     loader.request(&mut pending, "maps/town.json", None);
/// }
///
/// fn report_loads(mut results: ResMut<MapLoadResults>) {
///     for result in results.drain() {
///         match result.outcome {
///             Ok(LoadOutcome::Loaded(map)) => info!("{}: {} entities", map.map_id, map.entity_count),
///             Ok(LoadOutcome::Cancelled) => info!("{} cancelled", result.map_id),
///             Err(err) => error!("{err}"),
///         }
///     }
/// }
/// ```
pub struct TilestreamCorePlugin<R: AssetReader, T: TextureProvider> {
    loader: MapLoader<R, T>,
}

impl<R: AssetReader, T: TextureProvider> TilestreamCorePlugin<R, T> {
    pub fn new(config: LoaderConfig, reader: R, textures: T) -> Self {
        Self {
            loader: MapLoader::new(config, reader, textures),
        }
    }

    /// Use an already configured loader, e.g. one sharing caches with another.
    pub fn from_loader(loader: MapLoader<R, T>) -> Self {
        Self { loader }
    }

    pub fn with_mappers(mut self, mappers: PropertyMapperRegistry) -> Self {
        self.loader = self.loader.with_mappers(mappers);
        self
    }

    pub fn with_templates(mut self, templates: impl TemplateFactory) -> Self {
        self.loader = self.loader.with_templates(templates);
        self
    }

    pub fn loader(&self) -> &MapLoader<R, T> {
        &self.loader
    }
}

impl<R: AssetReader, T: TextureProvider> Plugin for TilestreamCorePlugin<R, T> {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.loader.config().clone())
            .insert_resource(self.loader.mappers().clone())
            .insert_resource(self.loader.clone())
            .init_resource::<PendingMapLoads>()
            .init_resource::<MapLoadResults>();

        // Finished loads are materialized before user systems run
        app.add_systems(PreUpdate, finish_pending_loads::<R, T>)
            .add_systems(Update, advance_tile_animations);
    }
}
