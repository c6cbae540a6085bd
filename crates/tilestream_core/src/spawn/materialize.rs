//! Bulk entity materialization.
//!
//! Runs on the caller's thread once every layer has been collected. Tiles of
//! one archetype bucket are created with a single `spawn_batch`, mapper
//! components are attached with one batch per mapper, and animations are bound
//! with one `insert_batch` for the whole map.

use std::sync::Arc;

use bevy::prelude::*;
use tilestream_assets::prelude::{
    Gid, Layer, LayerImage, LayerKind, MapDocument, MapObject, Properties, resolve_relative_path,
};

use crate::components::animation::{AnimationIndex, TileAnimation};
use crate::components::layer::{ImageLayerData, MapObjectData};
use crate::components::map::{MapId, MapMember};
use crate::components::tile::{TileGid, TileInstance, TilePosition, TileVisualRef};
use crate::loader::collect::{ClassifiedTile, LayerBatch};
use crate::loader::orchestrator::PreparedMap;
use crate::pool::BufferPool;
use crate::properties::{PropertyMapperRegistry, TileArchetype};
use crate::spawn::template::{TemplateContext, TemplateFactory};

/// Entities created for one map.
#[derive(Debug, Clone)]
pub struct MaterializedMap {
    pub map_id: MapId,
    pub document: Arc<MapDocument>,
    /// Every entity created, tiles first within each layer
    pub entities: Vec<Entity>,
    pub entity_count: usize,
    pub tile_count: usize,
    /// Tiles that received a `TileAnimation`
    pub animated_count: usize,
}

/// Create the entities of a prepared map.
///
/// Layers are processed in document order. Buffers of the prepared layers are
/// returned to `pool`.
pub fn materialize_map(
    world: &mut World,
    prepared: PreparedMap,
    mappers: &PropertyMapperRegistry,
    templates: Option<&dyn TemplateFactory>,
    pool: &BufferPool<ClassifiedTile>,
) -> MaterializedMap {
    let PreparedMap {
        map_id,
        document,
        tilesets,
        layers,
    } = prepared;

    let animations = AnimationIndex::build(
        tilesets
            .iter()
            .map(|resolved| (resolved.first_gid, &*resolved.loaded.tileset)),
    );
    let tile_count = layers.iter().map(LayerBatch::tile_count).sum();
    let mut entities = Vec::with_capacity(tile_count);
    let mut animated: Vec<(Entity, TileAnimation)> = Vec::new();

    for batch in layers {
        let Some(layer) = document.layers.get(batch.layer_index) else {
            batch.recycle(pool);
            continue;
        };
        let layer_index = batch.layer_index as u32;
        let before = entities.len();
        match &layer.kind {
            LayerKind::Tiles(_) => spawn_tiles(
                world,
                &map_id,
                &batch,
                mappers,
                &animations,
                &mut entities,
                &mut animated,
            ),
            LayerKind::Image(image) => {
                entities.push(spawn_image(world, &map_id, layer_index, layer, image));
            }
            LayerKind::Objects(objects) => spawn_objects(
                world,
                &map_id,
                layer_index,
                layer,
                objects,
                templates,
                &mut entities,
            ),
        }
        trace!(
            "Materialized layer `{}` of {}: {} entities",
            layer.name,
            map_id,
            entities.len() - before
        );
        batch.recycle(pool);
    }

    // One pass over every animated tile of the map
    let animated_count = animated.len();
    if !animated.is_empty() {
        world.insert_batch(animated);
    }

    debug!(
        "Materialized {}: {} tiles, {} animated, {} entities",
        map_id,
        tile_count,
        animated_count,
        entities.len()
    );
    MaterializedMap {
        map_id,
        document,
        entity_count: entities.len(),
        entities,
        tile_count,
        animated_count,
    }
}

fn spawn_tiles(
    world: &mut World,
    map_id: &MapId,
    batch: &LayerBatch,
    mappers: &PropertyMapperRegistry,
    animations: &AnimationIndex,
    entities: &mut Vec<Entity>,
    animated: &mut Vec<(Entity, TileAnimation)>,
) {
    let layer = batch.layer_index as u32;
    let mut targets: Vec<Vec<(Entity, &Properties)>> = vec![Vec::new(); mappers.len()];

    for archetype in TileArchetype::ALL {
        let tiles = &batch.buckets[archetype.index()];
        if tiles.is_empty() {
            continue;
        }

        let spawned: Vec<Entity> = world
            .spawn_batch(tiles.iter().map(|tile| {
                (
                    MapMember(map_id.clone()),
                    TilePosition {
                        layer,
                        x: tile.x,
                        y: tile.y,
                    },
                    TileGid(tile.class.gid),
                    TileVisualRef(tile.class.visual.clone()),
                    TileInstance {
                        flip: tile.flip,
                        elevation_override: batch.elevation_override,
                    },
                )
            }))
            .collect();

        for (&entity, tile) in spawned.iter().zip(tiles) {
            if let Some(properties) = tile.class.properties.as_deref() {
                for &index in &tile.class.mappers {
                    targets[index].push((entity, properties));
                }
            }
            if let Some(frames) = animations.get(tile.class.gid) {
                animated.push((entity, TileAnimation::new(frames.clone())));
            }
        }

        for (index, targets) in targets.iter_mut().enumerate() {
            if targets.is_empty() {
                continue;
            }
            if let Some(mapper) = mappers.get(index) {
                mapper.apply_batch(world, targets);
            }
            targets.clear();
        }
        entities.extend(spawned);
    }
}

fn spawn_image(
    world: &mut World,
    map_id: &MapId,
    layer_index: u32,
    layer: &Layer,
    image: &LayerImage,
) -> Entity {
    let source = resolve_relative_path(map_id.base_dir(), &image.source.to_string_lossy());
    world
        .spawn((
            MapMember(map_id.clone()),
            ImageLayerData {
                layer: layer_index,
                name: layer.name.clone(),
                source,
                offset: layer.offset,
                opacity: layer.opacity,
                visible: layer.visible,
            },
        ))
        .id()
}

fn spawn_objects(
    world: &mut World,
    map_id: &MapId,
    layer_index: u32,
    layer: &Layer,
    objects: &[MapObject],
    templates: Option<&dyn TemplateFactory>,
    entities: &mut Vec<Entity>,
) {
    let mut plain = Vec::with_capacity(objects.len());
    for object in objects {
        let data = MapObjectData {
            layer: layer_index,
            id: object.id,
            name: object.name.clone(),
            class: object.class.clone(),
            position: Vec2::new(object.x, object.y),
            size: Vec2::new(object.width, object.height),
            rotation: object.rotation,
            visible: object.visible,
            gid: object.gid.map(|gid| Gid(gid).id()),
            properties: object.properties.clone(),
        };

        let factory =
            templates.filter(|t| !object.class.is_empty() && t.has_template(&object.class));
        let Some(factory) = factory else {
            plain.push((MapMember(map_id.clone()), data));
            continue;
        };

        let context = TemplateContext {
            map_id,
            layer: layer_index,
            layer_name: &layer.name,
            object,
        };
        let entity = factory.spawn_from_template(&object.class, world, &context);
        match world.get_entity_mut(entity) {
            Ok(mut spawned) => {
                spawned.insert((MapMember(map_id.clone()), data));
                entities.push(entity);
            }
            Err(_) => warn!(
                "Template `{}` for object {} of {} returned a missing entity",
                object.class, object.id, map_id
            ),
        }
    }
    entities.extend(world.spawn_batch(plain));
}

#[cfg(test)]
mod tests {
    use bevy::tasks::block_on;
    use tilestream_assets::prelude::{HeadlessTextureProvider, MemoryAssetReader};

    use super::*;
    use crate::cancel::CancellationToken;
    use crate::components::gameplay::{Collision, TerrainType};
    use crate::config::LoaderConfig;
    use crate::loader::MapLoader;

    const MAP: &str = r#"{
        "width": 2, "height": 2, "tilewidth": 16, "tileheight": 16,
        "layers": [
            {"name": "ground", "type": "tilelayer", "width": 2, "height": 2, "data": [1, 2, 2, 0]},
            {"name": "sky", "type": "imagelayer", "image": "../art/sky.png",
             "offsetx": 4, "offsety": 8, "opacity": 0.5, "visible": false},
            {"name": "things", "type": "objectgroup", "objects": [
                {"id": 1, "name": "door", "class": "door", "x": 16, "y": 0, "width": 16, "height": 16},
                {"id": 2, "name": "sign", "type": "sign", "x": 0, "y": 16, "width": 16, "height": 16,
                 "properties": [{"name": "text", "type": "string", "value": "hello"}]}
            ]}
        ],
        "tilesets": [{
            "firstgid": 1, "name": "t", "tilewidth": 16, "tileheight": 16,
            "tilecount": 2, "columns": 2, "image": "t.png",
            "tiles": [{"id": 1, "properties": [
                {"name": "solid", "type": "bool", "value": true},
                {"name": "terrain", "type": "string", "value": "rock"}
            ]}]
        }]
    }"#;

    #[derive(Component)]
    struct Door;

    struct DoorTemplates;

    impl TemplateFactory for DoorTemplates {
        fn has_template(&self, id: &str) -> bool {
            id == "door"
        }

        fn spawn_from_template(
            &self,
            _id: &str,
            world: &mut World,
            context: &TemplateContext,
        ) -> Entity {
            assert_eq!(context.layer_name, "things");
            world.spawn(Door).id()
        }
    }

    fn load(templates: bool) -> (World, MaterializedMap) {
        let reader = MemoryAssetReader::new();
        reader.insert("maps/room.json", MAP);
        reader.insert("maps/t.png", vec![1u8]);
        let textures = HeadlessTextureProvider::new(reader.clone());
        let mut loader = MapLoader::new(LoaderConfig::default(), reader, textures);
        if templates {
            loader = loader.with_templates(DoorTemplates);
        }

        let mut world = World::new();
        let map = block_on(loader.load_map(
            &mut world,
            &MapId::from("maps/room.json"),
            &CancellationToken::new(),
            None,
        ))
        .unwrap()
        .loaded()
        .unwrap();
        (world, map)
    }

    #[test]
    fn test_tiles_get_mapper_components() {
        let (mut world, map) = load(false);
        assert_eq!(map.tile_count, 3);
        assert_eq!(map.entity_count, 6);

        let mut solid = world.query_filtered::<&TilePosition, With<Collision>>();
        let mut positions: Vec<(u32, u32)> = solid.iter(&world).map(|p| (p.x, p.y)).collect();
        positions.sort();
        assert_eq!(positions, vec![(0, 1), (1, 0)]);

        let mut terrain = world.query::<&TerrainType>();
        assert_eq!(terrain.iter(&world).count(), 2);

        // Solid tiles share one visual
        let mut visuals = world.query_filtered::<&TileVisualRef, With<Collision>>();
        let shared: Vec<&TileVisualRef> = visuals.iter(&world).collect();
        assert!(Arc::ptr_eq(&shared[0].0, &shared[1].0));
    }

    #[test]
    fn test_image_layer_is_materialized_when_invisible() {
        let (mut world, _) = load(false);
        let mut images = world.query::<&ImageLayerData>();
        let image = images.single(&world).unwrap();
        assert_eq!(image.source, std::path::PathBuf::from("art/sky.png"));
        assert_eq!(image.offset, Vec2::new(4.0, 8.0));
        assert_eq!(image.opacity, 0.5);
        assert!(!image.visible);
    }

    #[test]
    fn test_objects_and_templates() {
        let (mut world, _) = load(true);
        let mut doors = world.query_filtered::<&MapObjectData, With<Door>>();
        let door = doors.single(&world).unwrap();
        assert_eq!(door.name, "door");
        assert_eq!(door.position, Vec2::new(16.0, 0.0));

        let mut objects = world.query::<(&MapObjectData, &MapMember)>();
        assert_eq!(objects.iter(&world).count(), 2);
        let sign = objects
            .iter(&world)
            .map(|(data, _)| data)
            .find(|data| data.class == "sign")
            .unwrap();
        assert_eq!(sign.properties.get_str("text"), Some("hello"));
    }
}
