//! End-to-end loads through `MapLoader` with in-memory documents.

mod common;

use std::sync::Arc;

use base64::{Engine, prelude::BASE64_STANDARD};
use bevy::prelude::*;
use bevy::tasks::block_on;
use tilestream_assets::prelude::{TextureProvider, TileRect};
use tilestream_core::prelude::*;
use tilestream_core::properties::{CollisionMapper, LedgeMapper};

use common::{entity_count, load, loader, member_count, reader, tile_map, tiles};

#[test]
fn test_scenario_a_positions_and_source_rects() {
    let reader = reader();
    reader.insert("maps/a.json", tile_map(3, 3, &[1, 2, 3, 4, 5, 6, 7, 8, 9]));
    let loader = loader(&reader, LoaderConfig::default());

    let mut world = World::new();
    let map = load(&loader, &mut world, "maps/a.json");
    assert_eq!(map.entity_count, 9);
    assert_eq!(map.tile_count, 9);

    let tiles = tiles(&mut world);
    let expected: Vec<(u32, u32, u32, TileRect)> = (0..9)
        .map(|i| {
            let id = i + 1;
            (
                i % 3,
                i / 3,
                id,
                TileRect::new((id - 1) % 3 * 16, (id - 1) / 3 * 16, 16, 16),
            )
        })
        .collect();
    assert_eq!(tiles, expected);
}

#[test]
fn test_scenario_c_animation_index() {
    let reader = reader();
    reader.insert("maps/c.json", tile_map(3, 2, &[5, 1, 5, 0, 5, 2]));
    let loader = loader(&reader, LoaderConfig::default());

    let mut world = World::new();
    let map = load(&loader, &mut world, "maps/c.json");
    assert_eq!(map.animated_count, 3);

    let mut query = world.query::<(&TileGid, Option<&TileAnimation>)>();
    for (gid, animation) in query.iter(&world) {
        match gid.0 {
            5 => {
                let frames: Vec<u32> = animation.unwrap().frame_ids().collect();
                assert_eq!(frames, vec![5, 6, 7]);
            }
            _ => assert!(animation.is_none()),
        }
    }
}

#[test]
fn test_scenario_d_cancel_after_tilesets() {
    let reader = reader();
    reader.insert("maps/d.json", tile_map(2, 2, &[1, 2, 3, 4]));
    let loader = loader(&reader, LoaderConfig::default());
    let map_id = MapId::from("maps/d.json");

    let token = CancellationToken::new();
    let prepared = block_on(loader.prepare_map(&map_id, &token, None))
        .unwrap()
        .loaded()
        .unwrap();
    token.cancel();

    let mut world = World::new();
    let outcome = loader.materialize(&mut world, prepared, &token, None);
    assert!(outcome.is_cancelled());
    assert_eq!(member_count(&mut world, "maps/d.json"), 0);
}

#[test]
fn test_cancel_from_progress_callback() {
    let reader = reader();
    reader.insert("maps/d.json", tile_map(2, 2, &[1, 2, 3, 4]));
    let loader = loader(&reader, LoaderConfig::default());

    let token = CancellationToken::new();
    let trigger = token.clone();
    let callback: ProgressCallback = Arc::new(move |progress: LoadProgress| {
        if progress.stage == LoadStage::Tilesets && progress.fraction >= 1.0 {
            trigger.cancel();
        }
    });

    let mut world = World::new();
    let outcome = block_on(loader.load_map(
        &mut world,
        &MapId::from("maps/d.json"),
        &token,
        Some(&callback),
    ))
    .unwrap();
    assert!(outcome.is_cancelled());
    assert_eq!(entity_count(&mut world), 0);
    // Tilesets loaded before the cancel stay cached
    assert_eq!(loader.caches().tilesets.stats().hot_len, 1);
}

#[test]
fn test_second_load_hits_caches() {
    let reader = reader();
    reader.insert("maps/town.json", tile_map(2, 2, &[1, 5, 8, 9]));
    let loader = loader(&reader, LoaderConfig::default());

    let mut first_world = World::new();
    load(&loader, &mut first_world, "maps/town.json");
    let reads = reader.read_count();

    let mut second_world = World::new();
    load(&loader, &mut second_world, "maps/town.json");
    assert_eq!(reader.read_count(), reads);
    assert_eq!(tiles(&mut first_world), tiles(&mut second_world));

    let stats = loader.caches().stats();
    assert_eq!(stats.maps.hits, 1);
    assert_eq!(stats.maps.misses, 1);
    assert_eq!(stats.tilesets.misses, 1);
    assert_eq!(stats.tilesets.hot_hits, 1);
    assert_eq!(loader.textures().load_count(), 1);

    // Visuals are shared across both worlds
    let mut first = first_world.query::<(&TileGid, &TileVisualRef)>();
    let mut second = second_world.query::<(&TileGid, &TileVisualRef)>();
    let a = first.iter(&first_world).find(|(gid, _)| gid.0 == 5).unwrap().1;
    let b = second.iter(&second_world).find(|(gid, _)| gid.0 == 5).unwrap().1;
    assert!(Arc::ptr_eq(&a.0, &b.0));
}

#[test]
fn test_empty_cells_create_no_entities() {
    let reader = reader();
    reader.insert("maps/sparse.json", tile_map(3, 2, &[0, 0, 4, 0, 0, 0]));
    let loader = loader(&reader, LoaderConfig::default());

    let mut world = World::new();
    let map = load(&loader, &mut world, "maps/sparse.json");
    assert_eq!(map.entity_count, 1);
    assert_eq!(tiles(&mut world), vec![(2, 0, 4, TileRect::new(0, 16, 16, 16))]);
}

#[test]
fn test_gameplay_components_and_conflicts() {
    let reader = reader();
    reader.insert("maps/route.json", tile_map(2, 1, &[8, 9]));

    let mut world = World::new();
    load(
        &loader(&reader, LoaderConfig::default()),
        &mut world,
        "maps/route.json",
    );
    let mut ledge_tile = world.query::<(&TileGid, Option<&Collision>, Option<&LedgeJump>)>();
    let (_, collision, ledge) = ledge_tile
        .iter(&world)
        .find(|(gid, _, _)| gid.0 == 8)
        .unwrap();
    assert!(collision.is_some());
    assert!(ledge.is_none());

    let mut grass = world.query::<(&EncounterZone, &TerrainType)>();
    let (zone, terrain) = grass.single(&world).unwrap();
    assert_eq!(zone.table, "route1");
    assert_eq!(terrain.0, "grass");

    // Ledge registered first wins the movement group
    let mut mappers = PropertyMapperRegistry::new();
    mappers.register(LedgeMapper).register(CollisionMapper);
    let ledge_first = loader(&reader, LoaderConfig::default()).with_mappers(mappers);
    let mut world = World::new();
    load(&ledge_first, &mut world, "maps/route.json");
    let mut ledge_tile = world.query::<(&TileGid, Option<&Collision>, Option<&LedgeJump>)>();
    let (_, collision, ledge) = ledge_tile
        .iter(&world)
        .find(|(gid, _, _)| gid.0 == 8)
        .unwrap();
    assert!(collision.is_none());
    assert_eq!(ledge.unwrap().direction, LedgeDirection::Down);
}

#[test]
fn test_base64_zstd_layer_matches_plain_array() {
    let cells: [u32; 4] = [1, 0x8000_0002, 0, 9];
    let bytes: Vec<u8> = cells.iter().flat_map(|cell| cell.to_le_bytes()).collect();
    let encoded = BASE64_STANDARD.encode(zstd::encode_all(&bytes[..], 3).unwrap());

    let reader = reader();
    reader.insert("maps/plain.json", tile_map(2, 2, &cells));
    reader.insert(
        "maps/packed.json",
        format!(
            r#"{{
                "width": 2, "height": 2, "tilewidth": 16, "tileheight": 16,
                "layers": [{{"name": "ground", "type": "tilelayer", "width": 2, "height": 2,
                             "encoding": "base64", "compression": "zstd", "data": "{encoded}"}}],
                "tilesets": [{{"firstgid": 1, "source": "../tilesets/atlas.json"}}]
            }}"#
        ),
    );
    let loader = loader(&reader, LoaderConfig::default());

    let mut plain = World::new();
    load(&loader, &mut plain, "maps/plain.json");
    let mut packed = World::new();
    load(&loader, &mut packed, "maps/packed.json");
    assert_eq!(tiles(&mut plain), tiles(&mut packed));

    let mut flipped = packed.query::<(&TileGid, &TileInstance)>();
    let (_, instance) = flipped
        .iter(&packed)
        .find(|(gid, _)| gid.0 == 2)
        .unwrap();
    assert!(instance.flip.horizontal);
}

#[test]
fn test_gid_beyond_external_tileset() {
    let reader = reader();
    reader.insert("maps/broken.json", tile_map(2, 1, &[1, 10]));
    let loader = loader(&reader, LoaderConfig::default());

    let mut world = World::new();
    let err = block_on(loader.load_map(
        &mut world,
        &MapId::from("maps/broken.json"),
        &CancellationToken::new(),
        None,
    ))
    .unwrap_err();
    assert!(matches!(
        err,
        LoadError::InvalidGidRange { gid: 10, x: 1, y: 0, ref layer, .. } if layer == "ground"
    ));
    assert_eq!(entity_count(&mut world), 0);
}

#[test]
fn test_missing_tileset() {
    let reader = reader();
    reader.remove("tilesets/atlas.json");
    reader.insert("maps/a.json", tile_map(1, 1, &[1]));
    let loader = loader(&reader, LoaderConfig::default());

    let mut world = World::new();
    let err = block_on(loader.load_map(
        &mut world,
        &MapId::from("maps/a.json"),
        &CancellationToken::new(),
        None,
    ))
    .unwrap_err();
    assert!(matches!(err, LoadError::MissingTileset { ref tileset, .. } if tileset == "tilesets/atlas.json"));
}

#[test]
fn test_texture_failure_policy() {
    let reader = reader();
    reader.remove("tilesets/atlas.png");
    reader.insert("maps/a.json", tile_map(1, 1, &[1]));
    let map_id = MapId::from("maps/a.json");

    let abort = loader(&reader, LoaderConfig::default());
    let mut world = World::new();
    let err = block_on(abort.load_map(&mut world, &map_id, &CancellationToken::new(), None))
        .unwrap_err();
    assert!(matches!(err, LoadError::TextureLoadFailure { .. }));
    assert_eq!(entity_count(&mut world), 0);

    let config = LoaderConfig {
        texture_failure: TextureFailurePolicy::Placeholder,
        ..default()
    };
    let placeholder = loader(&reader, config);
    let map = load(&placeholder, &mut world, "maps/a.json");
    assert_eq!(map.entity_count, 1);
    assert_eq!(placeholder.textures().bound_count(), 0);
}

#[test]
fn test_unload_map_leaves_other_maps() {
    let reader = reader();
    reader.insert("maps/a.json", tile_map(2, 1, &[1, 2]));
    reader.insert("maps/b.json", tile_map(1, 1, &[3]));
    let loader = loader(&reader, LoaderConfig::default());

    let mut world = World::new();
    load(&loader, &mut world, "maps/a.json");
    load(&loader, &mut world, "maps/b.json");

    assert_eq!(unload_map(&mut world, &MapId::from("maps/a.json")), 2);
    assert_eq!(member_count(&mut world, "maps/a.json"), 0);
    assert_eq!(member_count(&mut world, "maps/b.json"), 1);
}

#[test]
fn test_invalidated_tileset_is_reloaded() {
    let reader = reader();
    reader.insert("maps/a.json", tile_map(1, 1, &[1]));
    let loader = loader(&reader, LoaderConfig::default());

    let mut world = World::new();
    load(&loader, &mut world, "maps/a.json");
    let key = TilesetKey::external(std::path::Path::new("tilesets/atlas.json"));
    loader.invalidate_tileset(&key);
    assert_eq!(loader.caches().visuals.len(), 0);

    load(&loader, &mut world, "maps/a.json");
    let stats = loader.caches().tilesets.stats();
    assert_eq!(stats.misses, 2);
    assert_eq!(loader.textures().load_count(), 2);
}

#[test]
fn test_tilesets_in_use_keep_their_textures() {
    let reader = reader();
    reader.insert(
        "tilesets/cave.json",
        r#"{"name": "cave", "tilewidth": 16, "tileheight": 16, "tilecount": 4,
            "columns": 2, "image": "cave.png", "imagewidth": 32, "imageheight": 32}"#,
    );
    reader.insert("tilesets/cave.png", vec![1u8]);
    reader.insert(
        "maps/mixed.json",
        r#"{
            "width": 2, "height": 1, "tilewidth": 16, "tileheight": 16,
            "layers": [{"name": "ground", "type": "tilelayer", "width": 2, "height": 1,
                        "data": [1, 10]}],
            "tilesets": [{"firstgid": 1, "source": "../tilesets/atlas.json"},
                         {"firstgid": 10, "source": "../tilesets/cave.json"}]
        }"#,
    );
    let config = LoaderConfig {
        hot_capacity: 1,
        ..default()
    };
    let loader = loader(&reader, config);

    let mut world = World::new();
    let map = load(&loader, &mut world, "maps/mixed.json");
    assert_eq!(map.entity_count, 2);

    let mut visuals = world.query::<&TileVisualRef>();
    for visual in visuals.iter(&world) {
        let texture = &visual.visual().texture;
        assert!(
            loader.textures().has_texture(texture.as_str()),
            "{texture} was released while in use"
        );
    }
    assert_eq!(loader.caches().tilesets.stats().hot_evictions, 0);
}
