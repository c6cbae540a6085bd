//! Fixtures shared by the integration tests.

use bevy::prelude::*;
use bevy::tasks::block_on;
use tilestream_assets::prelude::{HeadlessTextureProvider, MemoryAssetReader, TileRect};
use tilestream_core::prelude::*;

pub type TestLoader = MapLoader<MemoryAssetReader, HeadlessTextureProvider<MemoryAssetReader>>;

/// 3x3 atlas of 16x16 tiles.
///
/// - local 4 (gid 5) animates through locals 4, 5, 6
/// - local 7 (gid 8) is both solid and a ledge
/// - local 8 (gid 9) is tall grass with encounters
pub const ATLAS: &str = r#"{
    "name": "atlas", "tilewidth": 16, "tileheight": 16, "tilecount": 9, "columns": 3,
    "image": "atlas.png", "imagewidth": 48, "imageheight": 48,
    "tiles": [
        {"id": 4, "animation": [
            {"tileid": 4, "duration": 100},
            {"tileid": 5, "duration": 100},
            {"tileid": 6, "duration": 100}
        ]},
        {"id": 7, "properties": [
            {"name": "solid", "type": "bool", "value": true},
            {"name": "ledge", "type": "string", "value": "down"}
        ]},
        {"id": 8, "properties": [
            {"name": "encounter_table", "type": "string", "value": "route1"},
            {"name": "terrain", "type": "string", "value": "grass"}
        ]}
    ]
}"#;

/// A one-layer map using the external atlas.
pub fn tile_map(width: u32, height: u32, data: &[u32]) -> String {
    let cells: Vec<String> = data.iter().map(u32::to_string).collect();
    format!(
        r#"{{
            "width": {width}, "height": {height}, "tilewidth": 16, "tileheight": 16,
            "layers": [{{"name": "ground", "type": "tilelayer",
                         "width": {width}, "height": {height}, "data": [{}]}}],
            "tilesets": [{{"firstgid": 1, "source": "../tilesets/atlas.json"}}]
        }}"#,
        cells.join(", ")
    )
}

/// Reader holding the atlas and its image.
pub fn reader() -> MemoryAssetReader {
    let reader = MemoryAssetReader::new();
    reader.insert("tilesets/atlas.json", ATLAS);
    reader.insert("tilesets/atlas.png", vec![0x89u8, b'P', b'N', b'G']);
    reader
}

pub fn loader(reader: &MemoryAssetReader, config: LoaderConfig) -> TestLoader {
    let textures = HeadlessTextureProvider::new(reader.clone());
    MapLoader::new(config, reader.clone(), textures)
}

/// Load a map to completion, panicking on error or cancellation.
pub fn load(loader: &TestLoader, world: &mut World, map_id: &str) -> MaterializedMap {
    block_on(loader.load_map(world, &MapId::from(map_id), &CancellationToken::new(), None))
        .unwrap()
        .loaded()
        .unwrap()
}

/// `(x, y, gid, rect)` of every tile entity, in row-major order.
pub fn tiles(world: &mut World) -> Vec<(u32, u32, u32, TileRect)> {
    let mut query = world.query::<(&TilePosition, &TileGid, &TileVisualRef)>();
    let mut tiles: Vec<(u32, u32, u32, TileRect)> = query
        .iter(world)
        .map(|(pos, gid, visual)| (pos.x, pos.y, gid.0, visual.0.source))
        .collect();
    tiles.sort_by_key(|&(x, y, _, _)| (y, x));
    tiles
}

pub fn member_count(world: &mut World, map_id: &str) -> usize {
    let map_id = MapId::from(map_id);
    let mut query = world.query::<&MapMember>();
    query.iter(world).filter(|member| member.0 == map_id).count()
}

pub fn entity_count(world: &mut World) -> usize {
    world.query::<Entity>().iter(world).count()
}
