use std::path::PathBuf;
use std::sync::Arc;

use bevy::prelude::*;

use crate::assets::map::{
    Layer, LayerImage, LayerKind, MapDocument, MapObject, TilesetRef, TilesetSourceRef,
};
use crate::gid::Gid;
use crate::loaders::DecodeError;
use crate::loaders::encoding::{Compression, Encoding, decode_base64_cells, decode_csv_cells};
use crate::loaders::raw::{
    RawData, RawLayer, RawMap, RawObject, RawTilesetRef, convert_properties, convert_tileset,
};

/// Decode a Tiled JSON map document.
///
/// Validates the required map fields and, for every tile-grid layer, that every
/// non-empty cell names a global id inside exactly one tileset range. External
/// tilesets without a `tilecount` hint are treated as extending up to the next
/// tileset's `firstgid`; the real count is checked again once the tileset is loaded.
///
/// This function is pure: external tilesets and images are only referenced, never read.
///
/// # Arguments
/// * `bytes` - The raw document
///
/// # Returns
/// * `Ok(MapDocument)` - The decoded document
/// * `Err(DecodeError)` - The first validation failure encountered
pub fn decode_map(bytes: &[u8]) -> Result<MapDocument, DecodeError> {
    let raw: RawMap = serde_json::from_slice(bytes)?;

    let missing = |field: &'static str| DecodeError::MissingField {
        field,
        owner: "map".to_string(),
    };
    let width = raw.width.ok_or_else(|| missing("width"))?;
    let height = raw.height.ok_or_else(|| missing("height"))?;
    let tile_width = raw.tilewidth.ok_or_else(|| missing("tilewidth"))?;
    let tile_height = raw.tileheight.ok_or_else(|| missing("tileheight"))?;
    if raw.layers.is_empty() {
        return Err(DecodeError::NoLayers);
    }

    let mut tilesets = raw
        .tilesets
        .into_iter()
        .enumerate()
        .map(|(index, ts)| convert_tileset_ref(index, ts))
        .collect::<Result<Vec<_>, _>>()?;
    tilesets.sort_by_key(|ts| ts.first_gid);

    let ranges = GidRanges::new(&tilesets);
    let layers = raw
        .layers
        .into_iter()
        .map(|layer| convert_layer(layer, width, height, &ranges))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        "Decoded map {}x{} with {} layers and {} tilesets",
        width,
        height,
        layers.len(),
        tilesets.len()
    );

    Ok(MapDocument {
        width,
        height,
        tile_width,
        tile_height,
        layers,
        tilesets,
        properties: convert_properties(raw.properties)?,
    })
}

fn convert_tileset_ref(index: usize, raw: RawTilesetRef) -> Result<TilesetRef, DecodeError> {
    let owner = format!("tilesets[{index}]");
    let first_gid = raw.firstgid.ok_or_else(|| DecodeError::MissingField {
        field: "firstgid",
        owner: owner.clone(),
    })?;
    if first_gid == 0 {
        return Err(DecodeError::InvalidFirstGid(first_gid));
    }

    let source = match raw.source {
        Some(source) => TilesetSourceRef::External {
            source: PathBuf::from(source),
            tile_count: raw.inline.tilecount,
        },
        None => TilesetSourceRef::Embedded(Arc::new(convert_tileset(raw.inline, &owner)?)),
    };
    let tileset_ref = TilesetRef { first_gid, source };
    let tile_count = match &tileset_ref.source {
        TilesetSourceRef::Embedded(tileset) => Some(tileset.tile_count),
        TilesetSourceRef::External { tile_count, .. } => *tile_count,
    };
    match tile_count {
        Some(tile_count) if first_gid.checked_add(tile_count).is_none() => {
            return Err(DecodeError::GidRangeOverflow {
                first_gid,
                tile_count,
            });
        }
        _ => {}
    }
    Ok(tileset_ref)
}

fn convert_layer(
    raw: RawLayer,
    map_width: u32,
    map_height: u32,
    ranges: &GidRanges,
) -> Result<Layer, DecodeError> {
    let name = raw.name;
    let width = raw.width.unwrap_or(map_width);
    let height = raw.height.unwrap_or(map_height);
    let kind = raw.kind.unwrap_or_default();

    let payload = match kind.as_str() {
        "tilelayer" => {
            let encoding = Encoding::parse(&name, raw.encoding.as_deref())?;
            let compression = Compression::parse(&name, raw.compression.as_deref())?;
            let data = raw.data.ok_or_else(|| DecodeError::MissingField {
                field: "data",
                owner: format!("layer `{name}`"),
            })?;
            let expected = width as usize * height as usize;
            let cells = decode_cells(&name, data, encoding, compression, expected)?;

            if cells.len() != expected {
                return Err(DecodeError::LayerSize {
                    layer: name,
                    expected,
                    actual: cells.len(),
                });
            }
            ranges.validate(&name, width, &cells)?;
            LayerKind::Tiles(cells)
        }
        "imagelayer" => {
            let (source, w, h) = raw
                .image
                .ok_or_else(|| DecodeError::MissingField {
                    field: "image",
                    owner: format!("layer `{name}`"),
                })?
                .into_parts(raw.imagewidth, raw.imageheight);
            LayerKind::Image(LayerImage {
                source,
                width: w,
                height: h,
            })
        }
        "objectgroup" => LayerKind::Objects(
            raw.objects
                .into_iter()
                .map(convert_object)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        _ => {
            return Err(DecodeError::UnknownLayerType { layer: name, kind });
        }
    };

    Ok(Layer {
        properties: convert_properties(raw.properties)?,
        name,
        kind: payload,
        width,
        height,
        visible: raw.visible,
        opacity: raw.opacity,
        offset: Vec2::new(raw.offsetx, raw.offsety),
    })
}

fn decode_cells(
    layer: &str,
    data: RawData,
    encoding: Encoding,
    compression: Compression,
    expected_cells: usize,
) -> Result<Vec<u32>, DecodeError> {
    match (data, encoding) {
        (RawData::Cells(cells), Encoding::Csv) => Ok(cells),
        (RawData::Encoded(text), Encoding::Csv) => decode_csv_cells(layer, &text),
        (RawData::Encoded(text), Encoding::Base64) => {
            decode_base64_cells(layer, &text, compression, expected_cells)
        }
        (RawData::Cells(_), Encoding::Base64) => Err(DecodeError::UnsupportedEncoding {
            layer: layer.to_string(),
            encoding: "base64 with array data".to_string(),
        }),
    }
}

fn convert_object(raw: RawObject) -> Result<MapObject, DecodeError> {
    // `class` replaced `type` in Tiled 1.9
    let class = if raw.class.is_empty() {
        raw.kind
    } else {
        raw.class
    };
    Ok(MapObject {
        id: raw.id,
        name: raw.name,
        class,
        x: raw.x,
        y: raw.y,
        width: raw.width,
        height: raw.height,
        rotation: raw.rotation,
        visible: raw.visible,
        gid: raw.gid,
        properties: convert_properties(raw.properties)?,
    })
}

/// Global id ranges of a map's tilesets, used for validation.
struct GidRanges {
    /// `(start, end)` pairs sorted by start; `end` is exclusive
    ranges: Vec<(u32, u32)>,
    overlapping: bool,
}

impl GidRanges {
    fn new(tilesets: &[TilesetRef]) -> Self {
        let ranges: Vec<(u32, u32)> = tilesets
            .iter()
            .enumerate()
            .map(|(i, ts)| {
                let next = tilesets.get(i + 1).map(|n| n.first_gid);
                let end = ts.declared_end().or(next).unwrap_or(u32::MAX);
                (ts.first_gid, end)
            })
            .collect();
        let overlapping = ranges.windows(2).any(|w| w[0].1 > w[1].0);
        Self {
            ranges,
            overlapping,
        }
    }

    fn containing(&self, gid: u32) -> usize {
        let idx = self.ranges.partition_point(|&(start, _)| start <= gid);
        if self.overlapping {
            self.ranges[..idx].iter().filter(|&&(_, end)| gid < end).count()
        } else {
            match idx.checked_sub(1) {
                Some(i) if gid < self.ranges[i].1 => 1,
                _ => 0,
            }
        }
    }

    fn validate(&self, layer: &str, width: u32, cells: &[u32]) -> Result<(), DecodeError> {
        let mut last_valid = None;
        for (index, &raw) in cells.iter().enumerate() {
            let gid = Gid(raw);
            if gid.is_empty() {
                continue;
            }
            let id = gid.id();
            // Runs of the same tile are common
            if last_valid == Some(id) {
                continue;
            }
            if self.containing(id) != 1 {
                let width = width.max(1) as usize;
                return Err(DecodeError::InvalidGidRange {
                    layer: layer.to_string(),
                    x: (index % width) as u32,
                    y: (index / width) as u32,
                    gid: id,
                });
            }
            last_valid = Some(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TILESET: &str = r#"{
        "firstgid": 1, "name": "atlas", "tilewidth": 16, "tileheight": 16,
        "tilecount": 9, "columns": 3, "image": "atlas.png",
        "imagewidth": 48, "imageheight": 48
    }"#;

    fn map_json(layers: &str, tilesets: &str) -> String {
        format!(
            r#"{{"width": 3, "height": 3, "tilewidth": 16, "tileheight": 16,
                "layers": [{layers}], "tilesets": [{tilesets}]}}"#
        )
    }

    fn tile_layer(name: &str, data: &str) -> String {
        format!(r#"{{"name": "{name}", "type": "tilelayer", "width": 3, "height": 3, "data": {data}}}"#)
    }

    #[test]
    fn test_decode_plain_layer() {
        let json = map_json(&tile_layer("ground", "[1,2,3,4,5,6,7,8,9]"), TILESET);
        let map = decode_map(json.as_bytes()).unwrap();
        assert_eq!((map.width, map.height), (3, 3));
        assert_eq!(map.layers.len(), 1);
        assert_eq!(map.layers[0].tiles(), Some(&[1, 2, 3, 4, 5, 6, 7, 8, 9][..]));
        assert!(map.layers[0].visible);
        assert_eq!(map.layers[0].opacity, 1.0);
        let TilesetSourceRef::Embedded(tileset) = &map.tilesets[0].source else {
            panic!("expected embedded tileset");
        };
        assert_eq!(tileset.image.width, Some(48));
    }

    #[test]
    fn test_missing_required_fields() {
        let err = decode_map(br#"{"height": 1, "tilewidth": 1, "tileheight": 1, "layers": []}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::MissingField { field: "width", .. }));

        let err = decode_map(br#"{"width": 1, "height": 1, "tilewidth": 1, "tileheight": 1}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::NoLayers));
    }

    #[test]
    fn test_gid_outside_every_range() {
        let json = map_json(&tile_layer("ground", "[1,2,3,4,10,6,7,8,9]"), TILESET);
        let err = decode_map(json.as_bytes()).unwrap_err();
        match err {
            DecodeError::InvalidGidRange { layer, x, y, gid } => {
                assert_eq!(layer, "ground");
                assert_eq!((x, y, gid), (1, 1, 10));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_gid_in_two_ranges() {
        let second = r#"{"firstgid": 5, "name": "b", "tilewidth": 16, "tileheight": 16,
            "tilecount": 4, "columns": 2, "image": "b.png"}"#;
        let json = map_json(
            &tile_layer("ground", "[1,2,3,4,6,0,0,0,0]"),
            &format!("{TILESET},{second}"),
        );
        let err = decode_map(json.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidGidRange { gid: 6, .. }));
    }

    #[test]
    fn test_flip_flags_do_not_affect_range() {
        let flipped = 0x8000_0000u32 | 9;
        let json = map_json(
            &tile_layer("ground", &format!("[{flipped},0,0,0,0,0,0,0,0]")),
            TILESET,
        );
        assert!(decode_map(json.as_bytes()).is_ok());
    }

    #[test]
    fn test_firstgid_overflowing_id_space() {
        let external = r#"{"firstgid": 4294967290, "source": "a.json", "tilecount": 10}"#;
        let json = map_json(&tile_layer("l", "[0,0,0,0,0,0,0,0,0]"), external);
        assert!(matches!(
            decode_map(json.as_bytes()),
            Err(DecodeError::GidRangeOverflow {
                first_gid: 4_294_967_290,
                tile_count: 10
            })
        ));

        let embedded = TILESET.replace(r#""firstgid": 1"#, r#""firstgid": 4294967295"#);
        let json = map_json(&tile_layer("l", "[0,0,0,0,0,0,0,0,0]"), &embedded);
        assert!(matches!(
            decode_map(json.as_bytes()),
            Err(DecodeError::GidRangeOverflow { tile_count: 9, .. })
        ));

        // Without a count hint the range runs to the end of the id space
        let unhinted = r#"{"firstgid": 4294967290, "source": "a.json"}"#;
        let json = map_json(&tile_layer("l", "[0,0,0,0,0,0,0,0,0]"), unhinted);
        assert!(decode_map(json.as_bytes()).is_ok());
    }

    #[test]
    fn test_external_tileset_extends_to_next_firstgid() {
        let tilesets = r#"{"firstgid": 1, "source": "a.json"},
                          {"firstgid": 100, "source": "b.json", "tilecount": 4}"#;
        let ok = map_json(&tile_layer("l", "[99,100,103,0,0,0,0,0,0]"), tilesets);
        assert!(decode_map(ok.as_bytes()).is_ok());

        let bad = map_json(&tile_layer("l", "[104,0,0,0,0,0,0,0,0]"), tilesets);
        assert!(matches!(
            decode_map(bad.as_bytes()),
            Err(DecodeError::InvalidGidRange { gid: 104, .. })
        ));
    }

    #[test]
    fn test_layer_size_mismatch() {
        let json = map_json(&tile_layer("ground", "[1,2,3]"), TILESET);
        assert!(matches!(
            decode_map(json.as_bytes()),
            Err(DecodeError::LayerSize {
                expected: 9,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_encoding_and_layer_type() {
        let layer = r#"{"name": "g", "type": "tilelayer", "width": 3, "height": 3,
                        "encoding": "hex", "data": "00"}"#;
        let json = map_json(layer, TILESET);
        assert!(matches!(
            decode_map(json.as_bytes()),
            Err(DecodeError::UnsupportedEncoding { .. })
        ));

        let json = map_json(r#"{"name": "g", "type": "group"}"#, TILESET);
        assert!(matches!(
            decode_map(json.as_bytes()),
            Err(DecodeError::UnknownLayerType { .. })
        ));
    }

    #[test]
    fn test_object_and_image_layers() {
        let layers = r#"
            {"name": "sky", "type": "imagelayer", "image": "sky.png", "imagewidth": 320,
             "offsetx": 4, "offsety": -2, "opacity": 0.5, "visible": false},
            {"name": "things", "type": "objectgroup", "objects": [
                {"id": 7, "name": "door", "type": "Door", "x": 16, "y": 32, "width": 16, "height": 16,
                 "properties": [{"name": "target", "type": "string", "value": "house"}]},
                {"id": 8, "name": "sign", "class": "Sign", "type": "Ignored", "gid": 3}
            ]}"#;
        let map = decode_map(map_json(layers, TILESET).as_bytes()).unwrap();

        let sky = &map.layers[0];
        assert!(!sky.visible);
        assert_eq!(sky.offset, Vec2::new(4.0, -2.0));
        let LayerKind::Image(image) = &sky.kind else {
            panic!("expected image layer");
        };
        assert_eq!(image.source, PathBuf::from("sky.png"));
        assert_eq!(image.width, Some(320));

        let LayerKind::Objects(objects) = &map.layers[1].kind else {
            panic!("expected object layer");
        };
        assert_eq!(objects[0].class, "Door");
        assert_eq!(objects[0].properties.get_str("target"), Some("house"));
        assert_eq!(objects[1].class, "Sign");
        assert_eq!(objects[1].gid, Some(3));
    }

    #[test]
    fn test_tilesets_sorted_and_looked_up() {
        let tilesets = r#"{"firstgid": 10, "source": "b.json"}, {"firstgid": 1, "source": "a.json"}"#;
        let map = decode_map(map_json(&tile_layer("l", "[1,10,0,0,0,0,0,0,0]"), tilesets).as_bytes())
            .unwrap();
        assert_eq!(map.tilesets[0].first_gid, 1);
        assert_eq!(map.tileset_for_gid(9).map(|t| t.first_gid), Some(1));
        assert_eq!(map.tileset_for_gid(10).map(|t| t.first_gid), Some(10));
        assert!(map.tileset_for_gid(0).is_none());
    }
}
