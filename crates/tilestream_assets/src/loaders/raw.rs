//! Wire schema of Tiled JSON documents and its conversion into the document model.
//!
//! Required fields are `Option` here so that their absence becomes a
//! [`DecodeError::MissingField`] naming the field instead of a generic serde error.

use std::path::PathBuf;
use std::sync::Arc;

use bevy::platform::collections::HashMap;
use serde::Deserialize;
use serde_json::Value;

use crate::assets::tileset::{AnimationDef, AnimationFrame, Tileset, TilesetImage};
use crate::loaders::DecodeError;
use crate::properties::{Properties, PropertyValue};

#[derive(Debug, Deserialize)]
pub(crate) struct RawMap {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub tilewidth: Option<u32>,
    pub tileheight: Option<u32>,
    #[serde(default)]
    pub layers: Vec<RawLayer>,
    #[serde(default)]
    pub tilesets: Vec<RawTilesetRef>,
    #[serde(default)]
    pub properties: Vec<RawProperty>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawLayer {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub data: Option<RawData>,
    pub encoding: Option<String>,
    pub compression: Option<String>,
    #[serde(default)]
    pub offsetx: f32,
    #[serde(default)]
    pub offsety: f32,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub properties: Vec<RawProperty>,
    #[serde(default)]
    pub objects: Vec<RawObject>,
    pub image: Option<RawImage>,
    pub imagewidth: Option<u32>,
    pub imageheight: Option<u32>,
}

/// Layer data is either a JSON array or an encoded string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawData {
    Cells(Vec<u32>),
    Encoded(String),
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawObject {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "default_true")]
    pub visible: bool,
    pub gid: Option<u32>,
    #[serde(default)]
    pub properties: Vec<RawProperty>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTilesetRef {
    pub firstgid: Option<u32>,
    pub source: Option<String>,
    #[serde(flatten)]
    pub inline: RawTileset,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawTileset {
    #[serde(default)]
    pub name: String,
    pub tilewidth: Option<u32>,
    pub tileheight: Option<u32>,
    #[serde(default)]
    pub margin: u32,
    #[serde(default)]
    pub spacing: u32,
    pub tilecount: Option<u32>,
    #[serde(default)]
    pub columns: u32,
    pub image: Option<RawImage>,
    pub imagewidth: Option<u32>,
    pub imageheight: Option<u32>,
    #[serde(default)]
    pub tiles: Vec<RawTile>,
    #[serde(default)]
    pub properties: Vec<RawProperty>,
}

/// Images are written either as a bare path or as `{source, width, height}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawImage {
    Path(String),
    Object {
        source: String,
        width: Option<u32>,
        height: Option<u32>,
    },
}

impl RawImage {
    /// Split into `(source, width, height)`, preferring sizes from the object form.
    pub fn into_parts(
        self,
        width: Option<u32>,
        height: Option<u32>,
    ) -> (PathBuf, Option<u32>, Option<u32>) {
        match self {
            RawImage::Path(source) => (PathBuf::from(source), width, height),
            RawImage::Object {
                source,
                width: w,
                height: h,
            } => (PathBuf::from(source), w.or(width), h.or(height)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTile {
    pub id: u32,
    #[serde(default)]
    pub animation: Vec<RawFrame>,
    #[serde(default)]
    pub properties: Vec<RawProperty>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFrame {
    pub tileid: u32,
    pub duration: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawProperty {
    pub name: String,
    #[serde(default = "default_property_type", rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub propertytype: String,
    #[serde(default)]
    pub value: Value,
}

fn default_opacity() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_property_type() -> String {
    "string".to_string()
}

/// Convert a Tiled `[{name, type, value}]` list into a typed bag.
pub(crate) fn convert_properties(raw: Vec<RawProperty>) -> Result<Properties, DecodeError> {
    raw.into_iter()
        .map(|prop| {
            let value = convert_property_value(&prop.name, &prop.kind, prop.propertytype, prop.value)?;
            Ok((prop.name, value))
        })
        .collect()
}

fn convert_property_value(
    name: &str,
    kind: &str,
    property_type: String,
    value: Value,
) -> Result<PropertyValue, DecodeError> {
    let mismatch = || DecodeError::InvalidPropertyValue {
        name: name.to_string(),
        kind: kind.to_string(),
    };
    let converted = match kind {
        "bool" => PropertyValue::BoolValue(value.as_bool().ok_or_else(mismatch)?),
        "int" => PropertyValue::IntValue(value.as_i64().ok_or_else(mismatch)?),
        "float" => PropertyValue::FloatValue(value.as_f64().ok_or_else(mismatch)?),
        "string" => PropertyValue::StringValue(value_string(value).ok_or_else(mismatch)?),
        "file" => PropertyValue::FileValue(value_string(value).ok_or_else(mismatch)?),
        "color" => PropertyValue::ColorValue(value_string(value).ok_or_else(mismatch)?),
        "object" => {
            let id = value.as_u64().ok_or_else(mismatch)?;
            PropertyValue::ObjectValue(u32::try_from(id).map_err(|_| mismatch())?)
        }
        "class" => {
            let Value::Object(members) = value else {
                return Err(mismatch());
            };
            PropertyValue::ClassValue {
                property_type,
                properties: class_members(members),
            }
        }
        other => {
            return Err(DecodeError::UnsupportedPropertyType {
                name: name.to_string(),
                kind: other.to_string(),
            });
        }
    };
    Ok(converted)
}

fn value_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

// Class members carry no type tags, so they are typed by their JSON shape.
fn class_members(members: serde_json::Map<String, Value>) -> Properties {
    members
        .into_iter()
        .filter_map(|(name, value)| {
            let converted = match value {
                Value::Bool(b) => PropertyValue::BoolValue(b),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => PropertyValue::IntValue(i),
                    None => PropertyValue::FloatValue(n.as_f64()?),
                },
                Value::String(s) => PropertyValue::StringValue(s),
                Value::Object(nested) => PropertyValue::ClassValue {
                    property_type: String::new(),
                    properties: class_members(nested),
                },
                Value::Null | Value::Array(_) => return None,
            };
            Some((name, converted))
        })
        .collect()
}

/// Convert an inline or external tileset definition.
///
/// # Arguments
/// * `raw` - The wire form
/// * `owner` - Description used in error messages (e.g. `tileset "grass"`)
pub(crate) fn convert_tileset(raw: RawTileset, owner: &str) -> Result<Tileset, DecodeError> {
    let missing = |field: &'static str| DecodeError::MissingField {
        field,
        owner: owner.to_string(),
    };
    let tile_width = raw.tilewidth.ok_or_else(|| missing("tilewidth"))?;
    let tile_height = raw.tileheight.ok_or_else(|| missing("tileheight"))?;
    let tile_count = raw.tilecount.ok_or_else(|| missing("tilecount"))?;
    let (source, width, height) = raw
        .image
        .ok_or_else(|| missing("image"))?
        .into_parts(raw.imagewidth, raw.imageheight);

    let mut tile_properties = HashMap::new();
    let mut animations = HashMap::new();
    for tile in raw.tiles {
        if !tile.properties.is_empty() {
            let props = convert_properties(tile.properties)?;
            tile_properties.insert(tile.id, Arc::new(props));
        }
        if !tile.animation.is_empty() {
            let frames = tile
                .animation
                .into_iter()
                .map(|frame| AnimationFrame {
                    tile_id: frame.tileid,
                    duration_ms: frame.duration,
                })
                .collect();
            animations.insert(tile.id, AnimationDef { frames });
        }
    }

    Ok(Tileset {
        name: raw.name,
        tile_width,
        tile_height,
        margin: raw.margin,
        spacing: raw.spacing,
        tile_count,
        columns: raw.columns,
        image: TilesetImage {
            source,
            width,
            height,
        },
        tile_properties,
        animations,
        properties: convert_properties(raw.properties)?,
    })
}
