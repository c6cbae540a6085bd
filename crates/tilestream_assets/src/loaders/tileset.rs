use crate::assets::tileset::Tileset;
use crate::loaders::DecodeError;
use crate::loaders::raw::{RawTileset, convert_tileset};

/// Decode an external Tiled JSON tileset document.
///
/// The schema is the same as an embedded tileset without `firstgid`. The image
/// path is left relative to the tileset document.
///
/// # Arguments
/// * `bytes` - The raw document
///
/// # Returns
/// * `Ok(Tileset)` - The decoded tileset
/// * `Err(DecodeError)` - If the JSON is malformed or a required field is missing
pub fn decode_tileset(bytes: &[u8]) -> Result<Tileset, DecodeError> {
    let raw: RawTileset = serde_json::from_slice(bytes)?;
    let owner = if raw.name.is_empty() {
        "tileset".to_string()
    } else {
        format!("tileset `{}`", raw.name)
    };
    convert_tileset(raw, &owner)
}
