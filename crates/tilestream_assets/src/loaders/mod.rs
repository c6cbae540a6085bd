//! Document decoders.
//!
//! Everything in here is pure: bytes in, document model out. Reading files and
//! binding textures is the job of [`crate::io`].

use std::path::{Path, PathBuf};

use normalize_path::NormalizePath;
use thiserror::Error;

pub mod encoding;
pub mod map;
mod raw;
pub mod tileset;

pub use map::decode_map;
pub use tileset::decode_tileset;

/// Errors produced while decoding a map or tileset document.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required field `{field}` in {owner}")]
    MissingField { field: &'static str, owner: String },

    #[error("Map has no layers")]
    NoLayers,

    #[error("Unknown layer type `{kind}` in layer `{layer}`")]
    UnknownLayerType { layer: String, kind: String },

    #[error("Layer `{layer}` has {actual} cells, expected {expected}")]
    LayerSize {
        layer: String,
        expected: usize,
        actual: usize,
    },

    #[error("Layer `{layer}` decompresses to more than {limit} bytes")]
    OversizedLayerData { layer: String, limit: usize },

    #[error("Layer `{layer}` data is {len} bytes, not a whole number of u32 cells")]
    TruncatedData { layer: String, len: usize },

    #[error("Layer `{layer}` has invalid base64 data: {source}")]
    InvalidBase64 {
        layer: String,
        source: base64::DecodeError,
    },

    #[error("Layer `{layer}` failed to decompress ({compression}): {source}")]
    Decompress {
        layer: String,
        compression: &'static str,
        source: std::io::Error,
    },

    #[error("Layer `{layer}` uses unsupported compression `{compression}`")]
    UnsupportedCompression { layer: String, compression: String },

    #[error("Layer `{layer}` uses unsupported encoding `{encoding}`")]
    UnsupportedEncoding { layer: String, encoding: String },

    #[error("Layer `{layer}` has invalid CSV cell `{cell}`")]
    InvalidCsv { layer: String, cell: String },

    #[error("Tile id {gid} at ({x}, {y}) in layer `{layer}` does not fall in exactly one tileset")]
    InvalidGidRange {
        layer: String,
        x: u32,
        y: u32,
        gid: u32,
    },

    #[error("Tileset `firstgid` must be at least 1, got {0}")]
    InvalidFirstGid(u32),

    #[error("Tileset with `firstgid` {first_gid} and {tile_count} tiles overflows the global id space")]
    GidRangeOverflow { first_gid: u32, tile_count: u32 },

    #[error("Property `{name}` has unsupported type `{kind}`")]
    UnsupportedPropertyType { name: String, kind: String },

    #[error("Property `{name}` value does not match its type `{kind}`")]
    InvalidPropertyValue { name: String, kind: String },
}

/// Resolve a path found inside a document relative to that document's directory.
///
/// Tiled stores references like `../tilesets/grass.json`. This joins the path
/// to `base_dir` and normalizes `.` and `..` components, which `Path::join`
/// does not do on its own.
///
/// # Arguments
/// * `base_dir` - Directory of the referencing document
/// * `relative_path` - The path as written in the document
///
/// # Returns
/// * The normalized path; absolute inputs are only normalized
pub fn resolve_relative_path(base_dir: &Path, relative_path: &str) -> PathBuf {
    // Tiled on Windows writes backslashes
    let relative = relative_path.replace('\\', "/");
    base_dir.join(relative).normalize()
}
