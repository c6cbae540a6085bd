//! Load errors and outcomes.

use std::path::PathBuf;

use thiserror::Error;
use tilestream_assets::prelude::{DecodeError, ReadError, TextureError};

/// Errors that abort a map load.
///
/// Every variant names the document (map id or tileset key) it came from.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Map document `{map_id}` not found at {path}")]
    DocumentNotFound { map_id: String, path: PathBuf },

    #[error("Malformed document `{document}`: {source}")]
    MalformedDocument {
        document: String,
        source: DecodeError,
    },

    #[error("Tileset `{tileset}` not found at {path}")]
    MissingTileset { tileset: String, path: PathBuf },

    #[error("Tile id {gid} at ({x}, {y}) in layer `{layer}` of `{document}` is outside every tileset")]
    InvalidGidRange {
        document: String,
        layer: String,
        x: u32,
        y: u32,
        gid: u32,
    },

    #[error("Layer `{layer}` of `{document}` uses unsupported compression `{compression}`")]
    UnsupportedCompression {
        document: String,
        layer: String,
        compression: String,
    },

    #[error("Failed to load texture of tileset `{tileset}` from {path}: {source}")]
    TextureLoadFailure {
        tileset: String,
        path: PathBuf,
        source: TextureError,
    },

    #[error("I/O error while loading `{document}`: {source}")]
    Io {
        document: String,
        source: ReadError,
    },
}

impl LoadError {
    /// Attach the document name to a decode error.
    ///
    /// Range and compression failures keep their own kinds; everything else is
    /// reported as [`LoadError::MalformedDocument`].
    pub fn from_decode(document: impl Into<String>, err: DecodeError) -> Self {
        let document = document.into();
        match err {
            DecodeError::InvalidGidRange { layer, x, y, gid } => LoadError::InvalidGidRange {
                document,
                layer,
                x,
                y,
                gid,
            },
            DecodeError::UnsupportedCompression { layer, compression } => {
                LoadError::UnsupportedCompression {
                    document,
                    layer,
                    compression,
                }
            }
            source => LoadError::MalformedDocument { document, source },
        }
    }
}

/// Result of a load that ran to completion or was cancelled.
#[derive(Debug)]
pub enum LoadOutcome<T> {
    Loaded(T),
    /// The cancellation token fired; nothing from this load is left in the world.
    Cancelled,
}

impl<T> LoadOutcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadOutcome::Cancelled)
    }

    /// The loaded value, or `None` when cancelled.
    pub fn loaded(self) -> Option<T> {
        match self {
            LoadOutcome::Loaded(value) => Some(value),
            LoadOutcome::Cancelled => None,
        }
    }

    pub fn as_loaded(&self) -> Option<&T> {
        match self {
            LoadOutcome::Loaded(value) => Some(value),
            LoadOutcome::Cancelled => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LoadOutcome<U> {
        match self {
            LoadOutcome::Loaded(value) => LoadOutcome::Loaded(f(value)),
            LoadOutcome::Cancelled => LoadOutcome::Cancelled,
        }
    }
}
