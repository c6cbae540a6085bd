//! Tile-grid data encodings.
//!
//! Layer data is stored either as a plain JSON array (`csv` or no encoding) or as
//! a base64 string, optionally compressed with zlib, gzip or zstd. Encoded data is
//! decoded as base64 → decompress → little-endian `u32` cells.

use std::io::Read;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use flate2::read::{GzDecoder, ZlibDecoder};

use crate::loaders::DecodeError;

/// Layer data encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Plain array (or comma separated text)
    Csv,
    /// Base64 string of little-endian `u32` values
    Base64,
}

impl Encoding {
    /// Parse the `encoding` field. Absent means [`Encoding::Csv`].
    pub fn parse(layer: &str, value: Option<&str>) -> Result<Self, DecodeError> {
        match value.unwrap_or("") {
            "" | "csv" => Ok(Self::Csv),
            "base64" => Ok(Self::Base64),
            other => Err(DecodeError::UnsupportedEncoding {
                layer: layer.to_string(),
                encoding: other.to_string(),
            }),
        }
    }
}

/// Compression applied to base64 layer data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Zlib,
    Gzip,
    Zstd,
}

impl Compression {
    /// Parse the `compression` field. Absent or empty means [`Compression::None`].
    pub fn parse(layer: &str, value: Option<&str>) -> Result<Self, DecodeError> {
        match value.unwrap_or("") {
            "" => Ok(Self::None),
            "zlib" => Ok(Self::Zlib),
            "gzip" => Ok(Self::Gzip),
            "zstd" => Ok(Self::Zstd),
            other => Err(DecodeError::UnsupportedCompression {
                layer: layer.to_string(),
                compression: other.to_string(),
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Zlib => "zlib",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
        }
    }

    /// Decompress `bytes`, stopping one byte past `limit`.
    ///
    /// A result longer than `limit` means the stream holds more than the caller
    /// expects; its length is not meaningful beyond that.
    pub fn decompress(self, bytes: Vec<u8>, limit: usize) -> std::io::Result<Vec<u8>> {
        let capacity = bytes.len().saturating_mul(4).min(limit);
        match self {
            Self::None => Ok(bytes),
            Self::Zlib => read_bounded(ZlibDecoder::new(bytes.as_slice()), limit, capacity),
            Self::Gzip => read_bounded(GzDecoder::new(bytes.as_slice()), limit, capacity),
            Self::Zstd => read_bounded(
                zstd::stream::read::Decoder::with_buffer(bytes.as_slice())?,
                limit,
                capacity,
            ),
        }
    }
}

fn read_bounded(reader: impl Read, limit: usize, capacity: usize) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(capacity);
    reader
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut out)?;
    Ok(out)
}

/// Decode a base64 (optionally compressed) layer payload into raw cells.
///
/// # Arguments
/// * `layer` - Layer name, for error context
/// * `data` - The base64 text; surrounding whitespace is ignored
/// * `compression` - Compression applied before base64 encoding
/// * `expected_cells` - Cell count of the layer; decompression stops past it
pub fn decode_base64_cells(
    layer: &str,
    data: &str,
    compression: Compression,
    expected_cells: usize,
) -> Result<Vec<u32>, DecodeError> {
    let bytes = BASE64_STANDARD
        .decode(data.trim())
        .map_err(|source| DecodeError::InvalidBase64 {
            layer: layer.to_string(),
            source,
        })?;
    let limit = expected_cells.saturating_mul(4);
    let bytes = compression
        .decompress(bytes, limit)
        .map_err(|source| DecodeError::Decompress {
            layer: layer.to_string(),
            compression: compression.name(),
            source,
        })?;
    if compression != Compression::None && bytes.len() > limit {
        return Err(DecodeError::OversizedLayerData {
            layer: layer.to_string(),
            limit,
        });
    }
    cells_from_le_bytes(layer, &bytes)
}

/// Reinterpret bytes as little-endian `u32` cells.
pub fn cells_from_le_bytes(layer: &str, bytes: &[u8]) -> Result<Vec<u32>, DecodeError> {
    if bytes.len() % 4 != 0 {
        return Err(DecodeError::TruncatedData {
            layer: layer.to_string(),
            len: bytes.len(),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Parse comma separated cell text (`"1,2,3"`, newlines allowed).
pub fn decode_csv_cells(layer: &str, data: &str) -> Result<Vec<u32>, DecodeError> {
    data.split(',')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(|cell| {
            cell.parse::<u32>().map_err(|_| DecodeError::InvalidCsv {
                layer: layer.to_string(),
                cell: cell.to_string(),
            })
        })
        .collect()
}
