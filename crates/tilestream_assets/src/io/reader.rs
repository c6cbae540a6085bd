use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bevy::{platform::collections::HashMap, tasks::ConditionalSendFuture};
use normalize_path::NormalizePath;
use parking_lot::RwLock;
use thiserror::Error;

/// Errors produced by an [`AssetReader`].
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ReadError {
    /// Build from an I/O error, mapping `NotFound` to [`ReadError::NotFound`].
    pub fn from_io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == ErrorKind::NotFound {
            ReadError::NotFound(path.to_path_buf())
        } else {
            ReadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Source of raw document and image bytes.
///
/// Paths are relative to the reader's root and already normalized by the caller.
pub trait AssetReader: Send + Sync + 'static {
    /// Read the full contents of `path`.
    fn read(&self, path: &Path) -> impl ConditionalSendFuture<Output = Result<Vec<u8>, ReadError>>;
}

/// Reads files below a root directory.
///
/// File access goes through `async-fs`, so a read never blocks a task pool thread.
#[derive(Debug, Clone)]
pub struct FileAssetReader {
    root: PathBuf,
}

impl FileAssetReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetReader for FileAssetReader {
    fn read(&self, path: &Path) -> impl ConditionalSendFuture<Output = Result<Vec<u8>, ReadError>> {
        let full_path = self.root.join(path);
        let path = path.to_path_buf();
        async move {
            async_fs::read(&full_path)
                .await
                .map_err(|err| ReadError::from_io(&path, err))
        }
    }
}

/// In-memory file table for tools and tests.
///
/// Cloning shares the same table.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetReader {
    files: Arc<RwLock<HashMap<PathBuf, Arc<[u8]>>>>,
    reads: Arc<AtomicUsize>,
}

impl MemoryAssetReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&self, path: impl AsRef<Path>, bytes: impl Into<Vec<u8>>) {
        let bytes: Vec<u8> = bytes.into();
        self.files
            .write()
            .insert(path.as_ref().normalize(), Arc::from(bytes));
    }

    /// Remove a file, returning whether it existed.
    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        self.files.write().remove(&path.as_ref().normalize()).is_some()
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.files.read().contains_key(&path.as_ref().normalize())
    }

    /// Number of successful and failed reads so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl AssetReader for MemoryAssetReader {
    fn read(&self, path: &Path) -> impl ConditionalSendFuture<Output = Result<Vec<u8>, ReadError>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let key = path.normalize();
        let found = self.files.read().get(&key).cloned();
        async move {
            found
                .map(|bytes| bytes.to_vec())
                .ok_or(ReadError::NotFound(key))
        }
    }
}

#[cfg(test)]
mod tests {
    use bevy::tasks::block_on;

    use super::*;

    #[test]
    fn test_memory_reader_round_trip() {
        let reader = MemoryAssetReader::new();
        reader.insert("maps/town.json", b"{}".to_vec());

        let bytes = block_on(reader.read(Path::new("maps/./town.json"))).unwrap();
        assert_eq!(bytes, b"{}");
        assert_eq!(reader.read_count(), 1);

        let err = block_on(reader.read(Path::new("maps/cave.json"))).unwrap_err();
        assert!(matches!(err, ReadError::NotFound(ref p) if p == Path::new("maps/cave.json")));
    }

    #[test]
    fn test_clones_share_files() {
        let reader = MemoryAssetReader::new();
        let other = reader.clone();
        other.insert("a.json", "[]");
        assert!(reader.contains("a.json"));
        assert!(reader.remove("a.json"));
        assert!(!other.contains("a.json"));
    }

    #[test]
    fn test_file_reader_reads_below_root() {
        let root = std::env::temp_dir().join("tilestream-reader-test");
        std::fs::create_dir_all(root.join("maps")).unwrap();
        std::fs::write(root.join("maps/town.json"), b"{}").unwrap();

        let reader = FileAssetReader::new(&root);
        let bytes = block_on(reader.read(Path::new("maps/town.json"))).unwrap();
        assert_eq!(bytes, b"{}");
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_file_reader_maps_not_found() {
        let reader = FileAssetReader::new(std::env::temp_dir());
        let err = block_on(reader.read(Path::new("tilestream-definitely-missing.json"))).unwrap_err();
        assert!(matches!(err, ReadError::NotFound(_)));
    }
}
