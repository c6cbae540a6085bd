use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bevy::{platform::collections::HashMap, prelude::*, tasks::ConditionalSendFuture};
use parking_lot::RwLock;
use thiserror::Error;

use crate::io::reader::{AssetReader, ReadError};

/// Opaque handle to a texture bound by a [`TextureProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

impl TextureHandle {
    /// Handle reserved for the placeholder texture.
    pub const PLACEHOLDER: TextureHandle = TextureHandle(0);
}

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("Failed to read texture: {0}")]
    Read(#[from] ReadError),

    #[error("Invalid image {path}: {reason}")]
    InvalidImage { path: PathBuf, reason: String },
}

/// Binds tileset images to GPU (or headless) textures.
///
/// Textures are keyed by an id chosen by the caller; tile loading uses the
/// tileset cache key so that the same tileset never binds twice.
pub trait TextureProvider: Send + Sync + 'static {
    /// Load the image at `path` and bind it under `id`.
    ///
    /// Loading an id that is already bound returns the existing handle.
    fn load_texture(
        &self,
        id: &str,
        path: &Path,
    ) -> impl ConditionalSendFuture<Output = Result<TextureHandle, TextureError>>;

    /// Whether `id` is currently bound.
    fn has_texture(&self, id: &str) -> bool;

    /// Handle bound under `id`, if any.
    fn texture(&self, id: &str) -> Option<TextureHandle>;

    /// Release the texture bound under `id`. Unknown ids are ignored.
    fn unload_texture(&self, id: &str);

    /// Fallback texture used when a load fails and the policy allows it.
    fn placeholder(&self) -> TextureHandle {
        TextureHandle::PLACEHOLDER
    }
}

/// Texture provider that never touches a GPU.
///
/// It checks that the image exists through an [`AssetReader`] and hands out
/// opaque handles. Used by servers and tests.
pub struct HeadlessTextureProvider<R: AssetReader> {
    reader: R,
    bound: RwLock<HashMap<String, TextureHandle>>,
    next_handle: AtomicU64,
    loads: AtomicUsize,
    unloads: AtomicUsize,
}

impl<R: AssetReader> HeadlessTextureProvider<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            bound: RwLock::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            loads: AtomicUsize::new(0),
            unloads: AtomicUsize::new(0),
        }
    }

    /// Number of textures currently bound.
    pub fn bound_count(&self) -> usize {
        self.bound.read().len()
    }

    /// Number of image reads performed.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// Number of textures released.
    pub fn unload_count(&self) -> usize {
        self.unloads.load(Ordering::Relaxed)
    }
}

impl<R: AssetReader> TextureProvider for HeadlessTextureProvider<R> {
    fn load_texture(
        &self,
        id: &str,
        path: &Path,
    ) -> impl ConditionalSendFuture<Output = Result<TextureHandle, TextureError>> {
        let id = id.to_string();
        let path = path.to_path_buf();
        async move {
            if let Some(handle) = self.texture(&id) {
                return Ok(handle);
            }
            let bytes = self.reader.read(&path).await?;
            self.loads.fetch_add(1, Ordering::Relaxed);
            if bytes.is_empty() {
                return Err(TextureError::InvalidImage {
                    path,
                    reason: "empty file".to_string(),
                });
            }
            let mut bound = self.bound.write();
            let handle = *bound
                .entry(id)
                .or_insert_with(|| TextureHandle(self.next_handle.fetch_add(1, Ordering::Relaxed)));
            trace!("Bound headless texture {:?} for {}", handle, path.display());
            Ok(handle)
        }
    }

    fn has_texture(&self, id: &str) -> bool {
        self.bound.read().contains_key(id)
    }

    fn texture(&self, id: &str) -> Option<TextureHandle> {
        self.bound.read().get(id).copied()
    }

    fn unload_texture(&self, id: &str) {
        if self.bound.write().remove(id).is_some() {
            self.unloads.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use bevy::tasks::block_on;

    use super::*;
    use crate::io::reader::MemoryAssetReader;

    #[test]
    fn test_headless_binds_once() {
        let reader = MemoryAssetReader::new();
        reader.insert("art/atlas.png", vec![1, 2, 3]);
        let textures = HeadlessTextureProvider::new(reader);

        let first = block_on(textures.load_texture("atlas", Path::new("art/atlas.png"))).unwrap();
        let second = block_on(textures.load_texture("atlas", Path::new("art/atlas.png"))).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, textures.placeholder());
        assert_eq!(textures.load_count(), 1);
        assert!(textures.has_texture("atlas"));

        textures.unload_texture("atlas");
        textures.unload_texture("atlas");
        assert!(textures.texture("atlas").is_none());
        assert_eq!(textures.unload_count(), 1);
    }

    #[test]
    fn test_missing_image_fails() {
        let textures = HeadlessTextureProvider::new(MemoryAssetReader::new());
        let err = block_on(textures.load_texture("x", Path::new("missing.png"))).unwrap_err();
        assert!(matches!(err, TextureError::Read(ReadError::NotFound(_))));
        assert_eq!(textures.bound_count(), 0);
    }
}
