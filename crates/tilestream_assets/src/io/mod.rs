//! Collaborator interfaces for reading bytes and binding textures.

pub mod reader;
pub mod texture;

pub use reader::{AssetReader, FileAssetReader, MemoryAssetReader, ReadError};
pub use texture::{HeadlessTextureProvider, TextureError, TextureHandle, TextureProvider};
