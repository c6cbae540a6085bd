//! In-memory document model.

pub mod map;
pub mod tileset;
