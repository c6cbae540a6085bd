use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::components::map::MapId;

/// Identity of a tileset across every cache tier.
///
/// External tilesets are keyed by their normalized document path and are shared
/// by every map that references them. Embedded tilesets only exist inside one
/// map, so their key is scoped to that map and its `firstgid`.
///
/// The key doubles as the texture id given to the `TextureProvider`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TilesetKey(Arc<str>);

impl TilesetKey {
    /// Key of an external tileset document.
    pub fn external(path: &Path) -> Self {
        Self(Arc::from(path.to_string_lossy().replace('\\', "/")))
    }

    /// Key of a tileset embedded in `map` at `first_gid`.
    pub fn embedded(map: &MapId, first_gid: u32) -> Self {
        Self(Arc::from(format!("{map}#{first_gid}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TilesetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
