use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bevy::prelude::*;

/// Identifier of a map: its document path relative to the reader root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapId(Arc<str>);

impl MapId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Document path passed to the `AssetReader`.
    pub fn path(&self) -> &Path {
        Path::new(&*self.0)
    }

    /// Directory that relative tileset and image paths resolve against.
    pub fn base_dir(&self) -> &Path {
        self.path().parent().unwrap_or(Path::new(""))
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MapId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MapId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

/// Marks every entity created by a map load.
///
/// `unload_map` and cancellation find a map's entities through this component.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct MapMember(pub MapId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_dir() {
        assert_eq!(MapId::from("maps/town.json").base_dir(), Path::new("maps"));
        assert_eq!(MapId::from("town.json").base_dir(), Path::new(""));
    }
}
