//! Object templates.

use bevy::prelude::*;
use tilestream_assets::prelude::MapObject;

use crate::components::map::MapId;

/// What a template sees of the object it is spawned for.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub map_id: &'a MapId,
    /// Index of the object's layer in the map document
    pub layer: u32,
    pub layer_name: &'a str,
    pub object: &'a MapObject,
}

/// Spawns objects from named templates.
///
/// An object whose class is a known template id is handed to
/// [`TemplateFactory::spawn_from_template`]; the returned entity then receives
/// the usual `MapMember` and `MapObjectData` components.
pub trait TemplateFactory: Send + Sync + 'static {
    fn has_template(&self, id: &str) -> bool;

    fn spawn_from_template(&self, id: &str, world: &mut World, context: &TemplateContext) -> Entity;
}
