//! Removing a map's entities.

use bevy::prelude::*;

use crate::components::map::{MapId, MapMember};

/// Despawn every entity created for `map_id`.
///
/// Returns the number of entities removed.
pub fn unload_map(world: &mut World, map_id: &MapId) -> usize {
    let mut members = world.query::<(Entity, &MapMember)>();
    let entities: Vec<Entity> = members
        .iter(world)
        .filter(|(_, member)| member.0 == *map_id)
        .map(|(entity, _)| entity)
        .collect();
    despawn_entities(world, &entities);
    info!("Unloaded map {} ({} entities)", map_id, entities.len());
    entities.len()
}

/// Despawn `entities`, skipping any that no longer exist.
pub fn despawn_entities(world: &mut World, entities: &[Entity]) {
    for &entity in entities {
        if let Ok(entity) = world.get_entity_mut(entity) {
            entity.despawn();
        }
    }
}
