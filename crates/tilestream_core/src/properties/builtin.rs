//! Built-in property mappers.
//!
//! | Mapper | Properties | Component | Bucket |
//! |---|---|---|---|
//! | collision | bool `solid` or `collision` | [`Collision`] | Solid |
//! | ledge | string `ledge` (`up`/`down`/`left`/`right`) | [`LedgeJump`] | Ledge |
//! | encounter | string `encounter_table`, float `encounter_rate` | [`EncounterZone`] | `EncounterZone` |
//! | terrain | string `terrain` | [`TerrainType`] | - |
//! | script | string `script`, string `trigger` | [`ScriptTrigger`] | - |
//! | interaction | string `interaction` | [`Interactable`] | - |
//!
//! Collision and ledge share the `movement` exclusivity group.

use bevy::prelude::*;
use tilestream_assets::prelude::Properties;

use crate::components::gameplay::{
    Collision, EncounterZone, Interactable, LedgeDirection, LedgeJump, ScriptTrigger, TerrainType,
};
use crate::properties::mappers::{PropertyMapper, TileArchetype};

/// Exclusivity group of mappers that decide how a tile is walked on.
pub const MOVEMENT_GROUP: &str = "movement";

/// Encounter rate used when `encounter_rate` is absent.
pub const DEFAULT_ENCOUNTER_RATE: f32 = 0.1;

/// Trigger used when `trigger` is absent.
pub const DEFAULT_TRIGGER: &str = "step";

fn non_empty<'a>(properties: &'a Properties, name: &str) -> Option<&'a str> {
    properties.get_str(name).filter(|s| !s.is_empty())
}

pub struct CollisionMapper;

impl CollisionMapper {
    fn solid(properties: &Properties) -> bool {
        properties.get_as::<bool>("solid").unwrap_or(false)
            || properties.get_as::<bool>("collision").unwrap_or(false)
    }
}

impl PropertyMapper for CollisionMapper {
    fn name(&self) -> &str {
        "collision"
    }

    fn archetype(&self) -> Option<TileArchetype> {
        Some(TileArchetype::Solid)
    }

    fn exclusive_group(&self) -> Option<&str> {
        Some(MOVEMENT_GROUP)
    }

    fn can_apply(&self, properties: &Properties) -> bool {
        Self::solid(properties)
    }

    fn apply(&self, entity: &mut EntityWorldMut, _properties: &Properties) {
        entity.insert(Collision);
    }

    fn apply_batch(&self, world: &mut World, targets: &[(Entity, &Properties)]) {
        let batch: Vec<(Entity, Collision)> = targets
            .iter()
            .map(|&(entity, _)| (entity, Collision))
            .collect();
        world.insert_batch(batch);
    }
}

pub struct LedgeMapper;

impl LedgeMapper {
    fn ledge(properties: &Properties) -> Option<LedgeJump> {
        let direction = LedgeDirection::parse(properties.get_str("ledge")?)?;
        Some(LedgeJump { direction })
    }
}

impl PropertyMapper for LedgeMapper {
    fn name(&self) -> &str {
        "ledge"
    }

    fn archetype(&self) -> Option<TileArchetype> {
        Some(TileArchetype::Ledge)
    }

    fn exclusive_group(&self) -> Option<&str> {
        Some(MOVEMENT_GROUP)
    }

    fn can_apply(&self, properties: &Properties) -> bool {
        Self::ledge(properties).is_some()
    }

    fn apply(&self, entity: &mut EntityWorldMut, properties: &Properties) {
        if let Some(ledge) = Self::ledge(properties) {
            entity.insert(ledge);
        }
    }

    fn apply_batch(&self, world: &mut World, targets: &[(Entity, &Properties)]) {
        let batch: Vec<(Entity, LedgeJump)> = targets
            .iter()
            .filter_map(|&(entity, props)| Some((entity, Self::ledge(props)?)))
            .collect();
        world.insert_batch(batch);
    }
}

pub struct EncounterMapper;

impl EncounterMapper {
    fn zone(properties: &Properties) -> Option<EncounterZone> {
        let table = non_empty(properties, "encounter_table")?;
        let rate = properties
            .get_as::<f32>("encounter_rate")
            .unwrap_or(DEFAULT_ENCOUNTER_RATE)
            .clamp(0.0, 1.0);
        Some(EncounterZone {
            table: table.to_string(),
            rate,
        })
    }
}

impl PropertyMapper for EncounterMapper {
    fn name(&self) -> &str {
        "encounter"
    }

    fn archetype(&self) -> Option<TileArchetype> {
        Some(TileArchetype::EncounterZone)
    }

    fn can_apply(&self, properties: &Properties) -> bool {
        non_empty(properties, "encounter_table").is_some()
    }

    fn apply(&self, entity: &mut EntityWorldMut, properties: &Properties) {
        if let Some(zone) = Self::zone(properties) {
            entity.insert(zone);
        }
    }

    fn apply_batch(&self, world: &mut World, targets: &[(Entity, &Properties)]) {
        let batch: Vec<(Entity, EncounterZone)> = targets
            .iter()
            .filter_map(|&(entity, props)| Some((entity, Self::zone(props)?)))
            .collect();
        world.insert_batch(batch);
    }
}

pub struct TerrainMapper;

impl PropertyMapper for TerrainMapper {
    fn name(&self) -> &str {
        "terrain"
    }

    fn can_apply(&self, properties: &Properties) -> bool {
        non_empty(properties, "terrain").is_some()
    }

    fn apply(&self, entity: &mut EntityWorldMut, properties: &Properties) {
        if let Some(terrain) = non_empty(properties, "terrain") {
            entity.insert(TerrainType(terrain.to_string()));
        }
    }

    fn apply_batch(&self, world: &mut World, targets: &[(Entity, &Properties)]) {
        let batch: Vec<(Entity, TerrainType)> = targets
            .iter()
            .filter_map(|&(entity, props)| {
                Some((entity, TerrainType(non_empty(props, "terrain")?.to_string())))
            })
            .collect();
        world.insert_batch(batch);
    }
}

pub struct ScriptMapper;

impl ScriptMapper {
    fn trigger(properties: &Properties) -> Option<ScriptTrigger> {
        let script = non_empty(properties, "script")?;
        let trigger = non_empty(properties, "trigger").unwrap_or(DEFAULT_TRIGGER);
        Some(ScriptTrigger {
            script: script.to_string(),
            trigger: trigger.to_string(),
        })
    }
}

impl PropertyMapper for ScriptMapper {
    fn name(&self) -> &str {
        "script"
    }

    fn can_apply(&self, properties: &Properties) -> bool {
        non_empty(properties, "script").is_some()
    }

    fn apply(&self, entity: &mut EntityWorldMut, properties: &Properties) {
        if let Some(trigger) = Self::trigger(properties) {
            entity.insert(trigger);
        }
    }

    fn apply_batch(&self, world: &mut World, targets: &[(Entity, &Properties)]) {
        let batch: Vec<(Entity, ScriptTrigger)> = targets
            .iter()
            .filter_map(|&(entity, props)| Some((entity, Self::trigger(props)?)))
            .collect();
        world.insert_batch(batch);
    }
}

pub struct InteractionMapper;

impl PropertyMapper for InteractionMapper {
    fn name(&self) -> &str {
        "interaction"
    }

    fn can_apply(&self, properties: &Properties) -> bool {
        non_empty(properties, "interaction").is_some()
    }

    fn apply(&self, entity: &mut EntityWorldMut, properties: &Properties) {
        if let Some(kind) = non_empty(properties, "interaction") {
            entity.insert(Interactable {
                kind: kind.to_string(),
            });
        }
    }

    fn apply_batch(&self, world: &mut World, targets: &[(Entity, &Properties)]) {
        let batch: Vec<(Entity, Interactable)> = targets
            .iter()
            .filter_map(|&(entity, props)| {
                let kind = non_empty(props, "interaction")?.to_string();
                Some((entity, Interactable { kind }))
            })
            .collect();
        world.insert_batch(batch);
    }
}

#[cfg(test)]
mod tests {
    use tilestream_assets::prelude::PropertyValue;

    use super::*;

    fn props(entries: &[(&str, PropertyValue)]) -> Properties {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_encounter_defaults() {
        let bag = props(&[(
            "encounter_table",
            PropertyValue::StringValue("route1".into()),
        )]);
        assert_eq!(
            EncounterMapper::zone(&bag),
            Some(EncounterZone {
                table: "route1".into(),
                rate: DEFAULT_ENCOUNTER_RATE
            })
        );
    }

    #[test]
    fn test_script_trigger_default() {
        let bag = props(&[("script", PropertyValue::StringValue("sign_1".into()))]);
        let trigger = ScriptMapper::trigger(&bag).unwrap();
        assert_eq!(trigger.trigger, DEFAULT_TRIGGER);
    }

    #[test]
    fn test_invalid_ledge_direction_does_not_apply() {
        let bag = props(&[("ledge", PropertyValue::StringValue("sideways".into()))]);
        assert!(!LedgeMapper.can_apply(&bag));
    }

    #[test]
    fn test_batch_and_single_apply_agree() {
        let mut world = World::new();
        let bag = props(&[
            ("collision", PropertyValue::BoolValue(true)),
            ("terrain", PropertyValue::StringValue("rock".into())),
        ]);
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();

        CollisionMapper.apply_batch(&mut world, &[(a, &bag)]);
        TerrainMapper.apply_batch(&mut world, &[(a, &bag)]);
        CollisionMapper.apply(&mut world.entity_mut(b), &bag);
        TerrainMapper.apply(&mut world.entity_mut(b), &bag);

        for entity in [a, b] {
            assert!(world.entity(entity).contains::<Collision>());
            assert_eq!(
                world.get::<TerrainType>(entity),
                Some(&TerrainType("rock".into()))
            );
        }
    }
}
