//! Property-driven component attachment.

pub mod builtin;
pub mod mappers;

pub use builtin::{
    CollisionMapper, EncounterMapper, InteractionMapper, LedgeMapper, ScriptMapper, TerrainMapper,
};
pub use mappers::{Classification, PropertyMapper, PropertyMapperRegistry, TileArchetype};
