//! Gameplay components attached by the built-in property mappers.
//!
//! Tiles only carry the data; movement, encounters and scripting are left to
//! the game's own systems.

use bevy::prelude::*;

/// Tile blocks movement.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Collision;

/// Direction a ledge can be jumped down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl LedgeDirection {
    /// Parse a property value (`up`, `down`, `left`, `right`, case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

/// One-way jump over the tile.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgeJump {
    pub direction: LedgeDirection,
}

/// Random encounters can start on this tile.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct EncounterZone {
    /// Name of the encounter table
    pub table: String,
    /// Chance per step, `0.0..=1.0`
    pub rate: f32,
}

#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct TerrainType(pub String);

/// Script run when the tile is triggered.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct ScriptTrigger {
    pub script: String,
    /// When the script runs (`step`, `interact`, ...)
    pub trigger: String,
}

/// Tile can be interacted with.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct Interactable {
    pub kind: String,
}
