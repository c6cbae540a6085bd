//! Typed property mappers.
//!
//! A [`PropertyMapper`] turns a tile's property bag into components. Mappers are
//! kept in a [`PropertyMapperRegistry`] and consulted in registration order.
//!
//! Mappers may share an exclusivity group: among the mappers of one group only
//! the first registered mapper that can apply is used. The archetype bucket of a
//! tile is the archetype of the first applied mapper that names one.

use std::sync::Arc;

use bevy::prelude::*;
use tilestream_assets::prelude::Properties;

use crate::properties::builtin::{
    CollisionMapper, EncounterMapper, InteractionMapper, LedgeMapper, ScriptMapper, TerrainMapper,
};

/// Archetype bucket a tile entity is created in.
///
/// Tiles of one bucket are spawned together so they share one storage layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TileArchetype {
    /// No mapper applied
    Ground,
    Solid,
    Ledge,
    EncounterZone,
    /// Mappers applied but none named an archetype
    Other,
}

impl TileArchetype {
    /// All buckets in materialization order.
    pub const ALL: [TileArchetype; 5] = [
        TileArchetype::Ground,
        TileArchetype::Solid,
        TileArchetype::Ledge,
        TileArchetype::EncounterZone,
        TileArchetype::Other,
    ];

    pub const fn index(self) -> usize {
        match self {
            TileArchetype::Ground => 0,
            TileArchetype::Solid => 1,
            TileArchetype::Ledge => 2,
            TileArchetype::EncounterZone => 3,
            TileArchetype::Other => 4,
        }
    }
}

/// Converts tile properties into components.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use tilestream_assets::prelude::Properties;
/// use tilestream_core::properties::{PropertyMapper, PropertyMapperRegistry};
///
/// #[derive(Component)]
/// struct Slippery;
///
/// struct IceMapper;
///
/// impl PropertyMapper for IceMapper {
///     fn name(&self) -> &str {
///         "ice"
///     }
///
///     fn can_apply(&self, properties: &Properties) -> bool {
///         properties.get_as::<bool>("ice").unwrap_or(false)
///     }
///
///     fn apply(&self, entity: &mut EntityWorldMut, _properties: &Properties) {
///         entity.insert(Slippery);
///     }
/// }
///
/// let mut registry = PropertyMapperRegistry::with_defaults();
/// registry.register(IceMapper);
/// assert_eq!(registry.len(), 7);
/// ```
pub trait PropertyMapper: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Bucket of tiles this mapper applies to, if it defines one.
    fn archetype(&self) -> Option<TileArchetype> {
        None
    }

    /// Mappers sharing a group are mutually exclusive on one tile.
    fn exclusive_group(&self) -> Option<&str> {
        None
    }

    /// Whether the properties carry what this mapper needs.
    fn can_apply(&self, properties: &Properties) -> bool;

    /// Attach components to a single entity.
    fn apply(&self, entity: &mut EntityWorldMut, properties: &Properties);

    /// Attach components to many freshly spawned entities.
    ///
    /// The default calls [`PropertyMapper::apply`] per entity. Mappers that
    /// insert a fixed component type override this with one `insert_batch`.
    fn apply_batch(&self, world: &mut World, targets: &[(Entity, &Properties)]) {
        for &(entity, properties) in targets {
            if let Ok(mut entity) = world.get_entity_mut(entity) {
                self.apply(&mut entity, properties);
            }
        }
    }
}

/// Result of running a property bag through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub archetype: TileArchetype,
    /// Indices of applied mappers, in registration order
    pub mappers: Vec<usize>,
}

impl Classification {
    pub const GROUND: Classification = Classification {
        archetype: TileArchetype::Ground,
        mappers: Vec::new(),
    };
}

/// Ordered set of property mappers.
///
/// Cloning is cheap; clones share the mapper instances.
#[derive(Resource, Clone, Default)]
pub struct PropertyMapperRegistry {
    mappers: Vec<Arc<dyn PropertyMapper>>,
}

impl PropertyMapperRegistry {
    /// An empty registry: every tile is `Ground` and gets no gameplay components.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in mappers, in this order: collision, ledge,
    /// encounter, terrain, script, interaction.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(CollisionMapper)
            .register(LedgeMapper)
            .register(EncounterMapper)
            .register(TerrainMapper)
            .register(ScriptMapper)
            .register(InteractionMapper);
        registry
    }

    /// Append a mapper. Earlier mappers win exclusivity conflicts.
    pub fn register(&mut self, mapper: impl PropertyMapper) -> &mut Self {
        self.mappers.push(Arc::new(mapper));
        self
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn PropertyMapper> {
        self.mappers.get(index).map(|mapper| &**mapper)
    }

    /// Decide which mappers apply to a property bag and which bucket it lands in.
    pub fn classify(&self, properties: Option<&Properties>) -> Classification {
        let Some(properties) = properties.filter(|p| !p.is_empty()) else {
            return Classification::GROUND;
        };

        let mut claimed: Vec<&str> = Vec::new();
        let mut applied = Vec::new();
        let mut archetype = None;
        for (index, mapper) in self.mappers.iter().enumerate() {
            let group = mapper.exclusive_group();
            if group.is_some_and(|g| claimed.contains(&g)) {
                continue;
            }
            if !mapper.can_apply(properties) {
                continue;
            }
            if let Some(group) = group {
                claimed.push(group);
            }
            if archetype.is_none() {
                archetype = mapper.archetype();
            }
            applied.push(index);
        }

        let archetype = match (archetype, applied.is_empty()) {
            (Some(archetype), _) => archetype,
            (None, true) => TileArchetype::Ground,
            (None, false) => TileArchetype::Other,
        };
        Classification {
            archetype,
            mappers: applied,
        }
    }
}

impl std::fmt::Debug for PropertyMapperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.mappers.iter().map(|mapper| mapper.name()))
            .finish()
    }
}
