//! Entity creation and removal.

pub mod materialize;
pub mod template;
pub mod unload;

pub use materialize::{MaterializedMap, materialize_map};
pub use template::{TemplateContext, TemplateFactory};
pub use unload::{despawn_entities, unload_map};
