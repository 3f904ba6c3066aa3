//! An archetype-based entity component system.
//!
//! Entities with the same set of component types share an archetype,
//! which stores each component in its own densely packed column. Adding or
//! removing a component moves the entity's row to the archetype of its new
//! component set.

mod archetype;
mod archetype_graph;
mod archetypes;
pub mod commands;
pub mod component;
mod entity;
pub mod error;
pub mod events;
mod hierarchy;
mod naming;
pub mod plugin;
pub mod query;
pub mod schedule;
pub mod singleton;
pub mod system;
pub mod world;

pub use archetype::{Archetype, ArchetypeId};
pub use archetypes::Archetypes;
pub use entity::{Entity, EntityLocation};

pub mod prelude {
    pub use crate::commands::CommandBuffer;
    pub use crate::component::{Component, ComponentId};
    pub use crate::entity::Entity;
    pub use crate::error::{EcsError, Result};
    pub use crate::events::SubscriptionId;
    pub use crate::plugin::{Plugin, PluginContext};
    pub use crate::query::Query;
    pub use crate::schedule::SystemPhase;
    pub use crate::singleton::Singleton;
    pub use crate::system::{System, SystemId};
    pub use crate::world::{EntityBuilder, World, WorldConfig};
}
