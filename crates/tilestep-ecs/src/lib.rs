//! Tilestep ECS -- sparse-array entity component storage for tile games.
//!
//! This crate provides the data model of the Tilestep simulation core. An
//! entity is a bare integer id; every piece of state lives in a per-type
//! [`ComponentStore`](component::ComponentStore) indexed by that id. The
//! [`World`](world::World) owns all stores, the entity registry and the tile
//! occupancy index, so several independent worlds can coexist (tests do this
//! constantly).
//!
//! # Quick Start
//!
//! ```
//! use tilestep_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
//! struct Health(u32);
//!
//! let mut world = World::new();
//! world.register_component::<Health>("health").unwrap();
//!
//! let entity = world.spawn();
//! world.set(entity, Health(3)).unwrap();
//!
//! assert_eq!(world.get::<Health>(entity).unwrap(), &Health(3));
//! assert!(world.get::<Health>(EntityId(99)).is_err());
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod query;
pub mod snapshot;
pub mod tiles;
pub mod units;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
///
/// All of these signal a caller logic bug. They propagate up to the frame
/// boundary; nothing inside the core retries or defaults around them.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// An accessor was called on an entity that lacks the component.
    #[error("entity {entity} has no '{component}' component")]
    MissingComponent {
        entity: entity::EntityId,
        component: String,
    },

    /// A component type was referenced that has not been registered.
    #[error("component type '{name}' not registered. Registered components: [{registered}]")]
    UnknownComponent { name: String, registered: String },

    /// A tile or matrix coordinate was not an integer.
    #[error("coordinate {value} is not an integer")]
    InvalidCoordinate { value: f64 },

    /// A name, alias or handler was registered twice without an override.
    #[error("'{name}' is already registered (pass RegisterMode::Override to replace it)")]
    DuplicateRegistration { name: String },

    /// Deserialization of a component value failed.
    #[error("failed to deserialize component '{component}': {details}")]
    ComponentDeserializationError { component: String, details: String },

    /// The entity id is not currently allocated.
    #[error("entity {entity} does not exist")]
    StaleEntity { entity: entity::EntityId },

    /// Loaded state named an entity id above [`entity::MAX_ENTITY_ID`].
    #[error("entity {entity} is above the id limit {limit}")]
    EntityIdOutOfRange { entity: entity::EntityId, limit: u32 },
}

/// Whether a registration may replace an existing entry with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegisterMode {
    /// Fail with [`EcsError::DuplicateRegistration`] if the name is taken.
    #[default]
    Unique,
    /// Replace the existing entry.
    Override,
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{ComponentRegistry, ComponentStore};
    pub use crate::entity::{AutoIncrementIdentifierSet, EntityId, EntityRegistry};
    pub use crate::query::{Query, QueryMatches};
    pub use crate::snapshot::{EntityRecord, WorldSnapshot};
    pub use crate::tiles::{Collision, TileMatrix, TileOccupancy};
    pub use crate::units::{Pixels, TileCoord, TilePoint, TileRect, TileStep};
    pub use crate::world::World;
    pub use crate::{EcsError, RegisterMode};
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
