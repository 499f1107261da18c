//! The [`World`] is the top-level container of the ECS. It owns the entity
//! registry, the component registry with every component store, the tile
//! occupancy index and the debug alias table.
//!
//! Nothing here is global: systems, behaviors and queries receive the world
//! by reference, and tests build as many independent worlds as they like.

use std::collections::{BTreeMap, HashMap};

use crate::component::{Component, ComponentRegistry, ComponentStore};
use crate::entity::{EntityId, EntityRegistry};
use crate::tiles::TileOccupancy;
use crate::{EcsError, RegisterMode};

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The top-level ECS container.
#[derive(Default)]
pub struct World {
    pub(crate) entities: EntityRegistry,
    pub(crate) components: ComponentRegistry,
    tiles: TileOccupancy,
    aliases: BTreeMap<String, EntityId>,
    alias_of: HashMap<EntityId, String>,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.entities.alive_count())
            .field("components", &self.components.registered_names())
            .field("aliases", &self.aliases.len())
            .finish()
    }
}

impl World {
    /// Create a new, empty world with no registered components.
    pub fn new() -> Self {
        Self::default()
    }

    // -- registration -------------------------------------------------------

    /// Register a component type under `name`.
    ///
    /// Fails with [`EcsError::DuplicateRegistration`] if the name (or the
    /// type) is already taken by a different registration.
    pub fn register_component<T: Component>(&mut self, name: &str) -> Result<(), EcsError> {
        self.components.register::<T>(name, RegisterMode::Unique)
    }

    /// Register a component type, choosing whether a clash replaces the
    /// existing store.
    pub fn register_component_with<T: Component>(
        &mut self,
        name: &str,
        mode: RegisterMode,
    ) -> Result<(), EcsError> {
        self.components.register::<T>(name, mode)
    }

    /// Read-only access to the component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.components
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Allocate the lowest free entity id. The entity starts with no
    /// components and is marked as added this frame.
    pub fn spawn(&mut self) -> EntityId {
        let entity = self.entities.allocate();
        tracing::trace!(entity = %entity, "spawned entity");
        entity
    }

    /// Allocate a specific id (used when loading saved state).
    ///
    /// Returns `false` if the id was already alive.
    pub fn spawn_with_id(&mut self, entity: EntityId) -> bool {
        self.entities.ensure(entity)
    }

    /// Remove every component of `entity`, drop it from the tile index and
    /// its debug alias, and release the id for reuse.
    pub fn despawn(&mut self, entity: EntityId) -> Result<(), EcsError> {
        if !self.entities.is_alive(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        for store in self.components.iter_mut() {
            store.remove_entity(entity);
        }
        self.tiles.evict(entity);
        if let Some(alias) = self.alias_of.remove(&entity) {
            self.aliases.remove(&alias);
        }
        self.entities.release(entity);
        tracing::trace!(entity = %entity, "despawned entity");
        Ok(())
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of allocated entities.
    pub fn entity_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Allocated entity ids, ascending.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.alive()
    }

    /// Entities allocated since the last [`clear_added`](Self::clear_added).
    pub fn added_this_frame(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.added_this_frame().iter().copied()
    }

    pub fn was_added_this_frame(&self, entity: EntityId) -> bool {
        self.entities.added_this_frame().contains(&entity)
    }

    /// End-of-frame bookkeeping: forget which entities were just added.
    pub fn clear_added(&mut self) {
        self.entities.clear_added();
    }

    /// Despawn everything and reset the tile index. Registrations survive.
    pub fn reset(&mut self) {
        for store in self.components.iter_mut() {
            store.clear();
        }
        self.entities.clear();
        self.tiles.reset_tiles();
        self.aliases.clear();
        self.alias_of.clear();
    }

    // -- component access ---------------------------------------------------

    pub fn has<T: Component>(&self, entity: EntityId) -> bool {
        self.components
            .store::<T>()
            .map(|s| s.has(entity))
            .unwrap_or(false)
    }

    /// The component of `entity`; fails with [`EcsError::MissingComponent`]
    /// if absent.
    pub fn get<T: Component>(&self, entity: EntityId) -> Result<&T, EcsError> {
        self.components.store::<T>()?.get(entity)
    }

    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Result<&mut T, EcsError> {
        self.components.store_mut::<T>()?.get_mut(entity)
    }

    /// The component of `entity`, or `default` when absent.
    pub fn get_or_default<T: Component>(&self, entity: EntityId, default: T) -> Result<T, EcsError> {
        Ok(self.components.store::<T>()?.get_or_default(entity, default))
    }

    /// Insert or overwrite a component. The entity must be alive.
    pub fn set<T: Component>(&mut self, entity: EntityId, value: T) -> Result<Option<T>, EcsError> {
        if !self.entities.is_alive(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        Ok(self.components.store_mut::<T>()?.set(entity, value))
    }

    /// Remove a component; a no-op returning `None` if absent.
    pub fn remove<T: Component>(&mut self, entity: EntityId) -> Result<Option<T>, EcsError> {
        Ok(self.components.store_mut::<T>()?.remove(entity))
    }

    /// The whole store of `T`, for iteration.
    pub fn store<T: Component>(&self) -> Result<&ComponentStore<T>, EcsError> {
        self.components.store::<T>()
    }

    pub fn store_mut<T: Component>(&mut self) -> Result<&mut ComponentStore<T>, EcsError> {
        self.components.store_mut::<T>()
    }

    // -- tiles --------------------------------------------------------------

    pub fn tiles(&self) -> &TileOccupancy {
        &self.tiles
    }

    pub fn tiles_mut(&mut self) -> &mut TileOccupancy {
        &mut self.tiles
    }

    // -- debug aliases ------------------------------------------------------

    /// Attach a human-readable alias to an entity (for logs and debug UI).
    ///
    /// An alias already pointing at another entity fails with
    /// [`EcsError::DuplicateRegistration`] unless `mode` is
    /// [`RegisterMode::Override`]. An entity carries at most one alias.
    pub fn set_debug_alias(
        &mut self,
        entity: EntityId,
        alias: &str,
        mode: RegisterMode,
    ) -> Result<(), EcsError> {
        if !self.entities.is_alive(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        if let Some(&owner) = self.aliases.get(alias) {
            if owner == entity {
                return Ok(());
            }
            if mode == RegisterMode::Unique {
                return Err(EcsError::DuplicateRegistration {
                    name: alias.to_owned(),
                });
            }
            self.alias_of.remove(&owner);
        }
        if let Some(previous) = self.alias_of.insert(entity, alias.to_owned()) {
            self.aliases.remove(&previous);
        }
        self.aliases.insert(alias.to_owned(), entity);
        Ok(())
    }

    pub fn debug_alias(&self, entity: EntityId) -> Option<&str> {
        self.alias_of.get(&entity).map(String::as_str)
    }

    pub fn entity_by_alias(&self, alias: &str) -> Option<EntityId> {
        self.aliases.get(alias).copied()
    }

    /// Every `(alias, entity)` pair, sorted by alias.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, EntityId)> + '_ {
        self.aliases.iter().map(|(a, e)| (a.as_str(), *e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
