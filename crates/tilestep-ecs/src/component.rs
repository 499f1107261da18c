//! Component storage and type registration.
//!
//! Each component type lives in its own [`ComponentStore`], a sparse array
//! indexed by [`EntityId`]. Absence is "no entry", never a null value, and
//! every typed accessor fails with [`EcsError::MissingComponent`] instead of
//! inventing a default.
//!
//! Stores are registered under a human-readable name in the
//! [`ComponentRegistry`]. The name is what snapshots and error messages use;
//! the Rust `TypeId` is what typed access uses.

use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashMap};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::entity::EntityId;
use crate::{EcsError, RegisterMode};

/// Bound shared by every component type.
pub trait Component: Clone + Serialize + DeserializeOwned + 'static {}

impl<T: Clone + Serialize + DeserializeOwned + 'static> Component for T {}

// ---------------------------------------------------------------------------
// ComponentStore
// ---------------------------------------------------------------------------

/// Sparse per-type storage. Slot `i` holds the component of `EntityId(i)`.
///
/// `has`, `get`, `set` and `remove` are O(1). Iteration is in ascending id
/// order. `set` and `remove` record the entity in a dirty set that the render
/// layer drains with [`take_dirty`](Self::take_dirty).
#[derive(Debug, Clone)]
pub struct ComponentStore<T> {
    name: String,
    slots: Vec<Option<T>>,
    len: usize,
    dirty: BTreeSet<EntityId>,
}

impl<T> ComponentStore<T> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            slots: Vec::new(),
            len: 0,
            dirty: BTreeSet::new(),
        }
    }

    /// The name this store was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has(&self, entity: EntityId) -> bool {
        matches!(self.slots.get(entity.index()), Some(Some(_)))
    }

    /// The component of `entity`, or [`EcsError::MissingComponent`].
    pub fn get(&self, entity: EntityId) -> Result<&T, EcsError> {
        match self.slots.get(entity.index()) {
            Some(Some(value)) => Ok(value),
            _ => Err(self.missing(entity)),
        }
    }

    /// Mutable access. Marks the entity dirty since the caller may write.
    pub fn get_mut(&mut self, entity: EntityId) -> Result<&mut T, EcsError> {
        match self.slots.get_mut(entity.index()) {
            Some(Some(value)) => {
                self.dirty.insert(entity);
                Ok(value)
            }
            _ => Err(EcsError::MissingComponent {
                entity,
                component: self.name.clone(),
            }),
        }
    }

    /// Insert or overwrite. Returns the previous value, if any.
    pub fn set(&mut self, entity: EntityId, value: T) -> Option<T> {
        let idx = entity.index();
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        let previous = self.slots[idx].replace(value);
        if previous.is_none() {
            self.len += 1;
        }
        self.dirty.insert(entity);
        previous
    }

    /// Delete the entry. A no-op (returning `None`) if absent.
    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        let removed = self.slots.get_mut(entity.index()).and_then(Option::take);
        if removed.is_some() {
            self.len -= 1;
            self.dirty.insert(entity);
            // Keep the array tight when the tail empties out.
            while matches!(self.slots.last(), Some(None)) {
                self.slots.pop();
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `(entity, &component)` pairs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (EntityId(i as u32), v)))
    }

    /// Ids holding this component, ascending.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.iter().map(|(id, _)| id)
    }

    /// Entities written or removed since the last [`take_dirty`](Self::take_dirty).
    pub fn dirty(&self) -> &BTreeSet<EntityId> {
        &self.dirty
    }

    /// Drain the dirty set.
    pub fn take_dirty(&mut self) -> BTreeSet<EntityId> {
        std::mem::take(&mut self.dirty)
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        for id in self.ids().collect::<Vec<_>>() {
            self.dirty.insert(id);
        }
        self.slots.clear();
        self.len = 0;
    }

    fn decode(&self, value: &serde_json::Value) -> Result<T, EcsError>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_value(value.clone()).map_err(|e| EcsError::ComponentDeserializationError {
            component: self.name.clone(),
            details: e.to_string(),
        })
    }

    fn missing(&self, entity: EntityId) -> EcsError {
        EcsError::MissingComponent {
            entity,
            component: self.name.clone(),
        }
    }
}

impl<T: Clone> ComponentStore<T> {
    /// The component of `entity`, or `default` if absent. This is the only
    /// accessor that tolerates absence.
    pub fn get_or_default(&self, entity: EntityId, default: T) -> T {
        self.get(entity).cloned().unwrap_or(default)
    }
}

// ---------------------------------------------------------------------------
// ErasedStore
// ---------------------------------------------------------------------------

/// Type-erased view of a [`ComponentStore`], used where the world has to
/// treat all stores uniformly (despawn, queries, snapshots).
pub trait ErasedStore: Any {
    fn name(&self) -> &str;
    fn has(&self, entity: EntityId) -> bool;
    /// Remove the entity's component, returning whether one was present.
    fn remove_entity(&mut self, entity: EntityId) -> bool;
    fn ids(&self) -> Vec<EntityId>;
    fn len(&self) -> usize;
    /// Serialize the entity's component, or `None` if absent.
    fn serialize(&self, entity: EntityId) -> Option<Result<serde_json::Value, EcsError>>;
    /// Deserialize `value` and store it on `entity`.
    fn set_from_json(&mut self, entity: EntityId, value: &serde_json::Value)
        -> Result<(), EcsError>;
    /// Whether `value` deserializes as this store's component. Stores nothing.
    fn check_json(&self, value: &serde_json::Value) -> Result<(), EcsError>;
    fn clear(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStore for ComponentStore<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn has(&self, entity: EntityId) -> bool {
        ComponentStore::has(self, entity)
    }

    fn remove_entity(&mut self, entity: EntityId) -> bool {
        self.remove(entity).is_some()
    }

    fn ids(&self) -> Vec<EntityId> {
        ComponentStore::ids(self).collect()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn serialize(&self, entity: EntityId) -> Option<Result<serde_json::Value, EcsError>> {
        let value = self.get(entity).ok()?;
        Some(serde_json::to_value(value).map_err(|e| {
            EcsError::ComponentDeserializationError {
                component: self.name.clone(),
                details: e.to_string(),
            }
        }))
    }

    fn set_from_json(
        &mut self,
        entity: EntityId,
        value: &serde_json::Value,
    ) -> Result<(), EcsError> {
        let typed = self.decode(value)?;
        self.set(entity, typed);
        Ok(())
    }

    fn check_json(&self, value: &serde_json::Value) -> Result<(), EcsError> {
        self.decode(value).map(drop)
    }

    fn clear(&mut self) {
        ComponentStore::clear(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Registry mapping Rust types and names to their component stores.
///
/// Stores are kept in registration order, which is also the order snapshots
/// and despawn visit them.
#[derive(Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, usize>,
    by_name: HashMap<String, usize>,
    stores: Vec<Box<dyn ErasedStore>>,
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("names", &self.registered_names())
            .finish()
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register component type `T` under `name`.
    ///
    /// Registering the same type under the same name again is a no-op. A
    /// name already used by another type, or a type already registered under
    /// another name, fails with [`EcsError::DuplicateRegistration`] unless
    /// `mode` is [`RegisterMode::Override`], in which case the old store (and
    /// its data) is replaced by an empty one.
    pub fn register<T: Component>(&mut self, name: &str, mode: RegisterMode) -> Result<(), EcsError> {
        let type_id = TypeId::of::<T>();
        let existing_by_name = self.by_name.get(name).copied();
        let existing_by_type = self.by_type.get(&type_id).copied();

        if existing_by_name.is_some() && existing_by_name == existing_by_type {
            return Ok(());
        }
        if mode == RegisterMode::Unique {
            if existing_by_name.is_some() {
                return Err(EcsError::DuplicateRegistration {
                    name: name.to_owned(),
                });
            }
            if let Some(idx) = existing_by_type {
                return Err(EcsError::DuplicateRegistration {
                    name: self.stores[idx].name().to_owned(),
                });
            }
        }

        let store: Box<dyn ErasedStore> = Box::new(ComponentStore::<T>::new(name));
        let idx = match existing_by_name.or(existing_by_type) {
            Some(idx) => {
                tracing::warn!(component = %name, "overriding registered component store");
                let old_name = self.stores[idx].name().to_owned();
                self.by_name.remove(&old_name);
                self.by_type.retain(|_, v| *v != idx);
                self.stores[idx] = store;
                idx
            }
            None => {
                self.stores.push(store);
                self.stores.len() - 1
            }
        };
        // An override may orphan a second slot (name of one type, type of
        // another); drop its lookups so each index is reachable once.
        if let (Some(a), Some(b)) = (existing_by_name, existing_by_type) {
            if a != b {
                let orphan = if idx == a { b } else { a };
                let orphan_name = self.stores[orphan].name().to_owned();
                self.by_name.remove(&orphan_name);
                self.by_type.retain(|_, v| *v != orphan);
                self.stores[orphan].clear();
            }
        }
        self.by_type.insert(type_id, idx);
        self.by_name.insert(name.to_owned(), idx);
        Ok(())
    }

    /// The typed store for `T`.
    pub fn store<T: Component>(&self) -> Result<&ComponentStore<T>, EcsError> {
        let idx = self.index_of::<T>()?;
        self.stores[idx]
            .as_any()
            .downcast_ref::<ComponentStore<T>>()
            .ok_or_else(|| self.unknown(std::any::type_name::<T>()))
    }

    /// The typed store for `T`, mutably.
    pub fn store_mut<T: Component>(&mut self) -> Result<&mut ComponentStore<T>, EcsError> {
        let idx = self.index_of::<T>()?;
        let unknown = self.unknown(std::any::type_name::<T>());
        self.stores[idx]
            .as_any_mut()
            .downcast_mut::<ComponentStore<T>>()
            .ok_or(unknown)
    }

    /// The type-erased store registered under `name`.
    pub fn erased(&self, name: &str) -> Result<&dyn ErasedStore, EcsError> {
        self.by_name
            .get(name)
            .map(|&idx| self.stores[idx].as_ref())
            .ok_or_else(|| self.unknown(name))
    }

    /// The type-erased store registered under `name`, mutably.
    pub fn erased_mut(&mut self, name: &str) -> Result<&mut dyn ErasedStore, EcsError> {
        match self.by_name.get(name) {
            Some(&idx) => Ok(self.stores[idx].as_mut()),
            None => Err(self.unknown(name)),
        }
    }

    /// The type-erased store for a Rust type.
    pub fn erased_by_type(&self, type_id: TypeId, type_name: &str) -> Result<&dyn ErasedStore, EcsError> {
        self.by_type
            .get(&type_id)
            .map(|&idx| self.stores[idx].as_ref())
            .ok_or_else(|| self.unknown(type_name))
    }

    /// All live stores in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn ErasedStore> + '_ {
        self.live_indices().map(|idx| self.stores[idx].as_ref())
    }

    /// All live stores in registration order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn ErasedStore>> + '_ {
        let live: BTreeSet<usize> = self.by_name.values().copied().collect();
        self.stores
            .iter_mut()
            .enumerate()
            .filter(move |(i, _)| live.contains(i))
            .map(|(_, store)| store)
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Names of all registered component types, sorted.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    fn live_indices(&self) -> impl Iterator<Item = usize> {
        let live: BTreeSet<usize> = self.by_name.values().copied().collect();
        live.into_iter()
    }

    fn index_of<T: 'static>(&self) -> Result<usize, EcsError> {
        self.by_type
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or_else(|| self.unknown(std::any::type_name::<T>()))
    }

    pub(crate) fn unknown(&self, name: &str) -> EcsError {
        EcsError::UnknownComponent {
            name: name.to_owned(),
            registered: self.registered_names().join(", "),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Pos {
        x: i32,
        y: i32,
    }

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Vel {
        dx: i32,
        dy: i32,
    }

    #[test]
    fn store_has_get_set_remove() {
        let mut store = ComponentStore::new("pos");
        let e = EntityId(3);
        assert!(!store.has(e));
        assert!(store.get(e).is_err());

        assert_eq!(store.set(e, Pos { x: 1, y: 2 }), None);
        assert!(store.has(e));
        assert_eq!(store.get(e).unwrap(), &Pos { x: 1, y: 2 });
        assert_eq!(store.len(), 1);

        assert_eq!(store.remove(e), Some(Pos { x: 1, y: 2 }));
        assert_eq!(store.remove(e), None);
        assert!(store.is_empty());
    }

    #[test]
    fn iteration_is_ascending_by_id() {
        let mut store = ComponentStore::new("n");
        for id in [7u32, 2, 5] {
            store.set(EntityId(id), id);
        }
        let ids: Vec<u32> = store.ids().map(|e| e.0).collect();
        assert_eq!(ids, vec![2, 5, 7]);
    }

    #[test]
    fn writes_mark_dirty() {
        let mut store = ComponentStore::new("n");
        store.set(EntityId(1), 10u32);
        store.set(EntityId(2), 20u32);
        store.take_dirty();

        *store.get_mut(EntityId(1)).unwrap() += 1;
        store.remove(EntityId(2));
        store.remove(EntityId(9));
        let dirty: Vec<EntityId> = store.take_dirty().into_iter().collect();
        assert_eq!(dirty, vec![EntityId(1), EntityId(2)]);
    }

    #[test]
    fn missing_component_error_names_the_store() {
        let store: ComponentStore<Pos> = ComponentStore::new("position");
        let err = store.get(EntityId(0)).unwrap_err();
        assert_eq!(err.to_string(), "entity #0 has no 'position' component");
    }

    #[test]
    fn duplicate_name_requires_override() {
        let mut reg = ComponentRegistry::new();
        reg.register::<Pos>("position", RegisterMode::Unique).unwrap();
        // Same type, same name: idempotent.
        reg.register::<Pos>("position", RegisterMode::Unique).unwrap();

        let err = reg.register::<Vel>("position", RegisterMode::Unique).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateRegistration { .. }));

        reg.register::<Vel>("position", RegisterMode::Override).unwrap();
        assert!(reg.is_registered::<Vel>());
        assert!(!reg.is_registered::<Pos>());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn erased_store_json_roundtrip() {
        let mut reg = ComponentRegistry::new();
        reg.register::<Pos>("position", RegisterMode::Unique).unwrap();
        let store = reg.erased_mut("position").unwrap();
        store
            .set_from_json(EntityId(0), &serde_json::json!({"x": 4, "y": -2}))
            .unwrap();
        assert!(store
            .set_from_json(EntityId(1), &serde_json::json!("nope"))
            .is_err());
        assert_eq!(
            reg.store::<Pos>().unwrap().get(EntityId(0)).unwrap(),
            &Pos { x: 4, y: -2 }
        );
    }
}
