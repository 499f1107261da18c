//! Reusable entity filters.
//!
//! A [`Query`] is built once (usually at startup) from a set of required
//! component types, an optional predicate and an optional "added this frame"
//! restriction. Running it against a [`World`] snapshots the matching ids at
//! call time into an owned [`QueryMatches`], so the caller is free to add or
//! remove components, or despawn entities, while walking the result.

use std::any::TypeId;
use std::fmt;

use crate::component::Component;
use crate::entity::EntityId;
use crate::world::World;
use crate::EcsError;

type Predicate = Box<dyn Fn(&World, EntityId) -> bool>;

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// An all-of component filter with an optional post-filter predicate.
#[derive(Default)]
pub struct Query {
    all: Vec<(TypeId, &'static str)>,
    predicate: Option<Predicate>,
    added_only: bool,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("all", &self.all.iter().map(|(_, n)| *n).collect::<Vec<_>>())
            .field("has_predicate", &self.predicate.is_some())
            .field("added_only", &self.added_only)
            .finish()
    }
}

impl Query {
    /// A query with no requirements; matches every entity holding at least
    /// one component.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require component `T`.
    pub fn with<T: Component>(mut self) -> Self {
        let key = (TypeId::of::<T>(), std::any::type_name::<T>());
        if !self.all.contains(&key) {
            self.all.push(key);
        }
        self
    }

    /// Narrow matches with a predicate evaluated at run time.
    pub fn filter(mut self, predicate: impl Fn(&World, EntityId) -> bool + 'static) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Only match entities added during the current frame.
    pub fn added_only(mut self) -> Self {
        self.added_only = true;
        self
    }

    /// Snapshot the ids currently matching this query, ascending.
    ///
    /// Fails with [`EcsError::UnknownComponent`] if a required component type
    /// is not registered in `world`.
    pub fn run(&self, world: &World) -> Result<QueryMatches, EcsError> {
        let registry = world.registry();
        let mut stores = Vec::with_capacity(self.all.len());
        for &(type_id, type_name) in &self.all {
            stores.push(registry.erased_by_type(type_id, type_name)?);
        }

        // Candidates come from the smallest required store; without
        // requirements, from every entity that holds any component.
        let candidates: Vec<EntityId> = match stores.iter().min_by_key(|s| s.len()) {
            Some(smallest) => smallest.ids(),
            None => world
                .entities()
                .filter(|&e| registry.iter().any(|s| s.has(e)))
                .collect(),
        };

        let ids = candidates
            .into_iter()
            .filter(|&e| !self.added_only || world.was_added_this_frame(e))
            .filter(|&e| stores.iter().all(|s| s.has(e)))
            .filter(|&e| self.predicate.as_ref().map_or(true, |p| p(world, e)))
            .collect();
        Ok(QueryMatches { ids })
    }
}

// ---------------------------------------------------------------------------
// QueryMatches
// ---------------------------------------------------------------------------

/// The ids matched by one [`Query::run`], detached from the world.
///
/// Finite and restartable: [`iter`](Self::iter) can be called any number of
/// times.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryMatches {
    ids: Vec<EntityId>,
}

impl QueryMatches {
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn as_slice(&self) -> &[EntityId] {
        &self.ids
    }
}

impl IntoIterator for QueryMatches {
    type Item = EntityId;
    type IntoIter = std::vec::IntoIter<EntityId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryMatches {
    type Item = EntityId;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, EntityId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter().copied()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
