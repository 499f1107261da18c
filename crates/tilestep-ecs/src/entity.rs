//! Entity identifiers and allocation.
//!
//! An [`EntityId`] is a plain non-negative integer. Ids are handed out by the
//! [`EntityRegistry`] using a lowest-free-id strategy, so a released id is the
//! next one reused. Component stores are sparse arrays indexed by the id,
//! which keeps them compact under that strategy.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// Largest id accepted from loaded state. Component stores are indexed by
/// id, so a stray huge id would size every store to match.
pub const MAX_ENTITY_ID: u32 = 1 << 20;

/// An opaque entity identifier. Carries no data of its own.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl EntityId {
    /// Index into a sparse component array.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AutoIncrementIdentifierSet
// ---------------------------------------------------------------------------

/// A set of integer ids that knows its smallest missing member.
///
/// [`next_value`](Self::next_value) always returns the smallest non-negative
/// integer not in the set. It does not reserve the value; calling it twice
/// without an [`add`](Self::add) in between returns the same number.
#[derive(Debug, Clone, Default)]
pub struct AutoIncrementIdentifierSet {
    members: BTreeSet<u32>,
    /// Lower bound for the search: every value below it is a member.
    low_water: u32,
}

impl AutoIncrementIdentifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The smallest non-negative integer not currently in the set.
    pub fn next_value(&self) -> u32 {
        let mut candidate = self.low_water;
        for &member in self.members.range(self.low_water..) {
            if member != candidate {
                break;
            }
            candidate += 1;
        }
        candidate
    }

    /// Insert `value`. Returns `false` if it was already present.
    pub fn add(&mut self, value: u32) -> bool {
        let inserted = self.members.insert(value);
        if inserted && value == self.low_water {
            self.low_water = self.next_value();
        }
        inserted
    }

    /// Remove `value`. Returns `false` if it was not present.
    pub fn remove(&mut self, value: u32) -> bool {
        let removed = self.members.remove(&value);
        if removed && value < self.low_water {
            self.low_water = value;
        }
        removed
    }

    pub fn contains(&self, value: u32) -> bool {
        self.members.contains(&value)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.members.iter().copied()
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.low_water = 0;
    }
}

// ---------------------------------------------------------------------------
// EntityRegistry
// ---------------------------------------------------------------------------

/// Allocates and recycles [`EntityId`]s and tracks which ones were added
/// during the current frame.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    ids: AutoIncrementIdentifierSet,
    /// Ids allocated since the last [`clear_added`](Self::clear_added).
    added: BTreeSet<EntityId>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the lowest free id and mark it as added this frame.
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.ids.next_value());
        self.ids.add(id.0);
        self.added.insert(id);
        id
    }

    /// Make sure a specific id is allocated (used when restoring saved
    /// state). Returns `true` if the id was newly allocated.
    pub fn ensure(&mut self, id: EntityId) -> bool {
        let inserted = self.ids.add(id.0);
        if inserted {
            self.added.insert(id);
        }
        inserted
    }

    /// Release an id for reuse. Returns `false` if it was not allocated.
    pub fn release(&mut self, id: EntityId) -> bool {
        self.added.remove(&id);
        self.ids.remove(id.0)
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.ids.contains(id.0)
    }

    /// Number of allocated ids.
    pub fn alive_count(&self) -> usize {
        self.ids.len()
    }

    /// Allocated ids in ascending order.
    pub fn alive(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.ids.iter().map(EntityId)
    }

    /// Ids allocated during the current frame.
    pub fn added_this_frame(&self) -> &BTreeSet<EntityId> {
        &self.added
    }

    /// Forget the "added" marks. Called once at the end of every frame.
    pub fn clear_added(&mut self) {
        self.added.clear();
    }

    /// Release every id.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.added.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
