//! Action bookkeeping: the ledger that owns actions, the FIFO queue of
//! accepted actions, and the undo stack grouping them into points.
//!
//! Actions are referenced by [`ActionId`] everywhere except the ledger, so
//! the same action can sit in the queue, the in-progress list and an undo
//! point at once without shared ownership.

use std::collections::{HashMap, VecDeque};

use tilestep_ecs::entity::EntityId;

use crate::action::{Action, ActionId};
use crate::EngineError;

// ---------------------------------------------------------------------------
// ActionLedger
// ---------------------------------------------------------------------------

struct LedgerSlot {
    action: Box<dyn Action>,
    /// Recorded in an undo point; kept after completion so it can be undone.
    recorded: bool,
}

/// Arena of live actions.
#[derive(Default)]
pub struct ActionLedger {
    slots: HashMap<ActionId, LedgerSlot>,
    next_id: u64,
}

impl std::fmt::Debug for ActionLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionLedger")
            .field("live", &self.slots.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl ActionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id without storing anything yet.
    pub fn reserve_id(&mut self) -> ActionId {
        let id = ActionId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, id: ActionId, action: Box<dyn Action>) {
        self.slots.insert(
            id,
            LedgerSlot {
                action,
                recorded: false,
            },
        );
    }

    pub fn get(&self, id: ActionId) -> Result<&dyn Action, EngineError> {
        self.slots
            .get(&id)
            .map(|slot| slot.action.as_ref())
            .ok_or(EngineError::UnknownAction { id })
    }

    pub fn get_mut(&mut self, id: ActionId) -> Result<&mut (dyn Action + 'static), EngineError> {
        match self.slots.get_mut(&id) {
            Some(slot) => Ok(slot.action.as_mut()),
            None => Err(EngineError::UnknownAction { id }),
        }
    }

    pub fn contains(&self, id: ActionId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn mark_recorded(&mut self, id: ActionId) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.recorded = true;
        }
    }

    pub fn remove(&mut self, id: ActionId) -> Option<Box<dyn Action>> {
        self.slots.remove(&id).map(|slot| slot.action)
    }

    /// Ids of stored actions that act on `entity`.
    pub fn ids_for_entity(&self, entity: EntityId) -> Vec<ActionId> {
        let mut ids: Vec<ActionId> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.action.entity() == entity)
            .map(|(&id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    /// An undo point no longer holds `id`. A finished action goes away now;
    /// one still queued or running is released when it completes.
    pub fn unrecord(&mut self, id: ActionId, in_flight: bool) {
        if in_flight {
            if let Some(slot) = self.slots.get_mut(&id) {
                slot.recorded = false;
            }
        } else {
            self.slots.remove(&id);
        }
    }

    /// Drop a finished action unless an undo point still needs it.
    pub fn release_if_unrecorded(&mut self, id: ActionId) -> bool {
        if self.slots.get(&id).is_some_and(|slot| !slot.recorded) {
            self.slots.remove(&id);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Forget every action. Ids keep counting up.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

// ---------------------------------------------------------------------------
// ActionQueue
// ---------------------------------------------------------------------------

/// Accepted actions waiting for the next action system pass.
#[derive(Debug, Default, Clone)]
pub struct ActionQueue {
    ids: VecDeque<ActionId>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: ActionId) {
        self.ids.push_back(id);
    }

    /// Take the oldest queued action.
    pub fn shift(&mut self) -> Result<ActionId, EngineError> {
        self.ids.pop_front().ok_or(EngineError::EmptyActionQueue)
    }

    pub fn remove(&mut self, id: ActionId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|&queued| queued != id);
        self.ids.len() != before
    }

    pub fn contains(&self, id: ActionId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ActionId> + '_ {
        self.ids.iter().copied()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

// ---------------------------------------------------------------------------
// UndoStack
// ---------------------------------------------------------------------------

/// A batch of actions reversed together, in recording order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UndoPoint {
    actions: Vec<ActionId>,
}

impl UndoPoint {
    pub fn actions(&self) -> &[ActionId] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Actions in the order they must be undone.
    pub fn undo_order(&self) -> impl Iterator<Item = ActionId> + '_ {
        self.actions.iter().rev().copied()
    }
}

#[derive(Debug, Default, Clone)]
pub struct UndoStack {
    points: Vec<UndoPoint>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.points.push(UndoPoint::default());
    }

    pub fn pop(&mut self) -> Result<UndoPoint, EngineError> {
        self.points.pop().ok_or(EngineError::EmptyUndoStack)
    }

    /// Add an action to the innermost point. Returns `false` when there is
    /// no point to record into.
    pub fn record(&mut self, id: ActionId) -> bool {
        match self.points.last_mut() {
            Some(point) => {
                point.actions.push(id);
                true
            }
            None => false,
        }
    }

    pub fn depth(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn top(&self) -> Option<&UndoPoint> {
        self.points.last()
    }

    /// Remove `ids` from every point. Points left empty stay on the stack.
    pub fn forget(&mut self, ids: &[ActionId]) -> usize {
        let mut removed = 0;
        for point in &mut self.points {
            let before = point.actions.len();
            point.actions.retain(|id| !ids.contains(id));
            removed += before - point.actions.len();
        }
        removed
    }

    /// Drop the oldest points until at most `limit` remain. Returns them,
    /// oldest first.
    pub fn truncate_oldest(&mut self, limit: usize) -> Vec<UndoPoint> {
        let excess = self.points.len().saturating_sub(limit);
        self.points.drain(..excess).collect()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
