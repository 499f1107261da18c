//! Synchronous event bus for action veto and lifecycle notification.
//!
//! Listeners are kept per [`EventKind`] in registration order. Dispatch runs
//! every listener for the event's kind, even after one of them cancels: the
//! cancellation flag is only read once dispatch returns.
//!
//! Listeners never touch the action queue or undo stack. They get an
//! [`ActionContext`] with the world and an outbox; whatever they
//! [`propose`](ActionContext::propose) is tried by the tick loop after the
//! dispatch that produced it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tilestep_ecs::prelude::*;

use crate::action::{Action, ActionInfo};
use crate::behavior::BehaviorRegistry;
use crate::tick::TickConfig;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    /// An action is being considered; listeners may cancel it.
    TestAction,
    /// An action was accepted and queued.
    StartAction,
    /// An action finished progressing.
    CompleteAction,
    /// An action was reversed.
    UndoAction,
}

/// Event data, one shape per kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EventPayload {
    TestAction(ActionInfo),
    StartAction(ActionInfo),
    CompleteAction(ActionInfo),
    UndoAction {
        action: ActionInfo,
        /// Part of a full rewind rather than a single popped point.
        rollback: bool,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::TestAction(_) => EventKind::TestAction,
            EventPayload::StartAction(_) => EventKind::StartAction,
            EventPayload::CompleteAction(_) => EventKind::CompleteAction,
            EventPayload::UndoAction { .. } => EventKind::UndoAction,
        }
    }

    pub fn action(&self) -> &ActionInfo {
        match self {
            EventPayload::TestAction(info)
            | EventPayload::StartAction(info)
            | EventPayload::CompleteAction(info)
            | EventPayload::UndoAction { action: info, .. } => info,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub payload: EventPayload,
    pub effected_area: TileRect,
    is_cancelled: bool,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        let effected_area = payload.action().effected_area;
        Self {
            payload,
            effected_area,
            is_cancelled: false,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn action(&self) -> &ActionInfo {
        self.payload.action()
    }

    pub fn is_cancellable(&self) -> bool {
        self.kind() == EventKind::TestAction
    }

    pub fn is_cancelled(&self) -> bool {
        self.is_cancelled
    }

    /// Veto the action under test. Returns `false` (and changes nothing)
    /// for events that cannot be cancelled.
    pub fn cancel(&mut self) -> bool {
        if !self.is_cancellable() {
            tracing::warn!(kind = ?self.kind(), action = %self.action().id, "ignored cancel on non-cancellable event");
            return false;
        }
        self.is_cancelled = true;
        true
    }
}

// ---------------------------------------------------------------------------
// Listener context
// ---------------------------------------------------------------------------

/// An action a listener wants tried once dispatch is over.
#[derive(Debug)]
pub struct Proposal {
    pub action: Box<dyn Action>,
    pub push_undo_point: bool,
}

/// What listeners and behaviors may touch.
pub struct ActionContext<'a> {
    pub world: &'a mut World,
    pub config: &'a TickConfig,
    proposals: &'a mut Vec<Proposal>,
}

impl<'a> ActionContext<'a> {
    pub fn new(
        world: &'a mut World,
        config: &'a TickConfig,
        proposals: &'a mut Vec<Proposal>,
    ) -> Self {
        Self {
            world,
            config,
            proposals,
        }
    }

    /// Ask for `action` to be tried after the current dispatch.
    pub fn propose(&mut self, action: impl Action + 'static, push_undo_point: bool) {
        self.proposals.push(Proposal {
            action: Box::new(action),
            push_undo_point,
        });
    }

    pub fn proposal_count(&self) -> usize {
        self.proposals.len()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

pub type HandlerFn = Box<dyn FnMut(&mut Event, &mut ActionContext<'_>) -> Result<(), EngineError>>;

/// Handle returned on registration, used to remove a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub enum Listener {
    /// A named closure.
    Handler { name: String, handler: HandlerFn },
    /// Routed to the behavior attached to this entity.
    Behavior(EntityId),
}

impl Listener {
    fn describe(&self) -> String {
        match self {
            Listener::Handler { name, .. } => name.clone(),
            Listener::Behavior(entity) => format!("behavior {entity}"),
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listener::Handler { name, .. } => f.debug_tuple("Handler").field(name).finish(),
            Listener::Behavior(entity) => f.debug_tuple("Behavior").field(entity).finish(),
        }
    }
}

#[derive(Debug, Default)]
pub struct EventBus {
    listeners: BTreeMap<EventKind, Vec<(ListenerId, Listener)>>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named handler for `kind`.
    ///
    /// A second handler with the same name on the same kind fails with
    /// [`EngineError::DuplicateRegistration`] unless `mode` is
    /// [`RegisterMode::Override`], which swaps the handler in place and keeps
    /// its position and id.
    pub fn add_event_listener(
        &mut self,
        kind: EventKind,
        name: &str,
        handler: impl FnMut(&mut Event, &mut ActionContext<'_>) -> Result<(), EngineError> + 'static,
        mode: RegisterMode,
    ) -> Result<ListenerId, EngineError> {
        let listener = Listener::Handler {
            name: name.to_owned(),
            handler: Box::new(handler),
        };
        self.insert(kind, listener, mode, |existing| {
            matches!(existing, Listener::Handler { name: n, .. } if n == name)
        })
    }

    /// Route `kind` events to the behavior attached to `entity`.
    pub fn subscribe_behavior(
        &mut self,
        kind: EventKind,
        entity: EntityId,
        mode: RegisterMode,
    ) -> Result<ListenerId, EngineError> {
        self.insert(kind, Listener::Behavior(entity), mode, |existing| {
            matches!(existing, Listener::Behavior(e) if *e == entity)
        })
    }

    fn insert(
        &mut self,
        kind: EventKind,
        listener: Listener,
        mode: RegisterMode,
        same: impl Fn(&Listener) -> bool,
    ) -> Result<ListenerId, EngineError> {
        let list = self.listeners.entry(kind).or_default();
        if let Some((id, slot)) = list.iter_mut().find(|(_, l)| same(l)) {
            return match mode {
                RegisterMode::Unique => Err(EngineError::DuplicateRegistration {
                    name: listener.describe(),
                    kind,
                }),
                RegisterMode::Override => {
                    tracing::debug!(listener = %listener.describe(), ?kind, "listener overridden");
                    *slot = listener;
                    Ok(*id)
                }
            };
        }
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        list.push((id, listener));
        Ok(id)
    }

    /// Remove a listener by handle. Returns whether it was registered.
    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        for list in self.listeners.values_mut() {
            if let Some(pos) = list.iter().position(|(lid, _)| *lid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Drop every subscription of `entity`'s behavior. Returns how many.
    pub fn unsubscribe_behavior(&mut self, entity: EntityId) -> usize {
        let mut removed = 0;
        for list in self.listeners.values_mut() {
            let before = list.len();
            list.retain(|(_, l)| !matches!(l, Listener::Behavior(e) if *e == entity));
            removed += before - list.len();
        }
        removed
    }

    pub fn is_subscribed(&self, kind: EventKind, entity: EntityId) -> bool {
        self.listeners.get(&kind).is_some_and(|list| {
            list.iter()
                .any(|(_, l)| matches!(l, Listener::Behavior(e) if *e == entity))
        })
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Run every listener for the event's kind, in registration order.
    ///
    /// The first listener error aborts dispatch and is returned.
    pub fn dispatch_event(
        &mut self,
        event: &mut Event,
        behaviors: &mut BehaviorRegistry,
        ctx: &mut ActionContext<'_>,
    ) -> Result<(), EngineError> {
        let Some(list) = self.listeners.get_mut(&event.kind()) else {
            return Ok(());
        };
        for (_, listener) in list.iter_mut() {
            match listener {
                Listener::Handler { handler, .. } => handler(&mut *event, &mut *ctx)?,
                Listener::Behavior(entity) => match behaviors.get_mut(*entity) {
                    Some(behavior) => behavior.on_event(*entity, event, ctx)?,
                    None => tracing::trace!(entity = %entity, "subscribed entity has no behavior"),
                },
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
