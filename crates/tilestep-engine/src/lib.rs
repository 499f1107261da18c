//! Tilestep Engine -- command-pattern actions with undo on top of `tilestep_ecs`.
//!
//! This crate is the simulation driver. Every world mutation is an
//! [`Action`](action::Action): proposed, vetted by listeners on the
//! [`EventBus`](event::EventBus), queued, progressed once per frame until
//! complete, and grouped into undo points so a whole player step can be
//! reversed at once. Per-entity [`Behavior`](behavior::Behavior)s react to the
//! bus and propose the follow-up actions (a pushed box, a chasing enemy).
//!
//! # Quick Start
//!
//! ```
//! use tilestep_engine::prelude::*;
//!
//! let mut tick_loop = TickLoop::new(World::new(), TickConfig::default()).unwrap();
//! let player = tick_loop.spawn_actor(ActLike::Player, TilePoint::new(1, 1)).unwrap();
//! let _wall = tick_loop.spawn_actor(ActLike::Wall, TilePoint::new(2, 1)).unwrap();
//!
//! // Walking into the wall is vetoed; walking down is not.
//! tick_loop.world_mut().set(player, MoveIntent::new(1, 0)).unwrap();
//! tick_loop.run_ticks(30).unwrap();
//! assert_eq!(tick_loop.world().get::<TilePosition>(player).unwrap().0, TilePoint::new(1, 1));
//!
//! tick_loop.world_mut().set(player, MoveIntent::new(0, 1)).unwrap();
//! tick_loop.run_ticks(30).unwrap();
//! assert_eq!(tick_loop.world().get::<TilePosition>(player).unwrap().0, TilePoint::new(1, 2));
//!
//! // One undo point per accepted step.
//! tick_loop.pop_undo_point().unwrap();
//! assert_eq!(tick_loop.world().get::<TilePosition>(player).unwrap().0, TilePoint::new(1, 1));
//! ```

#![deny(unsafe_code)]

pub mod action;
pub mod behavior;
pub mod components;
pub mod event;
pub mod snapshot;
pub mod tick;
pub mod undo;

use tilestep_ecs::EcsError;

/// Re-export the ECS crate for convenience.
pub use tilestep_ecs;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the action/undo engine.
///
/// None of these are recovered inside the engine. They terminate the current
/// simulation step and surface at the [`TickLoop`](tick::TickLoop) boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// `pop_undo_point` was called with no undo points.
    #[error("undo stack is empty")]
    EmptyUndoStack,

    /// `shift_action` was called on an empty queue.
    #[error("action queue is empty")]
    EmptyActionQueue,

    /// Listeners proposed actions while the undo stack was being unwound.
    /// The rollback completed; the proposals were discarded.
    #[error("{rejected} action(s) proposed during rollback were rejected")]
    MutationDuringRollback { rejected: usize },

    /// A listener name or behavior subscription was registered twice.
    #[error("listener '{name}' is already registered for {kind:?} (pass RegisterMode::Override to replace it)")]
    DuplicateRegistration {
        name: String,
        kind: event::EventKind,
    },

    /// An action id that is not in the ledger.
    #[error("action {id} is unknown (already discarded?)")]
    UnknownAction { id: action::ActionId },

    /// Engine state could not be encoded for hashing.
    #[error("failed to serialize engine state: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Ecs(#[from] EcsError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use tilestep_ecs::prelude::*;

    pub use crate::action::{
        Action, ActionId, ActionInfo, KillAction, Motion, MoveAction, TurnAction,
    };
    pub use crate::behavior::{Behavior, BehaviorRegistry};
    pub use crate::components::{
        register_game_components, ActLike, LayerId, MoveIntent, PixelPosition, Tint,
        TilePosition, Velocity,
    };
    pub use crate::event::{
        ActionContext, Event, EventBus, EventKind, EventPayload, ListenerId, Proposal,
    };
    pub use crate::snapshot::EngineSnapshot;
    pub use crate::tick::{FramePhase, TickConfig, TickDiagnostics, TickLoop, TryOutcome};
    pub use crate::undo::{ActionLedger, ActionQueue, UndoPoint, UndoStack};
    pub use crate::EngineError;
}
