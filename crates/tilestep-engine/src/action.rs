//! Actions: the only way the simulation mutates the world.
//!
//! An action is built once with everything it needs to know, then driven by
//! the action system: `progress` is called every frame until `is_complete`
//! turns true. Anything an action changes it must be able to put back in
//! `undo`, except for final actions, which end the played-out sequence and
//! are discarded by the rollback instead of reversed.

use std::fmt;

use serde::{Deserialize, Serialize};
use tilestep_ecs::prelude::*;

use crate::components::{PixelPosition, TilePosition, Velocity};
use crate::tick::TickConfig;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Handle of an action inside the engine's ledger. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action#{}", self.0)
    }
}

/// A tile-to-tile displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motion {
    pub from: TilePoint,
    pub to: TilePoint,
}

impl Motion {
    /// Direction of travel, one tile per axis at most.
    pub fn direction(&self) -> (TileStep, TileStep) {
        (
            (self.to.x - self.from.x).signum(),
            (self.to.y - self.from.y).signum(),
        )
    }
}

// ---------------------------------------------------------------------------
// The Action trait
// ---------------------------------------------------------------------------

pub trait Action: fmt::Debug {
    /// The entity this action acts on.
    fn entity(&self) -> EntityId;

    /// Tiles the action touches. Listeners use it to decide whether an event
    /// concerns them.
    fn effected_area(&self) -> TileRect;

    fn label(&self) -> &'static str;

    fn is_complete(&self) -> bool;

    /// Final actions are never undone; completing one rewinds everything.
    fn is_final(&self) -> bool {
        false
    }

    /// Tile displacement, for actions that move their entity.
    fn motion(&self) -> Option<Motion> {
        None
    }

    /// Advance by one frame. Must not block; all state lives on `self`.
    fn progress(
        &mut self,
        world: &mut World,
        delta_time: f64,
        elapsed_time: f64,
    ) -> Result<(), EngineError>;

    /// Reverse whatever `progress` changed. An action that never progressed
    /// has nothing to reverse.
    fn undo(&mut self, world: &mut World) -> Result<(), EngineError>;
}

/// The read-only view of an action carried by events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionInfo {
    pub id: ActionId,
    pub entity: EntityId,
    pub label: &'static str,
    pub effected_area: TileRect,
    pub is_final: bool,
    pub motion: Option<Motion>,
}

impl ActionInfo {
    pub fn describe(id: ActionId, action: &dyn Action) -> Self {
        Self {
            id,
            entity: action.entity(),
            label: action.label(),
            effected_area: action.effected_area(),
            is_final: action.is_final(),
            motion: action.motion(),
        }
    }
}

// ---------------------------------------------------------------------------
// MoveAction
// ---------------------------------------------------------------------------

/// What a move overwrote when it was applied.
#[derive(Debug, Clone, Copy)]
struct AppliedMove {
    tile: TilePoint,
    pixels: Option<PixelPosition>,
}

/// Step an entity to another tile.
///
/// The tile position and the occupancy index change on the first frame; the
/// pixel position (if the entity has one) is then eased toward the new tile
/// over `duration` seconds, and the move completes when it arrives.
#[derive(Debug)]
pub struct MoveAction {
    entity: EntityId,
    from: TilePoint,
    to: TilePoint,
    duration: f64,
    tile_size: Pixels,
    elapsed: f64,
    applied: Option<AppliedMove>,
    complete: bool,
}

impl MoveAction {
    pub fn new(
        entity: EntityId,
        from: TilePoint,
        to: TilePoint,
        duration: f64,
        tile_size: Pixels,
    ) -> Self {
        Self {
            entity,
            from,
            to,
            duration,
            tile_size,
            elapsed: 0.0,
            applied: None,
            complete: false,
        }
    }

    /// A one-step move from the entity's current tile, timed by `config`.
    pub fn step(
        world: &World,
        entity: EntityId,
        dx: TileStep,
        dy: TileStep,
        config: &TickConfig,
    ) -> Result<Self, EngineError> {
        let from = world.get::<TilePosition>(entity)?.0;
        Ok(Self::new(
            entity,
            from,
            from.offset(dx, dy),
            config.move_duration,
            config.tile_size,
        ))
    }

    pub fn from(&self) -> TilePoint {
        self.from
    }

    pub fn to(&self) -> TilePoint {
        self.to
    }

    fn apply(&mut self, world: &mut World) -> Result<AppliedMove, EngineError> {
        // Read the position now rather than at construction: an earlier move
        // of the same entity may have been queued after this one was built.
        let tile = world.get::<TilePosition>(self.entity)?.0;
        let pixels = world.get::<PixelPosition>(self.entity).ok().copied();

        world.set(self.entity, TilePosition(self.to))?;
        world.tiles_mut().remove_object_from_tile(self.entity, tile);
        world.tiles_mut().place_object_in_tile(self.entity, self.to);

        tracing::trace!(entity = %self.entity, from = %tile, to = %self.to, "move applied");
        let applied = AppliedMove { tile, pixels };
        self.applied = Some(applied);
        Ok(applied)
    }
}

impl Action for MoveAction {
    fn entity(&self) -> EntityId {
        self.entity
    }

    fn effected_area(&self) -> TileRect {
        TileRect::spanning(self.from, self.to)
    }

    fn label(&self) -> &'static str {
        "move"
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn motion(&self) -> Option<Motion> {
        Some(Motion {
            from: self.from,
            to: self.to,
        })
    }

    fn progress(
        &mut self,
        world: &mut World,
        delta_time: f64,
        _elapsed_time: f64,
    ) -> Result<(), EngineError> {
        if self.complete {
            return Ok(());
        }
        let applied = match self.applied {
            Some(applied) => applied,
            None => self.apply(world)?,
        };

        self.elapsed += delta_time;
        let t = if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).min(1.0)
        };
        if let Some(start) = applied.pixels {
            let target = PixelPosition::of_tile(self.to, self.tile_size);
            world.set(self.entity, start.lerp(target, t as f32))?;
        }
        self.complete = t >= 1.0;
        Ok(())
    }

    fn undo(&mut self, world: &mut World) -> Result<(), EngineError> {
        let Some(applied) = self.applied else {
            return Ok(());
        };
        // Leave whatever tile the entity stands on now, which is `to` unless
        // something moved it since.
        let current = world.get::<TilePosition>(self.entity)?.0;
        self.applied = None;
        world.set(self.entity, TilePosition(applied.tile))?;
        world.tiles_mut().remove_object_from_tile(self.entity, current);
        world.tiles_mut().place_object_in_tile(self.entity, applied.tile);
        if let Some(pixels) = applied.pixels {
            world.set(self.entity, pixels)?;
        }
        self.elapsed = 0.0;
        self.complete = false;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TurnAction
// ---------------------------------------------------------------------------

/// Replace an entity's velocity in one frame.
#[derive(Debug)]
pub struct TurnAction {
    entity: EntityId,
    at: TilePoint,
    velocity: Velocity,
    /// `Some(previous)` once applied; the inner `None` means there was no
    /// velocity before.
    replaced: Option<Option<Velocity>>,
}

impl TurnAction {
    pub fn new(entity: EntityId, at: TilePoint, velocity: Velocity) -> Self {
        Self {
            entity,
            at,
            velocity,
            replaced: None,
        }
    }
}

impl Action for TurnAction {
    fn entity(&self) -> EntityId {
        self.entity
    }

    fn effected_area(&self) -> TileRect {
        TileRect::single(self.at)
    }

    fn label(&self) -> &'static str {
        "turn"
    }

    fn is_complete(&self) -> bool {
        self.replaced.is_some()
    }

    fn progress(
        &mut self,
        world: &mut World,
        _delta_time: f64,
        _elapsed_time: f64,
    ) -> Result<(), EngineError> {
        if self.replaced.is_none() {
            self.replaced = Some(world.set(self.entity, self.velocity)?);
        }
        Ok(())
    }

    fn undo(&mut self, world: &mut World) -> Result<(), EngineError> {
        match self.replaced.take() {
            Some(Some(previous)) => {
                world.set(self.entity, previous)?;
            }
            Some(None) => {
                world.remove::<Velocity>(self.entity)?;
            }
            None => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// KillAction
// ---------------------------------------------------------------------------

/// The final action: after `delay` seconds the played-out sequence is over
/// and the engine rewinds every undo point.
#[derive(Debug)]
pub struct KillAction {
    victim: EntityId,
    killer: EntityId,
    at: TilePoint,
    delay: f64,
    elapsed: f64,
}

impl KillAction {
    pub fn new(victim: EntityId, killer: EntityId, at: TilePoint, delay: f64) -> Self {
        Self {
            victim,
            killer,
            at,
            delay,
            elapsed: 0.0,
        }
    }

    pub fn killer(&self) -> EntityId {
        self.killer
    }
}

impl Action for KillAction {
    fn entity(&self) -> EntityId {
        self.victim
    }

    fn effected_area(&self) -> TileRect {
        TileRect::single(self.at)
    }

    fn label(&self) -> &'static str {
        "kill"
    }

    fn is_complete(&self) -> bool {
        self.elapsed >= self.delay
    }

    fn is_final(&self) -> bool {
        true
    }

    fn progress(
        &mut self,
        _world: &mut World,
        delta_time: f64,
        _elapsed_time: f64,
    ) -> Result<(), EngineError> {
        self.elapsed += delta_time;
        if self.is_complete() {
            tracing::debug!(victim = %self.victim, killer = %self.killer, at = %self.at, "kill landed");
        }
        Ok(())
    }

    fn undo(&mut self, _world: &mut World) -> Result<(), EngineError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
