//! Per-entity controllers.
//!
//! Every entity with an [`ActLike`] kind gets exactly one [`Behavior`]. A
//! behavior subscribes to the event bus when attached, unsubscribes when
//! detached, and reacts by proposing actions through its [`ActionContext`].

use std::collections::BTreeMap;

use tilestep_ecs::prelude::*;

use crate::action::{ActionInfo, KillAction, MoveAction, TurnAction};
use crate::components::{act_like_of, tile_blocks_push, tile_holds, ActLike, MoveIntent, TilePosition, Velocity};
use crate::event::{ActionContext, Event, EventBus, EventKind};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// Kill bookkeeping for enemies, so one overlap produces one kill.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hunter {
    marked: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
    /// Turns `MoveIntent` into moves, one undo point per step.
    Player,
    /// Pushed along by players; refuses to move into walls and boxes.
    Box,
    /// Flies along its velocity whenever a player steps, turning at walls.
    Airplane(Hunter),
    /// Steps toward the player's destination whenever a player steps.
    Bro(Hunter),
    /// Vetoes every move into its tile.
    Wall,
}

impl Behavior {
    pub fn for_kind(kind: ActLike) -> Self {
        match kind {
            ActLike::Player => Behavior::Player,
            ActLike::Box => Behavior::Box,
            ActLike::Airplane => Behavior::Airplane(Hunter::default()),
            ActLike::Bro => Behavior::Bro(Hunter::default()),
            ActLike::Wall => Behavior::Wall,
        }
    }

    pub fn act_like(&self) -> ActLike {
        match self {
            Behavior::Player => ActLike::Player,
            Behavior::Box => ActLike::Box,
            Behavior::Airplane(_) => ActLike::Airplane,
            Behavior::Bro(_) => ActLike::Bro,
            Behavior::Wall => ActLike::Wall,
        }
    }

    /// Event kinds this behavior listens to.
    pub fn subscriptions(&self) -> &'static [EventKind] {
        match self {
            Behavior::Player => &[],
            Behavior::Box => &[EventKind::TestAction, EventKind::StartAction],
            Behavior::Airplane(_) | Behavior::Bro(_) => &[EventKind::StartAction],
            Behavior::Wall => &[EventKind::TestAction],
        }
    }

    pub fn start(&mut self, me: EntityId, bus: &mut EventBus) -> Result<(), EngineError> {
        for &kind in self.subscriptions() {
            bus.subscribe_behavior(kind, me, RegisterMode::Unique)?;
        }
        tracing::debug!(entity = %me, kind = ?self.act_like(), "behavior started");
        Ok(())
    }

    pub fn stop(&mut self, me: EntityId, bus: &mut EventBus) {
        let removed = bus.unsubscribe_behavior(me);
        tracing::debug!(entity = %me, kind = ?self.act_like(), removed, "behavior stopped");
    }

    /// Called once per tick, before the action system runs.
    pub fn on_frame(&mut self, me: EntityId, ctx: &mut ActionContext<'_>) -> Result<(), EngineError> {
        match self {
            Behavior::Player => consume_intent(me, ctx),
            Behavior::Airplane(hunter) | Behavior::Bro(hunter) => hunter.hunt(me, ctx),
            Behavior::Box | Behavior::Wall => Ok(()),
        }
    }

    pub fn on_event(
        &mut self,
        me: EntityId,
        event: &mut Event,
        ctx: &mut ActionContext<'_>,
    ) -> Result<(), EngineError> {
        let info = event.action().clone();
        if info.entity == me {
            return Ok(());
        }
        match (self, event.kind()) {
            (Behavior::Wall, EventKind::TestAction) => {
                if let Some(motion) = info.motion {
                    if motion.to == tile_of(ctx.world, me)? {
                        event.cancel();
                    }
                }
                Ok(())
            }
            (Behavior::Box, EventKind::TestAction) => {
                if let Some(push) = Push::of(ctx.world, me, &info)? {
                    if !push.by_player || tile_blocks_push(ctx.world, push.beyond) {
                        event.cancel();
                    }
                }
                Ok(())
            }
            (Behavior::Box, EventKind::StartAction) => {
                if let Some(push) = Push::of(ctx.world, me, &info)? {
                    if push.by_player {
                        let config = ctx.config;
                        ctx.propose(
                            MoveAction::new(me, push.here, push.beyond, config.move_duration, config.tile_size),
                            false,
                        );
                    }
                }
                Ok(())
            }
            (Behavior::Bro(_), EventKind::StartAction) => chase(me, &info, ctx),
            (Behavior::Airplane(_), EventKind::StartAction) => fly(me, &info, ctx),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Reactions
// ---------------------------------------------------------------------------

fn tile_of(world: &World, entity: EntityId) -> Result<TilePoint, EngineError> {
    Ok(world.get::<TilePosition>(entity)?.0)
}

fn is_player_move(world: &World, info: &ActionInfo) -> bool {
    info.motion.is_some() && act_like_of(world, info.entity) == Some(ActLike::Player)
}

fn consume_intent(me: EntityId, ctx: &mut ActionContext<'_>) -> Result<(), EngineError> {
    let Some(intent) = ctx.world.remove::<MoveIntent>(me)? else {
        return Ok(());
    };
    if intent.dx == TileStep::ZERO && intent.dy == TileStep::ZERO {
        return Ok(());
    }
    let step = MoveAction::step(ctx.world, me, intent.dx.signum(), intent.dy.signum(), ctx.config)?;
    ctx.propose(step, true);
    Ok(())
}

/// A move into a box's tile.
struct Push {
    here: TilePoint,
    beyond: TilePoint,
    by_player: bool,
}

impl Push {
    fn of(world: &World, me: EntityId, info: &ActionInfo) -> Result<Option<Self>, EngineError> {
        let Some(motion) = info.motion else {
            return Ok(None);
        };
        let here = tile_of(world, me)?;
        if motion.to != here {
            return Ok(None);
        }
        let (dx, dy) = motion.direction();
        Ok(Some(Push {
            here,
            beyond: here.offset(dx, dy),
            by_player: act_like_of(world, info.entity) == Some(ActLike::Player),
        }))
    }
}

/// One tile from `here` toward `target`, along the longer axis (x on ties).
pub fn chase_step(here: TilePoint, target: TilePoint) -> Option<(TileStep, TileStep)> {
    let dx = target.x - here.x;
    let dy = target.y - here.y;
    if dx == TileStep::ZERO && dy == TileStep::ZERO {
        None
    } else if dx.0.abs() >= dy.0.abs() {
        Some((dx.signum(), TileStep::ZERO))
    } else {
        Some((TileStep::ZERO, dy.signum()))
    }
}

fn chase(me: EntityId, info: &ActionInfo, ctx: &mut ActionContext<'_>) -> Result<(), EngineError> {
    if !is_player_move(ctx.world, info) {
        return Ok(());
    }
    let Some(motion) = info.motion else {
        return Ok(());
    };
    let here = tile_of(ctx.world, me)?;
    if let Some((dx, dy)) = chase_step(here, motion.to) {
        let config = ctx.config;
        ctx.propose(
            MoveAction::new(me, here, here.offset(dx, dy), config.move_duration, config.tile_size),
            false,
        );
    }
    Ok(())
}

fn fly(me: EntityId, info: &ActionInfo, ctx: &mut ActionContext<'_>) -> Result<(), EngineError> {
    if !is_player_move(ctx.world, info) {
        return Ok(());
    }
    let here = tile_of(ctx.world, me)?;
    let velocity = *ctx.world.get::<Velocity>(me)?;
    if velocity == Velocity::new(0, 0) {
        return Ok(());
    }
    let next = here.offset(velocity.dx, velocity.dy);
    if tile_holds(ctx.world, next, ActLike::Wall) {
        ctx.propose(TurnAction::new(me, here, velocity.reversed()), false);
    } else {
        let config = ctx.config;
        ctx.propose(
            MoveAction::new(me, here, next, config.move_duration, config.tile_size),
            false,
        );
    }
    Ok(())
}

impl Hunter {
    /// Propose a kill on a player sharing our tile, once per overlap.
    fn hunt(&mut self, me: EntityId, ctx: &mut ActionContext<'_>) -> Result<(), EngineError> {
        let here = tile_of(ctx.world, me)?;
        let world = &*ctx.world;
        let victim = world
            .tiles()
            .query_tile(here)
            .find(|&other| other != me && act_like_of(world, other) == Some(ActLike::Player));

        match victim {
            None => self.marked = None,
            Some(victim) if self.marked == Some(victim) => {}
            Some(victim) => {
                self.marked = Some(victim);
                tracing::debug!(killer = %me, victim = %victim, at = %here, "player caught");
                let delay = ctx.config.death_delay;
                ctx.propose(KillAction::new(victim, me, here, delay), false);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// BehaviorRegistry
// ---------------------------------------------------------------------------

/// Entity id -> its one behavior.
#[derive(Debug, Default)]
pub struct BehaviorRegistry {
    behaviors: BTreeMap<EntityId, Behavior>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `behavior` to `entity`, stopping whatever was there before.
    /// Returns the replaced behavior.
    pub fn attach(
        &mut self,
        entity: EntityId,
        mut behavior: Behavior,
        bus: &mut EventBus,
    ) -> Result<Option<Behavior>, EngineError> {
        let previous = self.detach(entity, bus);
        if let Err(err) = behavior.start(entity, bus) {
            bus.unsubscribe_behavior(entity);
            return Err(err);
        }
        self.behaviors.insert(entity, behavior);
        Ok(previous)
    }

    pub fn detach(&mut self, entity: EntityId, bus: &mut EventBus) -> Option<Behavior> {
        let mut behavior = self.behaviors.remove(&entity)?;
        behavior.stop(entity, bus);
        Some(behavior)
    }

    /// Stop every behavior.
    pub fn detach_all(&mut self, bus: &mut EventBus) {
        for (entity, mut behavior) in std::mem::take(&mut self.behaviors) {
            behavior.stop(entity, bus);
        }
    }

    pub fn get(&self, entity: EntityId) -> Option<&Behavior> {
        self.behaviors.get(&entity)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut Behavior> {
        self.behaviors.get_mut(&entity)
    }

    /// Entities with a behavior, ascending.
    pub fn entities(&self) -> Vec<EntityId> {
        self.behaviors.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
