//! Fixed-timestep tick loop and the action system.
//!
//! The [`TickLoop`] owns the world, the event bus, the behaviors and all
//! action state. Each tick:
//!
//! 1. Every behavior's `on_frame` runs, in ascending entity order. What they
//!    propose is tried in FIFO order.
//! 2. The action system drains the queue into the in-progress list and
//!    progresses every in-progress action. Completed actions fire their
//!    complete event in in-progress order; a completed final action rewinds
//!    the whole undo stack.
//! 3. Per-frame bookkeeping (added-entity set, tick counter, diagnostics).
//!
//! # Frame phases
//!
//! The loop tracks which [`FramePhase`] it is in. While the undo stack is
//! being unwound the phase is [`FramePhase::RollingBack`]; actions proposed
//! by listeners in that phase are never applied, and the rollback reports
//! them as [`EngineError::MutationDuringRollback`] once it has finished.
//!
//! # Example
//!
//! ```
//! use tilestep_engine::prelude::*;
//!
//! let config = TickConfig { fixed_dt: 1.0 / 30.0, ..Default::default() };
//! let mut tick_loop = TickLoop::new(World::new(), config).unwrap();
//! let crate_box = tick_loop.spawn_actor(ActLike::Box, TilePoint::new(4, 4)).unwrap();
//!
//! let step = MoveAction::step(tick_loop.world(), crate_box, TileStep(0), TileStep(1), tick_loop.config()).unwrap();
//! tick_loop.push_undo_point().unwrap();
//! tick_loop.enqueue_action(step).unwrap();
//! tick_loop.run_ticks(10).unwrap();
//!
//! assert_eq!(tick_loop.world().get::<TilePosition>(crate_box).unwrap().0, TilePoint::new(4, 5));
//! assert_eq!(tick_loop.tick_count(), 10);
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tilestep_ecs::prelude::*;

use crate::action::{Action, ActionId, ActionInfo};
use crate::behavior::{Behavior, BehaviorRegistry};
use crate::components::{register_game_components, ActLike, PixelPosition, TilePosition, Velocity};
use crate::event::{ActionContext, Event, EventBus, EventKind, EventPayload, ListenerId, Proposal};
use crate::undo::{ActionLedger, ActionQueue, UndoStack};
use crate::EngineError;

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
    /// Edge length of one tile in pixels.
    pub tile_size: Pixels,
    /// Seconds a one-tile move takes to ease its pixel position.
    pub move_duration: f64,
    /// Seconds between a kill being accepted and the rewind.
    pub death_delay: f64,
    /// Upper bound on proposals tried in one flush. Listeners that keep
    /// proposing in response to each other stop here.
    pub max_proposals_per_frame: usize,
    /// Undo points kept. Pushing past this forgets the oldest point and the
    /// actions recorded in it.
    pub max_undo_points: usize,
}

impl Default for TickConfig {
    /// 60 Hz, 16 px tiles.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            tile_size: Pixels(16.0),
            move_duration: 0.15,
            death_delay: 0.5,
            max_proposals_per_frame: 256,
            max_undo_points: 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Timing and counters for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Behavior `on_frame` calls plus trying what they proposed.
    pub behavior_time: Duration,
    /// The action system pass.
    pub action_time: Duration,
    pub total_time: Duration,
    pub proposals_tried: usize,
    /// Proposals dropped by `max_proposals_per_frame`.
    pub proposals_dropped: usize,
    pub actions_completed: usize,
    pub undo_depth: usize,
}

// ---------------------------------------------------------------------------
// Phases and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePhase {
    #[default]
    Idle,
    /// Running behavior `on_frame` hooks.
    Behaviors,
    /// Dispatching an event to listeners.
    Dispatching,
    /// Progressing in-progress actions.
    Applying,
    /// Unwinding undo points. No new actions are accepted.
    RollingBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryOutcome {
    Accepted(ActionId),
    Cancelled,
}

impl TryOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TryOutcome::Accepted(_))
    }
}

// ---------------------------------------------------------------------------
// TickLoop
// ---------------------------------------------------------------------------

pub struct TickLoop {
    world: World,
    bus: EventBus,
    behaviors: BehaviorRegistry,
    ledger: ActionLedger,
    queue: ActionQueue,
    /// Ordered; completion events fire in this order.
    in_progress: Vec<ActionId>,
    undo_stack: UndoStack,
    /// Proposals waiting to be tried, FIFO.
    pending: VecDeque<Proposal>,
    phase: FramePhase,
    /// Proposals refused during the current rollback.
    rejected: usize,
    tick_counter: u64,
    fixed_dt: f64,
    config: TickConfig,
    proposals_tried: usize,
    proposals_dropped: usize,
    last_diagnostics: TickDiagnostics,
}

impl std::fmt::Debug for TickLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickLoop")
            .field("tick_counter", &self.tick_counter)
            .field("phase", &self.phase)
            .field("entities", &self.world.entity_count())
            .field("behaviors", &self.behaviors.len())
            .field("queued", &self.queue.len())
            .field("in_progress", &self.in_progress.len())
            .field("undo_depth", &self.undo_stack.depth())
            .finish()
    }
}

impl TickLoop {
    /// Create a tick loop around `world`, registering the game components
    /// it relies on.
    ///
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite.
    pub fn new(mut world: World, config: TickConfig) -> Result<Self, EngineError> {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        register_game_components(&mut world)?;
        Ok(Self {
            world,
            bus: EventBus::new(),
            behaviors: BehaviorRegistry::new(),
            ledger: ActionLedger::new(),
            queue: ActionQueue::new(),
            in_progress: Vec::new(),
            undo_stack: UndoStack::new(),
            pending: VecDeque::new(),
            phase: FramePhase::Idle,
            rejected: 0,
            tick_counter: 0,
            fixed_dt: config.fixed_dt,
            config,
            proposals_tried: 0,
            proposals_dropped: 0,
            last_diagnostics: TickDiagnostics::default(),
        })
    }

    // -- phase guard --------------------------------------------------------

    fn ensure_mutable(&self) -> Result<(), EngineError> {
        if self.phase == FramePhase::RollingBack {
            return Err(EngineError::MutationDuringRollback { rejected: 1 });
        }
        Ok(())
    }

    /// Run `f` in `phase`, restoring the previous phase afterwards even if
    /// `f` fails.
    fn with_phase<R>(
        &mut self,
        phase: FramePhase,
        f: impl FnOnce(&mut Self) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        let previous = std::mem::replace(&mut self.phase, phase);
        let result = f(self);
        self.phase = previous;
        result
    }

    // -- dispatch -----------------------------------------------------------

    fn dispatch(&mut self, event: &mut Event) -> Result<Vec<Proposal>, EngineError> {
        let mut proposals = Vec::new();
        let mut ctx = ActionContext::new(&mut self.world, &self.config, &mut proposals);
        self.bus.dispatch_event(event, &mut self.behaviors, &mut ctx)?;
        Ok(proposals)
    }

    fn accept_proposals(&mut self, proposals: Vec<Proposal>) {
        if proposals.is_empty() {
            return;
        }
        if self.phase == FramePhase::RollingBack {
            tracing::warn!(count = proposals.len(), "rejected actions proposed during rollback");
            self.rejected += proposals.len();
            return;
        }
        self.pending.extend(proposals);
    }

    /// Try pending proposals until none are left or the per-flush limit is
    /// reached.
    fn flush_proposals(&mut self) -> Result<(), EngineError> {
        let mut tried = 0;
        while let Some(proposal) = self.pending.pop_front() {
            if tried >= self.config.max_proposals_per_frame {
                let dropped = self.pending.len() + 1;
                self.pending.clear();
                self.proposals_dropped += dropped;
                tracing::warn!(
                    dropped,
                    limit = self.config.max_proposals_per_frame,
                    "proposal limit reached, dropping the rest"
                );
                break;
            }
            tried += 1;
            self.proposals_tried += 1;
            self.attempt(proposal.action, proposal.push_undo_point)?;
        }
        Ok(())
    }

    /// Test, then commit or discard one action. Proposals raised by the
    /// events are queued, not tried.
    fn attempt(
        &mut self,
        action: Box<dyn Action>,
        push_undo_point: bool,
    ) -> Result<TryOutcome, EngineError> {
        let id = self.ledger.reserve_id();
        let info = ActionInfo::describe(id, action.as_ref());
        if push_undo_point {
            self.undo_stack.push();
        }

        let mut test = Event::new(EventPayload::TestAction(info.clone()));
        let proposals = match self.with_phase(FramePhase::Dispatching, |this| this.dispatch(&mut test)) {
            Ok(proposals) => proposals,
            Err(err) => {
                if push_undo_point {
                    self.undo_stack.pop()?;
                }
                return Err(err);
            }
        };

        if test.is_cancelled() {
            // Nothing was queued under the fresh point, so dropping it is
            // the whole rollback.
            if push_undo_point {
                self.undo_stack.pop()?;
            }
            tracing::debug!(action = %id, label = info.label, entity = %info.entity, "action cancelled");
            return Ok(TryOutcome::Cancelled);
        }

        self.ledger.insert(id, action);
        self.queue.push(id);
        if self.undo_stack.record(id) {
            self.ledger.mark_recorded(id);
        }
        if push_undo_point {
            self.enforce_history_limit();
        }
        self.accept_proposals(proposals);
        tracing::debug!(action = %id, label = info.label, entity = %info.entity, "action accepted");

        let mut start = Event::new(EventPayload::StartAction(info));
        let proposals = self.with_phase(FramePhase::Dispatching, |this| this.dispatch(&mut start))?;
        self.accept_proposals(proposals);
        Ok(TryOutcome::Accepted(id))
    }

    // -- action queue -------------------------------------------------------

    /// Test `action` with listeners and queue it unless one cancels.
    ///
    /// With `push_undo_point` the action opens a new undo point; a cancelled
    /// attempt removes that point again, so the stack depth is unchanged.
    /// Follow-up proposals from listeners are tried before this returns.
    pub fn try_action(
        &mut self,
        action: impl Action + 'static,
        push_undo_point: bool,
    ) -> Result<TryOutcome, EngineError> {
        self.ensure_mutable()?;
        let outcome = self.attempt(Box::new(action), push_undo_point)?;
        self.flush_proposals()?;
        Ok(outcome)
    }

    /// Queue `action` without testing it, recording it in the innermost undo
    /// point if there is one.
    pub fn enqueue_action(&mut self, action: impl Action + 'static) -> Result<ActionId, EngineError> {
        self.ensure_mutable()?;
        let id = self.ledger.reserve_id();
        tracing::debug!(action = %id, label = action.label(), entity = %action.entity(), "action enqueued");
        self.ledger.insert(id, Box::new(action));
        self.queue.push(id);
        if self.undo_stack.record(id) {
            self.ledger.mark_recorded(id);
        }
        Ok(id)
    }

    /// Move the oldest queued action to the in-progress list.
    pub fn shift_action(&mut self) -> Result<ActionId, EngineError> {
        self.ensure_mutable()?;
        let id = self.queue.shift()?;
        if !self.in_progress.contains(&id) {
            self.in_progress.push(id);
        }
        Ok(id)
    }

    pub fn push_undo_point(&mut self) -> Result<(), EngineError> {
        self.ensure_mutable()?;
        self.undo_stack.push();
        self.enforce_history_limit();
        Ok(())
    }

    /// Forget the oldest undo points beyond `max_undo_points`.
    fn enforce_history_limit(&mut self) {
        let dropped = self.undo_stack.truncate_oldest(self.config.max_undo_points);
        if dropped.is_empty() {
            return;
        }
        let mut forgotten = 0;
        for point in &dropped {
            for &id in point.actions() {
                let in_flight = self.queue.contains(id) || self.in_progress.contains(&id);
                self.ledger.unrecord(id, in_flight);
                forgotten += 1;
            }
        }
        tracing::debug!(
            points = dropped.len(),
            forgotten,
            limit = self.config.max_undo_points,
            "undo history trimmed"
        );
    }

    /// Undo the innermost point, newest action first. Returns how many
    /// actions were reversed.
    pub fn pop_undo_point(&mut self) -> Result<usize, EngineError> {
        self.ensure_mutable()?;
        let point = self.undo_stack.pop()?;
        let undone = self.with_phase(FramePhase::RollingBack, |this| {
            let mut undone = 0;
            for id in point.undo_order() {
                undone += this.revert(id, false)?;
            }
            Ok(undone)
        })?;
        self.finish_rollback()?;
        tracing::debug!(undone, depth = self.undo_stack.depth(), "undo point popped");
        Ok(undone)
    }

    /// Unwind every undo point and drop all queued and in-progress actions.
    /// Final actions are discarded, not undone.
    pub fn undo_all(&mut self) -> Result<usize, EngineError> {
        self.ensure_mutable()?;
        let points = self.undo_stack.depth();
        let undone = self.with_phase(FramePhase::RollingBack, |this| {
            let mut undone = 0;
            while !this.undo_stack.is_empty() {
                let point = this.undo_stack.pop()?;
                for id in point.undo_order() {
                    undone += this.revert(id, true)?;
                }
            }
            let in_flight = this.queue.len() + this.in_progress.len();
            let stale = this.pending.len();
            this.queue.clear();
            this.in_progress.clear();
            this.ledger.clear();
            this.pending.clear();
            tracing::debug!(undone, points, in_flight, stale, "rolled back every undo point");
            Ok(undone)
        })?;
        self.finish_rollback()?;
        Ok(undone)
    }

    /// Undo one recorded action and announce it. Returns 1 if it was
    /// reversed, 0 if it was final or already gone.
    fn revert(&mut self, id: ActionId, rollback: bool) -> Result<usize, EngineError> {
        self.queue.remove(id);
        self.in_progress.retain(|&p| p != id);
        let Some(mut action) = self.ledger.remove(id) else {
            return Ok(0);
        };
        if action.is_final() {
            tracing::debug!(action = %id, label = action.label(), "final action discarded");
            return Ok(0);
        }
        action.undo(&mut self.world)?;

        let info = ActionInfo::describe(id, action.as_ref());
        let mut event = Event::new(EventPayload::UndoAction { action: info, rollback });
        let proposals = self.dispatch(&mut event)?;
        self.accept_proposals(proposals);
        Ok(1)
    }

    fn finish_rollback(&mut self) -> Result<(), EngineError> {
        let rejected = std::mem::take(&mut self.rejected);
        if rejected > 0 {
            return Err(EngineError::MutationDuringRollback { rejected });
        }
        Ok(())
    }

    /// Drain the queue, progress every in-progress action, fire complete
    /// events. Returns the actions that completed, in completion order.
    pub fn action_system(
        &mut self,
        delta_time: f64,
        elapsed_time: f64,
    ) -> Result<Vec<ActionInfo>, EngineError> {
        self.ensure_mutable()?;
        let completed = self.with_phase(FramePhase::Applying, |this| {
            this.apply_actions(delta_time, elapsed_time)
        })?;
        self.flush_proposals()?;
        Ok(completed)
    }

    fn apply_actions(
        &mut self,
        delta_time: f64,
        elapsed_time: f64,
    ) -> Result<Vec<ActionInfo>, EngineError> {
        while let Ok(id) = self.queue.shift() {
            if !self.in_progress.contains(&id) {
                self.in_progress.push(id);
            }
        }

        let mut finished = Vec::new();
        for id in self.in_progress.clone() {
            let action = self.ledger.get_mut(id)?;
            action.progress(&mut self.world, delta_time, elapsed_time)?;
            if action.is_complete() {
                finished.push(ActionInfo::describe(id, &*action));
            }
        }
        self.in_progress
            .retain(|id| !finished.iter().any(|info| info.id == *id));

        let mut completed = Vec::with_capacity(finished.len());
        for info in finished {
            let mut event = Event::new(EventPayload::CompleteAction(info.clone()));
            let proposals = self.dispatch(&mut event)?;
            self.accept_proposals(proposals);
            self.ledger.release_if_unrecorded(info.id);

            let is_final = info.is_final;
            tracing::trace!(action = %info.id, label = info.label, "action complete");
            completed.push(info);
            if is_final {
                self.undo_all()?;
                break;
            }
        }
        Ok(completed)
    }

    // -- ticking ------------------------------------------------------------

    /// Execute one simulation tick. Returns the actions completed in it.
    pub fn tick(&mut self) -> Result<Vec<ActionInfo>, EngineError> {
        let tick_start = Instant::now();
        self.proposals_tried = 0;
        self.proposals_dropped = 0;

        // Phase 1: behaviors.
        let behavior_start = Instant::now();
        self.with_phase(FramePhase::Behaviors, Self::run_behaviors)?;
        self.flush_proposals()?;
        let behavior_time = behavior_start.elapsed();

        // Phase 2: actions.
        let action_start = Instant::now();
        let elapsed = (self.tick_counter + 1) as f64 * self.fixed_dt;
        let completed = self.action_system(self.fixed_dt, elapsed)?;
        let action_time = action_start.elapsed();

        // Phase 3: bookkeeping.
        self.world.clear_added();
        self.tick_counter += 1;
        self.last_diagnostics = TickDiagnostics {
            behavior_time,
            action_time,
            total_time: tick_start.elapsed(),
            proposals_tried: self.proposals_tried,
            proposals_dropped: self.proposals_dropped,
            actions_completed: completed.len(),
            undo_depth: self.undo_stack.depth(),
        };
        Ok(completed)
    }

    fn run_behaviors(&mut self) -> Result<(), EngineError> {
        for entity in self.behaviors.entities() {
            let mut proposals = Vec::new();
            if let Some(behavior) = self.behaviors.get_mut(entity) {
                let mut ctx = ActionContext::new(&mut self.world, &self.config, &mut proposals);
                behavior.on_frame(entity, &mut ctx)?;
            }
            self.accept_proposals(proposals);
        }
        Ok(())
    }

    /// Run `count` ticks. Returns the number of actions completed.
    pub fn run_ticks(&mut self, count: u64) -> Result<u64, EngineError> {
        let mut total = 0u64;
        for _ in 0..count {
            total += self.tick()?.len() as u64;
        }
        Ok(total)
    }

    // -- behaviors and entities ---------------------------------------------

    /// Attach `behavior` to a live entity, stopping the previous one. The
    /// entity's `ActLike` component is updated to match.
    pub fn attach_behavior(
        &mut self,
        entity: EntityId,
        behavior: Behavior,
    ) -> Result<Option<Behavior>, EngineError> {
        self.world.set(entity, behavior.act_like())?;
        self.behaviors.attach(entity, behavior, &mut self.bus)
    }

    pub fn detach_behavior(&mut self, entity: EntityId) -> Result<Option<Behavior>, EngineError> {
        self.world.remove::<ActLike>(entity)?;
        Ok(self.behaviors.detach(entity, &mut self.bus))
    }

    /// Spawn an entity of `kind` standing on `at`, with position, layer and
    /// behavior set up. Airplanes start flying east.
    pub fn spawn_actor(&mut self, kind: ActLike, at: TilePoint) -> Result<EntityId, EngineError> {
        self.ensure_mutable()?;
        let entity = self.world.spawn();
        self.world.set(entity, TilePosition(at))?;
        self.world
            .set(entity, PixelPosition::of_tile(at, self.config.tile_size))?;
        self.world.set(entity, kind.default_layer())?;
        if kind == ActLike::Airplane {
            self.world.set(entity, Velocity::new(1, 0))?;
        }
        self.world.tiles_mut().place_object_in_tile(entity, at);
        self.attach_behavior(entity, Behavior::for_kind(kind))?;
        tracing::debug!(entity = %entity, ?kind, at = %at, "actor spawned");
        Ok(entity)
    }

    /// Detach the behavior, drop every action that acts on the entity
    /// (queued, running, pending or recorded in an undo point) and despawn
    /// it. A later entity reusing the id starts with no history.
    pub fn despawn(&mut self, entity: EntityId) -> Result<(), EngineError> {
        self.ensure_mutable()?;
        if !self.world.is_alive(entity) {
            return Err(EcsError::StaleEntity { entity }.into());
        }
        let purged = self.ledger.ids_for_entity(entity);
        for &id in &purged {
            self.queue.remove(id);
            self.ledger.remove(id);
        }
        self.in_progress.retain(|id| !purged.contains(id));
        self.undo_stack.forget(&purged);
        self.pending.retain(|proposal| proposal.action.entity() != entity);

        self.behaviors.detach(entity, &mut self.bus);
        self.world.despawn(entity)?;
        tracing::debug!(entity = %entity, purged = purged.len(), "actor despawned");
        Ok(())
    }

    pub fn get_collisions(&self) -> Vec<Collision> {
        self.world.tiles().get_collisions()
    }

    // -- event bus ----------------------------------------------------------

    pub fn add_event_listener(
        &mut self,
        kind: EventKind,
        name: &str,
        handler: impl FnMut(&mut Event, &mut ActionContext<'_>) -> Result<(), EngineError> + 'static,
        mode: RegisterMode,
    ) -> Result<ListenerId, EngineError> {
        self.bus.add_event_listener(kind, name, handler, mode)
    }

    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        self.bus.remove_event_listener(id)
    }

    /// Dispatch an event built outside the action system, e.g. by debug
    /// tooling. Proposals are tried unless the event ends cancelled.
    pub fn dispatch_event(&mut self, payload: EventPayload) -> Result<Event, EngineError> {
        self.ensure_mutable()?;
        let mut event = Event::new(payload);
        let proposals = self.with_phase(FramePhase::Dispatching, |this| this.dispatch(&mut event))?;
        if !event.is_cancelled() {
            self.accept_proposals(proposals);
            self.flush_proposals()?;
        }
        Ok(event)
    }

    // -- accessors ----------------------------------------------------------

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Computed as `tick_count * fixed_dt` to avoid drift.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct world access, for level setup and tests. Simulation changes
    /// should go through actions so they can be undone.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn behaviors(&self) -> &BehaviorRegistry {
        &self.behaviors
    }

    pub fn action(&self, id: ActionId) -> Result<&dyn Action, EngineError> {
        self.ledger.get(id)
    }

    pub fn queued_actions(&self) -> impl Iterator<Item = ActionId> + '_ {
        self.queue.iter()
    }

    pub fn in_progress(&self) -> &[ActionId] {
        &self.in_progress
    }

    pub fn has_queued_actions(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.depth()
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo_stack
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }

    // -- restore helpers ----------------------------------------------------

    pub(crate) fn set_tick_counter(&mut self, tick_counter: u64) {
        self.tick_counter = tick_counter;
    }

    pub(crate) fn set_fixed_dt(&mut self, fixed_dt: f64) {
        self.fixed_dt = fixed_dt;
        self.config.fixed_dt = fixed_dt;
    }

    /// Forget every action, queued, running or recorded.
    pub(crate) fn reset_actions(&mut self) {
        self.queue.clear();
        self.in_progress.clear();
        self.undo_stack.clear();
        self.ledger.clear();
        self.pending.clear();
        self.rejected = 0;
    }

    /// Rebuild tile occupancy from `TilePosition` components.
    pub(crate) fn rebuild_occupancy(&mut self) -> Result<usize, EngineError> {
        self.world.tiles_mut().reset_tiles();
        let placed: Vec<(EntityId, TilePoint)> = self
            .world
            .store::<TilePosition>()?
            .iter()
            .map(|(entity, position)| (entity, position.0))
            .collect();
        for &(entity, tile) in &placed {
            self.world.tiles_mut().place_object_in_tile(entity, tile);
        }
        Ok(placed.len())
    }

    /// Drop every behavior and attach fresh ones from `ActLike` components.
    pub(crate) fn reattach_behaviors(&mut self) -> Result<usize, EngineError> {
        self.behaviors.detach_all(&mut self.bus);
        let kinds: Vec<(EntityId, ActLike)> = self
            .world
            .store::<ActLike>()?
            .iter()
            .map(|(entity, kind)| (entity, *kind))
            .collect();
        for &(entity, kind) in &kinds {
            self.behaviors
                .attach(entity, Behavior::for_kind(kind), &mut self.bus)?;
        }
        Ok(kinds.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
