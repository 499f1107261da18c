//! Engine-level snapshot and restore with BLAKE3 hashing.
//!
//! An [`EngineSnapshot`] is the world snapshot plus tick metadata and a
//! BLAKE3 digest of both. It is the save-game format: plain serde data that
//! round-trips through JSON.
//!
//! ```
//! use tilestep_engine::prelude::*;
//!
//! let mut tick_loop = TickLoop::new(World::new(), TickConfig::default()).unwrap();
//! let player = tick_loop.spawn_actor(ActLike::Player, TilePoint::new(0, 0)).unwrap();
//! tick_loop.run_ticks(5).unwrap();
//!
//! let snapshot = tick_loop.capture_snapshot().unwrap();
//! assert_eq!(snapshot.hash.len(), 64);
//!
//! tick_loop.world_mut().set(player, MoveIntent::new(1, 0)).unwrap();
//! tick_loop.run_ticks(20).unwrap();
//! assert_ne!(tick_loop.state_hash().unwrap(), snapshot.hash);
//!
//! tick_loop.restore_from_snapshot(&snapshot).unwrap();
//! assert_eq!(tick_loop.state_hash().unwrap(), snapshot.hash);
//! assert_eq!(tick_loop.world().get::<TilePosition>(player).unwrap().0, TilePoint::new(0, 0));
//! ```
//!
//! # What Is NOT Serialized
//!
//! - **Actions**: queued and in-progress actions and the undo stack. A
//!   restore starts with an empty history.
//! - **Tile occupancy**: rebuilt from `TilePosition` components.
//! - **Behaviors**: re-attached from `ActLike` components.
//! - **Named event listeners**: retained on the same `TickLoop` instance.

use serde::{Deserialize, Serialize};
use tilestep_ecs::snapshot::WorldSnapshot;

use crate::tick::TickLoop;
use crate::EngineError;

// ---------------------------------------------------------------------------
// EngineSnapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub world: WorldSnapshot,
    /// Number of ticks executed at the time of capture.
    pub tick_counter: u64,
    pub fixed_dt: f64,
    /// BLAKE3 hex digest (64 lowercase hex chars) of the fields above.
    pub hash: String,
}

/// Hash the canonical JSON form of the hashable state.
fn compute_hash(
    world: &WorldSnapshot,
    tick_counter: u64,
    fixed_dt: f64,
) -> Result<String, EngineError> {
    #[derive(Serialize)]
    struct HashableState<'a> {
        world: &'a WorldSnapshot,
        tick_counter: u64,
        fixed_dt: f64,
    }

    let hashable = HashableState {
        world,
        tick_counter,
        fixed_dt,
    };
    let json_bytes = serde_json::to_vec(&hashable)?;
    Ok(blake3::hash(&json_bytes).to_hex().to_string())
}

// ---------------------------------------------------------------------------
// TickLoop snapshot/restore methods
// ---------------------------------------------------------------------------

impl TickLoop {
    /// Capture the world and tick metadata.
    pub fn capture_snapshot(&self) -> Result<EngineSnapshot, EngineError> {
        let world = self.world().capture_snapshot()?;
        let tick_counter = self.tick_count();
        let fixed_dt = self.fixed_dt();
        let hash = compute_hash(&world, tick_counter, fixed_dt)?;
        Ok(EngineSnapshot {
            world,
            tick_counter,
            fixed_dt,
            hash,
        })
    }

    /// Restore from a snapshot captured by this or another `TickLoop`.
    ///
    /// The hash and `fixed_dt` are checked before anything is touched.
    /// Afterwards all action state is empty, tile occupancy matches the
    /// restored positions and every entity with an `ActLike` component has
    /// a fresh behavior.
    ///
    /// # Errors
    ///
    /// Fails on a hash mismatch (corruption or tampering), an invalid
    /// `fixed_dt`, or a world restore error (e.g. a component name not
    /// registered here).
    pub fn restore_from_snapshot(&mut self, snapshot: &EngineSnapshot) -> Result<(), anyhow::Error> {
        if !(snapshot.fixed_dt > 0.0 && snapshot.fixed_dt.is_finite()) {
            return Err(anyhow::anyhow!(
                "snapshot has invalid fixed_dt: {}. Must be positive and finite.",
                snapshot.fixed_dt
            ));
        }

        let expected_hash = compute_hash(&snapshot.world, snapshot.tick_counter, snapshot.fixed_dt)?;
        if expected_hash != snapshot.hash {
            return Err(anyhow::anyhow!(
                "snapshot hash mismatch: recorded {} but recomputed {}. \
                 The snapshot may be corrupted or tampered with.",
                snapshot.hash,
                expected_hash
            ));
        }

        self.world_mut()
            .restore_from_snapshot(&snapshot.world)
            .map_err(|e| anyhow::anyhow!("failed to restore world from snapshot: {e}"))?;
        self.set_tick_counter(snapshot.tick_counter);
        self.set_fixed_dt(snapshot.fixed_dt);
        self.reset_actions();
        let placed = self.rebuild_occupancy()?;
        let behaviors = self.reattach_behaviors()?;

        tracing::debug!(
            tick = snapshot.tick_counter,
            placed,
            behaviors,
            "restored engine from snapshot"
        );
        Ok(())
    }

    /// The BLAKE3 digest `capture_snapshot` would record now.
    pub fn state_hash(&self) -> Result<String, EngineError> {
        let world = self.world().capture_snapshot()?;
        compute_hash(&world, self.tick_count(), self.fixed_dt())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    fn setup_loop() -> (TickLoop, EntityId) {
        let mut tick_loop = TickLoop::new(World::new(), TickConfig::default()).unwrap();
        let player = tick_loop.spawn_actor(ActLike::Player, TilePoint::new(3, 3)).unwrap();
        tick_loop.spawn_actor(ActLike::Wall, TilePoint::new(4, 3)).unwrap();
        (tick_loop, player)
    }

    #[test]
    fn same_state_same_hash() {
        let (a, _) = setup_loop();
        let (b, _) = setup_loop();
        assert_eq!(a.state_hash().unwrap(), b.state_hash().unwrap());
        assert_eq!(a.capture_snapshot().unwrap().hash, a.state_hash().unwrap());
    }

    #[test]
    fn tampered_snapshot_is_rejected() {
        let (mut tick_loop, _) = setup_loop();
        let mut snapshot = tick_loop.capture_snapshot().unwrap();
        snapshot.tick_counter += 1;
        let err = tick_loop.restore_from_snapshot(&snapshot).unwrap_err();
        assert!(err.to_string().contains("hash mismatch"));
    }

    #[test]
    fn invalid_dt_is_rejected_before_hash_check() {
        let (mut tick_loop, _) = setup_loop();
        let mut snapshot = tick_loop.capture_snapshot().unwrap();
        snapshot.fixed_dt = 0.0;
        let err = tick_loop.restore_from_snapshot(&snapshot).unwrap_err();
        assert!(err.to_string().contains("fixed_dt"));
    }

    #[test]
    fn restore_clears_history_and_rebuilds_derived_state() {
        let (mut tick_loop, player) = setup_loop();
        let snapshot = tick_loop.capture_snapshot().unwrap();

        tick_loop.world_mut().set(player, MoveIntent::new(0, 1)).unwrap();
        tick_loop.run_ticks(30).unwrap();
        assert_eq!(tick_loop.undo_depth(), 1);

        tick_loop.restore_from_snapshot(&snapshot).unwrap();
        assert_eq!(tick_loop.undo_depth(), 0);
        assert!(tick_loop
            .world()
            .tiles()
            .query_tile(TilePoint::new(3, 3))
            .any(|e| e == player));
        assert!(!tick_loop.world().tiles().is_tile_occupied(TilePoint::new(3, 4)));
        assert_eq!(tick_loop.behaviors().len(), 2);
        assert_eq!(tick_loop.behaviors().get(player), Some(&Behavior::Player));
    }

    #[test]
    fn malformed_snapshot_leaves_the_level_playable() {
        let (mut tick_loop, player) = setup_loop();
        let mut world = tick_loop.world().capture_snapshot().unwrap();
        world.entities[0]
            .components
            .insert("tint".to_owned(), serde_json::json!("bad"));
        let hash = compute_hash(&world, tick_loop.tick_count(), tick_loop.fixed_dt()).unwrap();
        let snapshot = EngineSnapshot {
            world,
            tick_counter: tick_loop.tick_count(),
            fixed_dt: tick_loop.fixed_dt(),
            hash,
        };

        assert!(tick_loop.restore_from_snapshot(&snapshot).is_err());
        assert_eq!(tick_loop.world().entity_count(), 2);
        assert_eq!(tick_loop.world().tiles().occupied_cells().count(), 2);

        // The wall is still there and still vetoes.
        tick_loop.world_mut().set(player, MoveIntent::new(1, 0)).unwrap();
        tick_loop.run_ticks(20).unwrap();
        assert_eq!(tick_loop.world().get::<TilePosition>(player).unwrap().0, TilePoint::new(3, 3));
    }

    #[test]
    fn restore_into_fresh_loop_via_json() {
        let (tick_loop, player) = setup_loop();
        let json = serde_json::to_string(&tick_loop.capture_snapshot().unwrap()).unwrap();
        let parsed: EngineSnapshot = serde_json::from_str(&json).unwrap();

        let mut fresh = TickLoop::new(World::new(), TickConfig::default()).unwrap();
        fresh.restore_from_snapshot(&parsed).unwrap();
        assert_eq!(fresh.state_hash().unwrap(), parsed.hash);

        // The restored wall still vetoes.
        fresh.world_mut().set(player, MoveIntent::new(1, 0)).unwrap();
        fresh.run_ticks(20).unwrap();
        assert_eq!(fresh.world().get::<TilePosition>(player).unwrap().0, TilePoint::new(3, 3));
    }
}
