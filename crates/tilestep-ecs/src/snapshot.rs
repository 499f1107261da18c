//! World snapshot and restore support.
//!
//! A [`WorldSnapshot`] is the persistence boundary of the core: an ordered
//! list of per-entity records, each mapping component names to their JSON
//! values. It is plain serde data, so saving a level is
//! `serde_json::to_string(&world.capture_snapshot())`.
//!
//! The tile occupancy index is derived state and is not part of the
//! snapshot; whoever owns position semantics rebuilds it after a restore.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, MAX_ENTITY_ID};
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Serializable snapshot of a single entity's component data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    /// Component name -> JSON value. `BTreeMap` keeps serialization order
    /// deterministic.
    pub components: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// A complete, serializable snapshot of the world's entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Names of all registered component types, sorted (informational).
    pub component_names: Vec<String>,
    /// Every alive entity, ascending by id.
    pub entities: Vec<EntityRecord>,
}

// ---------------------------------------------------------------------------
// World snapshot/restore impl
// ---------------------------------------------------------------------------

impl World {
    /// Capture every alive entity and its components.
    ///
    /// Fails only if a component refuses to serialize (e.g. a map with
    /// non-string keys).
    pub fn capture_snapshot(&self) -> Result<WorldSnapshot, EcsError> {
        let component_names: Vec<String> = self
            .registry()
            .registered_names()
            .into_iter()
            .map(str::to_owned)
            .collect();

        let mut entities = Vec::with_capacity(self.entity_count());
        for id in self.entities() {
            let mut components = BTreeMap::new();
            for store in self.registry().iter() {
                if let Some(value) = store.serialize(id) {
                    components.insert(store.name().to_owned(), value?);
                }
            }
            entities.push(EntityRecord {
                id,
                components,
                alias: self.debug_alias(id).map(str::to_owned),
            });
        }

        Ok(WorldSnapshot {
            component_names,
            entities,
        })
    }

    /// Replace the world's contents with a snapshot.
    ///
    /// The whole snapshot is validated before anything is touched: every
    /// component name must be registered here, every value must deserialize
    /// as its component and every id must be at most [`MAX_ENTITY_ID`]. Any
    /// error leaves the world unchanged. Entity ids are recreated exactly.
    /// The tile index is cleared.
    pub fn restore_from_snapshot(&mut self, snapshot: &WorldSnapshot) -> Result<(), EcsError> {
        for record in &snapshot.entities {
            if record.id.0 > MAX_ENTITY_ID {
                return Err(EcsError::EntityIdOutOfRange {
                    entity: record.id,
                    limit: MAX_ENTITY_ID,
                });
            }
            for (name, value) in &record.components {
                self.registry().erased(name)?.check_json(value)?;
            }
        }

        self.reset();
        for record in &snapshot.entities {
            self.spawn_with_id(record.id);
            for (name, value) in &record.components {
                self.components.erased_mut(name)?.set_from_json(record.id, value)?;
            }
            if let Some(alias) = &record.alias {
                self.set_debug_alias(record.id, alias, crate::RegisterMode::Override)?;
            }
        }
        self.clear_added();

        tracing::debug!(
            entities = snapshot.entities.len(),
            "restored world from snapshot"
        );
        Ok(())
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
    struct Tint(u32);

    fn setup_world() -> World {
        let mut world = World::new();
        world.register_component::<Pos>("position").unwrap();
        world.register_component::<Tint>("tint").unwrap();
        world
    }

    #[test]
    fn records_are_ordered_by_id() {
        let mut world = setup_world();
        let a = world.spawn();
        let b = world.spawn();
        world.set(b, Pos { x: 1, y: 2 }).unwrap();
        world.set(a, Tint(3)).unwrap();

        let snap = world.capture_snapshot().unwrap();
        let ids: Vec<EntityId> = snap.entities.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(snap.entities[1].components["position"], serde_json::json!({"x": 1, "y": 2}));
        assert_eq!(snap.component_names, vec!["position", "tint"]);
    }

    #[test]
    fn restore_recreates_ids_with_gaps() {
        let mut world = setup_world();
        let ids: Vec<EntityId> = (0..4).map(|_| world.spawn()).collect();
        for (i, &e) in ids.iter().enumerate() {
            world.set(e, Tint(i as u32)).unwrap();
        }
        world.despawn(ids[1]).unwrap();
        let snap = world.capture_snapshot().unwrap();

        let mut restored = setup_world();
        restored.restore_from_snapshot(&snap).unwrap();
        assert!(!restored.is_alive(ids[1]));
        assert_eq!(restored.get::<Tint>(ids[3]).unwrap(), &Tint(3));
        // The gap is the next id handed out.
        assert_eq!(restored.spawn(), ids[1]);
    }

    #[test]
    fn unknown_component_leaves_world_untouched() {
        let mut world = setup_world();
        let e = world.spawn();
        world.set(e, Tint(1)).unwrap();

        let bad = WorldSnapshot {
            component_names: vec!["ghost".into()],
            entities: vec![EntityRecord {
                id: EntityId(0),
                components: BTreeMap::from([("ghost".to_owned(), serde_json::json!(1))]),
                alias: None,
            }],
        };
        assert!(world.restore_from_snapshot(&bad).is_err());
        assert_eq!(world.get::<Tint>(e).unwrap(), &Tint(1));
    }

    #[test]
    fn malformed_value_leaves_world_untouched() {
        let mut world = setup_world();
        let a = world.spawn();
        let b = world.spawn();
        world.set(a, Tint(1)).unwrap();
        world.set(b, Pos { x: 2, y: 3 }).unwrap();

        let mut snap = world.capture_snapshot().unwrap();
        // The first record is fine; the second one is not.
        snap.entities[1]
            .components
            .insert("tint".to_owned(), serde_json::json!("bad"));
        let err = world.restore_from_snapshot(&snap).unwrap_err();
        assert!(matches!(err, EcsError::ComponentDeserializationError { ref component, .. } if component == "tint"));

        assert_eq!(world.entity_count(), 2);
        assert_eq!(world.get::<Tint>(a).unwrap(), &Tint(1));
        assert_eq!(world.get::<Pos>(b).unwrap(), &Pos { x: 2, y: 3 });
        assert!(!world.has::<Tint>(b));
    }

    #[test]
    fn huge_entity_id_is_rejected() {
        let mut world = setup_world();
        let e = world.spawn();
        world.set(e, Tint(7)).unwrap();

        let bad = WorldSnapshot {
            component_names: vec!["tint".into()],
            entities: vec![EntityRecord {
                id: EntityId(u32::MAX - 1),
                components: BTreeMap::from([("tint".to_owned(), serde_json::json!(1))]),
                alias: None,
            }],
        };
        let err = world.restore_from_snapshot(&bad).unwrap_err();
        assert!(matches!(err, EcsError::EntityIdOutOfRange { limit: MAX_ENTITY_ID, .. }));
        assert_eq!(world.get::<Tint>(e).unwrap(), &Tint(7));
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn snapshot_json_roundtrip_keeps_aliases() {
        let mut world = setup_world();
        let e = world.spawn();
        world.set(e, Pos { x: -4, y: 7 }).unwrap();
        world
            .set_debug_alias(e, "player", crate::RegisterMode::Unique)
            .unwrap();

        let json = serde_json::to_string(&world.capture_snapshot().unwrap()).unwrap();
        let parsed: WorldSnapshot = serde_json::from_str(&json).unwrap();

        let mut restored = setup_world();
        restored.restore_from_snapshot(&parsed).unwrap();
        assert_eq!(restored.entity_by_alias("player"), Some(e));
        assert_eq!(restored.get::<Pos>(e).unwrap(), &Pos { x: -4, y: 7 });
    }
}
