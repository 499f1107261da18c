//! Integration tests for the world, queries and the tile index together.

use tilestep_ecs::prelude::*;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Position(TilePoint);

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Tint(u32);

fn setup_world() -> World {
    let mut world = World::new();
    world.register_component::<Position>("position").unwrap();
    world.register_component::<Tint>("tint").unwrap();
    world
}

fn place(world: &mut World, entity: EntityId, at: TilePoint) {
    world.set(entity, Position(at)).unwrap();
    world.tiles_mut().place_object_in_tile(entity, at);
}

#[test]
fn moving_into_an_occupied_tile_reports_both_collisions() {
    let mut world = setup_world();
    let _filler = world.spawn();
    let a = world.spawn();
    let b = world.spawn();
    assert_eq!((a, b), (EntityId(1), EntityId(2)));

    place(&mut world, a, TilePoint::new(1, 1));
    place(&mut world, b, TilePoint::new(2, 1));

    // Move b onto a's tile.
    world.tiles_mut().remove_object_from_tile(b, TilePoint::new(2, 1));
    place(&mut world, b, TilePoint::new(1, 1));

    let collisions = world.tiles().get_collisions();
    assert_eq!(collisions.len(), 2);
    for c in &collisions {
        assert_eq!(c.other_ids.len(), 1);
    }
    assert!(collisions.contains(&Collision {
        entity_id: EntityId(1),
        other_ids: vec![EntityId(2)],
    }));
    assert!(collisions.contains(&Collision {
        entity_id: EntityId(2),
        other_ids: vec![EntityId(1)],
    }));
}

#[test]
fn query_over_tiles_uses_predicate_on_occupancy() {
    let mut world = setup_world();
    let mut ids = Vec::new();
    for x in 0..4 {
        let e = world.spawn();
        place(&mut world, e, TilePoint::new(x, 0));
        ids.push(e);
    }
    let crowd = world.spawn();
    place(&mut world, crowd, TilePoint::new(2, 0));

    let crowded = Query::new().with::<Position>().filter(|w, e| {
        let at = w.get::<Position>(e).map(|p| p.0);
        at.map(|t| w.tiles().query_tile(t).count() > 1).unwrap_or(false)
    });
    let matched = crowded.run(&world).unwrap();
    assert_eq!(matched.as_slice(), &[ids[2], crowd]);
}

#[test]
fn dirty_positions_are_visible_to_a_render_pass() {
    let mut world = setup_world();
    let e = world.spawn();
    world.set(e, Tint(0x00ff00ff)).unwrap();
    assert!(world.store::<Tint>().unwrap().dirty().contains(&e));

    let drained = world.store_mut::<Tint>().unwrap().take_dirty();
    assert_eq!(drained.len(), 1);
    assert!(world.store::<Tint>().unwrap().dirty().is_empty());
}

#[test]
fn snapshot_is_plain_json_records() {
    let mut world = setup_world();
    let e = world.spawn();
    world.set(e, Position(TilePoint::new(3, -2))).unwrap();
    world.set(e, Tint(7)).unwrap();

    let json = serde_json::to_value(world.capture_snapshot().unwrap()).unwrap();
    assert_eq!(
        json["entities"][0],
        serde_json::json!({
            "id": 0,
            "components": {
                "position": {"x": 3, "y": -2},
                "tint": 7
            }
        })
    );
}
