//! Action queue and undo stack behavior through the public `TickLoop` API.

use tilestep_engine::prelude::*;

fn setup_loop() -> TickLoop {
    TickLoop::new(World::new(), TickConfig::default()).unwrap()
}

fn at(tick_loop: &TickLoop, entity: EntityId) -> TilePoint {
    tick_loop.world().get::<TilePosition>(entity).unwrap().0
}

fn occupants(tick_loop: &TickLoop, tile: TilePoint) -> Vec<EntityId> {
    tick_loop.world().tiles().query_tile(tile).collect()
}

#[test]
fn popping_an_empty_stack_fails() {
    let mut tick_loop = setup_loop();
    assert!(matches!(tick_loop.pop_undo_point(), Err(EngineError::EmptyUndoStack)));

    tick_loop.push_undo_point().unwrap();
    assert_eq!(tick_loop.pop_undo_point().unwrap(), 0);
    assert!(matches!(tick_loop.pop_undo_point(), Err(EngineError::EmptyUndoStack)));
}

#[test]
fn cancelled_attempt_leaves_queue_and_depth_unchanged() {
    let mut tick_loop = setup_loop();
    let e = tick_loop.spawn_actor(ActLike::Box, TilePoint::new(0, 0)).unwrap();
    tick_loop
        .add_event_listener(
            EventKind::TestAction,
            "veto-everything",
            |event, _| {
                event.cancel();
                Ok(())
            },
            RegisterMode::Unique,
        )
        .unwrap();
    tick_loop.push_undo_point().unwrap();

    let mv = MoveAction::step(tick_loop.world(), e, TileStep(1), TileStep(0), tick_loop.config()).unwrap();
    let outcome = tick_loop.try_action(mv, true).unwrap();

    assert_eq!(outcome, TryOutcome::Cancelled);
    assert_eq!(tick_loop.undo_depth(), 1);
    assert_eq!(tick_loop.queued_actions().count(), 0);
    assert!(tick_loop.undo_stack().top().unwrap().is_empty());
}

#[test]
fn popped_move_restores_position_and_occupancy() {
    let mut tick_loop = setup_loop();
    let e = tick_loop.spawn_actor(ActLike::Box, TilePoint::new(10, 10)).unwrap();

    tick_loop.push_undo_point().unwrap();
    let mv = MoveAction::new(e, TilePoint::new(10, 10), TilePoint::new(12, 10), 0.1, Pixels(16.0));
    assert!(tick_loop.try_action(mv, false).unwrap().is_accepted());
    tick_loop.run_ticks(20).unwrap();
    assert_eq!(at(&tick_loop, e), TilePoint::new(12, 10));
    assert_eq!(occupants(&tick_loop, TilePoint::new(12, 10)), vec![e]);

    assert_eq!(tick_loop.pop_undo_point().unwrap(), 1);
    assert_eq!(at(&tick_loop, e), TilePoint::new(10, 10));
    assert_eq!(occupants(&tick_loop, TilePoint::new(10, 10)), vec![e]);
    assert!(!tick_loop.world().tiles().is_tile_occupied(TilePoint::new(12, 10)));
    assert_eq!(
        tick_loop.world().get::<PixelPosition>(e).unwrap(),
        &PixelPosition::of_tile(TilePoint::new(10, 10), Pixels(16.0))
    );
}

#[test]
fn popping_mid_move_stops_the_action() {
    let mut tick_loop = setup_loop();
    let e = tick_loop.spawn_actor(ActLike::Box, TilePoint::new(0, 0)).unwrap();
    let mv = MoveAction::new(e, TilePoint::new(0, 0), TilePoint::new(0, 1), 1.0, Pixels(16.0));
    tick_loop.try_action(mv, true).unwrap();

    tick_loop.tick().unwrap();
    assert_eq!(at(&tick_loop, e), TilePoint::new(0, 1));
    assert_eq!(tick_loop.in_progress().len(), 1);

    tick_loop.pop_undo_point().unwrap();
    assert_eq!(at(&tick_loop, e), TilePoint::new(0, 0));
    assert!(tick_loop.in_progress().is_empty());
    assert_eq!(tick_loop.run_ticks(90).unwrap(), 0);
}

#[test]
fn moves_within_a_point_undo_newest_first() {
    let mut tick_loop = setup_loop();
    let e = tick_loop.spawn_actor(ActLike::Box, TilePoint::new(0, 0)).unwrap();
    tick_loop.push_undo_point().unwrap();
    for x in 1..=3 {
        let mv = MoveAction::new(e, TilePoint::new(x - 1, 0), TilePoint::new(x, 0), 0.0, Pixels(16.0));
        tick_loop.enqueue_action(mv).unwrap();
        tick_loop.tick().unwrap();
    }
    assert_eq!(at(&tick_loop, e), TilePoint::new(3, 0));

    assert_eq!(tick_loop.pop_undo_point().unwrap(), 3);
    assert_eq!(at(&tick_loop, e), TilePoint::new(0, 0));
    assert_eq!(occupants(&tick_loop, TilePoint::new(0, 0)), vec![e]);
}

#[test]
fn undo_all_drops_in_flight_actions() {
    let mut tick_loop = setup_loop();
    let e = tick_loop.spawn_actor(ActLike::Box, TilePoint::new(0, 0)).unwrap();
    tick_loop
        .try_action(MoveAction::new(e, TilePoint::new(0, 0), TilePoint::new(1, 0), 0.0, Pixels(16.0)), true)
        .unwrap();
    tick_loop.tick().unwrap();
    tick_loop
        .try_action(MoveAction::new(e, TilePoint::new(1, 0), TilePoint::new(2, 0), 5.0, Pixels(16.0)), true)
        .unwrap();
    tick_loop.tick().unwrap();
    // Joins the innermost point while still queued.
    tick_loop
        .enqueue_action(MoveAction::new(e, TilePoint::new(2, 0), TilePoint::new(3, 0), 0.0, Pixels(16.0)))
        .unwrap();
    assert_eq!(tick_loop.in_progress().len(), 1);

    assert_eq!(tick_loop.undo_all().unwrap(), 3);
    assert_eq!(at(&tick_loop, e), TilePoint::new(0, 0));
    assert_eq!(tick_loop.undo_depth(), 0);
    assert!(tick_loop.in_progress().is_empty());
    assert!(!tick_loop.has_queued_actions());
}

#[test]
fn undo_events_report_rollback_flag() {
    let mut tick_loop = setup_loop();
    let e = tick_loop.spawn_actor(ActLike::Box, TilePoint::new(0, 0)).unwrap();
    let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = std::rc::Rc::clone(&seen);
    tick_loop
        .add_event_listener(
            EventKind::UndoAction,
            "journal",
            move |event, _| {
                if let EventPayload::UndoAction { action, rollback } = &event.payload {
                    sink.borrow_mut().push((action.label, *rollback));
                }
                Ok(())
            },
            RegisterMode::Unique,
        )
        .unwrap();

    for y in 1..=2 {
        let mv = MoveAction::new(e, TilePoint::new(0, y - 1), TilePoint::new(0, y), 0.0, Pixels(16.0));
        tick_loop.try_action(mv, true).unwrap();
        tick_loop.tick().unwrap();
    }
    tick_loop.pop_undo_point().unwrap();
    tick_loop.undo_all().unwrap();

    assert_eq!(*seen.borrow(), vec![("move", false), ("move", true)]);
}

#[test]
fn two_entities_on_one_tile_collide_both_ways() {
    let mut tick_loop = setup_loop();
    let _filler = tick_loop.world_mut().spawn();
    let a = tick_loop.spawn_actor(ActLike::Box, TilePoint::new(1, 1)).unwrap();
    let b = tick_loop.spawn_actor(ActLike::Box, TilePoint::new(2, 1)).unwrap();
    assert_eq!((a, b), (EntityId(1), EntityId(2)));

    // Enqueued actions skip the test event, so the box does not object.
    tick_loop
        .enqueue_action(MoveAction::new(b, TilePoint::new(2, 1), TilePoint::new(1, 1), 0.0, Pixels(16.0)))
        .unwrap();
    tick_loop.tick().unwrap();

    let collisions = tick_loop.get_collisions();
    assert_eq!(collisions.len(), 2);
    assert!(collisions.contains(&Collision { entity_id: a, other_ids: vec![b] }));
    assert!(collisions.contains(&Collision { entity_id: b, other_ids: vec![a] }));
}

#[test]
fn respawned_id_does_not_inherit_undo_history() {
    let mut tick_loop = setup_loop();
    let a = tick_loop.spawn_actor(ActLike::Box, TilePoint::new(0, 0)).unwrap();
    let mv = MoveAction::new(a, TilePoint::new(0, 0), TilePoint::new(1, 0), 0.0, Pixels(16.0));
    assert!(tick_loop.try_action(mv, true).unwrap().is_accepted());
    tick_loop.tick().unwrap();

    tick_loop.despawn(a).unwrap();
    let b = tick_loop.spawn_actor(ActLike::Box, TilePoint::new(5, 5)).unwrap();
    assert_eq!(a, b);

    // The point survives but holds nothing of the old entity.
    assert_eq!(tick_loop.pop_undo_point().unwrap(), 0);
    assert_eq!(at(&tick_loop, b), TilePoint::new(5, 5));
    let cells: Vec<(TilePoint, Vec<EntityId>)> = tick_loop
        .world()
        .tiles()
        .occupied_cells()
        .map(|(tile, occupants)| (tile, occupants.iter().copied().collect()))
        .collect();
    assert_eq!(cells, vec![(TilePoint::new(5, 5), vec![b])]);
}
