//! Game components shared by actions, behaviors and the render layer.

use serde::{Deserialize, Serialize};
use tilestep_ecs::prelude::*;

/// Where an entity stands on the tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TilePosition(pub TilePoint);

/// Where an entity is drawn. Eased toward the tile position by moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPosition {
    pub x: Pixels,
    pub y: Pixels,
}

impl PixelPosition {
    /// The pixel origin of a tile.
    pub fn of_tile(tile: TilePoint, tile_size: Pixels) -> Self {
        Self {
            x: tile.x.to_pixels(tile_size),
            y: tile.y.to_pixels(tile_size),
        }
    }

    pub fn lerp(self, to: PixelPosition, t: f32) -> Self {
        Self {
            x: self.x.lerp(to.x, t),
            y: self.y.lerp(to.y, t),
        }
    }
}

/// Tiles travelled per step (airplanes fly along it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Velocity {
    pub dx: TileStep,
    pub dy: TileStep,
}

impl Velocity {
    pub fn new(dx: i32, dy: i32) -> Self {
        Self {
            dx: TileStep(dx),
            dy: TileStep(dy),
        }
    }

    pub fn reversed(self) -> Self {
        Self {
            dx: -self.dx,
            dy: -self.dy,
        }
    }
}

/// RGBA colour, `0xRRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tint(pub u32);

/// Draw layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerId {
    Floor,
    Solid,
    Actor,
    Overlay,
}

/// Which behavior drives an entity. Persisted so behaviors can be
/// re-attached after a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActLike {
    Player,
    Box,
    Airplane,
    Bro,
    Wall,
}

impl ActLike {
    /// Walls and boxes stop a pushed box.
    pub fn blocks_push(self) -> bool {
        matches!(self, ActLike::Wall | ActLike::Box)
    }

    pub fn default_layer(self) -> LayerId {
        match self {
            ActLike::Wall => LayerId::Solid,
            ActLike::Box => LayerId::Solid,
            ActLike::Player | ActLike::Bro | ActLike::Airplane => LayerId::Actor,
        }
    }
}

/// A step requested by the input layer, consumed by the player behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveIntent {
    pub dx: TileStep,
    pub dy: TileStep,
}

impl MoveIntent {
    pub fn new(dx: i32, dy: i32) -> Self {
        Self {
            dx: TileStep(dx),
            dy: TileStep(dy),
        }
    }
}

/// Register every component above. Safe to call on a world that already
/// has them.
pub fn register_game_components(world: &mut World) -> Result<(), EcsError> {
    world.register_component::<TilePosition>("tile_position")?;
    world.register_component::<PixelPosition>("pixel_position")?;
    world.register_component::<Velocity>("velocity")?;
    world.register_component::<Tint>("tint")?;
    world.register_component::<LayerId>("layer")?;
    world.register_component::<ActLike>("act_like")?;
    world.register_component::<MoveIntent>("move_intent")?;
    Ok(())
}

/// The behavior kind of `entity`, if it has one.
pub fn act_like_of(world: &World, entity: EntityId) -> Option<ActLike> {
    world.get::<ActLike>(entity).ok().copied()
}

/// Whether any occupant of `tile` stops a pushed box.
pub fn tile_blocks_push(world: &World, tile: TilePoint) -> bool {
    world
        .tiles()
        .query_tile(tile)
        .any(|e| act_like_of(world, e).is_some_and(ActLike::blocks_push))
}

/// Whether any occupant of `tile` is of the given kind.
pub fn tile_holds(world: &World, tile: TilePoint, kind: ActLike) -> bool {
    world
        .tiles()
        .query_tile(tile)
        .any(|e| act_like_of(world, e) == Some(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_idempotent() {
        let mut world = World::new();
        register_game_components(&mut world).unwrap();
        register_game_components(&mut world).unwrap();
        assert_eq!(world.registry().len(), 7);
    }

    #[test]
    fn push_blocking_looks_at_occupants() {
        let mut world = World::new();
        register_game_components(&mut world).unwrap();
        let wall = world.spawn();
        world.set(wall, ActLike::Wall).unwrap();
        world.tiles_mut().place_object_in_tile(wall, TilePoint::new(0, 0));
        let bro = world.spawn();
        world.set(bro, ActLike::Bro).unwrap();
        world.tiles_mut().place_object_in_tile(bro, TilePoint::new(1, 0));

        assert!(tile_blocks_push(&world, TilePoint::new(0, 0)));
        assert!(!tile_blocks_push(&world, TilePoint::new(1, 0)));
        assert!(!tile_blocks_push(&world, TilePoint::new(2, 0)));
        assert!(tile_holds(&world, TilePoint::new(1, 0), ActLike::Bro));
    }

    #[test]
    fn pixel_position_of_tile_scales() {
        let p = PixelPosition::of_tile(TilePoint::new(2, -1), Pixels(16.0));
        assert_eq!(p.x, Pixels(32.0));
        assert_eq!(p.y, Pixels(-16.0));
    }
}
