//! Sparse spatial index over integer grid coordinates.
//!
//! [`TileMatrix`] maps `(x, y, z)` to a value and only stores occupied cells.
//! [`TileOccupancy`] builds on it to track which entities stand on which
//! tile; movement and collision logic consult it instead of scanning every
//! position component.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::units::{assert_int, TilePoint};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// Smallest and largest coordinate ever inserted on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: (i32, i32, i32),
    pub max: (i32, i32, i32),
}

impl Bounds {
    fn point(x: i32, y: i32, z: i32) -> Self {
        Self {
            min: (x, y, z),
            max: (x, y, z),
        }
    }

    fn include(&mut self, x: i32, y: i32, z: i32) {
        self.min = (self.min.0.min(x), self.min.1.min(y), self.min.2.min(z));
        self.max = (self.max.0.max(x), self.max.1.max(y), self.max.2.max(z));
    }
}

// ---------------------------------------------------------------------------
// TileMatrix
// ---------------------------------------------------------------------------

/// A sparse 3D matrix keyed by integer coordinates, negatives included.
///
/// Lookups are hash-based and O(1). [`entries`](Self::entries) walks cells in
/// ascending z, then y, then x order starting from the minimum coordinate
/// observed on each axis. Bounds only ever widen; deleting a cell does not
/// shrink them.
#[derive(Debug, Clone)]
pub struct TileMatrix<T> {
    cells: HashMap<(i32, i32, i32), T>,
    /// Occupied keys as `(z, y, x)`, the iteration order.
    order: BTreeSet<(i32, i32, i32)>,
    bounds: Option<Bounds>,
}

impl<T> Default for TileMatrix<T> {
    fn default() -> Self {
        Self {
            cells: HashMap::new(),
            order: BTreeSet::new(),
            bounds: None,
        }
    }
}

impl<T> TileMatrix<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` at `(x, y, z)`, returning the previous value.
    pub fn set(&mut self, x: i32, y: i32, z: i32, value: T) -> Option<T> {
        match &mut self.bounds {
            Some(bounds) => bounds.include(x, y, z),
            None => self.bounds = Some(Bounds::point(x, y, z)),
        }
        self.order.insert((z, y, x));
        self.cells.insert((x, y, z), value)
    }

    pub fn get(&self, x: i32, y: i32, z: i32) -> Option<&T> {
        self.cells.get(&(x, y, z))
    }

    pub fn get_mut(&mut self, x: i32, y: i32, z: i32) -> Option<&mut T> {
        self.cells.get_mut(&(x, y, z))
    }

    pub fn has(&self, x: i32, y: i32, z: i32) -> bool {
        self.cells.contains_key(&(x, y, z))
    }

    /// Remove the cell, returning its value.
    pub fn delete(&mut self, x: i32, y: i32, z: i32) -> Option<T> {
        self.order.remove(&(z, y, x));
        self.cells.remove(&(x, y, z))
    }

    /// Remove every cell and forget the bounds.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.order.clear();
        self.bounds = None;
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Per-axis extremes seen so far, or `None` if nothing was ever set.
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// `(x, y, z, &value)` for every cell in ascending z, y, x order.
    ///
    /// The scan starts at the minimum corner of [`bounds`](Self::bounds), so
    /// negative coordinates come first.
    pub fn entries(&self) -> impl Iterator<Item = (i32, i32, i32, &T)> + '_ {
        let start = match self.bounds {
            Some(Bounds { min: (x, y, z), .. }) => Bound::Included((z, y, x)),
            None => Bound::Unbounded,
        };
        self.order
            .range((start, Bound::Unbounded))
            .filter_map(move |&(z, y, x)| self.cells.get(&(x, y, z)).map(|v| (x, y, z, v)))
    }

    // -- float-coordinate entry points ---------------------------------------

    /// [`set`](Self::set) for externally supplied coordinates.
    pub fn set_f64(&mut self, x: f64, y: f64, z: f64, value: T) -> Result<Option<T>, EcsError> {
        let (x, y, z) = assert_ints(x, y, z)?;
        Ok(self.set(x, y, z, value))
    }

    /// [`get`](Self::get) for externally supplied coordinates.
    pub fn get_f64(&self, x: f64, y: f64, z: f64) -> Result<Option<&T>, EcsError> {
        let (x, y, z) = assert_ints(x, y, z)?;
        Ok(self.get(x, y, z))
    }

    /// [`has`](Self::has) for externally supplied coordinates.
    pub fn has_f64(&self, x: f64, y: f64, z: f64) -> Result<bool, EcsError> {
        let (x, y, z) = assert_ints(x, y, z)?;
        Ok(self.has(x, y, z))
    }

    /// [`delete`](Self::delete) for externally supplied coordinates.
    pub fn delete_f64(&mut self, x: f64, y: f64, z: f64) -> Result<Option<T>, EcsError> {
        let (x, y, z) = assert_ints(x, y, z)?;
        Ok(self.delete(x, y, z))
    }
}

/// All three coordinates must be integers.
pub fn assert_ints(x: f64, y: f64, z: f64) -> Result<(i32, i32, i32), EcsError> {
    Ok((assert_int(x)?, assert_int(y)?, assert_int(z)?))
}

// ---------------------------------------------------------------------------
// Collision
// ---------------------------------------------------------------------------

/// One entity sharing its tile with others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collision {
    pub entity_id: EntityId,
    /// The other occupants of the tile, ascending.
    pub other_ids: Vec<EntityId>,
}

// ---------------------------------------------------------------------------
// TileOccupancy
// ---------------------------------------------------------------------------

/// Which entities occupy which tile, on the z = 0 plane of a [`TileMatrix`].
///
/// Invariant: no cell maps to an empty set. A cell is created by the first
/// [`place_object_in_tile`](Self::place_object_in_tile) and removed by the
/// [`remove_object_from_tile`](Self::remove_object_from_tile) of its last
/// occupant.
#[derive(Debug, Clone, Default)]
pub struct TileOccupancy {
    matrix: TileMatrix<BTreeSet<EntityId>>,
}

impl TileOccupancy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `entity` as standing on `tile`.
    pub fn place_object_in_tile(&mut self, entity: EntityId, tile: TilePoint) {
        let (x, y) = (tile.x.0, tile.y.0);
        match self.matrix.get_mut(x, y, 0) {
            Some(set) => {
                set.insert(entity);
            }
            None => {
                self.matrix.set(x, y, 0, BTreeSet::from([entity]));
            }
        }
    }

    /// Forget that `entity` stands on `tile`. Returns `false` if it was not
    /// recorded there.
    pub fn remove_object_from_tile(&mut self, entity: EntityId, tile: TilePoint) -> bool {
        let (x, y) = (tile.x.0, tile.y.0);
        let Some(set) = self.matrix.get_mut(x, y, 0) else {
            return false;
        };
        let removed = set.remove(&entity);
        if set.is_empty() {
            self.matrix.delete(x, y, 0);
        }
        removed
    }

    /// Occupants of `tile`, ascending. Empty if the tile is free.
    pub fn query_tile(&self, tile: TilePoint) -> impl Iterator<Item = EntityId> + '_ {
        self.matrix
            .get(tile.x.0, tile.y.0, 0)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn is_tile_occupied(&self, tile: TilePoint) -> bool {
        self.matrix.has(tile.x.0, tile.y.0, 0)
    }

    /// Drop every occupancy record.
    pub fn reset_tiles(&mut self) {
        self.matrix.clear();
    }

    /// Remove `entity` from whatever tiles it occupies. Returns how many
    /// cells it was found in.
    pub fn evict(&mut self, entity: EntityId) -> usize {
        let cells: Vec<TilePoint> = self
            .occupied_cells()
            .filter(|(_, set)| set.contains(&entity))
            .map(|(tile, _)| tile)
            .collect();
        for &tile in &cells {
            self.remove_object_from_tile(entity, tile);
        }
        cells.len()
    }

    /// Occupied tiles with their occupants, ascending y then x.
    pub fn occupied_cells(&self) -> impl Iterator<Item = (TilePoint, &BTreeSet<EntityId>)> + '_ {
        self.matrix
            .entries()
            .map(|(x, y, _, set)| (TilePoint::new(x, y), set))
    }

    /// One [`Collision`] per occupant of every tile holding more than one
    /// entity.
    pub fn get_collisions(&self) -> Vec<Collision> {
        let mut collisions = Vec::new();
        for (_, set) in self.occupied_cells() {
            if set.len() < 2 {
                continue;
            }
            for &entity_id in set {
                collisions.push(Collision {
                    entity_id,
                    other_ids: set.iter().copied().filter(|&o| o != entity_id).collect(),
                });
            }
        }
        collisions
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete_with_negative_coordinates() {
        let mut m = TileMatrix::new();
        m.set(-3, 4, -1, "a");
        assert!(m.has(-3, 4, -1));
        assert_eq!(m.get(-3, 4, -1), Some(&"a"));
        assert_eq!(m.delete(-3, 4, -1), Some("a"));
        assert!(!m.has(-3, 4, -1));
        assert!(m.is_empty());
    }

    #[test]
    fn entries_are_ordered_z_then_y_then_x() {
        let mut m = TileMatrix::new();
        m.set(0, 0, 0, 4);
        m.set(-1, 0, -1, 3);
        m.set(0, -1, -1, 2);
        m.set(-1, -1, -1, 1);

        let entries: Vec<(i32, i32, i32, i32)> =
            m.entries().map(|(x, y, z, v)| (x, y, z, *v)).collect();
        assert_eq!(
            entries,
            vec![
                (-1, -1, -1, 1),
                (0, -1, -1, 2),
                (-1, 0, -1, 3),
                (0, 0, 0, 4),
            ]
        );
    }

    #[test]
    fn bounds_track_minimum_per_axis() {
        let mut m = TileMatrix::new();
        assert!(m.bounds().is_none());
        m.set(2, -5, 0, ());
        m.set(-7, 1, 3, ());
        let b = m.bounds().unwrap();
        assert_eq!(b.min, (-7, -5, 0));
        assert_eq!(b.max, (2, 1, 3));
    }

    #[test]
    fn entries_scan_from_the_widened_minimum() {
        let mut m = TileMatrix::new();
        m.set(5, 5, 0, 'c');
        m.set(-9, -9, -9, 'a');
        m.set(-2, 3, 0, 'b');
        m.delete(-9, -9, -9);
        // Bounds keep the deleted corner; the scan still finds every cell.
        assert_eq!(m.bounds().unwrap().min, (-9, -9, -9));
        let values: Vec<char> = m.entries().map(|(_, _, _, v)| *v).collect();
        assert_eq!(values, vec!['b', 'c']);

        m.clear();
        assert_eq!(m.entries().count(), 0);
        m.set(1, 1, 1, 'd');
        assert_eq!(m.entries().map(|(x, y, z, _)| (x, y, z)).collect::<Vec<_>>(), vec![(1, 1, 1)]);
    }

    #[test]
    fn float_coordinates_must_be_integers() {
        let mut m = TileMatrix::new();
        assert!(m.set_f64(1.0, 2.0, 0.0, 'x').is_ok());
        assert!(m.has_f64(1.0, 2.0, 0.0).unwrap());
        assert!(matches!(
            m.set_f64(0.5, 0.0, 0.0, 'y'),
            Err(EcsError::InvalidCoordinate { .. })
        ));
        assert!(m.get_f64(1.0, f64::INFINITY, 0.0).is_err());
        assert_eq!(m.delete_f64(1.0, 2.0, 0.0).unwrap(), Some('x'));
    }

    #[test]
    fn last_occupant_leaving_removes_the_cell() {
        let mut tiles = TileOccupancy::new();
        let t = TilePoint::new(1, 1);
        tiles.place_object_in_tile(EntityId(1), t);
        tiles.place_object_in_tile(EntityId(2), t);
        assert!(tiles.remove_object_from_tile(EntityId(1), t));
        assert!(tiles.is_tile_occupied(t));
        assert!(tiles.remove_object_from_tile(EntityId(2), t));
        assert!(!tiles.is_tile_occupied(t));
        assert!(!tiles.remove_object_from_tile(EntityId(2), t));
        assert_eq!(tiles.occupied_cells().count(), 0);
    }

    #[test]
    fn two_entities_on_one_tile_collide_both_ways() {
        let mut tiles = TileOccupancy::new();
        tiles.place_object_in_tile(EntityId(1), TilePoint::new(1, 1));
        tiles.place_object_in_tile(EntityId(2), TilePoint::new(1, 1));
        tiles.place_object_in_tile(EntityId(3), TilePoint::new(5, 1));

        let collisions = tiles.get_collisions();
        assert_eq!(collisions.len(), 2);
        assert!(collisions.contains(&Collision {
            entity_id: EntityId(1),
            other_ids: vec![EntityId(2)]
        }));
        assert!(collisions.contains(&Collision {
            entity_id: EntityId(2),
            other_ids: vec![EntityId(1)]
        }));
    }

    #[test]
    fn evict_clears_every_cell_of_an_entity() {
        let mut tiles = TileOccupancy::new();
        tiles.place_object_in_tile(EntityId(4), TilePoint::new(0, 0));
        tiles.place_object_in_tile(EntityId(4), TilePoint::new(3, 3));
        tiles.place_object_in_tile(EntityId(5), TilePoint::new(3, 3));
        assert_eq!(tiles.evict(EntityId(4)), 2);
        assert!(!tiles.is_tile_occupied(TilePoint::new(0, 0)));
        assert_eq!(
            tiles.query_tile(TilePoint::new(3, 3)).collect::<Vec<_>>(),
            vec![EntityId(5)]
        );
    }
}
