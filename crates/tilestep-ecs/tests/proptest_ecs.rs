//! Property-based tests for the ECS data structures.
//!
//! Random operation sequences are checked against a trivially correct model
//! (a `HashMap` / `BTreeSet`) after every step.

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;
use tilestep_ecs::prelude::*;

// ---------------------------------------------------------------------------
// TileMatrix vs HashMap model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum MatrixOp {
    Set(i32, i32, i32, u8),
    Delete(i32, i32, i32),
}

fn coord() -> impl Strategy<Value = i32> {
    -4..4i32
}

fn matrix_op_strategy() -> impl Strategy<Value = MatrixOp> {
    prop_oneof![
        (coord(), coord(), coord(), any::<u8>()).prop_map(|(x, y, z, v)| MatrixOp::Set(x, y, z, v)),
        (coord(), coord(), coord()).prop_map(|(x, y, z)| MatrixOp::Delete(x, y, z)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn tile_matrix_has_reflects_latest_op(ops in prop::collection::vec(matrix_op_strategy(), 1..60)) {
        let mut matrix = TileMatrix::new();
        let mut model: HashMap<(i32, i32, i32), u8> = HashMap::new();

        for op in ops {
            match op {
                MatrixOp::Set(x, y, z, v) => {
                    matrix.set(x, y, z, v);
                    model.insert((x, y, z), v);
                }
                MatrixOp::Delete(x, y, z) => {
                    matrix.delete(x, y, z);
                    model.remove(&(x, y, z));
                }
            }

            prop_assert_eq!(matrix.len(), model.len());
            for x in -4..4 {
                for y in -4..4 {
                    for z in -4..4 {
                        prop_assert_eq!(matrix.has(x, y, z), model.contains_key(&(x, y, z)));
                        prop_assert_eq!(matrix.get(x, y, z), model.get(&(x, y, z)));
                    }
                }
            }
        }

        // entries() is the model sorted by (z, y, x).
        let mut expected: Vec<(i32, i32, i32, u8)> =
            model.iter().map(|(&(x, y, z), &v)| (x, y, z, v)).collect();
        expected.sort_by_key(|&(x, y, z, _)| (z, y, x));
        let actual: Vec<(i32, i32, i32, u8)> =
            matrix.entries().map(|(x, y, z, v)| (x, y, z, *v)).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn next_value_is_smallest_missing(
        ops in prop::collection::vec((any::<bool>(), 0..32u32), 1..80)
    ) {
        let mut set = AutoIncrementIdentifierSet::new();
        let mut model: BTreeSet<u32> = BTreeSet::new();

        for (add, value) in ops {
            if add {
                prop_assert_eq!(set.add(value), model.insert(value));
            } else {
                prop_assert_eq!(set.remove(value), model.remove(&value));
            }
            let expected = (0..).find(|v| !model.contains(v)).unwrap();
            prop_assert_eq!(set.next_value(), expected);
            // Asking twice without an add changes nothing.
            prop_assert_eq!(set.next_value(), expected);
        }
    }

    #[test]
    fn occupancy_never_keeps_empty_cells(
        ops in prop::collection::vec((any::<bool>(), 0..4u32, -2..2i32, -2..2i32), 1..60)
    ) {
        let mut tiles = TileOccupancy::new();
        for (place, id, x, y) in ops {
            let tile = TilePoint::new(x, y);
            if place {
                tiles.place_object_in_tile(EntityId(id), tile);
            } else {
                tiles.remove_object_from_tile(EntityId(id), tile);
            }
            for (_, occupants) in tiles.occupied_cells() {
                prop_assert!(!occupants.is_empty());
            }
        }
    }
}
