//! Unit-tagged numeric types.
//!
//! Tile space, pixel space and tile velocity are distinct nominal types so
//! that mixing them is a compile error. Every conversion is an explicit
//! function; there are no `From` impls between units.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::EcsError;

// ---------------------------------------------------------------------------
// TileCoord
// ---------------------------------------------------------------------------

/// A coordinate along one axis of the tile grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TileCoord(pub i32);

impl TileCoord {
    /// Convert an externally supplied number into a tile coordinate.
    ///
    /// Fails with [`EcsError::InvalidCoordinate`] unless `value` is a finite
    /// integer that fits in an `i32`.
    pub fn try_from_f64(value: f64) -> Result<Self, EcsError> {
        Ok(Self(assert_int(value)?))
    }

    /// The pixel position of this tile's origin for a given tile size.
    pub fn to_pixels(self, tile_size: Pixels) -> Pixels {
        Pixels(self.0 as f32 * tile_size.0)
    }
}

impl Add<TileStep> for TileCoord {
    type Output = TileCoord;

    fn add(self, rhs: TileStep) -> TileCoord {
        TileCoord(self.0 + rhs.0)
    }
}

impl AddAssign<TileStep> for TileCoord {
    fn add_assign(&mut self, rhs: TileStep) {
        self.0 += rhs.0;
    }
}

impl Sub for TileCoord {
    type Output = TileStep;

    fn sub(self, rhs: TileCoord) -> TileStep {
        TileStep(self.0 - rhs.0)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TileStep
// ---------------------------------------------------------------------------

/// A signed displacement in tiles per step (tile-space velocity).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TileStep(pub i32);

impl TileStep {
    pub const ZERO: TileStep = TileStep(0);

    /// -1, 0 or 1 depending on the sign of the step.
    pub fn signum(self) -> TileStep {
        TileStep(self.0.signum())
    }
}

impl Neg for TileStep {
    type Output = TileStep;

    fn neg(self) -> TileStep {
        TileStep(-self.0)
    }
}

// ---------------------------------------------------------------------------
// Pixels
// ---------------------------------------------------------------------------

/// A length or coordinate in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pixels(pub f32);

impl Pixels {
    /// The tile containing this pixel coordinate (floor division).
    ///
    /// Fails with [`EcsError::InvalidCoordinate`] if the result is not finite
    /// or if `tile_size` is zero.
    pub fn to_tile(self, tile_size: Pixels) -> Result<TileCoord, EcsError> {
        let tile = (self.0 / tile_size.0).floor() as f64;
        TileCoord::try_from_f64(tile)
    }

    /// Linear interpolation between two pixel coordinates.
    pub fn lerp(self, to: Pixels, t: f32) -> Pixels {
        self + (to - self) * t.clamp(0.0, 1.0)
    }
}

impl Add for Pixels {
    type Output = Pixels;

    fn add(self, rhs: Pixels) -> Pixels {
        Pixels(self.0 + rhs.0)
    }
}

impl Sub for Pixels {
    type Output = Pixels;

    fn sub(self, rhs: Pixels) -> Pixels {
        Pixels(self.0 - rhs.0)
    }
}

impl Mul<f32> for Pixels {
    type Output = Pixels;

    fn mul(self, rhs: f32) -> Pixels {
        Pixels(self.0 * rhs)
    }
}

// ---------------------------------------------------------------------------
// TilePoint / TileRect
// ---------------------------------------------------------------------------

/// A position on the tile grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TilePoint {
    pub x: TileCoord,
    pub y: TileCoord,
}

impl TilePoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x: TileCoord(x),
            y: TileCoord(y),
        }
    }

    /// The point displaced by `(dx, dy)`.
    pub fn offset(self, dx: TileStep, dy: TileStep) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl fmt::Display for TilePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An inclusive rectangle of tiles (the area an action touches).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRect {
    pub min: TilePoint,
    pub max: TilePoint,
}

impl TileRect {
    /// A rectangle covering exactly one tile.
    pub fn single(point: TilePoint) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// The bounding rectangle of two tiles.
    pub fn spanning(a: TilePoint, b: TilePoint) -> Self {
        Self {
            min: TilePoint {
                x: a.x.min(b.x),
                y: a.y.min(b.y),
            },
            max: TilePoint {
                x: a.x.max(b.x),
                y: a.y.max(b.y),
            },
        }
    }

    pub fn contains(&self, point: TilePoint) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }
}

/// The `assertInts` precondition: `value` must be a finite integer in `i32`
/// range.
pub fn assert_int(value: f64) -> Result<i32, EcsError> {
    if value.is_finite()
        && value.fract() == 0.0
        && value >= i32::MIN as f64
        && value <= i32::MAX as f64
    {
        Ok(value as i32)
    } else {
        Err(EcsError::InvalidCoordinate { value })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_arithmetic_goes_through_steps() {
        let start = TileCoord(10);
        let moved = start + TileStep(2);
        assert_eq!(moved, TileCoord(12));
        assert_eq!(moved - start, TileStep(2));
    }

    #[test]
    fn pixel_conversion_floors_negative_values() {
        let size = Pixels(16.0);
        assert_eq!(TileCoord(3).to_pixels(size), Pixels(48.0));
        assert_eq!(Pixels(-1.0).to_tile(size).unwrap(), TileCoord(-1));
        assert_eq!(Pixels(31.9).to_tile(size).unwrap(), TileCoord(1));
    }

    #[test]
    fn non_integer_coordinates_are_rejected() {
        assert!(TileCoord::try_from_f64(1.5).is_err());
        assert!(TileCoord::try_from_f64(f64::NAN).is_err());
        assert!(TileCoord::try_from_f64(1e12).is_err());
        assert_eq!(TileCoord::try_from_f64(-4.0).unwrap(), TileCoord(-4));
    }

    #[test]
    fn rect_spanning_is_order_independent() {
        let a = TilePoint::new(3, -1);
        let b = TilePoint::new(1, 2);
        let rect = TileRect::spanning(a, b);
        assert_eq!(rect, TileRect::spanning(b, a));
        assert!(rect.contains(TilePoint::new(2, 0)));
        assert!(!rect.contains(TilePoint::new(4, 0)));
    }
}
