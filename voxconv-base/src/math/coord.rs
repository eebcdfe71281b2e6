//! Numeric types used for coordinates and related quantities.

use euclid::{Point3D, Vector3D};

/// Unit-of-measure type for positions on the voxel grid.
///
/// Scene-space and volume-space positions both use this unit; they differ only by a
/// node's translation.
#[expect(clippy::exhaustive_enums)]
#[derive(Debug)]
pub enum Grid {}

/// Coordinates that are locked to the voxel grid.
pub type GridCoordinate = i32;

/// Positions that are locked to the voxel grid.
pub type GridPoint = Point3D<GridCoordinate, Grid>;

/// Vectors that are locked to the voxel grid.
///
/// Also used for box dimensions, since a format's size limit may use negative values
/// as "no limit".
pub type GridVector = Vector3D<GridCoordinate, Grid>;

/// Returns whether every component of `a` is less than or equal to the same component of `b`.
#[inline]
pub fn all_less_than_or_equal(a: GridVector, b: GridVector) -> bool {
    a.x <= b.x && a.y <= b.y && a.z <= b.z
}

/// Componentwise [`GridCoordinate::checked_add()`] of two vectors.
///
/// Returns [`None`] if any component overflows.
#[inline]
pub fn checked_add_vectors(a: GridVector, b: GridVector) -> Option<GridVector> {
    Some(GridVector::new(
        a.x.checked_add(b.x)?,
        a.y.checked_add(b.y)?,
        a.z.checked_add(b.z)?,
    ))
}
