//! Conversion between MagicaVoxel's Z-up coordinates and our Y-up coordinates.
//!
//! Both systems are right-handed: MagicaVoxel's Z becomes our Y, and MagicaVoxel's Y becomes
//! our negative Z. Positions of voxels within a model are additionally kept non-negative by
//! offsetting the flipped axis by the model size.

use voxconv::euclid::vec3;
use voxconv::math::{GridCoordinate, GridPoint, GridVector, checked_add_vectors};

use crate::mv::DotVoxConversionError;

/// Converts a model size, which is in MagicaVoxel axis order, to our axis order.
pub(crate) fn mv_to_our_size(size: dot_vox::Size) -> Result<GridVector, DotVoxConversionError> {
    let convert = |c: u32| {
        GridCoordinate::try_from(c)
            .ok()
            .filter(|&c| c > 0)
            .ok_or(DotVoxConversionError::ModelSizeInvalid(size))
    };
    Ok(vec3(convert(size.x)?, convert(size.z)?, convert(size.y)?))
}

/// Inverse of [`mv_to_our_size()`].
///
/// Returns [`None`] if any axis is not positive.
pub(crate) fn our_to_mv_size(size: GridVector) -> Option<dot_vox::Size> {
    let convert = |c: GridCoordinate| u32::try_from(c).ok().filter(|&c| c > 0);
    Some(dot_vox::Size {
        x: convert(size.x)?,
        y: convert(size.z)?,
        z: convert(size.y)?,
    })
}

/// Converts the position of a voxel within a model of the given size (in our axis order) to
/// our coordinates, relative to the model's lower corner.
pub(crate) fn mv_to_our_voxel(voxel: &dot_vox::Voxel, our_size: GridVector) -> GridPoint {
    GridPoint::new(
        GridCoordinate::from(voxel.x),
        GridCoordinate::from(voxel.z),
        our_size.z - 1 - GridCoordinate::from(voxel.y),
    )
}

/// Inverse of [`mv_to_our_voxel()`].
///
/// Returns [`None`] if the position is outside the range MagicaVoxel can store.
pub(crate) fn our_to_mv_voxel(
    position: GridPoint,
    our_size: GridVector,
    color_index: u8,
) -> Option<dot_vox::Voxel> {
    Some(dot_vox::Voxel {
        x: u8::try_from(position.x).ok()?,
        y: u8::try_from(our_size.z - 1 - position.z).ok()?,
        z: u8::try_from(position.y).ok()?,
        i: color_index,
    })
}

/// Converts a translation from MagicaVoxel axis order to ours.
///
/// Returns [`None`] if the flipped axis cannot be negated.
pub(crate) fn mv_to_our_vector([x, y, z]: [GridCoordinate; 3]) -> Option<GridVector> {
    Some(vec3(x, z, y.checked_neg()?))
}

/// Inverse of [`mv_to_our_vector()`].
pub(crate) fn our_to_mv_vector(vector: GridVector) -> Option<[GridCoordinate; 3]> {
    Some([vector.x, vector.z.checked_neg()?, vector.y])
}

/// MagicaVoxel positions a model by its center. Given that center and the model's size,
/// returns the position of the model's lower corner, or [`None`] on overflow.
pub(crate) fn lower_corner_from_center(
    center: GridVector,
    our_size: GridVector,
) -> Option<GridVector> {
    checked_add_vectors(center, -(our_size / 2))
}

/// Inverse of [`lower_corner_from_center()`].
pub(crate) fn center_from_lower_corner(
    lower: GridVector,
    our_size: GridVector,
) -> Option<GridVector> {
    checked_add_vectors(lower, our_size / 2)
}
