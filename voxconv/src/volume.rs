//! [`RawVolume`], a dense box of [`Voxel`]s.

use core::fmt;

use crate::math::{GridPoint, Region};

/// The contents of one voxel position.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Voxel {
    /// Nothing is here.
    #[default]
    Air,
    /// A solid voxel whose color is the given index into the owning node's
    /// [`Palette`](crate::Palette).
    Solid(u8),
}

impl Voxel {
    /// Returns whether this is [`Voxel::Air`].
    #[inline]
    pub const fn is_air(self) -> bool {
        matches!(self, Voxel::Air)
    }

    /// Returns the palette index of a solid voxel.
    #[inline]
    pub const fn color_index(self) -> Option<u8> {
        match self {
            Voxel::Air => None,
            Voxel::Solid(index) => Some(index),
        }
    }
}

/// A dense, axis-aligned box of [`Voxel`]s.
///
/// The extent of a volume is fixed at construction and is always a valid [`Region`].
/// Reading outside the extent yields [`Voxel::Air`]; writing outside it is an error.
#[derive(Clone, Eq, PartialEq)]
pub struct RawVolume {
    region: Region,
    /// Voxels in [`Region::iter_points()`] order.
    voxels: Box<[Voxel]>,
}

impl RawVolume {
    /// The largest number of voxels a single volume may hold: a cube of 512 voxels per side.
    ///
    /// [`RawVolume::new()`] refuses larger regions before allocating.
    pub const MAX_VOXELS: usize = 1 << 27;

    /// Constructs a volume filled with [`Voxel::Air`].
    ///
    /// Returns an error if `region` is invalid or has more than [`RawVolume::MAX_VOXELS`]
    /// voxels.
    ///
    /// ```
    /// use voxconv::math::Region;
    /// use voxconv::{RawVolume, Voxel};
    ///
    /// let mut volume = RawVolume::new(Region::new([0, 0, 0], [3, 3, 3])).unwrap();
    /// volume.set([1, 2, 3], Voxel::Solid(7)).unwrap();
    /// assert_eq!(volume.get([1, 2, 3]), Voxel::Solid(7));
    /// assert_eq!(volume.get([10, 10, 10]), Voxel::Air);
    /// ```
    pub fn new(region: Region) -> Result<Self, VolumeError> {
        if !region.is_valid() {
            return Err(VolumeError::InvalidRegion(region));
        }
        let count = region
            .volume()
            .filter(|&count| count <= Self::MAX_VOXELS)
            .ok_or(VolumeError::TooLarge(region))?;
        Ok(Self {
            region,
            voxels: vec![Voxel::Air; count].into_boxed_slice(),
        })
    }

    /// The extent of this volume.
    #[inline]
    pub fn region(&self) -> Region {
        self.region
    }

    fn index(&self, point: GridPoint) -> Option<usize> {
        if !self.region.contains_point(point) {
            return None;
        }
        let size = self.region.dimensions_in_voxels();
        let offset = point - self.region.lower_corner();
        let x = usize::try_from(offset.x).ok()?;
        let y = usize::try_from(offset.y).ok()?;
        let z = usize::try_from(offset.z).ok()?;
        let sy = usize::try_from(size.y).ok()?;
        let sz = usize::try_from(size.z).ok()?;
        Some((x * sy + y) * sz + z)
    }

    /// Returns the voxel at `point`, or [`Voxel::Air`] if `point` is outside the volume.
    #[inline]
    pub fn get(&self, point: impl Into<GridPoint>) -> Voxel {
        match self.index(point.into()) {
            Some(i) => self.voxels[i],
            None => Voxel::Air,
        }
    }

    /// Replaces the voxel at `point`.
    pub fn set(&mut self, point: impl Into<GridPoint>, voxel: Voxel) -> Result<(), SetVoxelError> {
        let point = point.into();
        let i = self
            .index(point)
            .ok_or(SetVoxelError::OutOfBounds { point, region: self.region })?;
        self.voxels[i] = voxel;
        Ok(())
    }

    /// Returns whether every voxel of this volume within `region` is air.
    ///
    /// Positions of `region` outside the volume count as air.
    pub fn is_empty_in(&self, region: Region) -> bool {
        match self.region.intersection(region) {
            Some(r) => r.iter_points().all(|p| self.get(p).is_air()),
            None => true,
        }
    }

    /// Returns whether every voxel is air.
    pub fn is_empty(&self) -> bool {
        self.voxels.iter().all(|v| v.is_air())
    }

    /// Number of solid voxels.
    pub fn solid_count(&self) -> usize {
        self.voxels.iter().filter(|v| !v.is_air()).count()
    }

    /// Iterates over the positions and palette indices of all solid voxels.
    pub fn iter_solid(&self) -> impl Iterator<Item = (GridPoint, u8)> + '_ {
        self.region
            .iter_points()
            .zip(self.voxels.iter())
            .filter_map(|(p, v)| Some((p, v.color_index()?)))
    }

    /// Returns the smallest region containing every solid voxel, or [`None`] if there are
    /// none.
    pub fn occupied_region(&self) -> Option<Region> {
        let occupied = self
            .iter_solid()
            .fold(Region::INVALID, |r, (p, _)| r.union_point(p));
        occupied.is_valid().then_some(occupied)
    }

    /// Copies the part of this volume that lies within `region` into a new volume whose extent
    /// is that intersection.
    ///
    /// Returns [`None`] if `region` does not overlap this volume.
    pub fn copy_region(&self, region: Region) -> Option<RawVolume> {
        let region = self.region.intersection(region)?;
        let mut copy = RawVolume::new(region).ok()?;
        for (slot, point) in copy.voxels.iter_mut().zip(region.iter_points()) {
            *slot = self.get(point);
        }
        Some(copy)
    }

    /// Returns a copy shrunk to [`RawVolume::occupied_region()`], or [`None`] if the volume
    /// is empty.
    pub fn cropped(&self) -> Option<RawVolume> {
        self.copy_region(self.occupied_region()?)
    }
}

impl fmt::Debug for RawVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawVolume")
            .field("region", &self.region)
            .field("solid", &self.solid_count())
            .finish_non_exhaustive()
    }
}

/// Error returned by [`RawVolume::new()`].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum VolumeError {
    /// The region has no voxels.
    #[error("cannot create a volume with invalid region {0:?}")]
    InvalidRegion(Region),
    /// The region has more than [`RawVolume::MAX_VOXELS`] voxels.
    #[error("cannot create a volume with region {0:?}: too many voxels")]
    TooLarge(Region),
}

/// Error returned by [`RawVolume::set()`].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum SetVoxelError {
    /// The given position is outside the volume.
    #[error("{point:?} is out of bounds of {region:?}")]
    OutOfBounds {
        /// The position that was written.
        point: GridPoint,
        /// The volume's extent.
        region: Region,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cube(size: i32) -> RawVolume {
        RawVolume::new(Region::from_lower_size([0, 0, 0], [size, size, size])).unwrap()
    }

    #[test]
    fn new_rejects_invalid_region() {
        assert_eq!(
            RawVolume::new(Region::INVALID),
            Err(VolumeError::InvalidRegion(Region::INVALID))
        );
    }

    #[test]
    fn new_is_air() {
        let v = cube(4);
        assert!(v.is_empty());
        assert_eq!(v.solid_count(), 0);
        assert_eq!(v.occupied_region(), None);
    }

    #[test]
    fn set_out_of_bounds() {
        let mut v = cube(2);
        assert_eq!(
            v.set([2, 0, 0], Voxel::Solid(1)),
            Err(SetVoxelError::OutOfBounds {
                point: GridPoint::new(2, 0, 0),
                region: v.region()
            })
        );
    }

    #[test]
    fn storage_order_matches_iter_points() {
        let region = Region::new([-1, 3, 7], [1, 4, 9]);
        let mut v = RawVolume::new(region).unwrap();
        for (i, p) in region.iter_points().enumerate() {
            v.set(p, Voxel::Solid(i as u8)).unwrap();
        }
        let solid: Vec<(GridPoint, u8)> = v.iter_solid().collect();
        assert_eq!(solid.len(), region.volume().unwrap());
        for (i, (p, c)) in solid.into_iter().enumerate() {
            assert_eq!(c, i as u8);
            assert_eq!(v.get(p), Voxel::Solid(i as u8));
        }
    }

    #[test]
    fn is_empty_in() {
        let mut v = cube(8);
        v.set([5, 5, 5], Voxel::Solid(3)).unwrap();
        assert!(v.is_empty_in(Region::new([0, 0, 0], [4, 7, 7])));
        assert!(!v.is_empty_in(Region::new([4, 4, 4], [5, 5, 5])));
        assert!(v.is_empty_in(Region::new([100, 0, 0], [101, 1, 1])));
    }

    #[test]
    fn copy_region_clips() {
        let mut v = cube(4);
        v.set([3, 3, 3], Voxel::Solid(9)).unwrap();
        let copy = v.copy_region(Region::new([2, 2, 2], [10, 10, 10])).unwrap();
        assert_eq!(copy.region(), Region::new([2, 2, 2], [3, 3, 3]));
        assert_eq!(copy.get([3, 3, 3]), Voxel::Solid(9));
        assert_eq!(copy.solid_count(), 1);
        assert!(v.copy_region(Region::new([4, 0, 0], [5, 1, 1])).is_none());
    }

    #[test]
    fn cropped() {
        let mut v = cube(10);
        v.set([2, 3, 4], Voxel::Solid(1)).unwrap();
        v.set([5, 3, 6], Voxel::Solid(2)).unwrap();
        let c = v.cropped().unwrap();
        assert_eq!(c.region(), Region::new([2, 3, 4], [5, 3, 6]));
        assert_eq!(c.get([5, 3, 6]), Voxel::Solid(2));
        assert!(cube(3).cropped().is_none());
    }

    #[test]
    fn new_rejects_too_many_voxels() {
        let region = Region::from_lower_size([0, 0, 0], [100_000, 100_000, 100_000]);
        assert_eq!(RawVolume::new(region), Err(VolumeError::TooLarge(region)));

        let limit = Region::from_lower_size([0, 0, 0], [512, 512, 512]);
        assert_eq!(limit.volume(), Some(RawVolume::MAX_VOXELS));
        let over = Region::from_lower_size([0, 0, 0], [512, 512, 513]);
        assert_eq!(RawVolume::new(over), Err(VolumeError::TooLarge(over)));
    }
}
