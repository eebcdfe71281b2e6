//! Axis-aligned integer-coordinate boxes with inclusive bounds ([`Region`]).

use core::fmt;
use core::iter::FusedIterator;
use core::ops::RangeInclusive;

use euclid::vec3;

use crate::math::{GridCoordinate, GridPoint, GridVector, checked_add_vectors};

/// An axis-aligned box of voxel positions, described by its inclusive lower and upper
/// corners.
///
/// Unlike a half-open box, a [`Region`] with `lower == upper` contains exactly one voxel.
/// A region whose upper corner is less than its lower corner on any axis is *invalid*
/// and contains nothing; [`Region::INVALID`] is the canonical such value, and is what
/// scene nodes without voxel data report as their region.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    lower: GridPoint,
    upper: GridPoint,
}

impl Region {
    /// The canonical invalid region. It contains no voxels.
    pub const INVALID: Region = Region {
        lower: GridPoint::new(0, 0, 0),
        upper: GridPoint::new(-1, -1, -1),
    };

    /// Constructs a [`Region`] from its inclusive corners.
    ///
    /// No validation is performed; if any `upper` coordinate is less than the corresponding
    /// `lower` coordinate, the result is invalid (see [`Region::is_valid()`]).
    ///
    /// ```
    /// # extern crate voxconv_base as voxconv;
    /// use voxconv::math::Region;
    ///
    /// let r = Region::new([0, 0, 0], [15, 15, 15]);
    /// assert_eq!(r.volume(), Some(16 * 16 * 16));
    /// assert!(!Region::new([0, 0, 0], [-1, 5, 5]).is_valid());
    /// ```
    #[inline]
    pub fn new(lower: impl Into<GridPoint>, upper: impl Into<GridPoint>) -> Self {
        Self {
            lower: lower.into(),
            upper: upper.into(),
        }
    }

    /// Constructs a [`Region`] from its lower corner and its size in voxels.
    ///
    /// Panics if the size is not positive on every axis or the upper corner would overflow.
    /// Use [`Region::checked_from_lower_size()`] to avoid panics.
    #[track_caller]
    #[inline]
    pub fn from_lower_size(lower: impl Into<GridPoint>, size: impl Into<GridVector>) -> Self {
        Self::checked_from_lower_size(lower, size).expect("Region::from_lower_size")
    }

    /// Constructs a [`Region`] from its lower corner and its size in voxels.
    ///
    /// Returns [`Err`] if the size is not positive on every axis or the upper corner
    /// would overflow.
    #[inline]
    pub fn checked_from_lower_size(
        lower: impl Into<GridPoint>,
        size: impl Into<GridVector>,
    ) -> Result<Self, RegionError> {
        let lower = lower.into();
        let size = size.into();
        if size.x <= 0 || size.y <= 0 || size.z <= 0 {
            return Err(RegionError::NonPositiveSize {
                x: size.x,
                y: size.y,
                z: size.z,
            });
        }
        let upper = (|| {
            Some(GridPoint::new(
                lower.x.checked_add(size.x - 1)?,
                lower.y.checked_add(size.y - 1)?,
                lower.z.checked_add(size.z - 1)?,
            ))
        })()
        .ok_or(RegionError::Overflow)?;
        Ok(Self { lower, upper })
    }

    /// Returns whether the region contains at least one voxel, i.e. whether its upper corner
    /// is not less than its lower corner on any axis.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.lower.x <= self.upper.x && self.lower.y <= self.upper.y && self.lower.z <= self.upper.z
    }

    /// The inclusive lower corner.
    #[inline]
    pub fn lower_corner(&self) -> GridPoint {
        self.lower
    }

    /// The inclusive upper corner.
    #[inline]
    pub fn upper_corner(&self) -> GridPoint {
        self.upper
    }

    /// Number of voxels along each axis, `upper - lower + 1`.
    ///
    /// For an invalid region, at least one component is zero or negative.
    ///
    /// ```
    /// # extern crate voxconv_base as voxconv;
    /// use voxconv::math::Region;
    /// use voxconv::euclid::vec3;
    ///
    /// assert_eq!(
    ///     Region::new([-2, 0, 10], [1, 0, 19]).dimensions_in_voxels(),
    ///     vec3(4, 1, 10),
    /// );
    /// ```
    ///
    /// Panics on numeric overflow, which is possible only for regions wider than
    /// [`GridCoordinate::MAX`] on some axis. [`Region::volume()`] and [`Region::fits_in()`]
    /// do not have this limitation.
    #[inline]
    pub fn dimensions_in_voxels(&self) -> GridVector {
        self.upper - self.lower + vec3(1, 1, 1)
    }

    /// Like [`Region::dimensions_in_voxels()`], but computed without overflow.
    #[inline]
    fn wide_dimensions(&self) -> [i64; 3] {
        let axis = |lower: GridCoordinate, upper: GridCoordinate| {
            i64::from(upper) - i64::from(lower) + 1
        };
        [
            axis(self.lower.x, self.upper.x),
            axis(self.lower.y, self.upper.y),
            axis(self.lower.z, self.upper.z),
        ]
    }

    /// Computes the number of voxels in the region.
    ///
    /// Returns `Some(0)` for an invalid region and [`None`] if the count does not fit in a
    /// `usize`.
    #[inline]
    pub fn volume(&self) -> Option<usize> {
        if !self.is_valid() {
            return Some(0);
        }
        let [x, y, z] = self.wide_dimensions().map(usize::try_from);
        x.ok()?.checked_mul(y.ok()?)?.checked_mul(z.ok()?)
    }

    /// Returns whether this region is valid and at most `size` voxels along every axis.
    #[inline]
    pub fn fits_in(&self, size: GridVector) -> bool {
        let [x, y, z] = self.wide_dimensions();
        self.is_valid()
            && x <= i64::from(size.x)
            && y <= i64::from(size.y)
            && z <= i64::from(size.z)
    }

    /// The range of X coordinates within the region.
    #[inline]
    pub fn x_range(&self) -> RangeInclusive<GridCoordinate> {
        self.lower.x..=self.upper.x
    }

    /// The range of Y coordinates within the region.
    #[inline]
    pub fn y_range(&self) -> RangeInclusive<GridCoordinate> {
        self.lower.y..=self.upper.y
    }

    /// The range of Z coordinates within the region.
    #[inline]
    pub fn z_range(&self) -> RangeInclusive<GridCoordinate> {
        self.lower.z..=self.upper.z
    }

    /// Returns whether the region includes the given voxel position.
    ///
    /// ```
    /// # extern crate voxconv_base as voxconv;
    /// use voxconv::math::{GridPoint, Region};
    ///
    /// let r = Region::new([4, 4, 4], [9, 9, 9]);
    /// assert!(!r.contains_point(GridPoint::new(3, 5, 5)));
    /// assert!(r.contains_point(GridPoint::new(4, 5, 5)));
    /// assert!(r.contains_point(GridPoint::new(9, 5, 5)));
    /// assert!(!r.contains_point(GridPoint::new(10, 5, 5)));
    /// ```
    #[inline]
    pub fn contains_point(&self, point: GridPoint) -> bool {
        self.x_range().contains(&point.x)
            && self.y_range().contains(&point.y)
            && self.z_range().contains(&point.z)
    }

    /// Returns whether this region includes every voxel of `other`.
    ///
    /// An invalid `other` is contained by every valid region.
    #[inline]
    pub fn contains_region(&self, other: Region) -> bool {
        if !other.is_valid() {
            return self.is_valid();
        }
        self.contains_point(other.lower) && self.contains_point(other.upper)
    }

    /// Returns the region of voxels contained by both `self` and `other`, or [`None`] if
    /// there are none.
    ///
    /// ```
    /// # extern crate voxconv_base as voxconv;
    /// use voxconv::math::Region;
    ///
    /// assert_eq!(
    ///     Region::new([0, 0, 0], [1, 1, 1]).intersection(Region::new([1, 0, 0], [2, 0, 1])),
    ///     Some(Region::new([1, 0, 0], [1, 0, 1])),
    /// );
    /// assert_eq!(
    ///     Region::new([0, 0, 0], [1, 1, 1]).intersection(Region::new([2, 0, 0], [3, 1, 1])),
    ///     None,
    /// );
    /// ```
    #[inline]
    #[must_use]
    pub fn intersection(self, other: Region) -> Option<Region> {
        let result = Region {
            lower: self.lower.max(other.lower),
            upper: self.upper.min(other.upper),
        };
        result.is_valid().then_some(result)
    }

    /// Returns the smallest region which contains every voxel of both inputs.
    ///
    /// Invalid inputs are ignored; if both are invalid, `self` is returned.
    ///
    /// ```
    /// # extern crate voxconv_base as voxconv;
    /// use voxconv::math::Region;
    ///
    /// let a = Region::new([1, 2, 3], [1, 2, 3]);
    /// let b = Region::new([4, 7, 11], [4, 7, 11]);
    /// assert_eq!(a.union(b), Region::new([1, 2, 3], [4, 7, 11]));
    /// assert_eq!(a.union(Region::INVALID), a);
    /// ```
    #[inline]
    #[must_use]
    pub fn union(self, other: Region) -> Region {
        if !other.is_valid() {
            self
        } else if !self.is_valid() {
            other
        } else {
            Region {
                lower: self.lower.min(other.lower),
                upper: self.upper.max(other.upper),
            }
        }
    }

    /// Extends the region as needed to include `point`.
    ///
    /// If `self` is invalid, the result contains exactly `point`.
    #[inline]
    #[must_use]
    pub fn union_point(self, point: GridPoint) -> Region {
        self.union(Region {
            lower: point,
            upper: point,
        })
    }

    /// Displaces the region by the given `offset`, leaving its size unchanged.
    ///
    /// Returns [`None`] on numeric overflow.
    #[inline]
    pub fn checked_translate(self, offset: impl Into<GridVector>) -> Option<Self> {
        let offset = offset.into();
        Some(Self {
            lower: checked_add_vectors(self.lower.to_vector(), offset)?.to_point(),
            upper: checked_add_vectors(self.upper.to_vector(), offset)?.to_point(),
        })
    }

    /// Iterate over all voxel positions in the region.
    ///
    /// The order is X-major: the Z coordinate changes fastest.
    ///
    /// ```
    /// # extern crate voxconv_base as voxconv;
    /// use voxconv::math::{GridPoint, Region};
    ///
    /// let r = Region::new([10, 20, 30], [10, 21, 31]);
    /// assert_eq!(
    ///     r.iter_points().collect::<Vec<_>>(),
    ///     [
    ///         GridPoint::new(10, 20, 30),
    ///         GridPoint::new(10, 20, 31),
    ///         GridPoint::new(10, 21, 30),
    ///         GridPoint::new(10, 21, 31),
    ///     ]
    /// );
    /// ```
    #[inline]
    pub fn iter_points(self) -> RegionIter {
        RegionIter {
            region: self,
            next: self.is_valid().then_some(self.lower),
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Region")
            .field(&self.x_range())
            .field(&self.y_range())
            .field(&self.z_range())
            .finish()
    }
}

impl From<Region> for euclid::Box3D<GridCoordinate, crate::math::Grid> {
    /// Converts to a half-open box (exclusive upper corner).
    #[inline]
    fn from(region: Region) -> Self {
        Self {
            min: region.lower,
            max: region.upper + vec3(1, 1, 1),
        }
    }
}

/// Iterator over the voxel positions of a [`Region`], returned by [`Region::iter_points()`].
#[derive(Clone, Debug)]
pub struct RegionIter {
    region: Region,
    next: Option<GridPoint>,
}

impl Iterator for RegionIter {
    type Item = GridPoint;

    #[inline]
    fn next(&mut self) -> Option<GridPoint> {
        let current = self.next?;
        let Region { lower, upper } = self.region;
        let mut advanced = current;
        self.next = if advanced.z < upper.z {
            advanced.z += 1;
            Some(advanced)
        } else if advanced.y < upper.y {
            advanced.z = lower.z;
            advanced.y += 1;
            Some(advanced)
        } else if advanced.x < upper.x {
            advanced.z = lower.z;
            advanced.y = lower.y;
            advanced.x += 1;
            Some(advanced)
        } else {
            None
        };
        Some(current)
    }
}

impl FusedIterator for RegionIter {}

/// Error when a [`Region`] cannot be constructed from the given input.
#[derive(Clone, Copy, Debug, displaydoc::Display, Eq, PartialEq)]
#[non_exhaustive]
pub enum RegionError {
    /// region size ({x}, {y}, {z}) must be positive on every axis
    NonPositiveSize {
        /// Requested size on the X axis.
        x: GridCoordinate,
        /// Requested size on the Y axis.
        y: GridCoordinate,
        /// Requested size on the Z axis.
        z: GridCoordinate,
    },
    /// region upper corner overflows the coordinate range
    Overflow,
}

impl core::error::Error for RegionError {}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::string::ToString as _;
    use std::vec::Vec;

    #[test]
    fn single_voxel_is_valid() {
        let r = Region::new([1, 2, 3], [1, 2, 3]);
        assert!(r.is_valid());
        assert_eq!(r.volume(), Some(1));
        assert_eq!(r.dimensions_in_voxels(), vec3(1, 1, 1));
    }

    #[test]
    fn invalid_has_no_points() {
        assert!(!Region::INVALID.is_valid());
        assert_eq!(Region::INVALID.volume(), Some(0));
        assert_eq!(Region::INVALID.iter_points().count(), 0);
        assert!(!Region::INVALID.fits_in(vec3(16, 16, 16)));
    }

    #[test]
    fn from_lower_size_errors() {
        assert_eq!(
            Region::checked_from_lower_size([0, 0, 0], [0, 1, 1]),
            Err(RegionError::NonPositiveSize { x: 0, y: 1, z: 1 })
        );
        assert_eq!(
            Region::checked_from_lower_size([GridCoordinate::MAX, 0, 0], [2, 1, 1]),
            Err(RegionError::Overflow)
        );
        assert_eq!(
            RegionError::NonPositiveSize { x: 0, y: 1, z: 1 }.to_string(),
            "region size (0, 1, 1) must be positive on every axis"
        );
    }

    #[test]
    fn iteration_count_matches_volume() {
        let r = Region::new([-3, 0, 5], [0, 2, 6]);
        let points: Vec<GridPoint> = r.iter_points().collect();
        assert_eq!(Some(points.len()), r.volume());
        assert!(points.iter().all(|&p| r.contains_point(p)));
    }

    #[test]
    fn fits_in_checks_every_axis() {
        let r = Region::from_lower_size([5, 5, 5], [16, 17, 16]);
        assert!(!r.fits_in(vec3(16, 16, 16)));
        assert!(r.fits_in(vec3(16, 17, 16)));
    }

    #[test]
    fn checked_translate() {
        let r = Region::new([0, 0, 0], [1, 1, 1]);
        assert_eq!(
            r.checked_translate(vec3(5, -5, 0)),
            Some(Region::new([5, -5, 0], [6, -4, 1]))
        );
        assert_eq!(r.checked_translate(vec3(GridCoordinate::MAX, 0, 0)), None);
    }

    /// Regions spanning most of the coordinate range are measured without overflow.
    #[test]
    fn huge_region() {
        let r = Region::new([GridCoordinate::MIN, 0, 0], [GridCoordinate::MAX, 0, 0]);
        assert!(!r.fits_in(vec3(256, 256, 256)));
        assert!(!r.fits_in(vec3(GridCoordinate::MAX, 1, 1)));
        assert_eq!(r.volume(), usize::try_from(1u64 << 32).ok());
    }

    #[test]
    fn contains_region() {
        let outer = Region::new([0, 0, 0], [9, 9, 9]);
        assert!(outer.contains_region(Region::new([2, 2, 2], [9, 3, 4])));
        assert!(!outer.contains_region(Region::new([2, 2, 2], [10, 3, 4])));
    }

    #[test]
    fn debug() {
        let r = Region::new([1, 2, 3], [10, 21, 32]);
        assert_eq!(format!("{r:?}"), "Region(1..=10, 2..=21, 3..=32)");
        assert_eq!(
            format!("{r:#?}\n"),
            indoc! {"
                Region(
                    1..=10,
                    2..=21,
                    3..=32,
                )
            "}
        );
    }
}
