//! Splitting scene volumes into chunks that fit a format's maximum volume size.

use std::collections::HashMap;

use voxconv::math::{GridCoordinate, GridPoint, GridVector, Region};
use voxconv::util::StopSignal;
use voxconv::{NodeId, RawVolume, SceneGraph, SceneGraphError};

// -------------------------------------------------------------------------------------------------

/// A maximum volume size whose every axis is a positive power of two.
///
/// Chunk boundaries are aligned to multiples of the chunk size, which is computed with bit
/// masks and is only correct for powers of two.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ChunkSize(GridVector);

impl ChunkSize {
    /// Constructs a [`ChunkSize`] with the same size on every axis.
    ///
    /// Panics if `size` is not a positive power of two; in a `const` context, this is a
    /// compile-time error.
    ///
    /// ```
    /// use voxconv_port::ChunkSize;
    ///
    /// const MV: ChunkSize = ChunkSize::cube(256);
    /// assert_eq!(MV.get().x, 256);
    /// ```
    #[track_caller]
    pub const fn cube(size: GridCoordinate) -> Self {
        assert!(is_power_of_two(size), "chunk size must be a positive power of two");
        Self(GridVector::new(size, size, size))
    }

    /// Constructs a [`ChunkSize`], checking that every axis is a positive power of two.
    pub fn new(size: impl Into<GridVector>) -> Result<Self, ChunkSizeError> {
        let size = size.into();
        if is_power_of_two(size.x) && is_power_of_two(size.y) && is_power_of_two(size.z) {
            Ok(Self(size))
        } else {
            Err(ChunkSizeError { size })
        }
    }

    /// The size as a vector.
    pub const fn get(self) -> GridVector {
        self.0
    }
}

const fn is_power_of_two(n: GridCoordinate) -> bool {
    n > 0 && (n & (n - 1)) == 0
}

/// Error returned by [`ChunkSize::new()`].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("chunk size {size:?} must be a positive power of two on every axis")]
pub struct ChunkSizeError {
    size: GridVector,
}

/// Whether an operation that polls a [`StopSignal`] ran to the end.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[must_use]
#[expect(clippy::exhaustive_enums)]
pub enum Completion {
    /// All input was processed.
    Complete,
    /// The stop signal was raised; output is partial and should be discarded.
    Stopped,
}

// -------------------------------------------------------------------------------------------------

/// Returns whether every voxel of `volume` in the box of the given `size` whose lower corner is
/// `lower` is air.
pub fn is_empty_block(volume: &RawVolume, size: GridVector, lower: GridPoint) -> bool {
    match Region::checked_from_lower_size(lower, size) {
        Ok(block) => volume.is_empty_in(block),
        Err(_) => true,
    }
}

/// Returns the smallest region containing `region` whose corners lie on a grid of cells of
/// size `max_size`.
///
/// ```
/// use voxconv::math::Region;
/// use voxconv_port::{ChunkSize, calc_mins_maxs};
///
/// assert_eq!(
///     calc_mins_maxs(Region::new([5, 20, -3], [17, 20, -1]), ChunkSize::cube(16)),
///     Region::new([0, 16, -16], [31, 31, -1]),
/// );
/// ```
pub fn calc_mins_maxs(region: Region, max_size: ChunkSize) -> Region {
    let size = max_size.get();
    let align = |c: GridCoordinate, s: GridCoordinate| c & !(s - 1);
    let lower = region.lower_corner();
    let upper = region.upper_corner();
    let mins = GridPoint::new(
        align(lower.x, size.x),
        align(lower.y, size.y),
        align(lower.z, size.z),
    );
    let maxs = GridPoint::new(
        align(upper.x, size.x) + size.x - 1,
        align(upper.y, size.y) + size.y - 1,
        align(upper.z, size.z) + size.z - 1,
    );
    log::debug!("{region:?} aligns to mins {mins:?} maxs {maxs:?}");
    Region::new(mins, maxs)
}

/// Copies every model of `source` into `destination`, splitting models larger than `max_size`
/// into aligned chunks.
///
/// * A model that already fits is copied as-is, together with the chain of groups above it,
///   so that its placement and group membership are unchanged.
/// * A model that does not fit is cut along the cells of [`calc_mins_maxs()`]. Each cell that
///   contains any solid voxels becomes a new root node with the source node's name, palette,
///   properties and world translation. If `crop` is true, each chunk is further shrunk to its
///   occupied voxels.
///
/// Models without voxel data are skipped. `stop` is polled before each model and each
/// chunk; if it is raised, [`Completion::Stopped`] is returned and `destination` holds a
/// partial result.
pub fn split_volumes(
    source: &SceneGraph,
    destination: &mut SceneGraph,
    max_size: ChunkSize,
    crop: bool,
    stop: &StopSignal,
) -> Result<Completion, SceneGraphError> {
    destination.reserve(source.len());
    let mut copied: HashMap<NodeId, NodeId> = HashMap::new();

    for (id, node) in source.iter_models() {
        if stop.should_stop() {
            return Ok(Completion::Stopped);
        }
        let region = node.region();
        let Some(volume) = node.volume().filter(|_| region.is_valid()) else {
            log::debug!("invalid region for node {id:?}");
            continue;
        };

        if region.fits_in(max_size.get()) {
            log::debug!("no split needed for node “{}”", node.name());
            let parent = copy_ancestors(source, destination, id, &mut copied)?;
            let new_id = destination.add_node(node.clone(), parent)?;
            copied.insert(id, new_id);
            continue;
        }

        log::debug!("split needed for node “{}”", node.name());
        let cells = calc_mins_maxs(region, max_size);
        let step = max_size.get();
        for x in cells.x_range().step_by(step.x as usize) {
            for y in cells.y_range().step_by(step.y as usize) {
                for z in cells.z_range().step_by(step.z as usize) {
                    if stop.should_stop() {
                        return Ok(Completion::Stopped);
                    }
                    let lower = GridPoint::new(x, y, z);
                    if is_empty_block(volume, step, lower) {
                        continue;
                    }
                    let Some(cell) = Region::from_lower_size(lower, step).intersection(region)
                    else {
                        continue;
                    };
                    let chunk = if crop {
                        volume.copy_region(cell).and_then(|v| v.cropped())
                    } else {
                        volume.copy_region(cell)
                    };
                    if let Some(chunk) = chunk {
                        destination.add_node(node.with_volume(chunk), None)?;
                    }
                }
            }
        }
    }
    Ok(Completion::Complete)
}

/// Makes sure that the ancestors of `id` in `source` exist in `destination` and returns the
/// copy of its parent.
fn copy_ancestors(
    source: &SceneGraph,
    destination: &mut SceneGraph,
    id: NodeId,
    copied: &mut HashMap<NodeId, NodeId>,
) -> Result<Option<NodeId>, SceneGraphError> {
    let ancestors: Vec<NodeId> = source.ancestors(id).collect();
    let mut parent = None;
    for &ancestor in ancestors.iter().rev() {
        parent = Some(match copied.get(&ancestor) {
            Some(&existing) => existing,
            None => {
                let Some(node) = source.node(ancestor) else {
                    break;
                };
                let new_id = destination.add_node(node.as_group(), parent)?;
                copied.insert(ancestor, new_id);
                new_id
            }
        });
    }
    Ok(parent)
}

// -------------------------------------------------------------------------------------------------
