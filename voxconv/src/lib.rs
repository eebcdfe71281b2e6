//! `voxconv` is the in-memory model that voxel file conversion operates on.
//!
//! ## Data model
//!
//! * A [`SceneGraph`] is an ordered forest of [`SceneNode`]s. Nodes are either groups, which
//!   only carry a name, properties and a translation, or models, which additionally own a
//!   [`RawVolume`] of voxels.
//! * A [`RawVolume`] is a dense box of [`Voxel`]s whose extent is a [`Region`]
//!   (inclusive integer corners).
//! * Each node has a [`Palette`] of up to 256 colors; solid voxels store an index into
//!   their node's palette.
//!
//! Conversions between these types and file formats live in the `voxconv-port` crate.
//!
//! ## Coordinate system
//!
//! Voxel positions are integer [`GridPoint`]s in volume space. A node's *world* position of a
//! voxel is its volume-space position plus the node's world translation, which is the sum of
//! the local translations along its parent chain (see [`SceneGraph::update_transforms()`]).
//! The conventional "up" direction is +Y.
//!
//! ## Dependencies and global state
//!
//! `voxconv` has no global state except the immutable [`Palette::default_palette()`].
//! It writes log messages using the [`log`] crate and is therefore subject to that global
//! configuration.
//!
//! [`GridPoint`]: math::GridPoint
//! [`Region`]: math::Region

#![forbid(unsafe_code)]

pub use euclid;

/// Mathematical utilities: coordinates, [`Region`](math::Region), and colors.
pub mod math {
    pub use voxconv_base::math::*;
}

mod palette;
pub use palette::*;

mod scene;
pub use scene::*;

pub mod util;

mod volume;
pub use volume::*;
