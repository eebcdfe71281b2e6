//! Loading and saving [`voxconv`] scenes in voxel file formats.
//!
//! Currently supported formats:
//!
//! | Format              | Extension | Feature     | Colors        | Max model size | Caveats |
//! |---------------------|-----------|-------------|---------------|----------------|---------|
//! | voxconv JSON        | `.json`   | `"native"`  | RGBA          | unlimited      | Can embed a preview image. |
//! | MagicaVoxel `.vox`  | `.vox`    | `"dot-vox"` | 255-color palette | 256³       | Rotations are ignored on load. Materials and layers are not preserved. |
//!
//! ## Overview
//!
//! * A [`FormatDescription`] names a format and identifies its files by extension and by the
//!   first four bytes of their contents.
//! * A [`FormatRegistry`] holds the known formats and picks one for a given file.
//! * A [`Format`] wraps a codec, implementing one of [`GroupCodec`], [`PaletteCodec`] or
//!   [`RgbaCodec`], and adapts scenes to the codec's limits: models too large for it are
//!   [split](split_volumes), or all models are merged if [`FormatConfig::merge_on_save`] is set.
//! * [`load_scene_from_file()`] and [`save_scene_to_file()`] tie these together.
//!
//! ## Package features
//!
//! This package defines the following feature flags:
//!
//! * `"all-formats"`: Enables all format features.
//! * Features for each supported format as listed in the above table.
//!
//! Without any format features, the registry, conversion pipeline and codec traits are still
//! available for use with codecs defined elsewhere.

// Crate-specific lint settings. (General settings can be found in the workspace manifest.)
#![forbid(unsafe_code)]

// -------------------------------------------------------------------------------------------------

mod chunking;
pub use chunking::*;

mod config;
pub use config::*;

mod description;
pub use description::*;

mod export;
pub use export::*;

mod flatten;
pub use flatten::*;

mod format;
pub use format::*;

mod import;
pub use import::*;

mod property;
pub use property::*;

mod registry;
pub use registry::*;

pub mod file;

// Formats
#[cfg(feature = "dot-vox")]
mod mv;
#[cfg(feature = "native")]
mod native;

#[cfg(test)]
mod tests;
