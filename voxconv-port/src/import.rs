use std::io::{self, Cursor};

use image::RgbaImage;
use voxconv::SceneGraph;

use crate::file::Fileish;
use crate::{CodecError, Format, FormatConfig, FormatRegistry, LoadContext, read_magic};

/// Loads the scene stored in `file`, whose format is detected by `registry` from its magic
/// bytes or, failing that, its extension.
pub fn load_scene_from_file(
    file: &dyn Fileish,
    registry: &FormatRegistry,
    config: &FormatConfig,
    ctx: &LoadContext,
) -> Result<SceneGraph, LoadError> {
    let (format, mut stream) = open(file, registry, config)?;
    let path = file.display_full_path();

    let mut graph = SceneGraph::new();
    format
        .load(&path, &mut stream, &mut graph, ctx)
        .map_err(|error| LoadError {
            source_path: path.clone(),
            detail: LoadErrorKind::Codec {
                format: format.description().name().to_owned(),
                error,
            },
        })?;

    log::info!(
        "loaded {path} as {format}: {nodes} nodes, {models} models",
        format = format.description().name(),
        nodes = graph.len(),
        models = graph.model_count(),
    );
    Ok(graph)
}

/// Loads the preview image embedded in `file`, if its format supports one and it has one.
pub fn load_screenshot_from_file(
    file: &dyn Fileish,
    registry: &FormatRegistry,
    ctx: &LoadContext,
) -> Result<Option<RgbaImage>, LoadError> {
    let (format, mut stream) = open(file, registry, &FormatConfig::default())?;
    let path = file.display_full_path();
    format
        .load_screenshot(&path, &mut stream, ctx)
        .map_err(|error| LoadError {
            source_path: path.clone(),
            detail: LoadErrorKind::Codec {
                format: format.description().name().to_owned(),
                error,
            },
        })
}

fn open(
    file: &dyn Fileish,
    registry: &FormatRegistry,
    config: &FormatConfig,
) -> Result<(Format, Cursor<Vec<u8>>), LoadError> {
    let path = file.display_full_path();
    let bytes = file.read().map_err(|error| LoadError {
        source_path: path.clone(),
        detail: LoadErrorKind::Read { error },
    })?;
    let mut stream = Cursor::new(bytes);
    let magic = read_magic(&mut stream);
    let entry = registry.detect(&path, magic).ok_or_else(|| LoadError {
        source_path: path.clone(),
        detail: LoadErrorKind::UnknownFormat {},
    })?;
    Ok((registry.create(entry, config), stream))
}

/// Fatal errors that may be encountered while loading a file.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
#[error("failed to load '{source_path}'")]
pub struct LoadError {
    /// The path, as produced by [`Fileish::display_full_path()`], of the file being loaded.
    pub source_path: String,

    #[source]
    pub(crate) detail: LoadErrorKind,
}

impl LoadError {
    /// The specific reason for the failure.
    pub fn kind(&self) -> &LoadErrorKind {
        &self.detail
    }
}

/// Specific reason why loading failed.
/// Always contained within a [`LoadError`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LoadErrorKind {
    /// An IO error occurred while reading the file.
    #[non_exhaustive]
    #[error("failed to read data")]
    Read {
        /// The IO error that occurred while reading.
        error: io::Error,
    },

    /// Neither the contents nor the name of the file identify a known format.
    #[non_exhaustive]
    #[error("the data is not in a recognized format")]
    UnknownFormat {},

    /// The codec of the detected format failed.
    #[non_exhaustive]
    #[error("failed to decode {format} data")]
    Codec {
        /// Name of the detected format.
        format: String,
        /// Error reported by the codec.
        #[source]
        error: CodecError,
    },
}
