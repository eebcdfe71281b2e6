//! The contract every format codec implements, and [`Format`], which adapts scenes to a
//! codec's limits before handing them over.

use std::error::Error;
use std::fmt;
use std::io::{self, Seek as _, SeekFrom};
use std::sync::Arc;

use image::RgbaImage;

use voxconv::math::{GridVector, Rgba8};
use voxconv::util::StopSignal;
use voxconv::{MergeError, Palette, SceneGraph, SceneGraphError, VolumeError};

use crate::{
    ChunkSize, Completion, FormatConfig, FormatDescription, PaletteLookup, flatten_rgb,
    split_volumes,
};


// -------------------------------------------------------------------------------------------------

/// A seekable byte source that codecs read from.
pub trait ReadStream: io::Read + io::Seek {}
impl<T: io::Read + io::Seek + ?Sized> ReadStream for T {}

/// A seekable byte sink that codecs write to.
pub trait WriteStream: io::Write + io::Seek {}
impl<T: io::Write + io::Seek + ?Sized> WriteStream for T {}

/// Function that renders a preview image of a scene.
///
/// Supplied by the application through [`SaveContext::with_thumbnail_creator()`], since
/// rendering is not a concern of this library.
pub type ThumbnailCreator =
    dyn Fn(&SceneGraph, &ThumbnailContext) -> Option<RgbaImage> + Send + Sync;

/// Parameters for a [`ThumbnailCreator`].
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct ThumbnailContext {
    /// Width and height of the image to create, in pixels.
    pub size: [u32; 2],
}

impl Default for ThumbnailContext {
    fn default() -> Self {
        Self { size: [128, 128] }
    }
}

/// Runs `creator`, if there is one.
pub fn create_thumbnail(
    graph: &SceneGraph,
    creator: Option<&ThumbnailCreator>,
    ctx: &ThumbnailContext,
) -> Option<RgbaImage> {
    let Some(creator) = creator else {
        log::debug!("no thumbnail creator configured");
        return None;
    };
    creator(graph, ctx)
}

/// Options for one load operation.
#[derive(Clone, Debug, Default)]
pub struct LoadContext {
    stop: StopSignal,
}

impl LoadContext {
    /// Constructs a context with a fresh, unraised stop signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `stop` to cancel the load.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Signal polled between nodes.
    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }
}

/// Options for one save operation.
#[derive(Clone, Default)]
pub struct SaveContext {
    stop: StopSignal,
    thumbnail_creator: Option<Arc<ThumbnailCreator>>,
    thumbnail: ThumbnailContext,
}

impl SaveContext {
    /// Constructs a context with a fresh stop signal and no thumbnail creator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `stop` to cancel the save.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Sets the function used to create thumbnails for formats that embed one.
    #[must_use]
    pub fn with_thumbnail_creator(mut self, creator: Arc<ThumbnailCreator>) -> Self {
        self.thumbnail_creator = Some(creator);
        self
    }

    /// Sets the parameters passed to the thumbnail creator.
    #[must_use]
    pub fn with_thumbnail_context(mut self, ctx: ThumbnailContext) -> Self {
        self.thumbnail = ctx;
        self
    }

    /// Signal polled between nodes and chunks.
    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Creates a thumbnail of `graph` with the configured creator, if any.
    pub fn create_thumbnail(&self, graph: &SceneGraph) -> Option<RgbaImage> {
        create_thumbnail(graph, self.thumbnail_creator.as_deref(), &self.thumbnail)
    }
}

impl fmt::Debug for SaveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            stop,
            thumbnail_creator,
            thumbnail,
        } = self;
        f.debug_struct("SaveContext")
            .field("stop", stop)
            .field("thumbnail_creator", &thumbnail_creator.is_some())
            .field("thumbnail", thumbnail)
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------

/// Operations shared by codecs of every [`FormatKind`].
pub trait Codec: fmt::Debug + Send + Sync {
    /// Largest volume a single model may have in this format, or [`None`] if unlimited.
    fn max_size(&self) -> Option<ChunkSize>;

    /// Encodes `graph` to `stream`.
    ///
    /// [`Format::save()`] has already made sure every model fits within
    /// [`max_size()`](Self::max_size).
    fn save_groups(
        &self,
        graph: &SceneGraph,
        filename: &str,
        stream: &mut dyn WriteStream,
        ctx: &SaveContext,
    ) -> Result<(), CodecError>;

    /// Decodes the preview image embedded in the file, if the format has one.
    fn load_screenshot(
        &self,
        filename: &str,
        stream: &mut dyn ReadStream,
        ctx: &LoadContext,
    ) -> Result<Option<RgbaImage>, CodecError> {
        _ = (stream, ctx);
        log::debug!("{filename} doesn't have a supported embedded screenshot");
        Ok(None)
    }
}

/// Codec for a format that loads complete nodes, palettes included, by itself.
pub trait GroupCodec: Codec {
    /// Decodes the file into `graph`.
    fn load_groups(
        &self,
        filename: &str,
        stream: &mut dyn ReadStream,
        graph: &mut SceneGraph,
        ctx: &LoadContext,
    ) -> Result<(), CodecError>;
}

/// Codec for a format whose voxels are indices into a palette stored in the file.
pub trait PaletteCodec: Codec {
    /// Decodes the file into `graph`, storing the file's palette into `palette`.
    fn load_groups_palette(
        &self,
        filename: &str,
        stream: &mut dyn ReadStream,
        graph: &mut SceneGraph,
        palette: &mut Palette,
        ctx: &LoadContext,
    ) -> Result<(), CodecError>;

    /// Reads only the palette of the file, returning its number of colors.
    ///
    /// The default implementation decodes the whole file and discards the scene.
    fn load_palette(
        &self,
        filename: &str,
        stream: &mut dyn ReadStream,
        palette: &mut Palette,
        ctx: &LoadContext,
    ) -> Result<usize, CodecError> {
        let mut discarded = SceneGraph::new();
        self.load_groups_palette(filename, stream, &mut discarded, palette, ctx)?;
        Ok(palette.len())
    }
}

/// Codec for a format that stores a color per voxel rather than palette indices.
pub trait RgbaCodec: Codec {
    /// Reads a palette embedded in the file, returning its number of colors; 0 means the file
    /// has none.
    ///
    /// This is only a probe: [`Format::load()`] restores the stream position afterwards.
    /// The default implementation finds no palette.
    fn load_palette(
        &self,
        filename: &str,
        stream: &mut dyn ReadStream,
        palette: &mut Palette,
        ctx: &LoadContext,
    ) -> Result<usize, CodecError> {
        _ = (filename, stream, palette, ctx);
        Ok(0)
    }

    /// Decodes the file into `graph`, converting each voxel color to a palette index with
    /// `lookup`. Nodes should use `lookup.palette()` as their palette.
    fn load_groups_rgba(
        &self,
        filename: &str,
        stream: &mut dyn ReadStream,
        graph: &mut SceneGraph,
        lookup: &mut PaletteLookup<'_>,
        ctx: &LoadContext,
    ) -> Result<(), CodecError>;
}

/// A codec together with the color model that determines how [`Format::load()`] drives it.
#[derive(Debug)]
#[non_exhaustive]
pub enum FormatKind {
    /// The codec builds nodes and palettes itself.
    Generic(Box<dyn GroupCodec>),
    /// Voxels index a palette stored in the file.
    PaletteIndexed(Box<dyn PaletteCodec>),
    /// Voxels carry their own colors, which are mapped onto a palette while loading.
    DirectRgba(Box<dyn RgbaCodec>),
}

impl FormatKind {
    fn codec(&self) -> &dyn Codec {
        match self {
            FormatKind::Generic(codec) => &**codec,
            FormatKind::PaletteIndexed(codec) => &**codec,
            FormatKind::DirectRgba(codec) => &**codec,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// A file format: its description, its codec, and the configuration it was created with.
///
/// A [`Format`] holds no state besides these, and may be reused for any number of loads and
/// saves.
#[derive(Debug)]
pub struct Format {
    description: FormatDescription,
    kind: FormatKind,
    config: FormatConfig,
}

impl Format {
    /// Combines the parts of a format.
    pub fn new(description: FormatDescription, kind: FormatKind, config: FormatConfig) -> Self {
        Self {
            description,
            kind,
            config,
        }
    }

    /// The description of this format.
    pub fn description(&self) -> &FormatDescription {
        &self.description
    }

    /// The codec and its color model.
    pub fn kind(&self) -> &FormatKind {
        &self.kind
    }

    /// The configuration this format was created with.
    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    /// Largest volume a single model may have, or [`None`] if unlimited.
    pub fn max_size(&self) -> Option<ChunkSize> {
        self.kind.codec().max_size()
    }

    /// Whether scenes are merged into a single volume before saving.
    pub fn single_volume(&self) -> bool {
        self.config.merge_on_save
    }

    /// Applies this format's configured [`flatten_rgb()`] factor to `color`.
    pub fn flatten_rgb(&self, color: Rgba8) -> Rgba8 {
        flatten_rgb(color, self.config.rgb_flatten_factor)
    }

    /// Saves `graph` to `stream`.
    ///
    /// * If some model exceeds [`Format::max_size()`] and the format is in
    ///   [single-volume](Self::single_volume) mode, the scene cannot be represented and
    ///   [`SaveError::NotRepresentable`] is returned.
    /// * Otherwise, in single-volume mode, all models are [merged](SceneGraph::merge) into one,
    ///   unless their combined extent exceeds [`Format::max_size()`], which is also
    ///   [`SaveError::NotRepresentable`].
    /// * Otherwise, if some model is too large, models are [split](split_volumes).
    /// * Otherwise, `graph` is passed to the codec unchanged.
    ///
    /// `graph` itself is never modified.
    pub fn save(
        &self,
        graph: &SceneGraph,
        filename: &str,
        stream: &mut dyn WriteStream,
        ctx: &SaveContext,
    ) -> Result<(), SaveError> {
        let max_size = self.max_size();
        let needs_split = max_size.is_some_and(|max| {
            graph.iter_models().any(|(_, node)| {
                let region = node.region();
                let too_large = region.is_valid() && !region.fits_in(max.get());
                if too_large {
                    log::debug!(
                        "need to split node “{name}” because it exceeds the max size {max:?}",
                        name = node.name(),
                        max = max.get(),
                    );
                }
                too_large
            })
        });

        if needs_split && self.single_volume() {
            return Err(self.not_representable(
                "a model exceeds the maximum volume size and merging is enabled",
            ));
        }

        if self.single_volume() {
            let combined = graph.region();
            if let Some(max) = max_size
                && combined.is_valid()
                && !combined.fits_in(max.get())
            {
                return Err(self.not_representable(
                    "the merged models exceed the maximum volume size",
                ));
            }
            let merged = graph.merge().map_err(|error| match error {
                MergeError::Empty => SaveError::EmptyScene,
                MergeError::Volume(source) => self.not_representable(&source.to_string()),
                error => self.not_representable(&error.to_string()),
            })?;
            let name = graph
                .iter_models()
                .next()
                .map_or_else(String::new, |(_, node)| node.name().to_owned());
            return self.save_groups(&merged.into_scene_graph(name), filename, stream, ctx);
        }

        if let (true, Some(max)) = (needs_split, max_size) {
            let mut split = SceneGraph::new();
            let completion = split_volumes(graph, &mut split, max, false, ctx.stop_signal())
                .map_err(|error| self.codec_error(error.into()))?;
            return match completion {
                Completion::Complete => self.save_groups(&split, filename, stream, ctx),
                Completion::Stopped => Err(SaveError::Cancelled),
            };
        }

        self.save_groups(graph, filename, stream, ctx)
    }

    fn save_groups(
        &self,
        graph: &SceneGraph,
        filename: &str,
        stream: &mut dyn WriteStream,
        ctx: &SaveContext,
    ) -> Result<(), SaveError> {
        self.kind
            .codec()
            .save_groups(graph, filename, stream, ctx)
            .map_err(|error| self.codec_error(error))
    }

    fn not_representable(&self, reason: &str) -> SaveError {
        log::error!(
            "failed to save: {format} cannot represent this scene graph: {reason}",
            format = self.description.name()
        );
        SaveError::NotRepresentable {
            format: self.description.name().to_owned(),
            reason: reason.to_owned(),
        }
    }

    fn codec_error(&self, source: CodecError) -> SaveError {
        SaveError::Codec {
            format: self.description.name().to_owned(),
            source,
        }
    }

    /// Loads the file in `stream` into `graph`, then recomputes world transforms.
    ///
    /// For [`FormatKind::DirectRgba`] formats with
    /// [`FormatConfig::create_palette_on_load`] set, the file is first probed for an embedded
    /// palette; the stream is returned to its original position afterwards whether or not
    /// that succeeds. Without an embedded palette, the
    /// [default palette](Palette::default_palette) is used.
    pub fn load(
        &self,
        filename: &str,
        stream: &mut dyn ReadStream,
        graph: &mut SceneGraph,
        ctx: &LoadContext,
    ) -> Result<(), CodecError> {
        match &self.kind {
            FormatKind::Generic(codec) => codec.load_groups(filename, stream, graph, ctx)?,
            FormatKind::PaletteIndexed(codec) => {
                let mut palette = Palette::new();
                codec.load_groups_palette(filename, stream, graph, &mut palette, ctx)?;
            }
            FormatKind::DirectRgba(codec) => {
                let palette = if self.config.create_palette_on_load {
                    probe_palette(&**codec, filename, stream, ctx)?
                } else {
                    Palette::default_palette().clone()
                };
                let mut lookup = PaletteLookup::new(&palette, self.config.rgb_flatten_factor);
                codec.load_groups_rgba(filename, stream, graph, &mut lookup, ctx)?;
            }
        }
        graph.update_transforms()?;
        Ok(())
    }

    /// Reads only the palette stored in the file, returning its number of colors.
    ///
    /// Returns 0 if the file has no palette or the format cannot read one on its own.
    pub fn load_palette(
        &self,
        filename: &str,
        stream: &mut dyn ReadStream,
        palette: &mut Palette,
        ctx: &LoadContext,
    ) -> Result<usize, CodecError> {
        match &self.kind {
            FormatKind::Generic(_) => {
                log::debug!("{} has no separately loadable palette", self.description.name());
                Ok(0)
            }
            FormatKind::PaletteIndexed(codec) => codec.load_palette(filename, stream, palette, ctx),
            FormatKind::DirectRgba(codec) => codec.load_palette(filename, stream, palette, ctx),
        }
    }

    /// Decodes the preview image embedded in the file, if there is one.
    pub fn load_screenshot(
        &self,
        filename: &str,
        stream: &mut dyn ReadStream,
        ctx: &LoadContext,
    ) -> Result<Option<RgbaImage>, CodecError> {
        self.kind.codec().load_screenshot(filename, stream, ctx)
    }
}

/// Reads the embedded palette of an RGBA file, leaving the stream where it started.
fn probe_palette(
    codec: &dyn RgbaCodec,
    filename: &str,
    stream: &mut dyn ReadStream,
    ctx: &LoadContext,
) -> Result<Palette, CodecError> {
    let checkpoint = stream.stream_position()?;
    let mut stream = scopeguard::guard(stream, |stream| {
        if let Err(error) = stream.seek(SeekFrom::Start(checkpoint)) {
            log::warn!("failed to restore stream position after palette probe: {error}");
        }
    });

    let mut palette = Palette::new();
    match codec.load_palette(filename, &mut **stream, &mut palette, ctx) {
        Ok(count) if count > 0 => Ok(palette),
        Ok(_) => {
            log::debug!("{filename} has no embedded palette; using the default palette");
            Ok(Palette::default_palette().clone())
        }
        Err(error) => {
            log::debug!(
                "could not read embedded palette of {filename}; using the default palette: {error}"
            );
            Ok(Palette::default_palette().clone())
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Failure of a codec while encoding or decoding.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CodecError {
    /// Reading or writing the stream failed.
    #[error("I/O error")]
    Io(#[from] io::Error),

    /// The data did not match the expected format, or was invalid as defined by that format.
    #[error("failed to parse the data")]
    Parse(#[source] Box<dyn Error + Send + Sync>),

    /// The scene contains something the format cannot store.
    #[error("cannot be represented: {reason}")]
    NotRepresentable {
        /// Explanation of what could not be stored.
        reason: String,
    },

    /// A decoded volume could not be created.
    #[error("invalid volume")]
    Volume(#[from] VolumeError),

    /// A decoded node could not be inserted into the scene graph.
    #[error("invalid scene structure")]
    Scene(#[from] SceneGraphError),

    /// The stop signal was raised.
    #[error("operation was cancelled")]
    Cancelled,
}

/// Fatal errors that may be encountered by [`Format::save()`] and [`save_scene_to_path()`].
///
/// [`save_scene_to_path()`]: crate::save_scene_to_path
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SaveError {
    /// The scene does not fit the constraints of the format and cannot be adapted to them.
    #[error("could not convert the scene to {format}: {reason}")]
    NotRepresentable {
        /// Name of the format.
        format: String,
        /// The reason why it cannot be represented.
        reason: String,
    },

    /// There were no voxels to save and the format requires exactly one volume.
    #[error("the scene contains no voxels")]
    EmptyScene,

    /// The stop signal was raised before the codec ran.
    #[error("saving was cancelled")]
    Cancelled,

    /// The codec failed.
    #[error("could not encode {format} data")]
    Codec {
        /// Name of the format.
        format: String,
        /// Error reported by the codec.
        #[source]
        source: CodecError,
    },

    /// The destination file could not be created or written.
    #[error("could not write '{path}'")]
    Write {
        /// Path of the destination.
        path: String,
        /// Error that occurred.
        #[source]
        error: io::Error,
    },

    /// No known format matches the destination file name.
    #[error("'{path}' does not have the extension of a known format")]
    UnknownFormat {
        /// Path of the destination.
        path: String,
    },
}

/// Checks whether `size` is small enough to be stored in a format with maximum `max`.
/// Used by codecs to double-check their input.
pub(crate) fn check_fits(size: GridVector, max: Option<ChunkSize>) -> Result<(), CodecError> {
    match max {
        Some(max) if !voxconv::math::all_less_than_or_equal(size, max.get()) => {
            Err(CodecError::NotRepresentable {
                reason: format!("volume of size {size:?} exceeds the maximum {:?}", max.get()),
            })
        }
        _ => Ok(()),
    }
}
