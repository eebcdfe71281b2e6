//! Import and export of MagicaVoxel `.vox` files.

use std::io::Read as _;

use voxconv::{Palette, SceneGraph};

use crate::{
    ChunkSize, Codec, CodecError, Format, FormatConfig, FormatDescription, FormatFlags,
    FormatKind, LoadContext, PaletteCodec, ReadStream, SaveContext, WriteStream,
};

mod coord;
mod error;
mod export;
mod import;
#[cfg(test)]
mod tests;

pub(crate) use error::DotVoxConversionError;

/// Transform attribute holding the name of the node below it.
const NAME_ATTRIBUTE: &str = "_name";

/// Version number written to exported files.
const VERSION: u32 = 150;

/// Coordinates within a model are stored as single bytes.
const MAX_SIZE: ChunkSize = ChunkSize::cube(256);

pub(crate) fn description() -> FormatDescription {
    FormatDescription::new(
        "MagicaVoxel",
        ["vox"],
        Some(is_vox),
        FormatFlags::EMBEDDED_PALETTE,
    )
}

fn is_vox(magic: u32) -> bool {
    magic == u32::from_be_bytes(*b"VOX ")
}

pub(crate) fn format(config: &FormatConfig) -> Format {
    Format::new(
        description(),
        FormatKind::PaletteIndexed(Box::new(DotVoxCodec)),
        config.clone(),
    )
}

/// Codec for MagicaVoxel files, which index a palette of up to 256 colors.
#[derive(Debug)]
struct DotVoxCodec;

impl DotVoxCodec {
    fn read(stream: &mut dyn ReadStream) -> Result<dot_vox::DotVoxData, CodecError> {
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        Ok(import::parse(&bytes)?)
    }
}

impl Codec for DotVoxCodec {
    fn max_size(&self) -> Option<ChunkSize> {
        Some(MAX_SIZE)
    }

    fn save_groups(
        &self,
        graph: &SceneGraph,
        filename: &str,
        stream: &mut dyn WriteStream,
        ctx: &SaveContext,
    ) -> Result<(), CodecError> {
        if ctx.stop_signal().should_stop() {
            return Err(CodecError::Cancelled);
        }
        let data = export::scene_to_dot_vox_data(graph)?;
        log::debug!(
            "writing {filename}: {models} models, {nodes} scene nodes",
            models = data.models.len(),
            nodes = data.scenes.len(),
        );
        let mut writer = stream;
        data.write_vox(&mut writer)?;
        Ok(())
    }
}

impl PaletteCodec for DotVoxCodec {
    fn load_groups_palette(
        &self,
        filename: &str,
        stream: &mut dyn ReadStream,
        graph: &mut SceneGraph,
        palette: &mut Palette,
        ctx: &LoadContext,
    ) -> Result<(), CodecError> {
        log::debug!("reading {filename}");
        let data = Self::read(stream)?;
        import::dot_vox_data_to_scene(&data, graph, palette, ctx)?;
        Ok(())
    }

    fn load_palette(
        &self,
        _filename: &str,
        stream: &mut dyn ReadStream,
        palette: &mut Palette,
        _ctx: &LoadContext,
    ) -> Result<usize, CodecError> {
        let data = Self::read(stream)?;
        *palette = import::dot_vox_palette(&data.palette);
        Ok(palette.len())
    }
}
