//! The JSON scene format native to this library, which stores voxel colors directly and can
//! embed a preview image.

use std::io::{self, Write as _};

use base64::Engine as _;
use image::RgbaImage;

use voxconv::math::{Region, RegionError, Rgba8};
use voxconv::{NodeId, Palette, RawVolume, SceneGraph, SceneNode, Voxel};

use crate::{
    ChunkSize, Codec, CodecError, Format, FormatConfig, FormatDescription, FormatFlags,
    FormatKind, LoadContext, PaletteLookup, ReadStream, RgbaCodec, SaveContext, WriteStream,
};

mod schema;
use schema::{ModelSer, NodeSer, SceneSer, ScreenshotSer};


const BASE64_ENGINE: base64::engine::GeneralPurpose =
    base64::engine::general_purpose::STANDARD_NO_PAD;

pub(crate) fn description() -> FormatDescription {
    FormatDescription::new(
        "voxconv JSON",
        ["json"],
        Some(is_json_object),
        FormatFlags::EMBEDDED_PALETTE | FormatFlags::EMBEDDED_SCREENSHOT,
    )
}

fn is_json_object(magic: u32) -> bool {
    magic >> 24 == u32::from(b'{')
}

pub(crate) fn format(config: &FormatConfig) -> Format {
    Format::new(
        description(),
        FormatKind::DirectRgba(Box::new(JsonCodec)),
        config.clone(),
    )
}

/// Errors in JSON data that is syntactically valid but does not describe a scene.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub(crate) enum NativeError {
    #[error("node {node} refers to parent {parent}, which does not precede it")]
    InvalidParent { node: usize, parent: usize },

    #[error("model of node {node} has an invalid extent")]
    InvalidRegion {
        node: usize,
        #[source]
        error: RegionError,
    },

    #[error("node {node} has a voxel outside its model")]
    VoxelOutsideModel { node: usize },

    #[error("screenshot data is not valid base64")]
    ScreenshotEncoding(#[source] base64::DecodeError),

    #[error("screenshot data does not match its size")]
    ScreenshotSize,
}

impl From<NativeError> for CodecError {
    fn from(error: NativeError) -> Self {
        CodecError::Parse(Box::new(error))
    }
}

#[derive(Debug)]
struct JsonCodec;

impl JsonCodec {
    fn read(stream: &mut dyn ReadStream) -> Result<SceneSer, CodecError> {
        serde_json::from_reader(io::BufReader::new(stream)).map_err(|error| {
            if error.is_io() {
                CodecError::Io(error.into())
            } else {
                CodecError::Parse(Box::new(error))
            }
        })
    }
}

impl Codec for JsonCodec {
    fn max_size(&self) -> Option<ChunkSize> {
        None
    }

    fn save_groups(
        &self,
        graph: &SceneGraph,
        filename: &str,
        stream: &mut dyn WriteStream,
        ctx: &SaveContext,
    ) -> Result<(), CodecError> {
        let mut palette = Palette::new();
        let mut nodes = Vec::with_capacity(graph.len());
        for (_, node) in graph.iter() {
            if ctx.stop_signal().should_stop() {
                return Err(CodecError::Cancelled);
            }
            nodes.push(node_to_ser(node, &mut palette));
        }

        let screenshot = ctx.create_thumbnail(graph).map(|image| ScreenshotSer {
            width: image.width(),
            height: image.height(),
            rgba: BASE64_ENGINE.encode(image.as_raw()),
        });
        log::debug!(
            "writing {filename}: {nodes} nodes, screenshot: {screenshot}",
            nodes = nodes.len(),
            screenshot = screenshot.is_some(),
        );

        let scene = SceneSer::SceneV1 {
            palette: palette.colors().iter().map(|c| c.to_packed()).collect(),
            screenshot,
            nodes,
        };
        let mut writer = io::BufWriter::new(stream);
        serde_json::to_writer(&mut writer, &scene).map_err(|error| {
            if error.is_io() {
                CodecError::Io(error.into())
            } else {
                CodecError::NotRepresentable {
                    reason: error.to_string(),
                }
            }
        })?;
        writer.flush()?;
        Ok(())
    }

    fn load_screenshot(
        &self,
        _filename: &str,
        stream: &mut dyn ReadStream,
        _ctx: &LoadContext,
    ) -> Result<Option<RgbaImage>, CodecError> {
        let SceneSer::SceneV1 { screenshot, .. } = Self::read(stream)?;
        let Some(ScreenshotSer {
            width,
            height,
            rgba,
        }) = screenshot
        else {
            return Ok(None);
        };
        let pixels = BASE64_ENGINE
            .decode(rgba)
            .map_err(NativeError::ScreenshotEncoding)?;
        let image = RgbaImage::from_raw(width, height, pixels).ok_or(NativeError::ScreenshotSize)?;
        Ok(Some(image))
    }
}

impl RgbaCodec for JsonCodec {
    fn load_palette(
        &self,
        _filename: &str,
        stream: &mut dyn ReadStream,
        palette: &mut Palette,
        _ctx: &LoadContext,
    ) -> Result<usize, CodecError> {
        let SceneSer::SceneV1 {
            palette: colors, ..
        } = Self::read(stream)?;
        *palette = Palette::new();
        for packed in colors.into_iter().take(Palette::MAX_COLORS) {
            // Cannot fail: at most MAX_COLORS are pushed.
            let _ = palette.push(Rgba8::from_packed(packed));
        }
        Ok(palette.len())
    }

    fn load_groups_rgba(
        &self,
        filename: &str,
        stream: &mut dyn ReadStream,
        graph: &mut SceneGraph,
        lookup: &mut PaletteLookup<'_>,
        ctx: &LoadContext,
    ) -> Result<(), CodecError> {
        let SceneSer::SceneV1 { nodes, .. } = Self::read(stream)?;
        log::debug!("reading {filename}: {} nodes", nodes.len());

        let mut ids: Vec<NodeId> = Vec::with_capacity(nodes.len());
        graph.reserve(nodes.len());
        for (index, node_ser) in nodes.into_iter().enumerate() {
            if ctx.stop_signal().should_stop() {
                return Err(CodecError::Cancelled);
            }
            let parent = node_ser
                .parent
                .map(|parent| {
                    ids.get(parent).copied().ok_or(NativeError::InvalidParent {
                        node: index,
                        parent,
                    })
                })
                .transpose()?;
            let node = node_from_ser(index, node_ser, lookup)?;
            ids.push(graph.add_node(node, parent)?);
        }
        Ok(())
    }
}

fn node_to_ser(node: &SceneNode, palette: &mut Palette) -> NodeSer {
    let model = node.volume().filter(|_| node.is_model()).map(|volume| {
        let region = volume.region();
        let voxels = volume
            .iter_solid()
            .map(|(point, index)| {
                let color = node
                    .palette()
                    .get(index)
                    .or_else(|| Palette::default_palette().get(index))
                    .unwrap_or_default();
                // The embedded palette only records the first colors; voxels keep their own.
                let _ = palette.find_or_push(color);
                (point.to_array(), color.to_packed())
            })
            .collect();
        ModelSer {
            lower: region.lower_corner().to_array(),
            size: region.dimensions_in_voxels().to_array(),
            voxels,
        }
    });
    NodeSer {
        name: node.name().to_owned(),
        parent: node.parent().map(NodeId::index),
        translation: node.local_translation().to_array(),
        properties: node.properties().clone(),
        model,
    }
}

fn node_from_ser(
    index: usize,
    node_ser: NodeSer,
    lookup: &mut PaletteLookup<'_>,
) -> Result<SceneNode, CodecError> {
    let NodeSer {
        name,
        parent: _,
        translation,
        properties,
        model,
    } = node_ser;

    let mut node = match model {
        None => SceneNode::new_group(name),
        Some(ModelSer {
            lower,
            size,
            voxels,
        }) => {
            let region = Region::checked_from_lower_size(lower, size)
                .map_err(|error| NativeError::InvalidRegion { node: index, error })?;
            let mut volume = RawVolume::new(region)?;
            for (point, packed) in voxels {
                let color_index = lookup.index_for(Rgba8::from_packed(packed)).unwrap_or(0);
                volume
                    .set(point, Voxel::Solid(color_index))
                    .map_err(|_| NativeError::VoxelOutsideModel { node: index })?;
            }
            SceneNode::new_model(name, volume, lookup.palette().clone())
        }
    };
    node.set_local_translation(translation.into());
    for (key, value) in properties {
        node.set_property(key, value);
    }
    Ok(node)
}
