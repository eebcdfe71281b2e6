use std::collections::BTreeMap;

use voxconv::math::{GridCoordinate, GridVector, Region, Rgba8, checked_add_vectors};
use voxconv::{NodeId, Palette, RawVolume, SceneGraph, SceneGraphError, SceneNode, Voxel};

use crate::LoadContext;
use crate::mv::error::{DotVoxConversionError, warn_extra_attributes};
use crate::mv::{self, coord};

/// Rotation byte of an unrotated transform frame.
const IDENTITY_ROTATION: u8 = 0b0000_0100;

pub(crate) fn parse(bytes: &[u8]) -> Result<dot_vox::DotVoxData, DotVoxConversionError> {
    dot_vox::load_bytes(bytes).map_err(DotVoxConversionError::Parse)
}

pub(crate) fn dot_vox_palette(palette: &[dot_vox::Color]) -> Palette {
    let mut converted = Palette::new();
    for &dot_vox::Color { r, g, b, a } in palette.iter().take(Palette::MAX_COLORS) {
        // Cannot fail: at most MAX_COLORS are pushed.
        let _ = converted.push(Rgba8::new(r, g, b, a));
    }
    converted
}

/// Adds the contents of `data` to `graph`, and stores its palette in `palette`.
///
/// If the file has a scene graph, its transform and group nodes become group nodes (except
/// for the root group) and its shape nodes become model nodes. Otherwise, each model becomes
/// a root node.
pub(crate) fn dot_vox_data_to_scene(
    data: &dot_vox::DotVoxData,
    graph: &mut SceneGraph,
    palette: &mut Palette,
    ctx: &LoadContext,
) -> Result<(), DotVoxConversionError> {
    let dot_vox::DotVoxData {
        version,
        models,
        palette: file_palette,
        materials,
        scenes,
        layers,
    } = data;
    log::info!(
        "Loaded MagicaVoxel .vox format: version {}, \
        {} models, {} ignored materials, {} scene nodes, {} ignored layers",
        version,
        models.len(),
        materials.len(),
        scenes.len(),
        layers.len(),
    );

    *palette = dot_vox_palette(file_palette);

    let volumes = models
        .iter()
        .map(|model| model_to_volume(model, palette))
        .collect::<Result<Vec<RawVolume>, _>>()?;

    if scenes.is_empty() {
        graph.reserve(volumes.len());
        for (index, volume) in volumes.into_iter().enumerate() {
            if ctx.stop_signal().should_stop() {
                return Err(DotVoxConversionError::Cancelled);
            }
            let node = SceneNode::new_model(format!("model_{index}"), volume, palette.clone());
            graph
                .add_node(node, None)
                .map_err(DotVoxConversionError::Scene)?;
        }
        return Ok(());
    }

    SceneBuilder {
        data,
        volumes: &volumes,
        palette,
        graph,
        ctx,
    }
    .walk(0, None, PendingTransform::root(), None)
}

/// Converts a model to a volume whose lower corner is the origin.
pub(crate) fn model_to_volume(
    model: &dot_vox::Model,
    palette: &Palette,
) -> Result<RawVolume, DotVoxConversionError> {
    let size = coord::mv_to_our_size(model.size)?;
    let mut volume = RawVolume::new(Region::from_lower_size([0, 0, 0], size))
        .map_err(DotVoxConversionError::Volume)?;
    for voxel in &model.voxels {
        if usize::from(voxel.i) >= palette.len() {
            return Err(DotVoxConversionError::PaletteTooShort {
                len: palette.len(),
                index: voxel.i,
            });
        }
        let position = coord::mv_to_our_voxel(voxel, size);
        if volume.set(position, Voxel::Solid(voxel.i)).is_err() {
            return Err(DotVoxConversionError::ModelSizeInvalid(model.size));
        }
    }
    Ok(volume)
}

/// Accumulated effect of the transform nodes above the node being visited.
struct PendingTransform {
    name: Option<String>,
    properties: BTreeMap<String, String>,
    translation: GridVector,
    /// The next group is the file's root group, whose children become our root nodes.
    top_level: bool,
}

impl PendingTransform {
    fn root() -> Self {
        Self {
            name: None,
            properties: BTreeMap::new(),
            translation: GridVector::zero(),
            top_level: true,
        }
    }

    fn nested() -> Self {
        Self {
            top_level: false,
            ..Self::root()
        }
    }

    fn node_name(&self, fallback: impl FnOnce() -> String) -> String {
        self.name.clone().unwrap_or_else(fallback)
    }

    fn apply_properties(&self, node: &mut SceneNode) {
        for (key, value) in &self.properties {
            node.set_property(key.clone(), value.clone());
        }
    }
}

struct SceneBuilder<'a> {
    data: &'a dot_vox::DotVoxData,
    volumes: &'a [RawVolume],
    palette: &'a Palette,
    graph: &'a mut SceneGraph,
    ctx: &'a LoadContext,
}

impl SceneBuilder<'_> {
    fn walk(
        &mut self,
        scene_index: u32,
        parent: Option<NodeId>,
        pending: PendingTransform,
        parent_node_list: Option<&ParentList<'_>>,
    ) -> Result<(), DotVoxConversionError> {
        if self.ctx.stop_signal().should_stop() {
            return Err(DotVoxConversionError::Cancelled);
        }
        let this_list = ParentList::cycle_and_depth_check(parent_node_list, scene_index)?;
        let parent_node_list = Some(&this_list);

        let data = self.data;
        match usize::try_from(scene_index)
            .ok()
            .and_then(|i| data.scenes.get(i))
            .ok_or(DotVoxConversionError::MissingSceneNode(scene_index))?
        {
            &dot_vox::SceneNode::Transform {
                ref attributes,
                ref frames,
                child,
                layer_id: _,
            } => {
                let (name, properties) = split_name(attributes);
                let mut translation = GridVector::zero();
                if let Some(frame) = frames.first() {
                    warn_extra_attributes(
                        format_args!("first frame of transform node #{scene_index}"),
                        &frame.attributes,
                        &["_t", "_r", "_f"],
                    );
                    if let Some(t_string) = frame.attributes.get("_t") {
                        translation =
                            coord::mv_to_our_vector(parse_translation(t_string, scene_index)?)
                                .ok_or(DotVoxConversionError::TransformOverflow)?;
                    }
                    if let Some(r_string) = frame.attributes.get("_r") {
                        let rotation: u8 = r_string.trim().parse().map_err(|_| {
                            DotVoxConversionError::SceneAttributeParse {
                                scene_index,
                                attribute: "_r",
                            }
                        })?;
                        if rotation != IDENTITY_ROTATION {
                            log::warn!(
                                "rotation of transform node #{scene_index} is not supported \
                                and was ignored"
                            );
                        }
                    }
                }

                let translation = checked_add_vectors(pending.translation, translation)
                    .ok_or(DotVoxConversionError::TransformOverflow)?;
                let mut properties_below = pending.properties;
                properties_below.extend(properties);
                self.walk(
                    child,
                    parent,
                    PendingTransform {
                        name: name.or(pending.name),
                        properties: properties_below,
                        translation,
                        top_level: pending.top_level,
                    },
                    parent_node_list,
                )?;
            }
            dot_vox::SceneNode::Group {
                attributes,
                children,
            } => {
                warn_extra_attributes(
                    format_args!("group node #{scene_index}"),
                    attributes,
                    &[],
                );
                let group = if pending.top_level {
                    parent
                } else {
                    let mut node =
                        SceneNode::new_group(pending.node_name(|| format!("group_{scene_index}")));
                    node.set_local_translation(pending.translation);
                    pending.apply_properties(&mut node);
                    Some(self.add(node, parent)?)
                };
                for &child in children {
                    self.walk(child, group, PendingTransform::nested(), parent_node_list)?;
                }
            }
            dot_vox::SceneNode::Shape { attributes, models } => {
                warn_extra_attributes(
                    format_args!("shape node #{scene_index}"),
                    attributes,
                    &[],
                );
                for (sm_index, shape_model) in models.iter().enumerate() {
                    warn_extra_attributes(
                        format_args!("shape model #{sm_index} in node #{scene_index}"),
                        &shape_model.attributes,
                        &[],
                    );
                    let model_id = shape_model.model_id;
                    let volume = usize::try_from(model_id)
                        .ok()
                        .and_then(|i| self.volumes.get(i))
                        .ok_or(DotVoxConversionError::MissingModel(model_id))?;
                    let size = volume.region().dimensions_in_voxels();

                    let mut node = SceneNode::new_model(
                        pending.node_name(|| format!("model_{model_id}")),
                        volume.clone(),
                        self.palette.clone(),
                    );
                    node.set_local_translation(
                        coord::lower_corner_from_center(pending.translation, size)
                            .ok_or(DotVoxConversionError::TransformOverflow)?,
                    );
                    pending.apply_properties(&mut node);
                    self.add(node, parent)?;
                }
            }
        }
        Ok(())
    }

    fn add(
        &mut self,
        node: SceneNode,
        parent: Option<NodeId>,
    ) -> Result<NodeId, DotVoxConversionError> {
        self.graph.add_node(node, parent).map_err(|error| match error {
            SceneGraphError::TransformOverflow(_) => DotVoxConversionError::TransformOverflow,
            error => DotVoxConversionError::Scene(error),
        })
    }
}

/// Separates the `_name` attribute of a transform node from the others, which are kept as
/// node properties.
fn split_name(attributes: &dot_vox::Dict) -> (Option<String>, BTreeMap<String, String>) {
    let mut name = None;
    let mut properties = BTreeMap::new();
    for (key, value) in attributes {
        if key == mv::NAME_ATTRIBUTE {
            name = Some(value.clone());
        } else {
            properties.insert(key.clone(), value.clone());
        }
    }
    (name, properties)
}

fn parse_translation(
    text: &str,
    scene_index: u32,
) -> Result<[GridCoordinate; 3], DotVoxConversionError> {
    let error = || DotVoxConversionError::SceneAttributeParse {
        scene_index,
        attribute: "_t",
    };
    let components = text
        .split_whitespace()
        .map(str::parse::<GridCoordinate>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| error())?;
    <[GridCoordinate; 3]>::try_from(components).map_err(|_| error())
}

/// Used for cycle detection when walking the scene graph.
struct ParentList<'a> {
    index: u32,
    parent: Option<&'a ParentList<'a>>,
}

impl<'a> ParentList<'a> {
    const MAX_DEPTH: u32 = 100;

    fn cycle_and_depth_check(
        list: Option<&'a Self>,
        index: u32,
    ) -> Result<Self, DotVoxConversionError> {
        if let Some(list) = list {
            list.check_inner(index, Self::MAX_DEPTH)?;
        }
        Ok(ParentList {
            index,
            parent: list,
        })
    }

    fn check_inner(&self, index: u32, max_depth: u32) -> Result<(), DotVoxConversionError> {
        if self.index == index {
            Err(DotVoxConversionError::SceneGraphCycle(index))
        } else if let Some(parent) = self.parent {
            parent.check_inner(
                index,
                max_depth
                    .checked_sub(1)
                    .ok_or(DotVoxConversionError::SceneGraphRecursion)?,
            )
        } else {
            Ok(())
        }
    }
}
