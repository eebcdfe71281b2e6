use std::collections::HashMap;

use voxconv::math::{Rgba8, checked_add_vectors};
use voxconv::{NodeId, Palette, SceneGraph, SceneNode};

use crate::mv::{self, coord};
use crate::{CodecError, check_fits};

/// MagicaVoxel reserves one of its 256 palette slots.
const USABLE_COLORS: usize = 255;

/// Converts `graph` to in-memory [`dot_vox::DotVoxData`].
///
/// Use [`dot_vox::DotVoxData::write_vox()`] to produce the actual bytes from this.
///
/// Every node becomes a transform node carrying its name, properties and local translation.
/// Below that, groups become group nodes and models become shape nodes referring to one model
/// each. All root nodes are children of a single root group. Model nodes without voxel data
/// are skipped.
pub(crate) fn scene_to_dot_vox_data(graph: &SceneGraph) -> Result<dot_vox::DotVoxData, CodecError> {
    let mut builder = DataBuilder {
        graph,
        palette: Palette::new(),
        palette_overflowed: false,
        models: Vec::new(),
        scenes: vec![
            dot_vox::SceneNode::Transform {
                attributes: dot_vox::Dict::default(),
                frames: vec![dot_vox::Frame {
                    attributes: dot_vox::Dict::default(),
                }],
                child: 1,
                layer_id: 0,
            },
            dot_vox::SceneNode::Group {
                attributes: dot_vox::Dict::default(),
                children: Vec::new(),
            },
        ],
    };

    let mut root_children = Vec::new();
    for (id, _) in graph.roots() {
        if let Some(index) = builder.emit(id)? {
            root_children.push(index);
        }
    }
    if let dot_vox::SceneNode::Group { children, .. } = &mut builder.scenes[1] {
        *children = root_children;
    }

    let DataBuilder {
        palette, models, scenes, ..
    } = builder;
    let mut palette: Vec<dot_vox::Color> = palette
        .colors()
        .iter()
        .map(|&Rgba8 { r, g, b, a }| dot_vox::Color { r, g, b, a })
        .collect();
    palette.resize(Palette::MAX_COLORS, dot_vox::Color { r: 0, g: 0, b: 0, a: 0 });

    Ok(dot_vox::DotVoxData {
        version: mv::VERSION,
        models,
        palette,
        materials: Vec::new(),
        scenes,
        layers: Vec::new(),
    })
}

struct DataBuilder<'g> {
    graph: &'g SceneGraph,
    /// Colors shared by every model in the file.
    palette: Palette,
    palette_overflowed: bool,
    models: Vec<dot_vox::Model>,
    scenes: Vec<dot_vox::SceneNode>,
}

impl DataBuilder<'_> {
    /// Appends the scene nodes for `id` and its descendants, returning the index of its
    /// transform node, or [`None`] if it was skipped.
    fn emit(&mut self, id: NodeId) -> Result<Option<u32>, CodecError> {
        let graph = self.graph;
        let Some(node) = graph.node(id) else {
            return Ok(None);
        };

        let translation;
        let model = if node.is_model() {
            let region = node.region();
            let Some(volume) = node.volume().filter(|_| region.is_valid()) else {
                log::debug!("skipping model “{}” without voxels", node.name());
                return Ok(None);
            };
            let size = region.dimensions_in_voxels();
            check_fits(size, Some(mv::MAX_SIZE))?;
            translation =
                checked_add_vectors(node.local_translation(), region.lower_corner().to_vector())
                    .and_then(|lower| coord::center_from_lower_corner(lower, size))
                    .ok_or_else(|| transform_overflow(node))?;
            Some(self.model(node, volume, size)?)
        } else {
            translation = node.local_translation();
            None
        };

        let transform_index = self.next_index()?;
        let [x, y, z] =
            coord::our_to_mv_vector(translation).ok_or_else(|| transform_overflow(node))?;
        let mut attributes = dot_vox::Dict::default();
        for (key, value) in node.properties() {
            attributes.insert(key.clone(), value.clone());
        }
        attributes.insert(mv::NAME_ATTRIBUTE.to_owned(), node.name().to_owned());
        let mut frame_attributes = dot_vox::Dict::default();
        frame_attributes.insert("_t".to_owned(), format!("{x} {y} {z}"));
        self.scenes.push(dot_vox::SceneNode::Transform {
            attributes,
            frames: vec![dot_vox::Frame {
                attributes: frame_attributes,
            }],
            child: transform_index + 1,
            layer_id: 0,
        });

        if let Some(model) = model {
            let model_id = u32::try_from(self.models.len()).map_err(|_| too_many_nodes())?;
            self.models.push(model);
            self.scenes.push(dot_vox::SceneNode::Shape {
                attributes: dot_vox::Dict::default(),
                models: vec![dot_vox::ShapeModel {
                    model_id,
                    attributes: dot_vox::Dict::default(),
                }],
            });
        } else {
            let group_index = self.scenes.len();
            self.scenes.push(dot_vox::SceneNode::Group {
                attributes: dot_vox::Dict::default(),
                children: Vec::new(),
            });
            let mut group_children = Vec::with_capacity(node.children().len());
            for &child in node.children() {
                if let Some(index) = self.emit(child)? {
                    group_children.push(index);
                }
            }
            if let dot_vox::SceneNode::Group { children, .. } = &mut self.scenes[group_index] {
                *children = group_children;
            }
        }

        Ok(Some(transform_index))
    }

    fn next_index(&self) -> Result<u32, CodecError> {
        u32::try_from(self.scenes.len()).map_err(|_| too_many_nodes())
    }

    fn model(
        &mut self,
        node: &SceneNode,
        volume: &voxconv::RawVolume,
        size: voxconv::math::GridVector,
    ) -> Result<dot_vox::Model, CodecError> {
        let not_representable = || CodecError::NotRepresentable {
            reason: format!("model “{}” has an invalid size {size:?}", node.name()),
        };
        let mv_size = coord::our_to_mv_size(size).ok_or_else(not_representable)?;
        let lower = volume.region().lower_corner();

        let mut remap: HashMap<u8, u8> = HashMap::new();
        let mut voxels = Vec::with_capacity(volume.solid_count());
        for (point, index) in volume.iter_solid() {
            let file_index = match remap.get(&index) {
                Some(&i) => i,
                None => {
                    let color = node
                        .palette()
                        .get(index)
                        .or_else(|| Palette::default_palette().get(index))
                        .unwrap_or_default();
                    let i = self.color_index(color);
                    remap.insert(index, i);
                    i
                }
            };
            let local = (point - lower).to_point();
            voxels.push(
                coord::our_to_mv_voxel(local, size, file_index).ok_or_else(not_representable)?,
            );
        }

        Ok(dot_vox::Model {
            size: mv_size,
            voxels,
        })
    }

    /// Returns the file palette index for `color`, adding it if there is room.
    fn color_index(&mut self, color: Rgba8) -> u8 {
        if let Some(i) = self.palette.index_of(color) {
            return i;
        }
        if self.palette.len() < USABLE_COLORS {
            if let Ok(i) = self.palette.push(color) {
                return i;
            }
        }
        if !self.palette_overflowed {
            self.palette_overflowed = true;
            log::warn!(
                "scene uses more than {USABLE_COLORS} colors; \
                extra colors were mapped to the closest match"
            );
        }
        self.palette.closest_match(color).unwrap_or(0)
    }
}

fn transform_overflow(node: &SceneNode) -> CodecError {
    CodecError::NotRepresentable {
        reason: format!(
            "position of node “{}” is outside the range of the format",
            node.name()
        ),
    }
}

fn too_many_nodes() -> CodecError {
    CodecError::NotRepresentable {
        reason: "too many scene nodes".to_owned(),
    }
}
