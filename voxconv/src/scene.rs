//! [`SceneGraph`], the ordered forest of [`SceneNode`]s that file formats load into and
//! save from.

use std::collections::BTreeMap;
use std::fmt;

use crate::math::{GridVector, Region, checked_add_vectors};
use crate::{Palette, PaletteFullError, RawVolume, VolumeError, Voxel};


/// Identifies a node within one [`SceneGraph`].
///
/// IDs are assigned in insertion order and are never reused.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of this node in insertion order.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Whether a [`SceneNode`] holds voxels.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum SceneNodeKind {
    /// Organizes other nodes; has no volume.
    Group,
    /// Has a [`RawVolume`].
    Model,
}

/// One node of a [`SceneGraph`].
///
/// Construct nodes with [`SceneNode::new_group()`] or [`SceneNode::new_model()`] and insert
/// them with [`SceneGraph::add_node()`]; the graph then owns the parent/child links.
#[derive(Clone, Debug)]
pub struct SceneNode {
    name: String,
    kind: SceneNodeKind,
    volume: Option<RawVolume>,
    palette: Palette,
    properties: BTreeMap<String, String>,
    local_translation: GridVector,
    world_translation: GridVector,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    fn new(name: String, kind: SceneNodeKind, volume: Option<RawVolume>, palette: Palette) -> Self {
        Self {
            name,
            kind,
            volume,
            palette,
            properties: BTreeMap::new(),
            local_translation: GridVector::zero(),
            world_translation: GridVector::zero(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Constructs a group node.
    pub fn new_group(name: impl Into<String>) -> Self {
        Self::new(name.into(), SceneNodeKind::Group, None, Palette::new())
    }

    /// Constructs a model node owning `volume`, whose voxels index into `palette`.
    pub fn new_model(name: impl Into<String>, volume: RawVolume, palette: Palette) -> Self {
        Self::new(name.into(), SceneNodeKind::Model, Some(volume), palette)
    }

    /// Returns a detached model node with the same name, palette, properties and translation
    /// as `self`, but holding `volume` instead.
    ///
    /// The translation of the result is `self`'s world translation, so the new node keeps the
    /// same placement when inserted at the root of a graph.
    pub fn with_volume(&self, volume: RawVolume) -> Self {
        let mut node = Self::new(
            self.name.clone(),
            SceneNodeKind::Model,
            Some(volume),
            self.palette.clone(),
        );
        node.properties = self.properties.clone();
        node.local_translation = self.world_translation;
        node.world_translation = self.world_translation;
        node
    }

    /// Returns a detached group node with the same name, properties and local translation
    /// as `self`.
    pub fn as_group(&self) -> Self {
        let mut node = Self::new_group(self.name.clone());
        node.properties = self.properties.clone();
        node.local_translation = self.local_translation;
        node
    }

    /// The node's display name. Need not be unique.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replaces the node's name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Whether this is a group or model node.
    pub fn kind(&self) -> SceneNodeKind {
        self.kind
    }

    /// Returns whether this node is a model.
    pub fn is_model(&self) -> bool {
        self.kind == SceneNodeKind::Model
    }

    /// The node's voxels, if it is a model.
    pub fn volume(&self) -> Option<&RawVolume> {
        self.volume.as_ref()
    }

    /// Mutable access to the node's voxels, if it is a model.
    pub fn volume_mut(&mut self) -> Option<&mut RawVolume> {
        self.volume.as_mut()
    }

    /// Replaces the node's voxels. A group node given a volume becomes a model.
    pub fn set_volume(&mut self, volume: RawVolume) {
        self.volume = Some(volume);
        self.kind = SceneNodeKind::Model;
    }

    /// The extent of the node's volume in volume space, or [`Region::INVALID`] if the node
    /// has no volume.
    pub fn region(&self) -> Region {
        self.volume.as_ref().map_or(Region::INVALID, RawVolume::region)
    }

    /// The colors the node's voxels index into.
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Mutable access to the node's palette.
    pub fn palette_mut(&mut self) -> &mut Palette {
        &mut self.palette
    }

    /// Replaces the node's palette.
    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    /// All key-value properties of the node.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Looks up a property value.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Sets a property, replacing any previous value.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Translation relative to the parent node.
    pub fn local_translation(&self) -> GridVector {
        self.local_translation
    }

    /// Replaces the translation relative to the parent node.
    ///
    /// The world translation of this node and its descendants is not updated until
    /// [`SceneGraph::update_transforms()`] is called.
    pub fn set_local_translation(&mut self, translation: GridVector) {
        self.local_translation = translation;
    }

    /// Translation relative to the scene origin, as of the last transform update.
    pub fn world_translation(&self) -> GridVector {
        self.world_translation
    }

    /// The node's region translated into world space.
    ///
    /// Returns [`Region::INVALID`] if the node has no volume, or if the translated region
    /// would leave the coordinate range. [`SceneGraph`] refuses nodes for which that happens.
    pub fn world_region(&self) -> Region {
        let region = self.region();
        if region.is_valid() {
            region
                .checked_translate(self.world_translation)
                .unwrap_or(Region::INVALID)
        } else {
            region
        }
    }

    /// Computes the world translation this node would have under a parent with the given
    /// world translation.
    fn checked_world_translation(
        &self,
        id: NodeId,
        parent_world: GridVector,
    ) -> Result<GridVector, SceneGraphError> {
        let world = checked_add_vectors(self.local_translation, parent_world)
            .ok_or(SceneGraphError::TransformOverflow(id))?;
        let region = self.region();
        if region.is_valid() && region.checked_translate(world).is_none() {
            return Err(SceneGraphError::TransformOverflow(id));
        }
        Ok(world)
    }

    /// The node this node was inserted under, if any.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Nodes inserted under this node, in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// An ordered forest of [`SceneNode`]s.
///
/// Nodes are stored in insertion order, and a parent is always inserted before its children.
#[derive(Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    /// Constructs an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hints that `additional` more nodes are about to be added.
    pub fn reserve(&mut self, additional: usize) {
        self.nodes.reserve(additional);
    }

    /// Number of nodes of any kind.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of model nodes.
    pub fn model_count(&self) -> usize {
        self.iter_models().count()
    }

    /// Inserts `node` as the last child of `parent`, or as a root if `parent` is [`None`].
    ///
    /// The node's world translation is computed immediately from its parent's. If it, or the
    /// node's region moved by it, would overflow the coordinate range, the node is not added.
    pub fn add_node(
        &mut self,
        mut node: SceneNode,
        parent: Option<NodeId>,
    ) -> Result<NodeId, SceneGraphError> {
        let id = NodeId(self.nodes.len());
        let parent_world = match parent {
            Some(parent_id) => {
                self.node(parent_id)
                    .ok_or(SceneGraphError::MissingParent(parent_id))?
                    .world_translation
            }
            None => GridVector::zero(),
        };
        node.world_translation = node.checked_world_translation(id, parent_world)?;
        node.children.clear();
        node.parent = parent;
        if let Some(parent_node) = parent.and_then(|p| self.nodes.get_mut(p.0)) {
            parent_node.children.push(id);
        }
        self.nodes.push(node);
        Ok(id)
    }

    /// Returns the node with the given ID.
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    /// Returns the node with the given ID for modification.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0)
    }

    /// Iterates over all nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> + '_ {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Iterates over model nodes in insertion order.
    pub fn iter_models(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> + '_ {
        self.iter().filter(|(_, n)| n.is_model())
    }

    /// Iterates over nodes that have no parent, in insertion order.
    pub fn roots(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> + '_ {
        self.iter().filter(|(_, n)| n.parent.is_none())
    }

    /// Iterates over the ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.node(id).and_then(SceneNode::parent), |&p| {
            self.node(p).and_then(SceneNode::parent)
        })
    }

    /// Recomputes every node's world translation from the local translations along its
    /// parent chain.
    ///
    /// Fails at the first node whose world translation, or world region, would overflow the
    /// coordinate range; that node and the ones after it keep their previous translations.
    pub fn update_transforms(&mut self) -> Result<(), SceneGraphError> {
        // Parents precede children, so one pass in insertion order suffices.
        for i in 0..self.nodes.len() {
            let parent_world = self.nodes[i]
                .parent
                .and_then(|p| self.nodes.get(p.0))
                .map_or(GridVector::zero(), |p| p.world_translation);
            let node = &mut self.nodes[i];
            node.world_translation = node.checked_world_translation(NodeId(i), parent_world)?;
        }
        Ok(())
    }

    /// The union of all model nodes' world-space regions.
    ///
    /// Returns [`Region::INVALID`] if there are no models with voxel data.
    pub fn region(&self) -> Region {
        self.iter_models()
            .fold(Region::INVALID, |r, (_, n)| r.union(n.world_region()))
    }

    /// Combines every model into one volume in world space with one palette.
    ///
    /// Models are drawn in insertion order; where solid voxels of two models overlap, the
    /// later model wins. Air never overwrites. Colors are added to the merged palette as they
    /// are first used; once it is full, further colors map to the closest existing entry.
    ///
    /// Fails if the graph has no voxel data, or if the combined region has more than
    /// [`RawVolume::MAX_VOXELS`] voxels.
    pub fn merge(&self) -> Result<MergedVolume, MergeError> {
        let region = self.region();
        if !region.is_valid() {
            return Err(MergeError::Empty);
        }
        let mut volume = RawVolume::new(region).map_err(MergeError::Volume)?;
        let mut palette = Palette::new();
        let mut overflowed = false;

        for (_, node) in self.iter_models() {
            let Some(source) = node.volume() else {
                continue;
            };
            if !node.world_region().is_valid() {
                continue;
            }
            // Lazily filled mapping from this node's palette indices to merged indices.
            let mut remap: [Option<u8>; Palette::MAX_COLORS] = [None; Palette::MAX_COLORS];
            for (point, index) in source.iter_solid() {
                let merged_index = match remap[usize::from(index)] {
                    Some(i) => i,
                    None => {
                        let color = node
                            .palette()
                            .get(index)
                            .or_else(|| Palette::default_palette().get(index))
                            .unwrap_or_default();
                        let i = match palette.find_or_push(color) {
                            Ok(i) => i,
                            Err(PaletteFullError) => {
                                overflowed = true;
                                palette.closest_match(color).unwrap_or(0)
                            }
                        };
                        remap[usize::from(index)] = Some(i);
                        i
                    }
                };
                // Cannot fail: the merged region contains every node's world region.
                let _ = volume.set(point + node.world_translation, Voxel::Solid(merged_index));
            }
        }
        if overflowed {
            log::warn!(
                "merged scene uses more than {} colors; extra colors were mapped to the \
                closest match",
                Palette::MAX_COLORS
            );
        }
        Ok(MergedVolume { volume, palette })
    }
}

impl fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(id, node)| {
                (
                    id,
                    (node.name(), node.kind(), node.region(), node.parent()),
                )
            }))
            .finish()
    }
}

/// Result of [`SceneGraph::merge()`].
#[derive(Clone, Debug)]
#[expect(clippy::exhaustive_structs)]
pub struct MergedVolume {
    /// All voxels of the scene, positioned in world space.
    pub volume: RawVolume,
    /// The colors `volume` indexes into.
    pub palette: Palette,
}

impl MergedVolume {
    /// Wraps the merged volume in a new single-model graph.
    pub fn into_scene_graph(self, name: impl Into<String>) -> SceneGraph {
        let mut graph = SceneGraph::new();
        let node = SceneNode::new_model(name, self.volume, self.palette);
        // A root insertion cannot fail.
        let _ = graph.add_node(node, None);
        graph
    }
}

/// Error returned by [`SceneGraph::add_node()`] and [`SceneGraph::update_transforms()`].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum SceneGraphError {
    /// The requested parent is not in this graph.
    #[error("parent node {0:?} does not exist")]
    MissingParent(NodeId),

    /// The node's position in the world is outside the coordinate range.
    #[error("position/transform of node {0:?} too large")]
    TransformOverflow(NodeId),
}

/// Error returned by [`SceneGraph::merge()`].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum MergeError {
    /// No model in the graph has voxel data.
    #[error("the scene contains no voxels")]
    Empty,

    /// The volume spanning all models could not be created.
    #[error("cannot merge scene")]
    Volume(#[source] VolumeError),
}
