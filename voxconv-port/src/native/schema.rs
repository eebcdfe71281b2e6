//! Data types which represent scenes in the JSON format, kept apart from the in-memory types
//! so that changes to those do not leak into the file format.
//!
//! General properties of the serialization schema:
//!
//! * 3D vectors and points are represented as 3-element arrays.
//! * Colors are packed `0xRRGGBBAA` integers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub(crate) enum SceneSer {
    SceneV1 {
        /// Colors used by the scene, at most 256.
        palette: Vec<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        screenshot: Option<ScreenshotSer>,
        /// Nodes in order; a parent always precedes its children.
        nodes: Vec<NodeSer>,
    },
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct ScreenshotSer {
    pub width: u32,
    pub height: u32,
    /// Base64-encoded RGBA8 pixels, row-major.
    pub rgba: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct NodeSer {
    pub name: String,
    /// Index into the node list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    #[serde(default, skip_serializing_if = "is_default")]
    pub translation: [i32; 3],
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    /// Present exactly for model nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelSer>,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct ModelSer {
    pub lower: [i32; 3],
    pub size: [i32; 3],
    /// Solid voxels only, each a position and a packed color.
    pub voxels: Vec<([i32; 3], u32)>,
}

fn is_default<T: Default + PartialEq + 'static>(value: &T) -> bool {
    *value == T::default()
}
