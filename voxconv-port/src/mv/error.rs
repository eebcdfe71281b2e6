use voxconv::{SceneGraphError, VolumeError};

use crate::CodecError;

/// Errors that may occur while loading `.vox` data.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub(crate) enum DotVoxConversionError {
    #[error("{0}")]
    Parse(&'static str),

    #[error("file refers to scene node with ID {0} but does not define it")]
    MissingSceneNode(u32),

    #[error("scene graph contains cycle (involving node with ID {0})")]
    SceneGraphCycle(u32),

    #[error("scene graph is too complex")]
    SceneGraphRecursion,

    #[error("attribute “{attribute}” of scene node with ID {scene_index} is invalid")]
    SceneAttributeParse {
        scene_index: u32,
        attribute: &'static str,
    },

    #[error("file refers to model with ID {0} but does not define it")]
    MissingModel(u32),

    #[error("model’s size is invalid: {0:?}")]
    ModelSizeInvalid(dot_vox::Size),

    #[error("palette of {len} colors too short to contain index {index}")]
    PaletteTooShort { len: usize, index: u8 },

    #[error("position/transform too large")]
    TransformOverflow,

    #[error("could not allocate model volume")]
    Volume(#[source] VolumeError),

    #[error("could not build scene graph")]
    Scene(#[source] SceneGraphError),

    #[error("loading was cancelled")]
    Cancelled,
}

impl From<DotVoxConversionError> for CodecError {
    fn from(error: DotVoxConversionError) -> Self {
        match error {
            DotVoxConversionError::Cancelled => CodecError::Cancelled,
            error => CodecError::Parse(Box::new(error)),
        }
    }
}

pub(crate) fn warn_extra_attributes(
    thing: core::fmt::Arguments<'_>,
    attributes: &dot_vox::Dict,
    expected_attributes: &[&'static str],
) {
    let mut unexpected = Vec::from_iter(
        attributes
            .keys()
            .filter(|key| !expected_attributes.contains(&key.as_str())),
    );
    if !unexpected.is_empty() {
        unexpected.sort();
        log::warn!("{thing} contains unknown attributes {unexpected:?}");
    }
}
