//! Typed access to [`SceneNode`] properties, for codecs that map properties onto
//! format-specific fields.

use voxconv::SceneNode;

/// Returns the property `key` of `node`, or `default` if there is no node or no such property.
pub fn string_property<'a>(node: Option<&'a SceneNode>, key: &str, default: &'a str) -> &'a str {
    node.and_then(|node| node.property(key)).unwrap_or(default)
}

/// Returns the property `key` of `node` interpreted as a boolean, or `default` if there is no
/// node or no such property.
///
/// `1`, `true`, `yes` and `on`, in any letter case, are true; every other value is false.
pub fn bool_property(node: Option<&SceneNode>, key: &str, default: bool) -> bool {
    match node.and_then(|node| node.property(key)) {
        Some(value) => {
            let value = value.trim();
            ["1", "true", "yes", "on"]
                .iter()
                .any(|word| value.eq_ignore_ascii_case(word))
        }
        None => default,
    }
}

/// Returns the property `key` of `node` parsed as a number, or `default` if there is no node,
/// no such property, or the value is not a number.
pub fn float_property(node: Option<&SceneNode>, key: &str, default: f32) -> f32 {
    node.and_then(|node| node.property(key))
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
