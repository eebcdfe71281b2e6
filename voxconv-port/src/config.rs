use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

/// Settings that influence how a [`Format`](crate::Format) saves and loads.
///
/// These are resolved once, when the [`Format`](crate::Format) is constructed.
/// When deserialized, missing keys take their default values.
#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
#[non_exhaustive]
pub struct FormatConfig {
    /// Merge all models into one volume before saving.
    ///
    /// Formats then can only represent scenes whose every model fits within their maximum
    /// size.
    pub merge_on_save: bool,

    /// When loading a format that stores colors directly, look for a palette embedded in the
    /// file instead of always using the default palette.
    pub create_palette_on_load: bool,

    /// Granularity used by [`flatten_rgb()`](crate::flatten_rgb) when colors are matched
    /// against a palette. 0 and 1 disable flattening.
    pub rgb_flatten_factor: u8,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            merge_on_save: false,
            create_palette_on_load: true,
            rgb_flatten_factor: 1,
        }
    }
}

impl FormatConfig {
    /// Parses a configuration from JSON.
    pub fn from_json_reader(reader: impl io::Read) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }

    /// Reads a configuration from the JSON file at `path`.
    ///
    /// If the file does not exist, cannot be read, or is not valid, the problem is logged and
    /// the default configuration is returned.
    pub fn read_or_default(path: &Path) -> Self {
        match File::open(path) {
            Ok(file) => match Self::from_json_reader(BufReader::new(file)) {
                Ok(config) => {
                    log::trace!(
                        "Loaded format configuration from {path}",
                        path = path.to_string_lossy()
                    );
                    config
                }
                Err(e) => {
                    log::warn!(
                        "Syntax error in format configuration loaded from {path}; \
                        using default values. Error: {e}",
                        path = path.to_string_lossy(),
                    );
                    Self::default()
                }
            },
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                log::info!(
                    "No format configuration file found at {path}; using default values",
                    path = path.to_string_lossy()
                );
                Self::default()
            }
            Err(error) => {
                log::error!(
                    "Error while reading format configuration file {path}: {error}",
                    path = path.to_string_lossy(),
                );
                Self::default()
            }
        }
    }
}
