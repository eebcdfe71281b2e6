use std::io::Cursor;
use std::path::{Path, PathBuf};

use voxconv::SceneGraph;

use crate::file::Fileish;
use crate::{FormatConfig, FormatRegistry, SaveContext, SaveError};

/// Saves `graph` to `file` in the format its extension names.
///
/// The data is encoded completely before `file` is written, so a failed save leaves the
/// previous contents in place.
pub fn save_scene_to_file(
    graph: &SceneGraph,
    file: &dyn Fileish,
    registry: &FormatRegistry,
    config: &FormatConfig,
    ctx: &SaveContext,
) -> Result<(), SaveError> {
    let path = file.display_full_path();
    let entry = file
        .extension()
        .and_then(|extension| registry.find_by_extension(&extension))
        .ok_or_else(|| SaveError::UnknownFormat { path: path.clone() })?;
    let format = registry.create(entry, config);

    let mut stream = Cursor::new(Vec::<u8>::new());
    format.save(graph, &path, &mut stream, ctx)?;
    let data = stream.into_inner();

    file.write(&data)
        .map_err(|error| SaveError::Write { path: path.clone(), error })?;
    log::info!(
        "saved {path} as {format}: {bytes} bytes",
        format = format.description().name(),
        bytes = data.len(),
    );
    Ok(())
}

/// Saves `graph` to a file on disk, in the format its extension names.
pub fn save_scene_to_path(
    graph: &SceneGraph,
    destination: &Path,
    registry: &FormatRegistry,
    config: &FormatConfig,
    ctx: &SaveContext,
) -> Result<(), SaveError> {
    save_scene_to_file(graph, &PathBuf::from(destination), registry, config, ctx)
}
