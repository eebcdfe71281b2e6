//! Tests of loading and saving through the registry, across formats.

use pretty_assertions::assert_eq;

use voxconv::math::{Region, Rgba8};
use voxconv::{Palette, RawVolume, SceneGraph, SceneNode, Voxel};

use crate::file::MemoryFile;
use crate::{
    FormatConfig, FormatRegistry, LoadContext, LoadError, SaveContext, SaveError,
    load_scene_from_file, save_scene_to_file, save_scene_to_path,
};

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn errors_are_send_sync() {
    assert_send_sync::<LoadError>();
    assert_send_sync::<SaveError>();
    assert_send_sync::<crate::CodecError>();
}

fn two_color_scene() -> SceneGraph {
    let mut volume = RawVolume::new(Region::from_lower_size([0, 0, 0], [3, 1, 2])).unwrap();
    volume.set([0, 0, 0], Voxel::Solid(0)).unwrap();
    volume.set([2, 0, 1], Voxel::Solid(1)).unwrap();
    let palette =
        Palette::from_colors([Rgba8::new(255, 255, 0, 255), Rgba8::new(0, 128, 0, 255)]).unwrap();
    let mut graph = SceneGraph::new();
    graph
        .add_node(SceneNode::new_model("thing", volume, palette), None)
        .unwrap();
    graph
}

fn colored_voxels(graph: &SceneGraph) -> Vec<([i32; 3], Rgba8)> {
    let mut voxels: Vec<_> = graph
        .iter_models()
        .flat_map(|(_, node)| {
            let volume = node.volume().unwrap();
            let lower = volume.region().lower_corner();
            volume.iter_solid().map(move |(point, index)| {
                ((point - lower).to_array(), node.palette().get(index).unwrap())
            })
        })
        .collect();
    voxels.sort();
    voxels
}

#[cfg(all(feature = "dot-vox", feature = "native"))]
#[rstest::rstest]
fn save_and_load_by_extension(#[values("scene.vox", "scene.json")] name: &str) {
    let registry = FormatRegistry::with_builtin_formats();
    let config = FormatConfig::default();
    let graph = two_color_scene();
    let file = MemoryFile::new(name, Vec::new());

    save_scene_to_file(&graph, &file, &registry, &config, &SaveContext::new()).unwrap();
    let loaded = load_scene_from_file(&file, &registry, &config, &LoadContext::new()).unwrap();

    assert_eq!(colored_voxels(&loaded), colored_voxels(&graph));
}

/// Detection by contents takes precedence over the file name.
#[cfg(all(feature = "dot-vox", feature = "native"))]
#[test]
fn load_detects_by_magic() {
    let registry = FormatRegistry::with_builtin_formats();
    let config = FormatConfig::default();
    let vox = MemoryFile::new("actually-vox.vox", Vec::new());
    save_scene_to_file(
        &two_color_scene(),
        &vox,
        &registry,
        &config,
        &SaveContext::new(),
    )
    .unwrap();

    let misnamed = MemoryFile::new("misnamed.json", vox.contents());
    let loaded = load_scene_from_file(&misnamed, &registry, &config, &LoadContext::new()).unwrap();
    assert_eq!(colored_voxels(&loaded), colored_voxels(&two_color_scene()));
}

#[cfg(feature = "native")]
#[test]
fn save_to_disk_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.json");
    let registry = FormatRegistry::with_builtin_formats();
    let config = FormatConfig::default();

    save_scene_to_path(
        &two_color_scene(),
        &path,
        &registry,
        &config,
        &SaveContext::new(),
    )
    .unwrap();
    let loaded = load_scene_from_file(&path, &registry, &config, &LoadContext::new()).unwrap();
    assert_eq!(loaded.model_count(), 1);
    assert_eq!(loaded.roots().next().unwrap().1.name(), "thing");
}
