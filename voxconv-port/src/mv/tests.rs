use std::collections::BTreeSet;
use std::io::{Cursor, Seek as _, SeekFrom};

use either::Either;
use pretty_assertions::assert_eq;

use voxconv::euclid::vec3;
use voxconv::math::{GridCoordinate, Region, Rgba8};
use voxconv::util::StopSignal;
use voxconv::{Palette, RawVolume, SceneGraph, SceneNode, Voxel};

use crate::mv::{self, DotVoxCodec, DotVoxConversionError, export, import};
use crate::{Codec as _, CodecError, FormatConfig, LoadContext, SaveContext, SaveError};

// -------------------------------------------------------------------------------------------------

const RED: Rgba8 = Rgba8::new(255, 0, 0, 255);
const BLUE: Rgba8 = Rgba8::new(0, 0, 255, 255);

fn palette_of(colors: impl IntoIterator<Item = Rgba8>) -> Palette {
    Palette::from_colors(colors).unwrap()
}

fn model(name: &str, region: Region, voxels: &[([GridCoordinate; 3], u8)]) -> SceneNode {
    let mut volume = RawVolume::new(region).unwrap();
    for &(point, index) in voxels {
        volume.set(point, Voxel::Solid(index)).unwrap();
    }
    SceneNode::new_model(name, volume, palette_of([RED, BLUE]))
}

/// Every solid voxel of the graph, in world space, with its color.
fn world_voxels(graph: &SceneGraph) -> BTreeSet<([GridCoordinate; 3], Rgba8)> {
    graph
        .iter_models()
        .flat_map(|(_, node)| {
            let volume = node.volume().unwrap();
            volume.iter_solid().map(move |(point, index)| {
                (
                    (point + node.world_translation()).to_array(),
                    node.palette().get(index).unwrap(),
                )
            })
        })
        .collect()
}

/// The voxels of each model relative to its lower corner, independent of placement.
fn model_shapes(graph: &SceneGraph) -> Vec<Vec<([GridCoordinate; 3], Rgba8)>> {
    let mut shapes: Vec<_> = graph
        .iter_models()
        .map(|(_, node)| {
            let volume = node.volume().unwrap();
            let lower = volume.region().lower_corner();
            let mut voxels: Vec<_> = volume
                .iter_solid()
                .map(|(point, index)| {
                    (
                        (point - lower).to_array(),
                        node.palette().get(index).unwrap(),
                    )
                })
                .collect();
            voxels.sort();
            voxels
        })
        .collect();
    shapes.sort();
    shapes
}

fn roundtrip(
    graph: &SceneGraph,
) -> Result<(SceneGraph, Palette), Either<CodecError, DotVoxConversionError>> {
    let data = export::scene_to_dot_vox_data(graph).map_err(Either::Left)?;
    let mut imported = SceneGraph::new();
    let mut palette = Palette::new();
    import::dot_vox_data_to_scene(&data, &mut imported, &mut palette, &LoadContext::new())
        .map_err(Either::Right)?;
    Ok((imported, palette))
}

fn data_with(
    models: Vec<dot_vox::Model>,
    scenes: Vec<dot_vox::SceneNode>,
) -> dot_vox::DotVoxData {
    dot_vox::DotVoxData {
        version: 150,
        models,
        palette: vec![
            dot_vox::Color {
                r: 10,
                g: 20,
                b: 30,
                a: 255
            };
            256
        ],
        materials: Vec::new(),
        scenes,
        layers: Vec::new(),
    }
}

fn one_voxel_model() -> dot_vox::Model {
    dot_vox::Model {
        size: dot_vox::Size { x: 1, y: 1, z: 1 },
        voxels: vec![dot_vox::Voxel {
            x: 0,
            y: 0,
            z: 0,
            i: 0,
        }],
    }
}

fn transform(child: u32, attributes: &[(&str, &str)], t: Option<&str>) -> dot_vox::SceneNode {
    let mut frame = dot_vox::Dict::default();
    if let Some(t) = t {
        frame.insert("_t".to_owned(), t.to_owned());
    }
    dot_vox::SceneNode::Transform {
        attributes: attributes
            .iter()
            .map(|&(k, v)| (k.to_owned(), v.to_owned()))
            .collect(),
        frames: vec![dot_vox::Frame { attributes: frame }],
        child,
        layer_id: 0,
    }
}

fn shape(model_id: u32) -> dot_vox::SceneNode {
    dot_vox::SceneNode::Shape {
        attributes: dot_vox::Dict::default(),
        models: vec![dot_vox::ShapeModel {
            model_id,
            attributes: dot_vox::Dict::default(),
        }],
    }
}

fn import_data(data: &dot_vox::DotVoxData) -> Result<SceneGraph, DotVoxConversionError> {
    let mut graph = SceneGraph::new();
    let mut palette = Palette::new();
    import::dot_vox_data_to_scene(data, &mut graph, &mut palette, &LoadContext::new())?;
    Ok(graph)
}

// -------------------------------------------------------------------------------------------------

#[test]
fn detects_magic() {
    let description = mv::description();
    assert!(description.matches_magic(u32::from_be_bytes(*b"VOX ")));
    assert!(!description.matches_magic(u32::from_be_bytes(*b"VOXX")));
    assert!(description.matches_extension("VOX"));
}

#[test]
fn invalid_file_error() {
    let error = import::parse(&[]).unwrap_err();
    assert!(
        matches!(
            error,
            DotVoxConversionError::Parse("Not a valid MagicaVoxel .vox file")
        ),
        "{error:?}"
    );
}

#[test]
fn export_import_scene() {
    // Irregular and negative coordinates to check the coordinate transform.
    let mut graph = SceneGraph::new();
    let mut group = SceneNode::new_group("group");
    group.set_local_translation(vec3(10, -3, 7));
    group.set_property("hidden", "0");
    let group = graph.add_node(group, None).unwrap();

    let mut inner = model(
        "inner",
        Region::from_lower_size([-20, -30, -40], [1, 2, 3]),
        &[([-20, -29, -38], 0), ([-20, -29, -40], 1)],
    );
    inner.set_local_translation(vec3(1, 2, 3));
    graph.add_node(inner, Some(group)).unwrap();
    graph
        .add_node(
            model(
                "outer",
                Region::from_lower_size([0, 0, 0], [4, 5, 6]),
                &[([3, 4, 5], 1)],
            ),
            None,
        )
        .unwrap();

    let (imported, _) = roundtrip(&graph).expect("roundtrip failed");

    assert_eq!(world_voxels(&imported), world_voxels(&graph));
    let summary: Vec<(String, bool, Option<String>)> = imported
        .iter()
        .map(|(_, node)| {
            (
                node.name().to_owned(),
                node.is_model(),
                node.parent()
                    .map(|p| imported.node(p).unwrap().name().to_owned()),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("group".to_owned(), false, None),
            ("inner".to_owned(), true, Some("group".to_owned())),
            ("outer".to_owned(), true, None),
        ]
    );
    let (_, imported_group) = imported.roots().next().unwrap();
    assert_eq!(imported_group.property("hidden"), Some("0"));
    assert_eq!(imported_group.local_translation(), vec3(10, -3, 7));
}

#[test]
fn export_shares_palette() {
    let mut graph = SceneGraph::new();
    let region = Region::from_lower_size([0, 0, 0], [2, 1, 1]);
    graph
        .add_node(model("a", region, &[([0, 0, 0], 0), ([1, 0, 0], 1)]), None)
        .unwrap();
    let mut b = model("b", region, &[([0, 0, 0], 0)]);
    b.set_palette(palette_of([BLUE]));
    graph.add_node(b, None).unwrap();

    let data = export::scene_to_dot_vox_data(&graph).unwrap();
    assert_eq!(data.palette.len(), 256);
    assert_eq!(&data.palette[..2], &[
        dot_vox::Color {
            r: 255,
            g: 0,
            b: 0,
            a: 255
        },
        dot_vox::Color {
            r: 0,
            g: 0,
            b: 255,
            a: 255
        },
    ]);
    assert_eq!(data.models[1].voxels[0].i, 1);
}

#[test]
fn export_palette_overflow_maps_to_closest() {
    let mut graph = SceneGraph::new();
    let region = Region::from_lower_size([0, 0, 0], [150, 1, 1]);
    for half in 0..2u32 {
        let colors = (0..150u32).map(|i| {
            let n = half * 150 + i;
            Rgba8::new(n as u8, (n >> 8) as u8, 7, 255)
        });
        let voxels: Vec<_> = (0..150).map(|i| ([i, 0, 0], i as u8)).collect();
        let mut node = model(&format!("m{half}"), region, &voxels);
        node.set_palette(palette_of(colors));
        graph.add_node(node, None).unwrap();
    }

    let data = export::scene_to_dot_vox_data(&graph).unwrap();
    assert_eq!(data.palette.len(), 256);
    let max_index = data
        .models
        .iter()
        .flat_map(|m| &m.voxels)
        .map(|v| v.i)
        .max()
        .unwrap();
    assert_eq!(max_index, 254);
}

#[test]
fn export_skips_empty_models() {
    let mut graph = SceneGraph::new();
    graph.add_node(SceneNode::new_group("empty group"), None).unwrap();
    let data = export::scene_to_dot_vox_data(&graph).unwrap();
    assert!(data.models.is_empty());
    // Root transform, root group, and the transform and group of "empty group".
    assert_eq!(data.scenes.len(), 4);
}

/// [`dot_vox`] only supports coordinates from 0-255
#[test]
fn codec_rejects_too_large_model() {
    let mut graph = SceneGraph::new();
    graph
        .add_node(
            model(
                "big",
                Region::from_lower_size([0, 0, 0], [257, 1, 1]),
                &[([256, 0, 0], 0)],
            ),
            None,
        )
        .unwrap();
    let error = DotVoxCodec
        .save_groups(
            &graph,
            "big.vox",
            &mut Cursor::new(Vec::<u8>::new()),
            &SaveContext::new(),
        )
        .unwrap_err();
    assert!(
        matches!(error, CodecError::NotRepresentable { .. }),
        "{error:?}"
    );
}

#[test]
fn format_splits_too_large_model() {
    let region = Region::from_lower_size([0, 0, 0], [300, 1, 1]);
    let voxels: Vec<_> = (0..300).map(|x| ([x, 0, 0], 1)).collect();
    let mut graph = SceneGraph::new();
    graph.add_node(model("long", region, &voxels), None).unwrap();

    let format = mv::format(&FormatConfig::default());
    let mut stream = Cursor::new(Vec::<u8>::new());
    format
        .save(&graph, "long.vox", &mut stream, &SaveContext::new())
        .unwrap();

    stream.seek(SeekFrom::Start(0)).unwrap();
    let mut loaded = SceneGraph::new();
    format
        .load("long.vox", &mut stream, &mut loaded, &LoadContext::new())
        .unwrap();
    assert_eq!(loaded.model_count(), 2);
    let solid: usize = loaded
        .iter_models()
        .map(|(_, node)| node.volume().unwrap().solid_count())
        .sum();
    assert_eq!(solid, 300);
}

#[test]
fn format_merge_rejects_too_large_model() {
    let mut graph = SceneGraph::new();
    graph
        .add_node(
            model(
                "big",
                Region::from_lower_size([0, 0, 0], [1, 1, 300]),
                &[([0, 0, 0], 0)],
            ),
            None,
        )
        .unwrap();
    let config = FormatConfig {
        merge_on_save: true,
        ..FormatConfig::default()
    };
    let error = mv::format(&config)
        .save(
            &graph,
            "big.vox",
            &mut Cursor::new(Vec::<u8>::new()),
            &SaveContext::new(),
        )
        .unwrap_err();
    assert!(
        matches!(error, SaveError::NotRepresentable { ref format, .. } if format == "MagicaVoxel"),
        "{error:?}"
    );
}

#[test]
fn bytes_roundtrip() {
    let mut graph = SceneGraph::new();
    graph
        .add_node(
            model(
                "a",
                Region::from_lower_size([5, 5, 5], [3, 2, 1]),
                &[([5, 5, 5], 0), ([7, 6, 5], 1)],
            ),
            None,
        )
        .unwrap();
    graph
        .add_node(
            model(
                "b",
                Region::from_lower_size([0, 0, 0], [1, 1, 4]),
                &[([0, 0, 3], 1)],
            ),
            None,
        )
        .unwrap();

    let format = mv::format(&FormatConfig::default());
    let mut stream = Cursor::new(Vec::<u8>::new());
    format
        .save(&graph, "a.vox", &mut stream, &SaveContext::new())
        .unwrap();
    assert_eq!(&stream.get_ref()[..4], b"VOX ");

    stream.seek(SeekFrom::Start(0)).unwrap();
    let mut loaded = SceneGraph::new();
    format
        .load("a.vox", &mut stream, &mut loaded, &LoadContext::new())
        .unwrap();
    assert_eq!(model_shapes(&loaded), model_shapes(&graph));

    stream.seek(SeekFrom::Start(0)).unwrap();
    let mut palette = Palette::new();
    let count = format
        .load_palette("a.vox", &mut stream, &mut palette, &LoadContext::new())
        .unwrap();
    assert_eq!(count, 256);
    assert_eq!(palette.get(0), Some(RED));
    assert_eq!(palette.get(1), Some(BLUE));
}

// -------------------------------------------------------------------------------------------------
// Import of hand-built data

#[test]
fn import_without_scenes() {
    let graph = import_data(&data_with(vec![one_voxel_model(), one_voxel_model()], vec![]))
        .unwrap();
    let names: Vec<&str> = graph.roots().map(|(_, node)| node.name()).collect();
    assert_eq!(names, ["model_0", "model_1"]);
    let (_, node) = graph.roots().next().unwrap();
    assert_eq!(node.palette().get(0), Some(Rgba8::new(10, 20, 30, 255)));
}

#[test]
fn import_translation_and_name() {
    let data = data_with(
        vec![one_voxel_model()],
        vec![
            transform(1, &[], None),
            dot_vox::SceneNode::Group {
                attributes: dot_vox::Dict::default(),
                children: vec![2],
            },
            transform(3, &[("_name", "thing"), ("color", "red")], Some("4 5 6")),
            dot_vox::SceneNode::Shape {
                attributes: dot_vox::Dict::default(),
                models: vec![dot_vox::ShapeModel {
                    model_id: 0,
                    attributes: dot_vox::Dict::default(),
                }],
            },
        ],
    );
    let graph = import_data(&data).unwrap();
    assert_eq!(graph.len(), 1);
    let (_, node) = graph.roots().next().unwrap();
    assert_eq!(node.name(), "thing");
    assert_eq!(node.property("color"), Some("red"));
    // MagicaVoxel (4, 5, 6) is our (4, 6, -5); a 1-voxel model's center is its lower corner.
    assert_eq!(node.world_translation(), vec3(4, 6, -5));
}

#[test]
fn import_cycle() {
    let data = data_with(
        vec![],
        vec![
            transform(1, &[], None),
            dot_vox::SceneNode::Group {
                attributes: dot_vox::Dict::default(),
                children: vec![0],
            },
        ],
    );
    let error = import_data(&data).unwrap_err();
    assert!(
        matches!(error, DotVoxConversionError::SceneGraphCycle(0)),
        "{error:?}"
    );
}

#[test]
fn import_missing_model() {
    let data = data_with(
        vec![],
        vec![
            transform(1, &[], None),
            dot_vox::SceneNode::Shape {
                attributes: dot_vox::Dict::default(),
                models: vec![dot_vox::ShapeModel {
                    model_id: 5,
                    attributes: dot_vox::Dict::default(),
                }],
            },
        ],
    );
    let error = import_data(&data).unwrap_err();
    assert!(
        matches!(error, DotVoxConversionError::MissingModel(5)),
        "{error:?}"
    );
}

#[test]
fn import_missing_scene_node() {
    let data = data_with(vec![], vec![transform(7, &[], None)]);
    let error = import_data(&data).unwrap_err();
    assert!(
        matches!(error, DotVoxConversionError::MissingSceneNode(7)),
        "{error:?}"
    );
}

#[test]
fn import_bad_translation() {
    let data = data_with(vec![one_voxel_model()], vec![transform(1, &[], Some("1 2"))]);
    let error = import_data(&data).unwrap_err();
    assert!(
        matches!(
            error,
            DotVoxConversionError::SceneAttributeParse {
                scene_index: 0,
                attribute: "_t"
            }
        ),
        "{error:?}"
    );
}

#[rstest::rstest]
#[case::negated_axis(vec![
    transform(1, &[], Some("0 -2147483648 0")),
    shape(0),
])]
#[case::nested(vec![
    transform(1, &[], Some("2147483647 0 0")),
    transform(2, &[], Some("1 0 0")),
    shape(0),
])]
#[case::model_center(vec![
    transform(1, &[], Some("-2147483648 0 0")),
    shape(1),
])]
fn import_translation_overflow(#[case] scenes: Vec<dot_vox::SceneNode>) {
    let two_wide = dot_vox::Model {
        size: dot_vox::Size { x: 2, y: 1, z: 1 },
        voxels: vec![],
    };
    let data = data_with(vec![one_voxel_model(), two_wide], scenes);
    let error = import_data(&data).unwrap_err();
    assert!(
        matches!(error, DotVoxConversionError::TransformOverflow),
        "{error:?}"
    );
}

#[test]
fn export_translation_overflow() {
    let mut node = model("far", Region::new([0, 0, 0], [0, 0, 0]), &[([0, 0, 0], 0)]);
    node.set_local_translation(vec3(0, 0, GridCoordinate::MIN));
    let mut graph = SceneGraph::new();
    graph.add_node(node, None).unwrap();

    let error = export::scene_to_dot_vox_data(&graph).unwrap_err();
    assert!(
        matches!(error, CodecError::NotRepresentable { .. }),
        "{error:?}"
    );
}

#[test]
fn import_palette_too_short() {
    let mut data = data_with(vec![one_voxel_model()], vec![]);
    data.palette.clear();
    let error = import_data(&data).unwrap_err();
    assert!(
        matches!(
            error,
            DotVoxConversionError::PaletteTooShort { len: 0, index: 0 }
        ),
        "{error:?}"
    );
}

#[test]
fn import_cancelled() {
    let stop = StopSignal::new();
    stop.stop();
    let mut graph = SceneGraph::new();
    let error = import::dot_vox_data_to_scene(
        &data_with(vec![one_voxel_model()], vec![]),
        &mut graph,
        &mut Palette::new(),
        &LoadContext::new().with_stop_signal(stop),
    )
    .unwrap_err();
    assert!(matches!(error, DotVoxConversionError::Cancelled));
    assert!(matches!(CodecError::from(error), CodecError::Cancelled));
}
