use super::*;
use crate::scene::{find_object, trees_match};
use glam::Vec2;
use std::time::Duration;

/// 100 x 100 quad lying in z = 0, facing the camera.
const BACKDROP: &str = r#"{
    "asset": {"version": "2.0"},
    "scenes": [{"nodes": [0]}],
    "nodes": [{"name": "Backdrop", "mesh": 0}],
    "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
    "buffers": [{"byteLength": 60,
        "uri": "data:application/octet-stream;base64,AABIwgAASMIAAAAAAABIQgAASMIAAAAAAABIQgAASEIAAAAAAABIwgAASEIAAAAAAAABAAIAAAACAAMA"}],
    "bufferViews": [
        {"buffer": 0, "byteOffset": 0, "byteLength": 48},
        {"buffer": 0, "byteOffset": 48, "byteLength": 12}
    ],
    "accessors": [
        {"bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3",
         "min": [-50.0, -50.0, 0.0], "max": [50.0, 50.0, 0.0]},
        {"bufferView": 1, "componentType": 5123, "count": 6, "type": "SCALAR"}
    ]
}"#;

/// One triangle (0,0,0), (1,0,0), (0,1,0).
const TRIANGLE: &str = r#"{
    "asset": {"version": "2.0"},
    "scenes": [{"nodes": [0]}],
    "nodes": [{"name": "Tri", "mesh": 0}],
    "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
    "buffers": [{"byteLength": 36,
        "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"}],
    "bufferViews": [{"buffer": 0, "byteLength": 36}],
    "accessors": [{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
        "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]}]
}"#;

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn studio_with(config: StudioConfig) -> (Studio, Instant) {
    let mut studio = Studio::new(config).unwrap();
    // Looking straight down -Z from z = 10; screen centre hits the origin.
    let mut camera = CameraController::new(Vec3::new(0.0, 0.0, 10.0), -std::f32::consts::FRAC_PI_2, 0.0);
    camera.set_viewport(100.0, 100.0);
    *studio.camera_mut() = camera;
    let t0 = Instant::now();
    studio.update(t0);
    (studio, t0)
}

fn studio() -> (Studio, Instant) {
    studio_with(StudioConfig::default())
}

fn load(studio: &mut Studio, name: &str, now: Instant) -> ModelId {
    load_source(studio, name, BACKDROP, now)
}

fn load_source(studio: &mut Studio, name: &str, source: &str, now: Instant) -> ModelId {
    studio
        .import_bytes(name, source.as_bytes().to_vec(), ImportMode::Replace)
        .unwrap();
    studio.update(now);
    // Loading a model reframes the camera; put it back for screen mapping.
    let mut camera = CameraController::new(Vec3::new(0.0, 0.0, 10.0), -std::f32::consts::FRAC_PI_2, 0.0);
    camera.set_viewport(100.0, 100.0);
    *studio.camera_mut() = camera;
    studio.models().last().unwrap().id
}

fn screen_for(studio: &Studio, world: Vec3) -> Vec2 {
    let camera = studio.camera();
    let half = (camera.fov_y * 0.5).tan();
    let depth = camera.position.z - world.z;
    let ndc = Vec2::new(world.x / (depth * half), world.y / (depth * half));
    Vec2::new((ndc.x + 1.0) * 0.5 * 100.0, (1.0 - ndc.y) * 0.5 * 100.0)
}

fn click(studio: &mut Studio, world: Vec3) {
    let position = screen_for(studio, world);
    studio.handle_pointer(&PointerEvent::new(PointerPhase::Down, position));
    studio.handle_pointer(&PointerEvent::new(PointerPhase::Up, position));
}

fn backdrop_mesh(studio: &Studio) -> NodeId {
    let root = studio.models().last().unwrap().root;
    studio
        .engine()
        .descendants(root)
        .into_iter()
        .find(|id| studio.engine().node(*id).unwrap().name == "Backdrop")
        .unwrap()
}

fn overlay_children(studio: &Studio, node: NodeId) -> usize {
    studio
        .engine()
        .children(node)
        .iter()
        .filter(|id| studio.engine().node(**id).is_some_and(|n| n.role == NodeRole::Overlay))
        .count()
}

#[test]
fn select_deselect_round_trip() {
    let (mut studio, t0) = studio();
    load(&mut studio, "backdrop.gltf", t0 + ms(1));
    let mesh = backdrop_mesh(&studio);
    let slot_before = studio.engine().node(mesh).unwrap().material.clone().unwrap();
    let material_before = studio.engine().material(slot_before.ids()[0]).unwrap().clone();
    studio.drain_events();

    click(&mut studio, Vec3::ZERO);
    assert_eq!(studio.selection(), vec![mesh]);
    assert_eq!(studio.engine().node(mesh).unwrap().material.as_ref().unwrap().len(), 2);
    assert_eq!(overlay_children(&studio, mesh), 1);

    assert!(studio.select_by_id(None, false));
    let slot_after = studio.engine().node(mesh).unwrap().material.clone().unwrap();
    assert_eq!(slot_after, slot_before);
    assert_eq!(studio.engine().material(slot_after.ids()[0]).unwrap(), &material_before);
    assert_eq!(overlay_children(&studio, mesh), 0);

    let selections: Vec<Option<String>> = studio
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            StudioEvent::SelectionChanged { selected, .. } => Some(selected.map(|m| m.name)),
            _ => None,
        })
        .collect();
    assert_eq!(selections, vec![Some("Backdrop".to_string()), None]);
}

#[test]
fn two_click_measurement() {
    let (mut studio, t0) = studio();
    load(&mut studio, "backdrop.gltf", t0 + ms(1));
    assert!(studio.set_tool(ToolType::Measure));

    click(&mut studio, Vec3::ZERO);
    click(&mut studio, Vec3::new(3.0, 4.0, 0.0));

    assert_eq!(studio.measurements().len(), 1);
    let measurement = &studio.measurements()[0];
    assert!((measurement.distance - 5.0).abs() < 1e-3);
    assert_eq!(measurement.label, "5.00 m");
    let events = studio.drain_events();
    assert!(events
        .iter()
        .any(|event| matches!(event, StudioEvent::ToolChanged { tool: ToolType::Measure })));
    assert!(events
        .iter()
        .any(|event| matches!(event, StudioEvent::MeasurementCreated { .. })));
}

#[test]
fn oversized_import_is_rejected_without_side_effects() {
    let config = StudioConfig {
        max_import_bytes: 64,
        ..StudioConfig::default()
    };
    let (mut studio, t0) = studio_with(config);
    let baseline = studio.engine().resource_counts();
    studio.drain_events();

    let result = studio.import_bytes("huge.glb", vec![0; 65], ImportMode::Replace);
    assert!(matches!(result, Err(AssetError::TooLarge { size: 65, limit: 64, .. })));
    studio.update(t0 + ms(100));

    assert_eq!(studio.engine().resource_counts(), baseline);
    assert!(studio.models().is_empty());
    assert!(!studio.is_importing());
    assert!(studio
        .drain_events()
        .iter()
        .any(|event| matches!(event, StudioEvent::ImportFailed { .. })));
}

#[test]
fn deleted_measurement_returns_resources_to_baseline() {
    let (mut studio, t0) = studio();
    load(&mut studio, "backdrop.gltf", t0 + ms(1));
    let baseline = studio.engine().resource_counts();

    studio.set_tool(ToolType::Measure);
    click(&mut studio, Vec3::ZERO);
    click(&mut studio, Vec3::new(1.0, 1.0, 0.0));
    let id = studio.measurements()[0].id.clone();
    studio.update(t0 + ms(100));
    assert!(find_object(studio.scene_tree(), &id).is_some());

    assert!(studio.delete_object(&id));
    assert!(studio.measurements().is_empty());
    assert!(studio.selection().is_empty());
    assert_eq!(studio.engine().resource_counts(), baseline);

    studio.update(t0 + ms(200));
    assert!(find_object(studio.scene_tree(), &id).is_none());
    assert!(studio
        .drain_events()
        .iter()
        .any(|event| matches!(event, StudioEvent::ObjectDeleted { id: deleted } if *deleted == id)));
}

#[test]
fn superseded_import_leaves_no_trace() {
    let (mut studio, t0) = studio();
    let baseline = studio.engine().resource_counts();

    studio
        .import_bytes("a.gltf", BACKDROP.as_bytes().to_vec(), ImportMode::Replace)
        .unwrap();
    let job_a = studio.take_import_job().unwrap();
    studio
        .import_bytes("b.gltf", BACKDROP.as_bytes().to_vec(), ImportMode::Replace)
        .unwrap();

    // A finishes after B was requested.
    assert!(studio.run_import_job(job_a).is_none());
    assert_eq!(studio.engine().resource_counts(), baseline);
    assert!(studio.models().is_empty());

    studio.update(t0 + ms(1));
    let names: Vec<&str> = studio.models().iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["b.gltf"]);
    assert!(studio.scene_tree().iter().all(|object| object.name != "a.gltf"));
    assert!(studio.scene_tree().iter().any(|object| object.name == "b.gltf"));
}

#[test]
fn preview_line_does_not_accumulate() {
    let (mut studio, t0) = studio();
    load(&mut studio, "backdrop.gltf", t0 + ms(1));
    studio.set_tool(ToolType::Measure);
    let before_click = studio.engine().resource_counts();

    click(&mut studio, Vec3::ZERO);
    let with_preview = studio.engine().resource_counts();
    for step in 1..=20 {
        let position = screen_for(&studio, Vec3::new(step as f32 * 0.1, 0.0, 0.0));
        studio.handle_pointer(&PointerEvent::new(PointerPhase::Move, position));
    }
    assert_eq!(studio.engine().resource_counts(), with_preview);

    studio.cancel_interactions();
    assert_eq!(studio.engine().resource_counts(), before_click);
    assert!(studio.tools().pending_start().is_none());
}

#[test]
fn rebuild_without_structural_change_is_stable() {
    let (mut studio, t0) = studio();
    load(&mut studio, "backdrop.gltf", t0 + ms(1));
    studio.update(t0 + ms(100));
    let first = studio.scene_tree().to_vec();
    let rebuilds = studio.rebuild_count();

    let model_id = descriptor_id(ObjectType::Model.id_prefix(), studio.models()[0].root);
    assert!(studio.set_object_visibility(&model_id, true));
    studio.update(t0 + ms(200));

    assert_eq!(studio.rebuild_count(), rebuilds + 1);
    assert!(trees_match(&first, studio.scene_tree()));
    assert!(find_object(studio.scene_tree(), &model_id).is_some());
}

#[test]
fn burst_of_point_clicks_rebuilds_once() {
    let (mut studio, t0) = studio();
    let loaded_at = t0 + ms(1);
    load(&mut studio, "backdrop.gltf", loaded_at);
    studio.set_tool(ToolType::Point);
    let rebuilds = studio.rebuild_count();

    for step in 0..5 {
        click(&mut studio, Vec3::new(step as f32 * 0.5 - 1.0, 0.0, 0.0));
    }
    studio.update(loaded_at + ms(10));
    assert_eq!(studio.rebuild_count(), rebuilds);
    studio.update(loaded_at + ms(60));
    assert_eq!(studio.rebuild_count(), rebuilds + 1);
    studio.update(loaded_at + ms(500));
    assert_eq!(studio.rebuild_count(), rebuilds + 1);

    let points = studio
        .scene_tree()
        .iter()
        .filter(|object| object.object_type == ObjectType::Point)
        .count();
    assert_eq!(points, 5);
}

#[test]
fn commands_reach_the_studio_through_the_channel() {
    let (mut studio, t0) = studio();
    let sender = studio.command_sender();
    sender.send(StudioCommand::SetTool(ToolType::Measure)).unwrap();
    sender.send(StudioCommand::AddPrimitive(PrimitiveShape::Box)).unwrap();
    sender
        .send(StudioCommand::ImportBytes {
            name: "backdrop.gltf".into(),
            bytes: BACKDROP.as_bytes().to_vec(),
            mode: ImportMode::Add,
        })
        .unwrap();
    studio.update(t0 + ms(100));

    assert_eq!(studio.active_tool(), ToolType::Measure);
    assert_eq!(studio.models().len(), 1);
    assert!(studio
        .scene_tree()
        .iter()
        .any(|object| object.object_type == ObjectType::Primitive));
    assert!(studio
        .drain_events()
        .iter()
        .any(|event| matches!(event, StudioEvent::ModelLoaded { .. })));
}

#[test]
fn replace_disposes_previous_model_and_switch_hides_others() {
    let (mut studio, t0) = studio();
    let first = load(&mut studio, "first.gltf", t0 + ms(1));
    let first_root = studio.models()[0].root;
    let with_one = studio.engine().resource_counts();

    load(&mut studio, "second.gltf", t0 + ms(2));
    assert_eq!(studio.models().len(), 1);
    assert!(!studio.engine().contains(first_root));
    assert_eq!(studio.engine().resource_counts(), with_one);
    assert!(!studio.switch_model(first));

    studio
        .import_bytes("third.gltf", BACKDROP.as_bytes().to_vec(), ImportMode::Add)
        .unwrap();
    studio.update(t0 + ms(3));
    assert_eq!(studio.models().len(), 2);
    let second = studio.models()[0].id;
    let third_root = studio.models()[1].root;
    assert!(studio.switch_model(second));
    assert_eq!(studio.current_model().map(|m| m.id), Some(second));
    assert!(!studio.engine().node(third_root).unwrap().visible);

    assert!(studio.remove_model(second));
    assert!(studio.remove_model(studio.models()[0].id));
    assert!(studio.models().is_empty());
}

#[test]
fn inspect_reports_model_and_selection() {
    let (mut studio, t0) = studio();
    load(&mut studio, "backdrop.gltf", t0 + ms(1));
    let model_id = descriptor_id(ObjectType::Model.id_prefix(), studio.models()[0].root);
    let info = studio.inspect(&model_id).unwrap();
    assert_eq!(info.object_type, ObjectType::Model);
    assert_eq!(info.mesh_count, 1);
    assert!(studio.inspect("mesh-ffffffff").is_none());
    assert!(!studio.delete_object(&model_id.replace("model", "light")));
}

#[test]
fn environment_and_lights_update_scene_nodes() {
    let (mut studio, t0) = studio();
    studio.set_environment(EnvironmentSettings {
        ground_visible: true,
        preset: Some("studio".into()),
        exposure: 1.5,
    });
    studio.update(t0 + ms(1));
    assert!(studio.engine().node(studio.ground()).unwrap().visible);
    assert!(studio
        .scene_tree()
        .iter()
        .any(|object| object.object_type == ObjectType::Environment && object.name == "studio"));

    let before = studio.engine().resource_counts();
    studio.set_environment(EnvironmentSettings::default());
    assert_eq!(studio.engine().resource_counts().nodes, before.nodes - 1);

    studio.set_light_settings(LightSettings {
        intensity: 3.0,
        ..LightSettings::default()
    });
    let sun = studio.engine().node(studio.sun_light).unwrap();
    assert_eq!(sun.light.unwrap().intensity, 3.0);
}

#[test]
fn shutdown_releases_interaction_resources() {
    let (mut studio, t0) = studio();
    load(&mut studio, "backdrop.gltf", t0 + ms(1));
    let baseline = studio.engine().resource_counts();

    click(&mut studio, Vec3::ZERO);
    assert!(studio.materials().overlay_material().is_some());
    studio.shutdown();

    assert!(studio.materials().is_disposed());
    assert!(studio.selection().is_empty());
    assert_eq!(studio.engine().resource_counts(), baseline);
    // Further input is ignored.
    click(&mut studio, Vec3::ZERO);
    assert!(studio.selection().is_empty());
}

#[test]
fn measurements_survive_export_and_import() {
    let (mut studio, t0) = studio();
    load(&mut studio, "backdrop.gltf", t0 + ms(1));
    studio.set_tool(ToolType::Measure);
    click(&mut studio, Vec3::ZERO);
    click(&mut studio, Vec3::new(3.0, 4.0, 0.0));

    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let path = std::env::temp_dir().join(format!("studio3d_measurements_{}_{nonce}.json", std::process::id()));
    studio.export_measurements(&path).unwrap();
    studio.clear_measurements();
    assert!(studio.measurements().is_empty());

    let restored = studio.import_measurements(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert_eq!(restored, 1);
    assert!((studio.measurements()[0].distance - 5.0).abs() < 1e-3);
}

#[test]
fn clicks_land_on_the_surface_not_its_bounds() {
    let (mut studio, t0) = studio();
    load_source(&mut studio, "tri.gltf", TRIANGLE, t0 + ms(1));
    studio.set_tool(ToolType::Point);
    studio.drain_events();

    // Inside the bounding square but outside the triangle.
    click(&mut studio, Vec3::new(0.9, 0.9, 0.0));
    assert!(!studio
        .drain_events()
        .iter()
        .any(|event| matches!(event, StudioEvent::PointCreated { .. })));

    click(&mut studio, Vec3::new(0.2, 0.2, 0.0));
    let created: Vec<Vec3> = studio
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            StudioEvent::PointCreated { position, .. } => Some(position),
            _ => None,
        })
        .collect();
    assert_eq!(created.len(), 1);
    assert!((created[0] - Vec3::new(0.2, 0.2, 0.0)).length() < 1e-3);
}

#[test]
fn lights_cannot_be_selected() {
    let (mut studio, t0) = studio();
    load(&mut studio, "backdrop.gltf", t0 + ms(1));
    click(&mut studio, Vec3::ZERO);
    let mesh = backdrop_mesh(&studio);
    studio.drain_events();

    let light = studio.descriptor_for(studio.sun_light).unwrap();
    assert!(!studio.select_by_id(Some(&light), false));
    assert_eq!(studio.selection(), vec![mesh]);
    assert_eq!(overlay_children(&studio, studio.sun_light), 0);
    assert!(!studio
        .drain_events()
        .iter()
        .any(|event| matches!(event, StudioEvent::SelectionChanged { .. })));
}

#[test]
fn moved_measurement_exports_where_it_was_dropped() {
    let (mut studio, t0) = studio();
    load(&mut studio, "backdrop.gltf", t0 + ms(1));
    studio.set_tool(ToolType::Measure);
    click(&mut studio, Vec3::ZERO);
    click(&mut studio, Vec3::new(3.0, 4.0, 0.0));

    studio.set_tool(ToolType::Move);
    studio.handle_pointer(&PointerEvent::new(PointerPhase::Down, screen_for(&studio, Vec3::ZERO)));
    let target = screen_for(&studio, Vec3::new(1.0, 0.0, 0.0));
    studio.handle_pointer(&PointerEvent::new(PointerPhase::Move, target));
    studio.handle_pointer(&PointerEvent::new(PointerPhase::Up, target));

    let stored = studio.measurements()[0].clone();
    assert!(stored.start_point.x > 0.9);
    assert!((stored.end_point - stored.start_point - Vec3::new(3.0, 4.0, 0.0)).length() < 1e-3);
    assert!((stored.distance - 5.0).abs() < 1e-3);

    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let path = std::env::temp_dir().join(format!("studio3d_moved_{}_{nonce}.json", std::process::id()));
    studio.export_measurements(&path).unwrap();
    let exported = serialization::load_measurements_from_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0].start_point, stored.start_point);
    assert_eq!(exported[0].end_point, stored.end_point);
}
