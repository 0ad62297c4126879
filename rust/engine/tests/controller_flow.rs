// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scenes driven through the controller the way a host would drive them

use approx::assert_relative_eq;
use dynmod_engine::rules::{append, boundary_cut, curve_cut, mirror, plane_cut};
use dynmod_engine::{
    BindingState, Curve, ModelerConfig, ModelerController, NodeData, NodeKey, ParameterRecord,
    RuleRegistry, RunStatus, Scene,
};
use dynmod_geometry::shapes::{cuboid, disc, disc_ring, signed_volume, uv_sphere};
use dynmod_geometry::{boundary_edges, Mesh, Plane, Point3, Vector3};

fn controller() -> ModelerController {
    controller_with(ModelerConfig::default())
}

fn controller_with(config: ModelerConfig) -> ModelerController {
    ModelerController::with_registry(RuleRegistry::with_builtin_rules(config), config)
}

fn sphere() -> Mesh {
    uv_sphere(Point3::origin(), 1.0, 10, 11)
}

fn plane_node(scene: &mut Scene, name: &str, origin: Point3<f64>, normal: Vector3<f64>) -> NodeKey {
    scene.add_node(name, NodeData::Plane(Plane::new(origin, normal).unwrap()))
}

#[test]
fn cut_mirror_append_chain_follows_the_plane() {
    let mut scene = Scene::new();
    let source = scene.add_model("sphere", sphere());
    let plane = plane_node(&mut scene, "plane", Point3::origin(), Vector3::y());
    let half = scene.add_model("half", Mesh::new());
    let mirrored = scene.add_model("mirrored", Mesh::new());
    let whole = scene.add_model("whole", Mesh::new());

    scene.add_record(
        ParameterRecord::new("cut")
            .with_rule("Plane cut")
            .with_continuous_update(true)
            .with_attribute(plane_cut::CAP_SURFACE, "0")
            .with_reference(plane_cut::INPUT_MODEL, source)
            .with_reference(plane_cut::INPUT_PLANE, plane)
            .with_reference(plane_cut::OUTPUT_POSITIVE, half),
    );
    scene.add_record(
        ParameterRecord::new("mirror")
            .with_rule("Mirror")
            .with_continuous_update(true)
            .with_reference(mirror::INPUT_MODEL, half)
            .with_reference(mirror::INPUT_PLANE, plane)
            .with_reference(mirror::OUTPUT_MODEL, mirrored),
    );
    let mut append_record = ParameterRecord::new("append")
        .with_rule("Append")
        .with_continuous_update(true)
        .with_attribute(append::MERGE_POINTS, "1")
        .with_attribute(append::MERGE_TOLERANCE, "1e-9")
        .with_reference(append::OUTPUT_MODEL, whole);
    append_record.add_reference(append::INPUT_MODEL, half);
    append_record.add_reference(append::INPUT_MODEL, mirrored);
    scene.add_record(append_record);

    let mut controller = controller();
    let report = controller.process_events(&mut scene);
    assert!(report.failed.is_empty());
    assert!(!report.truncated);
    assert!(!scene.has_pending_events());

    let result = scene.mesh(whole).unwrap();
    assert!(boundary_edges(result).is_empty());
    assert_relative_eq!(
        signed_volume(result),
        signed_volume(&sphere()),
        max_relative = 1e-2
    );

    scene
        .set_plane(plane, Plane::new(Point3::new(0.0, 0.3, 0.0), Vector3::y()).unwrap())
        .unwrap();
    let report = controller.process_events(&mut scene);
    assert!(report.failed.is_empty());
    assert!(report.updated.len() >= 3);

    let result = scene.mesh(whole).unwrap();
    let min_y = result.positions.iter().map(|p| p.y).fold(f64::MAX, f64::min);
    assert!(min_y < -0.3);
    assert!(result
        .positions
        .iter()
        .all(|p| (p.y - 0.3).abs() <= 0.7 + 1e-9));
}

#[test]
fn self_feeding_record_loses_continuous_update() {
    let mut scene = Scene::new();
    let model = scene.add_model("sphere", sphere());
    let plane = plane_node(&mut scene, "plane", Point3::new(2.0, 0.0, 0.0), Vector3::x());
    let record = scene.add_record(
        ParameterRecord::new("loop")
            .with_rule("Mirror")
            .with_continuous_update(true)
            .with_reference(mirror::INPUT_MODEL, model)
            .with_reference(mirror::INPUT_PLANE, plane)
            .with_reference(mirror::OUTPUT_MODEL, model),
    );

    let mut controller = controller();
    let report = controller.process_events(&mut scene);
    assert_eq!(report.cycles, vec![record]);
    assert!(report.updated.is_empty());
    assert!(!scene.record(record).unwrap().continuous_update);
    assert!(controller.has_circular_reference(&scene, record));

    // A manual run still goes through
    assert_eq!(controller.run(&mut scene, record).unwrap(), RunStatus::Updated);
    assert!(scene.mesh(model).unwrap().positions.iter().all(|p| p.x > 2.0));
    let report = controller.process_events(&mut scene);
    assert!(report.updated.is_empty());
}

#[test]
fn mutual_records_stop_at_the_round_limit() {
    let config = ModelerConfig {
        max_event_rounds: 5,
        ..ModelerConfig::default()
    };
    let mut scene = Scene::new();
    let a = scene.add_model("a", sphere());
    let b = scene.add_model("b", Mesh::new());
    let plane = plane_node(&mut scene, "plane", Point3::origin(), Vector3::z());
    for (name, input, output) in [("a to b", a, b), ("b to a", b, a)] {
        scene.add_record(
            ParameterRecord::new(name)
                .with_rule("Mirror")
                .with_continuous_update(true)
                .with_reference(mirror::INPUT_MODEL, input)
                .with_reference(mirror::INPUT_PLANE, plane)
                .with_reference(mirror::OUTPUT_MODEL, output),
        );
    }

    let mut controller = controller_with(config);
    let report = controller.process_events(&mut scene);
    assert!(report.truncated);
    assert_eq!(report.rounds, 5);
    assert!(report.cycles.is_empty());
    assert!(!scene.has_pending_events());
}

#[test]
fn curve_cut_follows_the_curve() {
    let segments = 16;
    let mesh = disc(Point3::origin(), 4.0, 4, segments);
    let ring = |r: usize| -> Curve {
        Curve::new(
            disc_ring(r, segments)
                .into_iter()
                .map(|i| mesh.positions[i as usize])
                .collect(),
            true,
        )
    };

    let mut scene = Scene::new();
    let model = scene.add_model("disc", mesh.clone());
    let curve = scene.add_node("curve", NodeData::Curve(ring(2)));
    let out = scene.add_model("patch", Mesh::new());
    scene.add_record(
        ParameterRecord::new("patch")
            .with_rule("Curve cut")
            .with_continuous_update(true)
            .with_reference(curve_cut::INPUT_MODEL, model)
            .with_reference(curve_cut::INPUT_CURVE, curve)
            .with_reference(curve_cut::OUTPUT_MODEL, out),
    );

    let mut controller = controller();
    controller.process_events(&mut scene);
    assert_eq!(scene.mesh(out).unwrap().face_count(), 3 * segments);

    scene.set_curve(curve, ring(1)).unwrap();
    let report = controller.process_events(&mut scene);
    assert_eq!(report.updated.len(), 1);
    assert_eq!(scene.mesh(out).unwrap().face_count(), segments);
}

#[test]
fn boundary_cut_follows_the_seed() {
    let mut scene = Scene::new();
    let model = scene.add_model("sphere", uv_sphere(Point3::origin(), 1.0, 9, 12));
    let plane = plane_node(&mut scene, "equator", Point3::origin(), Vector3::z());
    let seed = scene.add_node("seed", NodeData::Points(vec![Point3::new(0.0, 0.0, 2.0)]));
    let out = scene.add_model("cap", Mesh::new());
    scene.add_record(
        ParameterRecord::new("cap")
            .with_rule("Boundary cut")
            .with_continuous_update(true)
            .with_reference(boundary_cut::INPUT_MODEL, model)
            .with_reference(boundary_cut::INPUT_BORDER, plane)
            .with_reference(boundary_cut::INPUT_SEED, seed)
            .with_reference(boundary_cut::OUTPUT_MODEL, out),
    );

    let mut controller = controller();
    controller.process_events(&mut scene);
    assert!(scene.mesh(out).unwrap().positions.iter().all(|p| p.z > 0.0));

    scene
        .set_points(seed, vec![Point3::new(0.0, 0.0, -2.0)])
        .unwrap();
    controller.process_events(&mut scene);
    let cap = scene.mesh(out).unwrap();
    // The rim sits on the last ring above the equator
    let rim = (4.0 * std::f64::consts::PI / 9.0).cos();
    assert!(cap.positions.iter().all(|p| p.z < rim));
    assert!(cap.positions.iter().any(|p| p.z < -0.5));
}

/// Run one continuous record over `scene` and check that it was skipped
/// without touching `out`, which starts out holding a unit cube
fn assert_skipped_untouched(mut scene: Scene, record: ParameterRecord, out: NodeKey) {
    let record = scene.add_record(record);
    let mut controller = controller();
    let report = controller.process_events(&mut scene);
    assert!(report.skipped.contains(&record));
    assert!(report.updated.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(scene.mesh(out).unwrap(), &placeholder());
    assert!(scene.record(record).unwrap().continuous_update);
}

fn placeholder() -> Mesh {
    cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
}

#[test]
fn empty_input_model_is_skipped() {
    let mut scene = Scene::new();
    let model = scene.add_model("empty", Mesh::new());
    let plane = plane_node(&mut scene, "plane", Point3::origin(), Vector3::x());
    let out = scene.add_model("out", placeholder());
    let record = ParameterRecord::new("mirror")
        .with_rule("Mirror")
        .with_continuous_update(true)
        .with_reference(mirror::INPUT_MODEL, model)
        .with_reference(mirror::INPUT_PLANE, plane)
        .with_reference(mirror::OUTPUT_MODEL, out);
    assert_skipped_untouched(scene, record, out);
}

#[test]
fn empty_border_curve_is_skipped() {
    let mut scene = Scene::new();
    let model = scene.add_model("sphere", sphere());
    let curve = scene.add_node("curve", NodeData::Curve(Curve::default()));
    let out = scene.add_model("out", placeholder());
    let record = ParameterRecord::new("cut")
        .with_rule("Boundary cut")
        .with_continuous_update(true)
        .with_reference(boundary_cut::INPUT_MODEL, model)
        .with_reference(boundary_cut::INPUT_BORDER, curve)
        .with_reference(boundary_cut::OUTPUT_MODEL, out);
    assert_skipped_untouched(scene, record, out);
}

#[test]
fn two_point_selection_loop_is_skipped() {
    let mut scene = Scene::new();
    let model = scene.add_model("sphere", sphere());
    let curve = scene.add_node(
        "curve",
        NodeData::Curve(Curve::new(
            vec![Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            true,
        )),
    );
    let out = scene.add_model("out", placeholder());
    let record = ParameterRecord::new("patch")
        .with_rule("Curve cut")
        .with_continuous_update(true)
        .with_reference(curve_cut::INPUT_MODEL, model)
        .with_reference(curve_cut::INPUT_CURVE, curve)
        .with_reference(curve_cut::OUTPUT_MODEL, out);
    assert_skipped_untouched(scene, record, out);
}

#[test]
fn plane_missing_the_model_is_skipped() {
    let mut scene = Scene::new();
    let model = scene.add_model("sphere", sphere());
    let plane = plane_node(&mut scene, "above", Point3::new(0.0, 0.0, 2.0), Vector3::z());
    let out = scene.add_model("out", placeholder());
    let record = ParameterRecord::new("cut")
        .with_rule("Boundary cut")
        .with_continuous_update(true)
        .with_reference(boundary_cut::INPUT_MODEL, model)
        .with_reference(boundary_cut::INPUT_BORDER, plane)
        .with_reference(boundary_cut::OUTPUT_MODEL, out);
    assert_skipped_untouched(scene, record, out);
}

#[test]
fn removing_an_input_node_unbinds_it() {
    let mut scene = Scene::new();
    let model = scene.add_model("sphere", sphere());
    let plane = plane_node(&mut scene, "plane", Point3::origin(), Vector3::x());
    let out = scene.add_model("out", Mesh::new());
    let record = scene.add_record(
        ParameterRecord::new("mirror")
            .with_rule("Mirror")
            .with_continuous_update(true)
            .with_reference(mirror::INPUT_MODEL, model)
            .with_reference(mirror::INPUT_PLANE, plane)
            .with_reference(mirror::OUTPUT_MODEL, out),
    );
    let mut controller = controller();
    controller.process_events(&mut scene);
    assert!(scene.subscribed_nodes(record).contains(&plane));

    scene.remove_node(plane);
    let report = controller.process_events(&mut scene);
    assert!(report.is_empty());
    assert_eq!(controller.state(record), Some(BindingState::Bound));
    assert!(!scene.subscribed_nodes(record).contains(&plane));
    assert!(scene
        .record(record)
        .unwrap()
        .references(mirror::INPUT_PLANE)
        .is_empty());
}

#[test]
fn global_registry_serves_builtin_rules() {
    let names = RuleRegistry::with_global(|r| r.names());
    for name in ["Plane cut", "Mirror", "Curve cut", "Boundary cut", "Append"] {
        assert!(names.contains(&name));
    }
    let json = RuleRegistry::with_global(|r| r.descriptors_json()).unwrap();
    assert!(json.contains("PlaneCut.InputPlane"));

    let mut scene = Scene::new();
    let record = scene.add_record(ParameterRecord::new("m").with_rule("Mirror"));
    let mut controller = ModelerController::new(ModelerConfig::default());
    controller.process_events(&mut scene);
    assert_eq!(controller.state(record), Some(BindingState::Bound));
}
