// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dynmod demo - drives a small reactive scene from the command line.
//!
//! A sphere is cut by a plane, the kept half is mirrored across the same
//! plane and both halves are appended back together. All three records
//! update continuously, so moving the plane re-runs the whole chain. A
//! record that feeds its own input is added last to show cycle handling.
//!
//! Logging follows `RUST_LOG`; set `DYNMOD_LOG_JSON=1` for JSON lines.

use anyhow::{Context, Result};
use dynmod_engine::rules::{append, mirror, plane_cut};
use dynmod_engine::{
    ModelerConfig, ModelerController, NodeData, NodeKey, ParameterRecord, ProcessReport,
    RuleRegistry, Scene,
};
use dynmod_geometry::shapes::{cuboid, signed_volume, uv_sphere};
use dynmod_geometry::{boundary_edges, Plane, Point3, Vector3};

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,dynmod_engine=info,dynmod_geometry=warn".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("DYNMOD_LOG_JSON").is_ok_and(|v| v == "1") {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

fn log_report(step: &str, report: &ProcessReport) {
    tracing::info!(
        step,
        rounds = report.rounds,
        updated = report.updated.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        cycles = report.cycles.len(),
        truncated = report.truncated,
        "processed scene events"
    );
    for (record, message) in &report.failed {
        tracing::warn!(step, record = ?record, error = %message, "record failed");
    }
}

fn log_model(scene: &Scene, key: NodeKey) -> Result<()> {
    let node = scene.node(key).context("model node disappeared")?;
    let mesh = scene.mesh(key).context("node is not a model")?;
    tracing::info!(
        model = %node.name,
        points = mesh.point_count(),
        faces = mesh.face_count(),
        open_edges = boundary_edges(mesh).len(),
        volume = signed_volume(mesh),
        "model"
    );
    Ok(())
}

fn main() -> Result<()> {
    init_logging();

    let config = ModelerConfig::from_env();
    tracing::info!(
        boundary_epsilon = config.boundary_epsilon,
        max_event_rounds = config.max_event_rounds,
        parallel_threshold = config.parallel_threshold,
        "Starting dynmod demo"
    );
    let rules = RuleRegistry::with_global(|r| r.names());
    tracing::info!(rules = ?rules, "registered rules");

    let mut scene = Scene::new();
    let mut controller = ModelerController::new(config);

    let sphere = scene.add_model("sphere", uv_sphere(Point3::origin(), 1.0, 24, 31));
    let plane = scene.add_node(
        "cut plane",
        NodeData::Plane(Plane::new(Point3::origin(), Vector3::y())?),
    );
    let half = scene.add_model("half", Default::default());
    let mirrored = scene.add_model("mirrored", Default::default());
    let whole = scene.add_model("whole", Default::default());

    scene.add_record(
        ParameterRecord::new("cut sphere")
            .with_rule("Plane cut")
            .with_continuous_update(true)
            .with_attribute(plane_cut::CAP_SURFACE, "0")
            .with_reference(plane_cut::INPUT_MODEL, sphere)
            .with_reference(plane_cut::INPUT_PLANE, plane)
            .with_reference(plane_cut::OUTPUT_POSITIVE, half),
    );
    scene.add_record(
        ParameterRecord::new("mirror half")
            .with_rule("Mirror")
            .with_continuous_update(true)
            .with_reference(mirror::INPUT_MODEL, half)
            .with_reference(mirror::INPUT_PLANE, plane)
            .with_reference(mirror::OUTPUT_MODEL, mirrored),
    );
    let mut weld = ParameterRecord::new("weld halves")
        .with_rule("Append")
        .with_continuous_update(true)
        .with_attribute(append::MERGE_POINTS, "1")
        .with_attribute(append::MERGE_TOLERANCE, "1e-9")
        .with_reference(append::OUTPUT_MODEL, whole);
    weld.add_reference(append::INPUT_MODEL, half);
    weld.add_reference(append::INPUT_MODEL, mirrored);
    scene.add_record(weld);

    let report = controller.process_events(&mut scene);
    log_report("initial", &report);
    for key in [half, mirrored, whole] {
        log_model(&scene, key)?;
    }

    for offset in [0.25, 0.5] {
        scene.set_plane(plane, Plane::new(Point3::new(0.0, offset, 0.0), Vector3::y())?)?;
        let report = controller.process_events(&mut scene);
        log_report("plane moved", &report);
        log_model(&scene, whole)?;
    }

    // A record writing into its own input is switched to manual updates
    let block = scene.add_model("block", cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0)));
    let looping = scene.add_record(
        ParameterRecord::new("mirror in place")
            .with_rule("Mirror")
            .with_continuous_update(true)
            .with_reference(mirror::INPUT_MODEL, block)
            .with_reference(mirror::INPUT_PLANE, plane)
            .with_reference(mirror::OUTPUT_MODEL, block),
    );
    let report = controller.process_events(&mut scene);
    log_report("self reference", &report);

    let status = controller.run(&mut scene, looping)?;
    tracing::info!(status = ?status, "manual run of the self-referencing record");
    log_model(&scene, block)?;

    Ok(())
}
