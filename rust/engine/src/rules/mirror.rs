// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use dynmod_geometry::mirror;

use crate::config::ModelerConfig;
use crate::error::Result;
use crate::record::ParameterRecord;
use crate::rule::{
    bound_outputs, model_input, plane_input, write_outputs, InputSlot, OutputSlot, Rule,
    RuleDescriptor, RunStatus, MARKUP_EVENTS, MODEL_EVENTS,
};
use crate::scene::{NodeKind, Scene};

pub const INPUT_PLANE: &str = "Mirror.InputPlane";
pub const INPUT_MODEL: &str = "Mirror.InputModel";
pub const OUTPUT_MODEL: &str = "Mirror.OutputModel";

/// Reflect a model across a plane.
pub struct MirrorRule {
    descriptor: RuleDescriptor,
    config: ModelerConfig,
}

impl MirrorRule {
    pub fn new(config: ModelerConfig) -> Self {
        Self {
            descriptor: RuleDescriptor {
                name: "Mirror",
                class_name: "MirrorRule",
                inputs: vec![
                    InputSlot {
                        name: "Input plane",
                        description: "Mirror plane",
                        reference_role: INPUT_PLANE,
                        accepted: &[NodeKind::Plane],
                        required: true,
                        repeatable: false,
                        events: MARKUP_EVENTS,
                    },
                    InputSlot {
                        name: "Input model",
                        description: "Model to mirror",
                        reference_role: INPUT_MODEL,
                        accepted: &[NodeKind::Model],
                        required: true,
                        repeatable: false,
                        events: MODEL_EVENTS,
                    },
                ],
                parameters: Vec::new(),
                outputs: vec![OutputSlot {
                    name: "Output model",
                    description: "Mirrored model",
                    reference_role: OUTPUT_MODEL,
                    accepted: &[NodeKind::Model],
                    required: true,
                }],
            },
            config,
        }
    }
}

impl Rule for MirrorRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn create_instance(&self) -> Box<dyn Rule> {
        Box::new(MirrorRule::new(self.config))
    }

    fn run_internal(&mut self, record: &ParameterRecord, scene: &mut Scene) -> Result<RunStatus> {
        let outputs = bound_outputs(scene, record, &self.descriptor.outputs[0])?;
        if outputs.is_empty() {
            return Ok(RunStatus::Skipped("no output bound"));
        }
        let [plane_slot, model_slot] = [&self.descriptor.inputs[0], &self.descriptor.inputs[1]];

        let mirrored = {
            let plane = match record.first_reference(INPUT_PLANE) {
                Some(key) => plane_input(scene, self.name(), plane_slot, key)?,
                None => return Ok(RunStatus::Skipped("no plane bound")),
            };
            let mesh = match record.first_reference(INPUT_MODEL) {
                Some(key) => model_input(scene, self.name(), model_slot, key)?,
                None => return Ok(RunStatus::Skipped("no model bound")),
            };
            if mesh.is_empty() {
                return Err(dynmod_geometry::Error::EmptyMesh("mirror input".into()).into());
            }
            mirror(mesh, &plane)
        };

        tracing::debug!(points = mirrored.point_count(), faces = mirrored.face_count(), "mirrored model");
        write_outputs(scene, &outputs, mirrored)?;
        Ok(RunStatus::Updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NodeData;
    use dynmod_geometry::shapes::cuboid;
    use dynmod_geometry::{Mesh, Plane, Point3, Vector3};

    #[test]
    fn test_mirror_writes_reflected_model() {
        let mut scene = Scene::new();
        let cube = cuboid(Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        let model = scene.add_model("cube", cube.clone());
        let plane = scene.add_node(
            "yz",
            NodeData::Plane(Plane::new(Point3::origin(), Vector3::x()).unwrap()),
        );
        let out = scene.add_model("out", Mesh::new());
        let record = ParameterRecord::new("mirror")
            .with_reference(INPUT_PLANE, plane)
            .with_reference(INPUT_MODEL, model)
            .with_reference(OUTPUT_MODEL, out);

        let status = MirrorRule::new(ModelerConfig::default())
            .run(&record, &mut scene)
            .unwrap();
        assert_eq!(status, RunStatus::Updated);

        let mirrored = scene.mesh(out).unwrap();
        assert_eq!(mirrored.face_count(), cube.face_count());
        assert!(mirrored.positions.iter().all(|p| p.x <= -1.0 + 1e-12));
    }

    #[test]
    fn test_unbound_output_is_a_no_op() {
        let mut scene = Scene::new();
        let model = scene.add_model("cube", cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0)));
        let plane = scene.add_node(
            "p",
            NodeData::Plane(Plane::new(Point3::origin(), Vector3::x()).unwrap()),
        );
        let record = ParameterRecord::new("mirror")
            .with_reference(INPUT_PLANE, plane)
            .with_reference(INPUT_MODEL, model);
        let status = MirrorRule::new(ModelerConfig::default())
            .run(&record, &mut scene)
            .unwrap();
        assert!(matches!(status, RunStatus::Skipped(_)));
    }

    #[test]
    fn test_empty_model_leaves_output_untouched() {
        let mut scene = Scene::new();
        let model = scene.add_model("empty", Mesh::new());
        let plane = scene.add_node(
            "p",
            NodeData::Plane(Plane::new(Point3::origin(), Vector3::x()).unwrap()),
        );
        let previous = cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let out = scene.add_model("out", previous.clone());
        let record = ParameterRecord::new("mirror")
            .with_reference(INPUT_PLANE, plane)
            .with_reference(INPUT_MODEL, model)
            .with_reference(OUTPUT_MODEL, out);

        let status = MirrorRule::new(ModelerConfig::default())
            .run(&record, &mut scene)
            .unwrap();
        assert_eq!(status, RunStatus::Skipped("empty input"));
        assert_eq!(scene.mesh(out), Some(&previous));
    }
}
