// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use dynmod_geometry::{plane_cut, BooleanOperation, PlaneCutOptions};

use crate::config::ModelerConfig;
use crate::error::{Error, Result};
use crate::record::ParameterRecord;
use crate::rule::{
    bound_outputs, model_input, plane_input, write_outputs, InputSlot, OutputSlot, ParameterSpec,
    Rule, RuleDescriptor, RunStatus, MARKUP_EVENTS, MODEL_EVENTS,
};
use crate::scene::{NodeKind, Scene};

pub const INPUT_PLANE: &str = "PlaneCut.InputPlane";
pub const INPUT_MODEL: &str = "PlaneCut.InputModel";
pub const OUTPUT_POSITIVE: &str = "PlaneCut.OutputPositiveModel";
pub const OUTPUT_NEGATIVE: &str = "PlaneCut.OutputNegativeModel";

pub const CAP_SURFACE: &str = "CapSurface";
pub const OPERATION_TYPE: &str = "OperationType";

const OPERATIONS: &[&str] = &["Union", "Intersection", "Difference"];

/// Cut a model by one or more planes combined with a boolean operation.
pub struct PlaneCutRule {
    descriptor: RuleDescriptor,
    config: ModelerConfig,
}

impl PlaneCutRule {
    pub fn new(config: ModelerConfig) -> Self {
        Self {
            descriptor: RuleDescriptor {
                name: "Plane cut",
                class_name: "PlaneCutRule",
                inputs: vec![
                    InputSlot {
                        name: "Input planes",
                        description: "Planes used to cut the model",
                        reference_role: INPUT_PLANE,
                        accepted: &[NodeKind::Plane],
                        required: true,
                        repeatable: true,
                        events: MARKUP_EVENTS,
                    },
                    InputSlot {
                        name: "Input model",
                        description: "Model to cut",
                        reference_role: INPUT_MODEL,
                        accepted: &[NodeKind::Model],
                        required: true,
                        repeatable: false,
                        events: MODEL_EVENTS,
                    },
                ],
                parameters: vec![
                    ParameterSpec::bool(CAP_SURFACE, "Close the cut surfaces", true),
                    ParameterSpec::string_enum(
                        OPERATION_TYPE,
                        "How the plane half-spaces combine",
                        OPERATIONS,
                        "Union",
                    ),
                ],
                outputs: vec![
                    OutputSlot {
                        name: "Positive side",
                        description: "Part inside the combined half-spaces",
                        reference_role: OUTPUT_POSITIVE,
                        accepted: &[NodeKind::Model],
                        required: false,
                    },
                    OutputSlot {
                        name: "Negative side",
                        description: "Remaining part",
                        reference_role: OUTPUT_NEGATIVE,
                        accepted: &[NodeKind::Model],
                        required: false,
                    },
                ],
            },
            config,
        }
    }
}

impl Rule for PlaneCutRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn create_instance(&self) -> Box<dyn Rule> {
        Box::new(PlaneCutRule::new(self.config))
    }

    fn run_internal(&mut self, record: &ParameterRecord, scene: &mut Scene) -> Result<RunStatus> {
        let positive = bound_outputs(scene, record, &self.descriptor.outputs[0])?;
        let negative = bound_outputs(scene, record, &self.descriptor.outputs[1])?;
        if positive.is_empty() && negative.is_empty() {
            return Ok(RunStatus::Skipped("no output bound"));
        }

        let cap_surface = self.bool_parameter(record, CAP_SURFACE)?;
        let operation_name = self.enum_parameter(record, OPERATION_TYPE)?;
        let operation = BooleanOperation::parse(&operation_name).ok_or_else(|| {
            Error::InvalidParameterValue {
                parameter: OPERATION_TYPE.to_string(),
                value: operation_name.clone(),
            }
        })?;

        let output = {
            let planes = record
                .references(INPUT_PLANE)
                .iter()
                .map(|&key| plane_input(scene, self.name(), &self.descriptor.inputs[0], key))
                .collect::<Result<Vec<_>>>()?;
            let Some(model) = record.first_reference(INPUT_MODEL) else {
                return Ok(RunStatus::Skipped("no model bound"));
            };
            let mesh = model_input(scene, self.name(), &self.descriptor.inputs[1], model)?;
            plane_cut(
                mesh,
                &planes,
                &PlaneCutOptions {
                    operation,
                    cap_surface,
                    generate_outside: !negative.is_empty(),
                    parallel_threshold: self.config.parallel_threshold,
                },
            )?
        };

        tracing::debug!(
            operation = operation.as_str(),
            cap_surface,
            positive_faces = output.inside.face_count(),
            negative_faces = output.outside.as_ref().map(|m| m.face_count()),
            "plane cut"
        );
        write_outputs(scene, &positive, output.inside)?;
        if let Some(outside) = output.outside {
            write_outputs(scene, &negative, outside)?;
        }
        Ok(RunStatus::Updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::ParameterValue;
    use crate::scene::NodeData;
    use dynmod_geometry::shapes::{cuboid, signed_volume};
    use dynmod_geometry::{boundary_edges, Mesh, Plane, Point3, Vector3};

    fn setup(record: ParameterRecord) -> (Scene, ParameterRecord, [crate::keys::NodeKey; 2]) {
        let mut scene = Scene::new();
        let model = scene.add_model("cube", cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0)));
        let plane = scene.add_node(
            "cut",
            NodeData::Plane(Plane::new(Point3::new(0.0, 0.0, 0.25), Vector3::z()).unwrap()),
        );
        let pos = scene.add_model("positive", Mesh::new());
        let neg = scene.add_model("negative", Mesh::new());
        let record = record
            .with_reference(INPUT_PLANE, plane)
            .with_reference(INPUT_MODEL, model)
            .with_reference(OUTPUT_POSITIVE, pos)
            .with_reference(OUTPUT_NEGATIVE, neg);
        (scene, record, [pos, neg])
    }

    #[test]
    fn test_capped_cut_fills_both_outputs() {
        let (mut scene, record, [pos, neg]) = setup(ParameterRecord::new("cut"));
        let mut rule = PlaneCutRule::new(ModelerConfig::default());
        assert_eq!(rule.run(&record, &mut scene).unwrap(), RunStatus::Updated);

        let positive = scene.mesh(pos).unwrap();
        let negative = scene.mesh(neg).unwrap();
        assert!(boundary_edges(positive).is_empty());
        assert!(boundary_edges(negative).is_empty());
        assert!((signed_volume(positive) - 0.75).abs() < 1e-9);
        assert!((signed_volume(negative) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_cap_surface_parameter_can_be_disabled() {
        let rule = PlaneCutRule::new(ModelerConfig::default());
        let mut record = ParameterRecord::new("cut");
        rule.set_parameter(&mut record, CAP_SURFACE, &ParameterValue::Bool(false))
            .unwrap();
        assert_eq!(record.attribute(CAP_SURFACE), Some("0"));

        let (mut scene, record, [pos, _]) = setup(record);
        let mut rule = rule.create_instance();
        rule.run(&record, &mut scene).unwrap();
        assert!(!boundary_edges(scene.mesh(pos).unwrap()).is_empty());
    }

    #[test]
    fn test_invalid_operation_aborts_without_writing() {
        let (mut scene, record, [pos, _]) =
            setup(ParameterRecord::new("cut").with_attribute(OPERATION_TYPE, "Xor"));
        let err = PlaneCutRule::new(ModelerConfig::default())
            .run(&record, &mut scene)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameterValue { .. }));
        assert!(scene.mesh(pos).unwrap().is_empty());
    }
}
