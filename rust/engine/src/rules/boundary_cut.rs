// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use dynmod_geometry::{boundary_cut, Border, BorderDistance, BoundaryCutOptions};

use crate::config::ModelerConfig;
use crate::error::{Error, Result};
use crate::record::ParameterRecord;
use crate::rule::{
    bound_outputs, model_input, points_input, write_outputs, InputSlot, OutputSlot,
    ParameterSpec, Rule, RuleDescriptor, RunStatus, MARKUP_EVENTS, MODEL_EVENTS,
};
use crate::scene::{NodeData, NodeKind, Scene};

pub const INPUT_BORDER: &str = "BoundaryCut.InputBorder";
pub const INPUT_MODEL: &str = "BoundaryCut.InputModel";
pub const INPUT_SEED: &str = "BoundaryCut.InputSeed";
pub const OUTPUT_MODEL: &str = "BoundaryCut.OutputModel";

pub const EPSILON: &str = "Epsilon";
pub const BORDER_DISTANCE: &str = "BorderDistance";

const DISTANCES: &[&str] = &["Point", "Cell"];

/// Cut a model along borders lying on it and keep the piece nearest a seed.
pub struct BoundaryCutRule {
    descriptor: RuleDescriptor,
    config: ModelerConfig,
}

impl BoundaryCutRule {
    pub fn new(config: ModelerConfig) -> Self {
        Self {
            descriptor: RuleDescriptor {
                name: "Boundary cut",
                class_name: "BoundaryCutRule",
                inputs: vec![
                    InputSlot {
                        name: "Input borders",
                        description: "Curves or planes bounding the kept region",
                        reference_role: INPUT_BORDER,
                        accepted: &[NodeKind::Curve, NodeKind::Plane],
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
                    InputSlot {
                        name: "Input seed",
                        description: "Point inside the region to keep",
                        reference_role: INPUT_SEED,
                        accepted: &[NodeKind::Points],
                        required: false,
                        repeatable: false,
                        events: MARKUP_EVENTS,
                    },
                ],
                parameters: vec![
                    ParameterSpec::double(
                        EPSILON,
                        "Squared distance to a border under which points are cut away",
                        config.boundary_epsilon,
                    ),
                    ParameterSpec::string_enum(
                        BORDER_DISTANCE,
                        "Measure to the nearest border point, or only within the configured cell radius",
                        DISTANCES,
                        "Point",
                    ),
                ],
                outputs: vec![OutputSlot {
                    name: "Output model",
                    description: "Region around the seed",
                    reference_role: OUTPUT_MODEL,
                    accepted: &[NodeKind::Model],
                    required: true,
                }],
            },
            config,
        }
    }
}

impl Rule for BoundaryCutRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn create_instance(&self) -> Box<dyn Rule> {
        Box::new(BoundaryCutRule::new(self.config))
    }

    fn run_internal(&mut self, record: &ParameterRecord, scene: &mut Scene) -> Result<RunStatus> {
        let outputs = bound_outputs(scene, record, &self.descriptor.outputs[0])?;
        if outputs.is_empty() {
            return Ok(RunStatus::Skipped("no output bound"));
        }
        let epsilon = self.f64_parameter(record, EPSILON)?;
        if epsilon < 0.0 {
            return Err(Error::InvalidParameterValue {
                parameter: EPSILON.to_string(),
                value: epsilon.to_string(),
            });
        }
        let distance = match self.enum_parameter(record, BORDER_DISTANCE)?.as_str() {
            "Cell" => BorderDistance::Cell {
                radius: self.config.cell_distance_radius,
            },
            _ => BorderDistance::Point,
        };

        let [border_slot, model_slot, seed_slot] = [
            &self.descriptor.inputs[0],
            &self.descriptor.inputs[1],
            &self.descriptor.inputs[2],
        ];
        let cut = {
            let mut borders = Vec::new();
            for &key in record.references(INPUT_BORDER) {
                match &scene.require_node(key)?.data {
                    NodeData::Curve(curve) => borders.push(Border::Curve(curve.points.clone())),
                    NodeData::Plane(plane) => borders.push(Border::Plane(*plane)),
                    _ => {
                        return Err(Error::InvalidInputNode {
                            rule: self.name().to_string(),
                            slot: border_slot.name.to_string(),
                            expected: "Curve or Plane".to_string(),
                        })
                    }
                }
            }
            let seed = match record.first_reference(INPUT_SEED) {
                Some(key) => points_input(scene, self.name(), seed_slot, key)?.first().copied(),
                None => None,
            };
            let Some(model) = record.first_reference(INPUT_MODEL) else {
                return Ok(RunStatus::Skipped("no model bound"));
            };
            let mesh = model_input(scene, self.name(), model_slot, model)?;

            boundary_cut(
                mesh,
                &borders,
                &BoundaryCutOptions {
                    epsilon,
                    distance,
                    seed,
                    locator: self.config.locator_options(),
                    parallel_threshold: self.config.parallel_threshold,
                },
            )?
        };

        tracing::debug!(faces = cut.face_count(), epsilon, distance = ?distance, "boundary cut");
        write_outputs(scene, &outputs, cut)?;
        Ok(RunStatus::Updated)
    }
}
