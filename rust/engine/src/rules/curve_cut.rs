// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use dynmod_geometry::{select_loop_region, LoopSelectOptions};

use crate::config::ModelerConfig;
use crate::error::Result;
use crate::record::ParameterRecord;
use crate::rule::{
    bound_outputs, curve_input, model_input, write_outputs, InputSlot, OutputSlot, ParameterSpec,
    Rule, RuleDescriptor, RunStatus, MARKUP_EVENTS, MODEL_EVENTS,
};
use crate::scene::{NodeKind, Scene};

pub const INPUT_CURVE: &str = "CurveCut.InputCurve";
pub const INPUT_MODEL: &str = "CurveCut.InputModel";
pub const OUTPUT_MODEL: &str = "CurveCut.OutputModel";

pub const STRAIGHT: &str = "Straight";

/// Keep the smallest region of a model enclosed by a curve drawn on it.
pub struct CurveCutRule {
    descriptor: RuleDescriptor,
    config: ModelerConfig,
}

impl CurveCutRule {
    pub fn new(config: ModelerConfig) -> Self {
        Self {
            descriptor: RuleDescriptor {
                name: "Curve cut",
                class_name: "CurveCutRule",
                inputs: vec![
                    InputSlot {
                        name: "Input curve",
                        description: "Loop drawn on the model",
                        reference_role: INPUT_CURVE,
                        accepted: &[NodeKind::Curve],
                        required: true,
                        repeatable: false,
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
                parameters: vec![ParameterSpec::bool(
                    STRAIGHT,
                    "Snap only the curve's own points instead of following its shape",
                    false,
                )],
                outputs: vec![OutputSlot {
                    name: "Output model",
                    description: "Enclosed region",
                    reference_role: OUTPUT_MODEL,
                    accepted: &[NodeKind::Model],
                    required: true,
                }],
            },
            config,
        }
    }
}

impl Rule for CurveCutRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn create_instance(&self) -> Box<dyn Rule> {
        Box::new(CurveCutRule::new(self.config))
    }

    fn run_internal(&mut self, record: &ParameterRecord, scene: &mut Scene) -> Result<RunStatus> {
        let outputs = bound_outputs(scene, record, &self.descriptor.outputs[0])?;
        if outputs.is_empty() {
            return Ok(RunStatus::Skipped("no output bound"));
        }
        let straight = self.bool_parameter(record, STRAIGHT)?;

        let region = {
            let (Some(curve_key), Some(model_key)) = (
                record.first_reference(INPUT_CURVE),
                record.first_reference(INPUT_MODEL),
            ) else {
                return Ok(RunStatus::Skipped("inputs not bound"));
            };
            let curve = curve_input(scene, self.name(), &self.descriptor.inputs[0], curve_key)?;
            let mesh = model_input(scene, self.name(), &self.descriptor.inputs[1], model_key)?;
            select_loop_region(
                mesh,
                &curve.points,
                &LoopSelectOptions {
                    straight,
                    closed: curve.closed,
                    locator: self.config.locator_options(),
                },
            )?
        };

        tracing::debug!(faces = region.face_count(), straight, "curve cut");
        write_outputs(scene, &outputs, region)?;
        Ok(RunStatus::Updated)
    }
}
