// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use dynmod_geometry::append_and_clean;

use crate::config::ModelerConfig;
use crate::error::{Error, Result};
use crate::record::ParameterRecord;
use crate::rule::{
    bound_outputs, model_input, write_outputs, InputSlot, OutputSlot, ParameterSpec, Rule,
    RuleDescriptor, RunStatus, MODEL_EVENTS,
};
use crate::scene::{NodeKind, Scene};

pub const INPUT_MODEL: &str = "Append.InputModel";
pub const OUTPUT_MODEL: &str = "Append.OutputModel";

pub const MERGE_POINTS: &str = "MergePoints";
pub const MERGE_TOLERANCE: &str = "MergeTolerance";

/// Concatenate models and drop duplicate faces.
pub struct AppendRule {
    descriptor: RuleDescriptor,
    config: ModelerConfig,
}

impl AppendRule {
    pub fn new(config: ModelerConfig) -> Self {
        Self {
            descriptor: RuleDescriptor {
                name: "Append",
                class_name: "AppendRule",
                inputs: vec![InputSlot {
                    name: "Input models",
                    description: "Models to append",
                    reference_role: INPUT_MODEL,
                    accepted: &[NodeKind::Model],
                    required: true,
                    repeatable: true,
                    events: MODEL_EVENTS,
                }],
                parameters: vec![
                    ParameterSpec::bool(
                        MERGE_POINTS,
                        "Weld coincident points before removing duplicate faces",
                        false,
                    ),
                    ParameterSpec::double(MERGE_TOLERANCE, "Welding distance", 0.0),
                ],
                outputs: vec![OutputSlot {
                    name: "Output model",
                    description: "Appended model",
                    reference_role: OUTPUT_MODEL,
                    accepted: &[NodeKind::Model],
                    required: true,
                }],
            },
            config,
        }
    }
}

impl Rule for AppendRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn create_instance(&self) -> Box<dyn Rule> {
        Box::new(AppendRule::new(self.config))
    }

    fn run_internal(&mut self, record: &ParameterRecord, scene: &mut Scene) -> Result<RunStatus> {
        let outputs = bound_outputs(scene, record, &self.descriptor.outputs[0])?;
        if outputs.is_empty() {
            return Ok(RunStatus::Skipped("no output bound"));
        }
        let merge = self
            .bool_parameter(record, MERGE_POINTS)?
            .then(|| self.f64_parameter(record, MERGE_TOLERANCE))
            .transpose()?;
        if let Some(tolerance) = merge.filter(|t| *t < 0.0) {
            return Err(Error::InvalidParameterValue {
                parameter: MERGE_TOLERANCE.to_string(),
                value: tolerance.to_string(),
            });
        }

        let (appended, report) = {
            let meshes = record
                .references(INPUT_MODEL)
                .iter()
                .map(|&key| model_input(scene, self.name(), &self.descriptor.inputs[0], key))
                .collect::<Result<Vec<_>>>()?;
            if meshes.iter().all(|m| m.is_empty()) {
                return Err(dynmod_geometry::Error::EmptyMesh("append inputs".into()).into());
            }
            append_and_clean(&meshes, merge, self.config.locator_options())
        };

        tracing::debug!(
            inputs = record.references(INPUT_MODEL).len(),
            faces = appended.face_count(),
            duplicates = report.duplicates,
            degenerates = report.degenerates,
            "appended models"
        );
        write_outputs(scene, &outputs, appended)?;
        Ok(RunStatus::Updated)
    }
}
