// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The rule contract.
//!
//! A rule declares its input slots, parameters and output slots once, in
//! a [`RuleDescriptor`], and implements [`Rule::run_internal`]. Everything
//! else (required-input checks, parameter decoding, cycle-relevant node
//! sets) is shared through provided trait methods.
//!
//! Rules compute every result before writing any output, so a failed run
//! leaves the scene as it was.

mod parameter;

pub use parameter::{ParameterKind, ParameterSpec, ParameterValue};

use serde::Serialize;

use dynmod_geometry::{Mesh, Plane, Point3};

use crate::error::{Error, Result};
use crate::keys::{NodeKey, RecordKey};
use crate::record::ParameterRecord;
use crate::scene::{Curve, EventKind, NodeData, NodeKind, Scene};

/// Events that should re-run a rule reading a model.
pub const MODEL_EVENTS: &[EventKind] = &[
    EventKind::Modified,
    EventKind::MeshModified,
    EventKind::TransformModified,
];

/// Events that should re-run a rule reading a curve, plane or point set.
pub const MARKUP_EVENTS: &[EventKind] = &[
    EventKind::Modified,
    EventKind::PointModified,
    EventKind::TransformModified,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputSlot {
    pub name: &'static str,
    pub description: &'static str,
    /// Record reference role the slot is bound under.
    pub reference_role: &'static str,
    pub accepted: &'static [NodeKind],
    pub required: bool,
    /// Accepts any number of nodes instead of one.
    pub repeatable: bool,
    pub events: &'static [EventKind],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputSlot {
    pub name: &'static str,
    pub description: &'static str,
    pub reference_role: &'static str,
    pub accepted: &'static [NodeKind],
    pub required: bool,
}

/// What a rule exposes to hosts, in stable order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleDescriptor {
    /// Display name, also the name records refer to.
    pub name: &'static str,
    /// Identifier used to reject duplicate registrations.
    pub class_name: &'static str,
    pub inputs: Vec<InputSlot>,
    pub parameters: Vec<ParameterSpec>,
    pub outputs: Vec<OutputSlot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Outputs were overwritten.
    Updated,
    /// Nothing to do; outputs untouched.
    Skipped(&'static str),
}

pub trait Rule: Send {
    fn descriptor(&self) -> &RuleDescriptor;

    /// Fresh instance sharing this one's configuration.
    fn create_instance(&self) -> Box<dyn Rule>;

    /// Rule-specific work. Required inputs are already known to be bound.
    fn run_internal(&mut self, record: &ParameterRecord, scene: &mut Scene) -> Result<RunStatus>;

    fn name(&self) -> &'static str {
        self.descriptor().name
    }

    fn class_name(&self) -> &'static str {
        self.descriptor().class_name
    }

    /// First required input slot with nothing bound.
    fn missing_required_input(&self, record: &ParameterRecord) -> Option<&InputSlot> {
        self.descriptor()
            .inputs
            .iter()
            .find(|slot| slot.required && record.references(slot.reference_role).is_empty())
    }

    fn has_required_inputs(&self, record: &ParameterRecord) -> bool {
        self.missing_required_input(record).is_none()
    }

    /// Every node bound to one of the rule's input slots.
    fn input_nodes(&self, record: &ParameterRecord) -> Vec<NodeKey> {
        collect_nodes(
            record,
            self.descriptor().inputs.iter().map(|s| s.reference_role),
        )
    }

    /// Every node bound to one of the rule's output slots.
    fn output_nodes(&self, record: &ParameterRecord) -> Vec<NodeKey> {
        collect_nodes(
            record,
            self.descriptor().outputs.iter().map(|s| s.reference_role),
        )
    }

    fn parameter_spec(&self, name: &str) -> Result<&ParameterSpec> {
        self.descriptor()
            .parameters
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::UnknownParameter {
                rule: self.name().to_string(),
                parameter: name.to_string(),
            })
    }

    fn parameter_value(&self, record: &ParameterRecord, name: &str) -> Result<ParameterValue> {
        let spec = self.parameter_spec(name)?;
        spec.decode(record.attribute(spec.attribute_name))
    }

    fn bool_parameter(&self, record: &ParameterRecord, name: &str) -> Result<bool> {
        let value = self.parameter_value(record, name)?;
        value.as_bool().ok_or_else(|| invalid_kind(name, &value))
    }

    fn f64_parameter(&self, record: &ParameterRecord, name: &str) -> Result<f64> {
        let value = self.parameter_value(record, name)?;
        value.as_f64().ok_or_else(|| invalid_kind(name, &value))
    }

    fn enum_parameter(&self, record: &ParameterRecord, name: &str) -> Result<String> {
        let value = self.parameter_value(record, name)?;
        match value {
            ParameterValue::String(s) => Ok(s),
            other => Err(invalid_kind(name, &other)),
        }
    }

    /// Encode and store a parameter value on `record`.
    fn set_parameter(
        &self,
        record: &mut ParameterRecord,
        name: &str,
        value: &ParameterValue,
    ) -> Result<()> {
        let spec = self.parameter_spec(name)?;
        let encoded = spec.encode(value)?;
        record.set_attribute(spec.attribute_name, encoded);
        Ok(())
    }

    /// Check required inputs, then run. Empty geometry is a no-op success.
    fn run(&mut self, record: &ParameterRecord, scene: &mut Scene) -> Result<RunStatus> {
        if let Some(slot) = self.missing_required_input(record) {
            tracing::error!(
                rule = self.name(),
                record = %record.name,
                slot = slot.name,
                "missing required input"
            );
            return Err(Error::MissingRequiredInput {
                rule: self.name().to_string(),
                slot: slot.name.to_string(),
            });
        }

        match self.run_internal(record, scene) {
            Err(e) if e.is_geometry() => {
                tracing::debug!(rule = self.name(), record = %record.name, error = %e, "empty input, outputs untouched");
                Ok(RunStatus::Skipped("empty input"))
            }
            Ok(RunStatus::Updated) => {
                tracing::info!(rule = self.name(), record = %record.name, "rule updated outputs");
                Ok(RunStatus::Updated)
            }
            other => other,
        }
    }
}

fn collect_nodes<'a>(
    record: &ParameterRecord,
    roles: impl Iterator<Item = &'a str>,
) -> Vec<NodeKey> {
    let mut nodes = Vec::new();
    for role in roles {
        for &node in record.references(role) {
            if !nodes.contains(&node) {
                nodes.push(node);
            }
        }
    }
    nodes
}

fn invalid_kind(name: &str, value: &ParameterValue) -> Error {
    Error::InvalidParameterValue {
        parameter: name.to_string(),
        value: value.encode(),
    }
}

// =============================================================================
// Input resolution shared by the built-in rules
// =============================================================================

fn wrong_kind(rule: &str, slot: &InputSlot) -> Error {
    Error::InvalidInputNode {
        rule: rule.to_string(),
        slot: slot.name.to_string(),
        expected: slot
            .accepted
            .iter()
            .map(NodeKind::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
    }
}

pub(crate) fn model_input<'s>(
    scene: &'s Scene,
    rule: &str,
    slot: &InputSlot,
    key: NodeKey,
) -> Result<&'s Mesh> {
    match &scene.require_node(key)?.data {
        NodeData::Model(mesh) => Ok(mesh),
        _ => Err(wrong_kind(rule, slot)),
    }
}

pub(crate) fn plane_input(scene: &Scene, rule: &str, slot: &InputSlot, key: NodeKey) -> Result<Plane> {
    match &scene.require_node(key)?.data {
        NodeData::Plane(plane) => Ok(*plane),
        _ => Err(wrong_kind(rule, slot)),
    }
}

pub(crate) fn curve_input<'s>(
    scene: &'s Scene,
    rule: &str,
    slot: &InputSlot,
    key: NodeKey,
) -> Result<&'s Curve> {
    match &scene.require_node(key)?.data {
        NodeData::Curve(curve) => Ok(curve),
        _ => Err(wrong_kind(rule, slot)),
    }
}

pub(crate) fn points_input<'s>(
    scene: &'s Scene,
    rule: &str,
    slot: &InputSlot,
    key: NodeKey,
) -> Result<&'s [Point3<f64>]> {
    match &scene.require_node(key)?.data {
        NodeData::Points(points) => Ok(points),
        _ => Err(wrong_kind(rule, slot)),
    }
}

/// Output nodes bound under `slot`, each checked to exist.
pub(crate) fn bound_outputs(
    scene: &Scene,
    record: &ParameterRecord,
    slot: &OutputSlot,
) -> Result<Vec<NodeKey>> {
    let nodes = record.references(slot.reference_role).to_vec();
    for &node in &nodes {
        scene.require_node(node)?;
    }
    Ok(nodes)
}

/// Write one mesh to every node in `outputs`.
pub(crate) fn write_outputs(scene: &mut Scene, outputs: &[NodeKey], mesh: Mesh) -> Result<()> {
    if let Some((&last, rest)) = outputs.split_last() {
        for &node in rest {
            scene.set_mesh(node, mesh.clone())?;
        }
        scene.set_mesh(last, mesh)?;
    }
    Ok(())
}

/// Identity used in controller diagnostics.
pub(crate) fn record_label(scene: &Scene, key: RecordKey) -> String {
    scene
        .record(key)
        .map_or_else(|| format!("{key:?}"), |r| r.name.clone())
}
