// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Keeps one rule instance per parameter record and re-runs rules when
//! their inputs change.
//!
//! ## States
//!
//! An entry is `Unbound` while its record names no rule (or an unknown
//! one) and `Bound` once a rule instance matching the record's rule name
//! exists and the nodes bound to its input slots are observed. Binding is
//! idempotent: it recreates the instance only when the rule name changed,
//! and always refreshes the subscriptions so rebinding a slot takes effect.
//!
//! ## Continuous update
//!
//! When a record with continuous update receives a change, the controller
//! first checks whether any node is both an input and an output of the
//! record. If so, continuous update is switched off for that record and the
//! run skipped; the record can still be run manually. Records missing a
//! required input are skipped quietly.

use rustc_hash::FxHashSet;
use slotmap::SecondaryMap;

use crate::config::ModelerConfig;
use crate::error::{Error, Result};
use crate::keys::{NodeKey, RecordKey};
use crate::registry::RuleRegistry;
use crate::rule::{record_label, Rule, RunStatus};
use crate::scene::{Scene, SceneEvent};

/// Binding state of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Unbound,
    Bound,
}

/// What one [`ModelerController::process_events`] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Records whose outputs were rewritten.
    pub updated: Vec<RecordKey>,
    /// Records that ran but had nothing to do.
    pub skipped: Vec<RecordKey>,
    /// Records whose run failed, with the error message.
    pub failed: Vec<(RecordKey, String)>,
    /// Records whose continuous update was disabled because of a cycle.
    pub cycles: Vec<RecordKey>,
    /// Notification rounds drained.
    pub rounds: usize,
    /// Whether the round limit stopped processing with events left.
    pub truncated: bool,
}

impl ProcessReport {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty()
            && self.skipped.is_empty()
            && self.failed.is_empty()
            && self.cycles.is_empty()
    }
}

enum RegistrySource {
    Global,
    Owned(RuleRegistry),
}

#[derive(Default)]
struct ControllerEntry {
    rule: Option<Box<dyn Rule>>,
}

pub struct ModelerController {
    entries: SecondaryMap<RecordKey, ControllerEntry>,
    registry: RegistrySource,
    config: ModelerConfig,
}

impl ModelerController {
    /// Controller resolving rules through [`RuleRegistry::global`].
    pub fn new(config: ModelerConfig) -> Self {
        Self {
            entries: SecondaryMap::new(),
            registry: RegistrySource::Global,
            config,
        }
    }

    /// Controller with its own registry.
    pub fn with_registry(registry: RuleRegistry, config: ModelerConfig) -> Self {
        Self {
            entries: SecondaryMap::new(),
            registry: RegistrySource::Owned(registry),
            config,
        }
    }

    pub fn config(&self) -> &ModelerConfig {
        &self.config
    }

    fn create_rule(&self, name: &str) -> Option<Box<dyn Rule>> {
        match &self.registry {
            RegistrySource::Global => RuleRegistry::with_global(|r| r.create_by_name(name)),
            RegistrySource::Owned(registry) => registry.create_by_name(name),
        }
    }

    // =========================================================================
    // Entries
    // =========================================================================

    /// Start tracking a record and bind it.
    pub fn add_record(&mut self, scene: &mut Scene, key: RecordKey) -> Result<()> {
        if !self.entries.contains_key(key) {
            self.entries.insert(key, ControllerEntry::default());
        }
        self.bind(scene, key)
    }

    /// Stop tracking a record and everything it observes.
    pub fn remove_record(&mut self, scene: &mut Scene, key: RecordKey) {
        if self.entries.remove(key).is_some() {
            tracing::info!(record = ?key, "record removed");
        }
        scene.unsubscribe_record(key);
    }

    pub fn contains(&self, key: RecordKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self, key: RecordKey) -> Option<BindingState> {
        self.entries.get(key).map(|e| match e.rule {
            Some(_) => BindingState::Bound,
            None => BindingState::Unbound,
        })
    }

    /// Current rule instance of a record.
    pub fn rule(&self, key: RecordKey) -> Option<&dyn Rule> {
        self.entries.get(key)?.rule.as_deref()
    }

    /// Make the record's rule instance match its rule name and observe the
    /// nodes bound to the rule's input slots.
    pub fn bind(&mut self, scene: &mut Scene, key: RecordKey) -> Result<()> {
        let record = scene.require_record(key)?;
        let desired = record.rule_name().map(str::to_owned);
        let label = record.name.clone();

        let current = self
            .entries
            .get(key)
            .and_then(|e| e.rule.as_ref())
            .map(|r| r.name());
        if current != desired.as_deref() {
            // Keep the record's references, only the instance goes away
            scene.unsubscribe_record(key);
            let rule = match desired.as_deref() {
                Some(name) => {
                    let rule = self.create_rule(name);
                    if rule.is_none() {
                        tracing::warn!(record = %label, rule = name, "unknown rule");
                    }
                    rule
                }
                None => None,
            };
            match &rule {
                Some(r) => tracing::info!(record = %label, rule = r.name(), "rule bound"),
                None if current.is_some() => tracing::info!(record = %label, "rule unbound"),
                None => {}
            }
            self.entries.insert(key, ControllerEntry { rule });
        }

        let Some(rule) = self.entries.get(key).and_then(|e| e.rule.as_ref()) else {
            return match desired {
                Some(name) => Err(Error::UnknownRule(name)),
                None => Ok(()),
            };
        };

        let record = scene.require_record(key)?;
        let subscriptions: Vec<(NodeKey, &'static [crate::scene::EventKind])> = rule
            .descriptor()
            .inputs
            .iter()
            .flat_map(|slot| {
                record
                    .references(slot.reference_role)
                    .iter()
                    .map(move |&node| (node, slot.events))
            })
            .collect();

        scene.unsubscribe_record(key);
        for (node, events) in subscriptions {
            scene.subscribe(node, key, events);
        }
        Ok(())
    }

    /// Whether a node is bound both as an input and as an output.
    pub fn has_circular_reference(&self, scene: &Scene, key: RecordKey) -> bool {
        let (Some(rule), Some(record)) = (self.rule(key), scene.record(key)) else {
            return false;
        };
        let inputs: FxHashSet<NodeKey> = rule.input_nodes(record).into_iter().collect();
        rule.output_nodes(record)
            .iter()
            .any(|node| inputs.contains(node))
    }

    // =========================================================================
    // Running
    // =========================================================================

    /// Run a record's rule now, regardless of its continuous-update flag.
    pub fn run(&mut self, scene: &mut Scene, key: RecordKey) -> Result<RunStatus> {
        if !self.entries.contains_key(key) {
            self.entries.insert(key, ControllerEntry::default());
        }
        self.bind(scene, key)?;
        let record = scene.require_record(key)?.clone();
        let rule = self
            .entries
            .get_mut(key)
            .and_then(|e| e.rule.as_mut())
            .ok_or_else(|| Error::UnknownRule(record.rule_name().unwrap_or_default().to_string()))?;
        rule.run(&record, scene)
    }

    /// Continuous-update path for one record.
    fn update(&mut self, scene: &mut Scene, key: RecordKey, report: &mut ProcessReport) {
        let Some(record) = scene.record(key).cloned() else {
            return;
        };
        if !record.continuous_update {
            return;
        }
        let label = record.name.as_str();

        if self.has_circular_reference(scene, key) {
            tracing::warn!(
                "Circular reference detected. Disabling continuous update for: {}",
                label
            );
            // The record is known to exist
            let _ = scene.modify_record(key, |r| r.continuous_update = false);
            report.cycles.push(key);
            return;
        }

        let Some(rule) = self.entries.get_mut(key).and_then(|e| e.rule.as_mut()) else {
            return;
        };
        if !rule.has_required_inputs(&record) {
            tracing::debug!(record = %label, "required inputs not bound, skipping");
            return;
        }

        match rule.run(&record, scene) {
            Ok(RunStatus::Updated) => report.updated.push(key),
            Ok(RunStatus::Skipped(reason)) => {
                tracing::debug!(record = %label, reason, "run skipped");
                report.skipped.push(key);
            }
            Err(e) => {
                tracing::error!(record = %label, error = %e, "rule failed");
                report.failed.push((key, e.to_string()));
            }
        }
    }

    /// Register every record of `scene` not tracked yet, bind them all and
    /// run the continuous ones.
    pub fn import_records(&mut self, scene: &mut Scene) -> ProcessReport {
        let mut report = ProcessReport::default();
        self.import_into(scene, &mut report);
        report
    }

    fn import_into(&mut self, scene: &mut Scene, report: &mut ProcessReport) {
        let keys: Vec<RecordKey> = scene.records().map(|(k, _)| k).collect();
        tracing::info!(records = keys.len(), "importing records");
        for key in &keys {
            if let Err(e) = self.add_record(scene, *key) {
                tracing::warn!(record = %record_label(scene, *key), error = %e, "bind failed");
            }
        }
        for key in keys {
            self.update(scene, key, report);
        }
    }

    /// Drain scene notifications until none are left or the round limit is
    /// reached. Each record runs at most once per round.
    pub fn process_events(&mut self, scene: &mut Scene) -> ProcessReport {
        let mut report = ProcessReport::default();
        loop {
            if !scene.has_pending_events() {
                break;
            }
            if report.rounds >= self.config.max_event_rounds {
                report.truncated = true;
                tracing::warn!(
                    rounds = report.rounds,
                    "event round limit reached, dropping remaining notifications"
                );
                scene.take_events();
                break;
            }
            report.rounds += 1;

            let mut touched: Vec<RecordKey> = Vec::new();
            for event in scene.take_events() {
                match event {
                    SceneEvent::RecordAdded(key) | SceneEvent::RecordModified(key) => {
                        if let Err(e) = self.add_record(scene, key) {
                            tracing::warn!(record = %record_label(scene, key), error = %e, "bind failed");
                        }
                        if !touched.contains(&key) {
                            touched.push(key);
                        }
                    }
                    SceneEvent::InputModified { record, node, event } => {
                        tracing::debug!(record = ?record, node = ?node, event = ?event, "input modified");
                        if !self.entries.contains_key(record) {
                            continue;
                        }
                        if let Err(e) = self.bind(scene, record) {
                            tracing::warn!(record = %record_label(scene, record), error = %e, "bind failed");
                        }
                        if !touched.contains(&record) {
                            touched.push(record);
                        }
                    }
                    SceneEvent::RecordRemoved(key) => {
                        touched.retain(|&k| k != key);
                        self.remove_record(scene, key);
                    }
                    SceneEvent::ImportEnded => self.import_into(scene, &mut report),
                }
            }
            for key in touched {
                self.update(scene, key, &mut report);
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ParameterRecord;
    use crate::scene::NodeData;
    use dynmod_geometry::shapes::cuboid;
    use dynmod_geometry::{Mesh, Plane, Point3, Vector3};

    fn controller() -> ModelerController {
        ModelerController::with_registry(
            RuleRegistry::with_builtin_rules(ModelerConfig::default()),
            ModelerConfig::default(),
        )
    }

    fn mirror_scene() -> (Scene, RecordKey, NodeKey, NodeKey) {
        let mut scene = Scene::new();
        let model = scene.add_model("cube", cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0)));
        let plane = scene.add_node(
            "plane",
            NodeData::Plane(Plane::new(Point3::new(-1.0, 0.0, 0.0), Vector3::x()).unwrap()),
        );
        let out = scene.add_model("mirrored", Mesh::new());
        let record = scene.add_record(
            ParameterRecord::new("mirror")
                .with_rule("Mirror")
                .with_continuous_update(true)
                .with_reference("Mirror.InputModel", model)
                .with_reference("Mirror.InputPlane", plane)
                .with_reference("Mirror.OutputModel", out),
        );
        (scene, record, model, out)
    }

    #[test]
    fn test_record_lifecycle() {
        let (mut scene, record, model, _) = mirror_scene();
        let mut controller = controller();

        let report = controller.process_events(&mut scene);
        assert_eq!(report.updated, vec![record]);
        assert_eq!(controller.state(record), Some(BindingState::Bound));
        assert!(scene.is_subscribed(model, record, crate::scene::EventKind::MeshModified));

        scene.remove_record(record);
        controller.process_events(&mut scene);
        assert!(!controller.contains(record));
        assert!(scene.subscribed_nodes(record).is_empty());
    }

    #[test]
    fn test_rule_name_change_rebinds() {
        let (mut scene, record, _, _) = mirror_scene();
        let mut controller = controller();
        controller.process_events(&mut scene);

        scene
            .modify_record(record, |r| r.rule_name = Some("Append".into()))
            .unwrap();
        controller.process_events(&mut scene);
        assert_eq!(controller.rule(record).map(|r| r.name()), Some("Append"));
        // Append has nothing bound under its own roles
        assert!(scene.subscribed_nodes(record).is_empty());

        scene
            .modify_record(record, |r| r.rule_name = Some("Sculpt".into()))
            .unwrap();
        controller.process_events(&mut scene);
        assert_eq!(controller.state(record), Some(BindingState::Unbound));
        // References survive the rebinding
        assert_eq!(scene.record(record).unwrap().references("Mirror.InputModel").len(), 1);
    }

    #[test]
    fn test_input_change_reruns_continuous_record() {
        let (mut scene, record, model, out) = mirror_scene();
        let mut controller = controller();
        controller.process_events(&mut scene);

        scene
            .set_mesh(model, cuboid(Point3::origin(), Point3::new(2.0, 1.0, 1.0)))
            .unwrap();
        let report = controller.process_events(&mut scene);
        assert_eq!(report.updated, vec![record]);
        let mirrored = scene.mesh(out).unwrap();
        assert!(mirrored.positions.iter().any(|p| (p.x + 4.0).abs() < 1e-12));
    }

    #[test]
    fn test_manual_records_only_run_on_request() {
        let (mut scene, record, model, out) = mirror_scene();
        scene
            .modify_record(record, |r| r.continuous_update = false)
            .unwrap();
        let mut controller = controller();

        let report = controller.process_events(&mut scene);
        assert!(report.is_empty());
        assert!(scene.mesh(out).unwrap().is_empty());

        scene.set_mesh(model, cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0))).unwrap();
        assert!(controller.process_events(&mut scene).is_empty());

        assert_eq!(controller.run(&mut scene, record).unwrap(), RunStatus::Updated);
        assert!(!scene.mesh(out).unwrap().is_empty());
    }

    #[test]
    fn test_missing_inputs_are_skipped_quietly() {
        let mut scene = Scene::new();
        let out = scene.add_model("out", Mesh::new());
        let record = scene.add_record(
            ParameterRecord::new("mirror")
                .with_rule("Mirror")
                .with_continuous_update(true)
                .with_reference("Mirror.OutputModel", out),
        );
        let mut controller = controller();
        let report = controller.process_events(&mut scene);
        assert!(report.is_empty());

        assert!(matches!(
            controller.run(&mut scene, record),
            Err(Error::MissingRequiredInput { .. })
        ));
    }

    #[test]
    fn test_import_defers_binding() {
        let mut scene = Scene::new();
        scene.begin_import();
        let (model, out) = (
            scene.add_model("cube", cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0))),
            scene.add_model("out", Mesh::new()),
        );
        let plane = scene.add_node(
            "plane",
            NodeData::Plane(Plane::new(Point3::origin(), Vector3::x()).unwrap()),
        );
        let record = scene.add_record(
            ParameterRecord::new("mirror")
                .with_rule("Mirror")
                .with_continuous_update(true)
                .with_reference("Mirror.InputModel", model)
                .with_reference("Mirror.InputPlane", plane)
                .with_reference("Mirror.OutputModel", out),
        );
        let mut controller = controller();
        assert!(controller.process_events(&mut scene).is_empty());
        assert!(!controller.contains(record));

        scene.end_import();
        let report = controller.process_events(&mut scene);
        assert_eq!(report.updated, vec![record]);
        assert_eq!(controller.state(record), Some(BindingState::Bound));
    }
}
