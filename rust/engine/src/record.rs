// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parameter records: the persistent binding of a rule to scene nodes.
//!
//! Node references are stored per reference role (the slot's stable role
//! string) and parameters as attribute strings, so a record can outlive
//! the rule instance that interprets it.

use std::collections::BTreeMap;

use crate::keys::NodeKey;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterRecord {
    pub name: String,
    pub rule_name: Option<String>,
    pub continuous_update: bool,
    pub references: BTreeMap<String, Vec<NodeKey>>,
    pub attributes: BTreeMap<String, String>,
}

impl ParameterRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_rule(mut self, rule_name: impl Into<String>) -> Self {
        self.rule_name = Some(rule_name.into());
        self
    }

    pub fn with_continuous_update(mut self, enabled: bool) -> Self {
        self.continuous_update = enabled;
        self
    }

    pub fn with_reference(mut self, role: impl Into<String>, node: NodeKey) -> Self {
        self.add_reference(role, node);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn rule_name(&self) -> Option<&str> {
        self.rule_name.as_deref()
    }

    /// Nodes bound under `role`, in binding order.
    pub fn references(&self, role: &str) -> &[NodeKey] {
        self.references.get(role).map_or(&[], Vec::as_slice)
    }

    pub fn first_reference(&self, role: &str) -> Option<NodeKey> {
        self.references(role).first().copied()
    }

    /// Bind `node` as the only reference under `role`.
    pub fn set_reference(&mut self, role: impl Into<String>, node: NodeKey) {
        self.references.insert(role.into(), vec![node]);
    }

    /// Append `node` under `role`; binding the same node twice is a no-op.
    pub fn add_reference(&mut self, role: impl Into<String>, node: NodeKey) {
        let nodes = self.references.entry(role.into()).or_default();
        if !nodes.contains(&node) {
            nodes.push(node);
        }
    }

    pub fn remove_reference(&mut self, role: &str, node: NodeKey) -> bool {
        let Some(nodes) = self.references.get_mut(role) else {
            return false;
        };
        let before = nodes.len();
        nodes.retain(|&n| n != node);
        let removed = nodes.len() != before;
        if nodes.is_empty() {
            self.references.remove(role);
        }
        removed
    }

    pub fn clear_references(&mut self, role: &str) {
        self.references.remove(role);
    }

    /// Drop `node` from every role. Returns whether anything changed.
    pub fn remove_node_everywhere(&mut self, node: NodeKey) -> bool {
        let roles: Vec<String> = self
            .references
            .iter()
            .filter(|(_, nodes)| nodes.contains(&node))
            .map(|(role, _)| role.clone())
            .collect();
        for role in &roles {
            self.remove_reference(role, node);
        }
        !roles.is_empty()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(name)
    }
}
