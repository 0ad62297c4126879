// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Catalog of rule prototypes, keyed by name.
//!
//! Rules are instantiated by cloning a registered prototype through
//! [`Rule::create_instance`]. The process-wide registry behind
//! [`RuleRegistry::global`] is built on first use with the built-in rules.

use std::sync::{Mutex, OnceLock, PoisonError};

use crate::config::ModelerConfig;
use crate::rule::{Rule, RuleDescriptor};
use crate::rules::{AppendRule, BoundaryCutRule, CurveCutRule, MirrorRule, PlaneCutRule};

#[derive(Default)]
pub struct RuleRegistry {
    prototypes: Vec<Box<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the five built-in rules.
    pub fn with_builtin_rules(config: ModelerConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PlaneCutRule::new(config)));
        registry.register(Box::new(MirrorRule::new(config)));
        registry.register(Box::new(CurveCutRule::new(config)));
        registry.register(Box::new(BoundaryCutRule::new(config)));
        registry.register(Box::new(AppendRule::new(config)));
        registry
    }

    /// Process-wide registry, configured from the environment on first use.
    pub fn global() -> &'static Mutex<RuleRegistry> {
        static GLOBAL: OnceLock<Mutex<RuleRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            Mutex::new(RuleRegistry::with_builtin_rules(ModelerConfig::from_env()))
        })
    }

    /// Run `f` against the global registry.
    pub fn with_global<R>(f: impl FnOnce(&mut RuleRegistry) -> R) -> R {
        let mut guard = Self::global()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Add a prototype. A rule whose class or name is already registered is
    /// rejected and the existing entry kept.
    pub fn register(&mut self, rule: Box<dyn Rule>) -> bool {
        let duplicate = self
            .prototypes
            .iter()
            .any(|p| p.class_name() == rule.class_name() || p.name() == rule.name());
        if duplicate {
            tracing::warn!(
                class = rule.class_name(),
                name = rule.name(),
                "rule already registered"
            );
            return false;
        }
        tracing::debug!(class = rule.class_name(), name = rule.name(), "registered rule");
        self.prototypes.push(rule);
        true
    }

    pub fn unregister(&mut self, class_name: &str) -> bool {
        let before = self.prototypes.len();
        self.prototypes.retain(|p| p.class_name() != class_name);
        self.prototypes.len() != before
    }

    /// New instance of the rule registered under `name`.
    pub fn create_by_name(&self, name: &str) -> Option<Box<dyn Rule>> {
        self.prototypes
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.create_instance())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.prototypes.iter().any(|p| p.name() == name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.prototypes.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    pub fn descriptors(&self) -> Vec<&RuleDescriptor> {
        self.prototypes.iter().map(|p| p.descriptor()).collect()
    }

    /// Descriptors of every registered rule as a JSON array.
    pub fn descriptors_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.descriptors())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order() {
        let registry = RuleRegistry::with_builtin_rules(ModelerConfig::default());
        assert_eq!(
            registry.names(),
            vec!["Plane cut", "Mirror", "Curve cut", "Boundary cut", "Append"]
        );
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = RuleRegistry::with_builtin_rules(ModelerConfig::default());
        assert!(!registry.register(Box::new(MirrorRule::new(ModelerConfig::default()))));
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_create_and_unregister() {
        let mut registry = RuleRegistry::with_builtin_rules(ModelerConfig::default());
        let rule = registry.create_by_name("Curve cut").unwrap();
        assert_eq!(rule.class_name(), "CurveCutRule");
        assert!(registry.create_by_name("Sculpt").is_none());

        assert!(registry.unregister("CurveCutRule"));
        assert!(!registry.unregister("CurveCutRule"));
        assert!(!registry.contains("Curve cut"));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_descriptors_json_lists_slots_in_order() {
        let registry = RuleRegistry::with_builtin_rules(ModelerConfig::default());
        let json: serde_json::Value =
            serde_json::from_str(&registry.descriptors_json().unwrap()).unwrap();
        let rules = json.as_array().unwrap();
        assert_eq!(rules.len(), 5);
        assert_eq!(rules[0]["name"], "Plane cut");
        assert_eq!(rules[0]["inputs"][0]["reference_role"], "PlaneCut.InputPlane");
        assert_eq!(rules[0]["parameters"][1]["allowed"][2], "Difference");
        assert_eq!(rules[0]["parameters"][0]["default"], true);
    }

    #[test]
    fn test_global_registry_is_shared() {
        let names = RuleRegistry::with_global(|r| r.names());
        assert!(names.contains(&"Append"));
    }
}
