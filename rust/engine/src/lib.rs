// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dynmod Engine
//!
//! Reactive modeling on top of `dynmod-geometry`. A [`Scene`] holds nodes
//! (models, curves, planes, seed points) and parameter records. Each
//! record names a rule and binds scene nodes to the rule's input and
//! output slots. The [`ModelerController`] instantiates rules through the
//! [`RuleRegistry`], observes bound inputs and re-runs continuous records
//! when those inputs change.
//!
//! ```ignore
//! use dynmod_engine::{ModelerConfig, ModelerController, ParameterRecord, Scene};
//!
//! let mut scene = Scene::new();
//! let mut controller = ModelerController::new(ModelerConfig::from_env());
//! let record = scene.add_record(ParameterRecord::new("mirror").with_rule("Mirror"));
//! controller.process_events(&mut scene);
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod keys;
pub mod record;
pub mod registry;
pub mod rule;
pub mod rules;
pub mod scene;

pub use config::{ModelerConfig, DEFAULT_MAX_EVENT_ROUNDS};
pub use controller::{BindingState, ModelerController, ProcessReport};
pub use error::{Error, Result};
pub use keys::{NodeKey, RecordKey};
pub use record::ParameterRecord;
pub use registry::RuleRegistry;
pub use rule::{
    InputSlot, OutputSlot, ParameterKind, ParameterSpec, ParameterValue, Rule, RuleDescriptor,
    RunStatus,
};
pub use rules::{AppendRule, BoundaryCutRule, CurveCutRule, MirrorRule, PlaneCutRule};
pub use scene::{Curve, EventKind, Node, NodeData, NodeKind, Scene, SceneEvent};
