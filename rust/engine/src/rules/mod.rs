// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Built-in rules.

pub mod append;
pub mod boundary_cut;
pub mod curve_cut;
pub mod mirror;
pub mod plane_cut;

pub use append::AppendRule;
pub use boundary_cut::BoundaryCutRule;
pub use curve_cut::CurveCutRule;
pub use mirror::MirrorRule;
pub use plane_cut::PlaneCutRule;
