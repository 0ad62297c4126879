// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine configuration

use dynmod_geometry::{
    LocatorOptions, DEFAULT_BOUNDARY_EPSILON, DEFAULT_CELL_SEARCH_RADIUS,
    DEFAULT_PARALLEL_THRESHOLD, DEFAULT_POINTS_PER_BUCKET, DEFAULT_TOLERANCE,
};
use std::str::FromStr;

/// Default limit on notification rounds per `process_events` call
pub const DEFAULT_MAX_EVENT_ROUNDS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelerConfig {
    /// Default clip epsilon of boundary cuts
    pub boundary_epsilon: f64,
    pub locator_points_per_bucket: usize,
    pub locator_tolerance: f64,
    pub cell_distance_radius: f64,
    pub max_event_rounds: usize,
    /// Point count from which scalar fields are sampled in parallel
    pub parallel_threshold: usize,
}

impl Default for ModelerConfig {
    fn default() -> Self {
        Self {
            boundary_epsilon: DEFAULT_BOUNDARY_EPSILON,
            locator_points_per_bucket: DEFAULT_POINTS_PER_BUCKET,
            locator_tolerance: DEFAULT_TOLERANCE,
            cell_distance_radius: DEFAULT_CELL_SEARCH_RADIUS,
            max_event_rounds: DEFAULT_MAX_EVENT_ROUNDS,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl ModelerConfig {
    /// Read overrides from `DYNMOD_*` environment variables. Missing or
    /// unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            boundary_epsilon: env_or("DYNMOD_BOUNDARY_EPSILON", defaults.boundary_epsilon),
            locator_points_per_bucket: env_or(
                "DYNMOD_LOCATOR_POINTS_PER_BUCKET",
                defaults.locator_points_per_bucket,
            ),
            locator_tolerance: env_or("DYNMOD_LOCATOR_TOLERANCE", defaults.locator_tolerance),
            cell_distance_radius: env_or(
                "DYNMOD_CELL_DISTANCE_RADIUS",
                defaults.cell_distance_radius,
            ),
            max_event_rounds: env_or("DYNMOD_MAX_EVENT_ROUNDS", defaults.max_event_rounds),
            parallel_threshold: env_or("DYNMOD_PARALLEL_THRESHOLD", defaults.parallel_threshold),
        }
    }

    pub fn locator_options(&self) -> LocatorOptions {
        LocatorOptions {
            points_per_bucket: self.locator_points_per_bucket,
            tolerance: self.locator_tolerance,
        }
    }
}
