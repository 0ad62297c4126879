// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the rule engine.

use crate::keys::{NodeKey, RecordKey};

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while binding or running rules.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required input slot has no node bound.
    #[error("{rule}: missing required input '{slot}'")]
    MissingRequiredInput { rule: String, slot: String },

    /// No rule with this name is registered.
    #[error("unknown rule: {0}")]
    UnknownRule(String),

    /// A parameter attribute could not be parsed as its declared type.
    #[error("invalid value '{value}' for parameter '{parameter}'")]
    InvalidParameterValue { parameter: String, value: String },

    /// A parameter name the rule does not declare.
    #[error("{rule} has no parameter '{parameter}'")]
    UnknownParameter { rule: String, parameter: String },

    /// A bound node is of a kind the slot does not accept.
    #[error("{rule}: node bound to '{slot}' is not a {expected}")]
    InvalidInputNode {
        rule: String,
        slot: String,
        expected: String,
    },

    /// Node key not found in the scene.
    #[error("node not found: {0:?}")]
    UnknownNode(NodeKey),

    /// Record key not found in the scene.
    #[error("parameter record not found: {0:?}")]
    UnknownRecord(RecordKey),

    /// Failure inside a geometric operation.
    #[error(transparent)]
    Geometry(#[from] dynmod_geometry::Error),
}

impl Error {
    /// Empty or degenerate geometry, which runs treat as a no-op.
    pub fn is_geometry(&self) -> bool {
        matches!(self, Error::Geometry(e) if e.is_empty_input())
    }

    /// Problems with how a record is set up rather than with its geometry.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::MissingRequiredInput { .. }
                | Error::UnknownRule(_)
                | Error::InvalidParameterValue { .. }
                | Error::UnknownParameter { .. }
                | Error::InvalidInputNode { .. }
        )
    }
}
