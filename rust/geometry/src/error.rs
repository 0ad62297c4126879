// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during geometry processing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Triangulation failed: {0}")]
    TriangulationError(String),

    #[error("Empty mesh: {0}")]
    EmptyMesh(String),

    #[error("Face {face} references vertex {index} but the mesh has {count} points")]
    InvalidFaceIndex { face: usize, index: u32, count: usize },

    #[error("Degenerate plane: normal has zero length")]
    DegeneratePlane,

    #[error("Degenerate input: {0}")]
    Degenerate(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Empty or degenerate input, such as a border that misses the mesh or
    /// a loop that collapses onto fewer than three vertices. Callers
    /// upstream treat these as a no-op rather than a failure.
    pub fn is_empty_input(&self) -> bool {
        matches!(self, Error::EmptyMesh(_) | Error::Degenerate(_))
    }

    pub(crate) fn empty(what: impl Into<String>) -> Self {
        Error::EmptyMesh(what.into())
    }

    pub(crate) fn degenerate(what: impl Into<String>) -> Self {
        Error::Degenerate(what.into())
    }

    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        Error::InvalidInput(what.into())
    }
}
