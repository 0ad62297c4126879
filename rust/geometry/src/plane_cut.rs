// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cut a surface by a boolean combination of half-spaces

use crate::clip::{clip_mesh, ClipOptions, DEFAULT_PARALLEL_THRESHOLD};
use crate::edges::cap_boundaries;
use crate::error::{Error, Result};
use crate::implicit::{BooleanOperation, ImplicitBoolean, ImplicitFunction, Plane};
use crate::mesh::Mesh;
use nalgebra::Point3;

/// Relative distance, as a fraction of the input diagonal, under which a
/// boundary point counts as lying on the cut
pub const CAP_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneCutOptions {
    pub operation: BooleanOperation,
    /// Close the cut with planar caps
    pub cap_surface: bool,
    /// Also produce the piece outside the combined half-spaces
    pub generate_outside: bool,
    pub parallel_threshold: usize,
}

impl Default for PlaneCutOptions {
    fn default() -> Self {
        Self {
            operation: BooleanOperation::Union,
            cap_surface: false,
            generate_outside: true,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlaneCutOutput {
    /// Part on the positive side of the combined function
    pub inside: Mesh,
    pub outside: Option<Mesh>,
}

/// Clip `mesh` against the boolean of `planes`.
///
/// Each plane keeps the side its normal points to. Caps replace the open
/// cut loops of each piece, they are not returned separately.
pub fn plane_cut(mesh: &Mesh, planes: &[Plane], options: &PlaneCutOptions) -> Result<PlaneCutOutput> {
    if mesh.is_empty() {
        return Err(Error::empty("plane cut input"));
    }
    if planes.is_empty() {
        return Err(Error::invalid("plane cut needs at least one plane"));
    }

    let function = ImplicitBoolean::from_planes(options.operation, planes);
    let output = clip_mesh(
        mesh,
        &function,
        &ClipOptions {
            value: 0.0,
            inside_out: false,
            generate_clipped_output: options.generate_outside,
        },
        options.parallel_threshold,
    )?;

    let mut inside = output.kept;
    let mut outside = output.clipped;
    if options.cap_surface {
        let tolerance = CAP_TOLERANCE * mesh.diagonal_length();
        let on_cut = |p: &Point3<f64>| function.evaluate(p).abs() <= tolerance;
        let mut capped = cap_boundaries(&mut inside, on_cut);
        if let Some(piece) = outside.as_mut() {
            capped += cap_boundaries(piece, on_cut);
        }
        tracing::debug!(cap_faces = capped, "capped plane cut");
    }

    tracing::debug!(
        planes = planes.len(),
        operation = options.operation.as_str(),
        inside_faces = inside.face_count(),
        outside_faces = outside.as_ref().map(|m| m.face_count()),
        "plane cut"
    );
    Ok(PlaneCutOutput { inside, outside })
}
