// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rigid and reflective transforms of whole meshes

use crate::implicit::Plane;
use crate::mesh::Mesh;
use nalgebra::Matrix4;

/// Apply an affine transform, returning a new mesh
pub fn transform_mesh(mesh: &Mesh, matrix: &Matrix4<f64>) -> Mesh {
    let mut out = mesh.clone();
    out.transform(matrix);
    out
}

/// Reflect a mesh across `plane`.
///
/// A reflection turns the surface inside out, so face winding is reversed
/// afterwards to keep normals pointing outward.
pub fn mirror(mesh: &Mesh, plane: &Plane) -> Mesh {
    let mut out = transform_mesh(mesh, &plane.reflection_matrix());
    out.reverse_faces();
    out
}
