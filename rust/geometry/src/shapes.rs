// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Procedural meshes
//!
//! Closed shapes are wound counter-clockwise seen from outside.

use crate::mesh::Mesh;
use nalgebra::Point3;
use std::f64::consts::PI;

/// Axis-aligned box with 12 triangles
pub fn cuboid(min: Point3<f64>, max: Point3<f64>) -> Mesh {
    let positions = vec![
        Point3::new(min.x, min.y, min.z),
        Point3::new(max.x, min.y, min.z),
        Point3::new(max.x, max.y, min.z),
        Point3::new(min.x, max.y, min.z),
        Point3::new(min.x, min.y, max.z),
        Point3::new(max.x, min.y, max.z),
        Point3::new(max.x, max.y, max.z),
        Point3::new(min.x, max.y, max.z),
    ];
    Mesh::from_triangles(
        positions,
        &[
            // -Z
            [0, 2, 1],
            [0, 3, 2],
            // +Z
            [4, 5, 6],
            [4, 6, 7],
            // -Y
            [0, 1, 5],
            [0, 5, 4],
            // +X
            [1, 2, 6],
            [1, 6, 5],
            // +Y
            [2, 3, 7],
            [2, 7, 6],
            // -X
            [3, 0, 4],
            [3, 4, 7],
        ],
    )
}

/// Flat disc in the plane `z = center.z`, facing +Z.
///
/// Point 0 is the center, followed by `rings` concentric rings of
/// `segments` points each, innermost first.
pub fn disc(center: Point3<f64>, radius: f64, rings: usize, segments: usize) -> Mesh {
    let rings = rings.max(1);
    let segments = segments.max(3);
    let mut mesh = Mesh::with_capacity(1 + rings * segments, segments * (2 * rings - 1));
    mesh.add_point(center);

    for r in 1..=rings {
        let rr = radius * r as f64 / rings as f64;
        for j in 0..segments {
            let theta = 2.0 * PI * j as f64 / segments as f64;
            mesh.add_point(Point3::new(
                center.x + rr * theta.cos(),
                center.y + rr * theta.sin(),
                center.z,
            ));
        }
    }

    let index = |r: usize, j: usize| (1 + (r - 1) * segments + j % segments) as u32;
    for j in 0..segments {
        mesh.add_triangle(0, index(1, j), index(1, j + 1));
    }
    for r in 1..rings {
        for j in 0..segments {
            let (a, b) = (index(r, j), index(r, j + 1));
            let (c, d) = (index(r + 1, j), index(r + 1, j + 1));
            mesh.add_triangle(a, c, d);
            mesh.add_triangle(a, d, b);
        }
    }
    mesh
}

/// Indices of ring `ring` (1-based) of a [`disc`]
pub fn disc_ring(ring: usize, segments: usize) -> Vec<u32> {
    (0..segments)
        .map(|j| (1 + (ring - 1) * segments + j) as u32)
        .collect()
}

/// Latitude/longitude sphere
pub fn uv_sphere(center: Point3<f64>, radius: f64, stacks: usize, slices: usize) -> Mesh {
    let stacks = stacks.max(2);
    let slices = slices.max(3);
    let mut mesh = Mesh::with_capacity(2 + (stacks - 1) * slices, 2 * slices * (stacks - 1));

    mesh.add_point(center + nalgebra::Vector3::new(0.0, 0.0, radius));
    for i in 1..stacks {
        let phi = PI * i as f64 / stacks as f64;
        for j in 0..slices {
            let theta = 2.0 * PI * j as f64 / slices as f64;
            mesh.add_point(Point3::new(
                center.x + radius * phi.sin() * theta.cos(),
                center.y + radius * phi.sin() * theta.sin(),
                center.z + radius * phi.cos(),
            ));
        }
    }
    let south = mesh.add_point(center - nalgebra::Vector3::new(0.0, 0.0, radius));

    let ring = |i: usize, j: usize| (1 + (i - 1) * slices + j % slices) as u32;
    for j in 0..slices {
        mesh.add_triangle(0, ring(1, j), ring(1, j + 1));
    }
    for i in 1..stacks - 1 {
        for j in 0..slices {
            let (a, b) = (ring(i, j), ring(i, j + 1));
            let (c, d) = (ring(i + 1, j), ring(i + 1, j + 1));
            mesh.add_triangle(a, c, d);
            mesh.add_triangle(a, d, b);
        }
    }
    for j in 0..slices {
        mesh.add_triangle(ring(stacks - 1, j), south, ring(stacks - 1, j + 1));
    }
    mesh
}

/// Signed volume enclosed by a closed, outward-wound triangle mesh
pub fn signed_volume(mesh: &Mesh) -> f64 {
    mesh.faces
        .iter()
        .filter(|f| f.is_triangle())
        .map(|f| {
            let p = mesh.face_points(f);
            p[0].coords.dot(&p[1].coords.cross(&p[2].coords))
        })
        .sum::<f64>()
        / 6.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edges::boundary_edges;
    use approx::assert_relative_eq;

    #[test]
    fn test_cuboid_is_closed_and_outward() {
        let mesh = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        assert!(boundary_edges(&mesh).is_empty());
        assert_relative_eq!(signed_volume(&mesh), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sphere_is_closed_and_outward() {
        let mesh = uv_sphere(Point3::new(1.0, 2.0, 3.0), 1.0, 12, 24);
        assert!(boundary_edges(&mesh).is_empty());
        let volume = signed_volume(&mesh);
        assert!(volume > 3.5 && volume < 4.0 * PI / 3.0);
    }

    #[test]
    fn test_disc_layout() {
        let mesh = disc(Point3::origin(), 3.0, 3, 16);
        assert_eq!(mesh.point_count(), 1 + 3 * 16);
        assert_eq!(mesh.face_count(), 16 + 2 * 2 * 16);
        // Only the outer ring is open
        assert_eq!(boundary_edges(&mesh).len(), 16);
        for i in disc_ring(2, 16) {
            assert_relative_eq!(mesh.positions[i as usize].coords.norm(), 2.0, epsilon = 1e-12);
        }
        mesh.validate().unwrap();
    }
}
