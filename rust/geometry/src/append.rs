// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh concatenation and point welding

use crate::dedup::{remove_duplicate_faces, DedupReport};
use crate::locator::{LocatorOptions, PointLocator};
use crate::mesh::Mesh;

/// Concatenate meshes. Attribute arrays present in every input survive.
pub fn append_meshes(meshes: &[&Mesh]) -> Mesh {
    let mut out = Mesh::new();
    out.merge_all(meshes);
    out
}

/// Weld points closer than `tolerance` onto the lowest index among them.
///
/// The locator tolerance is the floor, so a zero `tolerance` merges exact
/// duplicates only. Unused points are dropped afterwards.
pub fn merge_points(mesh: &Mesh, tolerance: f64, options: LocatorOptions) -> Mesh {
    let mut locator = PointLocator::new(options);
    locator.build(&mesh.positions);
    let radius = tolerance.max(locator.tolerance());

    let mut representative: Vec<u32> = (0..mesh.point_count() as u32).collect();
    for i in 0..mesh.point_count() {
        if representative[i] != i as u32 {
            continue;
        }
        for j in locator.find_points_within_radius(radius, &mesh.positions[i]) {
            if j > i && representative[j] == j as u32 {
                representative[j] = i as u32;
            }
        }
    }

    let mut welded = mesh.clone();
    for face in &mut welded.faces {
        for index in face.indices.iter_mut() {
            *index = representative[*index as usize];
        }
    }
    let merged = representative
        .iter()
        .enumerate()
        .filter(|&(i, &r)| r != i as u32)
        .count();
    tracing::debug!(merged, radius, "merged coincident points");
    welded.compact()
}

/// Append, optionally weld points, then drop duplicate faces
pub fn append_and_clean(
    meshes: &[&Mesh],
    merge_tolerance: Option<f64>,
    options: LocatorOptions,
) -> (Mesh, DedupReport) {
    let appended = append_meshes(meshes);
    let appended = match merge_tolerance {
        Some(tolerance) => merge_points(&appended, tolerance, options),
        None => appended,
    };
    remove_duplicate_faces(&appended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    /// Two triangles sharing the edge (1,0,0)-(0,1,0), each with its own
    /// copy of the shared vertices
    fn split_pair() -> (Mesh, Mesh) {
        let a = Mesh::from_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            &[[0, 1, 2]],
        );
        let b = Mesh::from_triangles(
            vec![
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            &[[0, 1, 2]],
        );
        (a, b)
    }

    #[test]
    fn test_append_keeps_coincident_points_distinct() {
        let (a, b) = split_pair();
        let (out, report) = append_and_clean(&[&a, &b], None, LocatorOptions::default());
        assert_eq!(out.face_count(), 2);
        assert_eq!(out.point_count(), 6);
        assert_eq!(report.removed(), 0);
    }

    #[test]
    fn test_append_with_merge_welds_shared_edge() {
        let (a, b) = split_pair();
        let (out, _) = append_and_clean(&[&a, &b], Some(0.0), LocatorOptions::default());
        assert_eq!(out.face_count(), 2);
        assert_eq!(out.point_count(), 4);
        assert_eq!(crate::edges::boundary_edges(&out).len(), 4);
    }

    #[test]
    fn test_appending_a_mesh_to_itself_dedups_after_merge() {
        let (a, _) = split_pair();
        let (out, report) = append_and_clean(&[&a, &a], Some(1e-9), LocatorOptions::default());
        assert_eq!(out.face_count(), 1);
        assert_eq!(report.duplicates, 1);
    }
}
