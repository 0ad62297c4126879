// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Duplicate and degenerate face removal
//!
//! Faces are compared by their vertex index set, so `[0, 1, 2]` and
//! `[2, 0, 1]` are duplicates regardless of winding, and a line `[0, 1]`
//! duplicates a two-point polygon `[1, 0]`. Points are never touched:
//! coincident points with different indices stay distinct.

use crate::mesh::{FaceKind, Mesh};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// What [`remove_duplicate_faces`] dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupReport {
    /// Faces whose vertex set matched an earlier kept face
    pub duplicates: usize,
    /// Faces repeating a vertex whose set matched no kept face
    pub degenerates: usize,
}

impl DedupReport {
    pub fn removed(&self) -> usize {
        self.duplicates + self.degenerates
    }
}

/// Drop duplicate and degenerate faces.
///
/// Vertex and strip faces pass through untouched. The output shares the
/// input's point array and keeps the attributes of every surviving face.
pub fn remove_duplicate_faces(mesh: &Mesh) -> (Mesh, DedupReport) {
    let mut out = Mesh {
        positions: mesh.positions.clone(),
        faces: Vec::with_capacity(mesh.faces.len()),
        point_data: mesh.point_data.clone(),
        face_data: mesh.face_data.empty_like(),
    };
    let mut report = DedupReport::default();
    let mut seen: FxHashSet<SmallVec<[u32; 4]>> = FxHashSet::default();

    for (index, face) in mesh.faces.iter().enumerate() {
        if !matches!(face.kind, FaceKind::Vertex | FaceKind::Strip) {
            let mut key: SmallVec<[u32; 4]> = face.indices.clone();
            key.sort_unstable();
            key.dedup();

            if seen.contains(&key) {
                report.duplicates += 1;
                tracing::trace!(face = index, indices = ?face.indices, "duplicate face");
                continue;
            }
            if key.len() < face.indices.len() {
                report.degenerates += 1;
                continue;
            }
            seen.insert(key);
        }
        out.faces.push(face.clone());
        out.face_data.copy_tuple(&mesh.face_data, index);
    }

    if report.removed() > 0 {
        tracing::debug!(
            duplicates = report.duplicates,
            degenerates = report.degenerates,
            kept = out.faces.len(),
            "removed duplicate faces"
        );
    }
    (out, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{AttributeArray, Face};
    use nalgebra::Point3;

    fn grid_points() -> Vec<Point3<f64>> {
        (0..6)
            .map(|i| Point3::new((i % 3) as f64, (i / 3) as f64, 0.0))
            .collect()
    }

    #[test]
    fn test_removes_all_but_one_occurrence() {
        let mut mesh = Mesh::from_triangles(
            grid_points(),
            &[[0, 1, 4], [4, 0, 1], [1, 4, 0], [1, 2, 5], [0, 4, 3]],
        );
        mesh.face_data
            .insert(AttributeArray::from_values("id", 1, vec![0.0, 1.0, 2.0, 3.0, 4.0]));

        let (out, report) = remove_duplicate_faces(&mesh);
        assert_eq!(report.duplicates, 2);
        assert_eq!(report.degenerates, 0);
        assert_eq!(out.face_count(), 3);
        assert_eq!(out.face_data.get("id").unwrap().values, vec![0.0, 3.0, 4.0]);
        assert_eq!(out.positions, mesh.positions);
    }

    #[test]
    fn test_drops_degenerate_faces() {
        let mut mesh = Mesh::from_triangles(grid_points(), &[[0, 1, 1], [0, 1, 4]]);
        mesh.add_face(Face::polygon([0, 1, 3, 0]));
        let (out, report) = remove_duplicate_faces(&mesh);
        assert_eq!(report.degenerates, 2);
        assert_eq!(out.face_count(), 1);
    }

    #[test]
    fn test_vertices_and_strips_pass_through() {
        let mut mesh = Mesh::new();
        mesh.positions = grid_points();
        mesh.add_face(Face::vertex(2));
        mesh.add_face(Face::vertex(2));
        mesh.add_face(Face::strip([0, 0, 1, 3]));
        mesh.add_face(Face::strip([0, 0, 1, 3]));
        let (out, report) = remove_duplicate_faces(&mesh);
        assert_eq!(report.removed(), 0);
        assert_eq!(out.face_count(), 4);
    }

    #[test]
    fn test_faces_match_on_point_set_alone() {
        let mut mesh = Mesh::new();
        mesh.positions = grid_points();
        mesh.add_face(Face::line([0, 1]));
        mesh.add_face(Face::line([1, 0]));
        mesh.add_face(Face::polygon([0, 1]));
        let (out, report) = remove_duplicate_faces(&mesh);
        assert_eq!(report.duplicates, 2);
        assert_eq!(out.face_count(), 1);
    }

    #[test]
    fn test_degenerate_copy_of_a_kept_face_is_a_duplicate() {
        let mut mesh = Mesh::from_triangles(grid_points(), &[[0, 1, 4]]);
        mesh.add_face(Face::polygon([0, 1, 4, 1]));
        mesh.add_face(Face::polygon([2, 5, 5]));
        let (out, report) = remove_duplicate_faces(&mesh);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.degenerates, 1);
        assert_eq!(out.face_count(), 1);
    }

    #[test]
    fn test_is_idempotent() {
        let mesh = Mesh::from_triangles(
            grid_points(),
            &[[0, 1, 4], [1, 4, 0], [3, 3, 4], [1, 2, 5], [5, 2, 1], [0, 4, 3]],
        );
        let (once, _) = remove_duplicate_faces(&mesh);
        let (twice, report) = remove_duplicate_faces(&once);
        assert_eq!(once, twice);
        assert_eq!(report.removed(), 0);
    }
}
