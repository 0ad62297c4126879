// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundary edges, polyline stitching and caps

use crate::mesh::{Face, FaceKind, Mesh};
use crate::triangulation::triangulate_face;
use nalgebra::Point3;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

#[inline]
fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Edges used by exactly one polygon, oriented as in their owning face
pub fn boundary_edges(mesh: &Mesh) -> Vec<[u32; 2]> {
    let mut count: FxHashMap<(u32, u32), (u32, [u32; 2])> = FxHashMap::default();
    for face in mesh.faces.iter().filter(|f| f.kind == FaceKind::Polygon) {
        for (a, b) in face.polygon_edges() {
            if a == b {
                continue;
            }
            count
                .entry(edge_key(a, b))
                .and_modify(|(n, _)| *n += 1)
                .or_insert((1, [a, b]));
        }
    }

    let mut edges: Vec<[u32; 2]> = count
        .into_values()
        .filter(|(n, _)| *n == 1)
        .map(|(_, edge)| edge)
        .collect();
    edges.sort_unstable();
    edges
}

/// A chain of point indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polyline {
    pub indices: Vec<u32>,
    /// Last point connects back to the first
    pub closed: bool,
}

/// Stitch loose edges into maximal polylines.
///
/// Open chains start at points of degree other than two; what remains
/// afterwards are closed loops. Each chain follows the direction of the
/// edge it starts from.
pub fn strip_polylines(edges: &[[u32; 2]]) -> Vec<Polyline> {
    let mut adjacency: FxHashMap<u32, SmallVec<[u32; 2]>> = FxHashMap::default();
    let mut forward: FxHashSet<(u32, u32)> = FxHashSet::default();
    for &[a, b] in edges {
        if a == b || !forward.insert((a, b)) || forward.contains(&(b, a)) {
            continue;
        }
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }

    let mut used: FxHashSet<(u32, u32)> = FxHashSet::default();
    let mut lines = Vec::new();

    let walk = |start: u32, next: u32, used: &mut FxHashSet<(u32, u32)>| {
        let mut indices = vec![start, next];
        used.insert(edge_key(start, next));
        let mut current = next;
        loop {
            let step = adjacency[&current]
                .iter()
                .copied()
                .find(|&n| !used.contains(&edge_key(current, n)));
            match step {
                Some(n) => {
                    used.insert(edge_key(current, n));
                    indices.push(n);
                    current = n;
                }
                None => break,
            }
        }
        let closed = indices.len() > 2 && indices.first() == indices.last();
        if closed {
            indices.pop();
        }
        Polyline { indices, closed }
    };

    // Open chains first so loops are not cut at an arbitrary point
    let mut ends: Vec<u32> = adjacency
        .iter()
        .filter(|(_, n)| n.len() != 2)
        .map(|(&p, _)| p)
        .collect();
    ends.sort_unstable();
    for start in ends {
        while let Some(next) = adjacency[&start]
            .iter()
            .copied()
            .find(|&n| !used.contains(&edge_key(start, n)))
        {
            lines.push(walk(start, next, &mut used));
        }
    }

    for &[a, b] in edges {
        if a != b && !used.contains(&edge_key(a, b)) {
            lines.push(walk(a, b, &mut used));
        }
    }
    lines
}

/// Boundary loops of a mesh, oriented like their owning faces
pub fn boundary_loops(mesh: &Mesh) -> Vec<Polyline> {
    strip_polylines(&boundary_edges(mesh))
        .into_iter()
        .filter(|l| l.closed)
        .collect()
}

/// Close boundary loops whose points all satisfy `on_cut`.
///
/// Each loop is triangulated in place, reusing the loop's point indices,
/// and wound against the neighbouring faces so the cap faces outward.
/// Returns the number of faces added.
pub fn cap_boundaries(mesh: &mut Mesh, on_cut: impl Fn(&Point3<f64>) -> bool) -> usize {
    let mut added = 0;
    for mut boundary in boundary_loops(mesh) {
        if boundary.indices.len() < 3
            || !boundary
                .indices
                .iter()
                .all(|&i| on_cut(&mesh.positions[i as usize]))
        {
            continue;
        }

        boundary.indices.reverse();
        let points: Vec<Point3<f64>> = boundary
            .indices
            .iter()
            .map(|&i| mesh.positions[i as usize])
            .collect();
        for [a, b, c] in triangulate_face(&points) {
            mesh.faces.push(Face::triangle(
                boundary.indices[a],
                boundary.indices[b],
                boundary.indices[c],
            ));
            mesh.face_data.push_zero_tuple();
            added += 1;
        }
    }

    tracing::debug!(faces = added, "capped clip boundaries");
    added
}
