// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Region selection by a loop drawn on a surface
//!
//! The curve is snapped onto mesh vertices and closed into an edge loop
//! with shortest paths over the mesh edge graph. Open curves are closed
//! around the outer side of their best-fit plane. The loop splits the
//! surface into regions; the smallest one is turned into a signed scalar
//! field (negative inside, zero on the loop) which is clipped inside-out
//! at zero. The largest connected piece of that clip is the selection.

use crate::clip::{clip_with_scalars, ClipOptions};
use crate::connectivity::extract_largest_region;
use crate::error::{Error, Result};
use crate::locator::{LocatorOptions, PointLocator};
use crate::mesh::{FaceKind, Mesh};
use nalgebra::{Matrix3, Point3, Vector3};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

/// Loop selection settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSelectOptions {
    /// Snap only the curve's own points. Otherwise the curve is resampled
    /// at the mesh's mean edge length first so the loop hugs its shape.
    pub straight: bool,
    /// Whether the curve's last point joins back to its first
    pub closed: bool,
    pub locator: LocatorOptions,
}

impl Default for LoopSelectOptions {
    fn default() -> Self {
        Self {
            straight: false,
            closed: true,
            locator: LocatorOptions::default(),
        }
    }
}

#[inline]
fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Undirected mesh edges weighted by length
struct EdgeGraph {
    neighbors: Vec<SmallVec<[(u32, f64); 8]>>,
}

impl EdgeGraph {
    fn new(mesh: &Mesh) -> Self {
        let mut neighbors: Vec<SmallVec<[(u32, f64); 8]>> =
            vec![SmallVec::new(); mesh.point_count()];
        let mut seen: FxHashSet<(u32, u32)> = FxHashSet::default();
        for face in &mesh.faces {
            for (a, b) in face.polygon_edges() {
                if a == b || !seen.insert(edge_key(a, b)) {
                    continue;
                }
                let weight = (mesh.positions[a as usize] - mesh.positions[b as usize]).norm();
                neighbors[a as usize].push((b, weight));
                neighbors[b as usize].push((a, weight));
            }
        }
        Self { neighbors }
    }

    fn is_adjacent(&self, a: u32, b: u32) -> bool {
        self.neighbors[a as usize].iter().any(|&(n, _)| n == b)
    }

    fn mean_edge_length(&self) -> f64 {
        let (sum, count) = self
            .neighbors
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(s, c), &(_, w)| (s + w, c + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    /// Dijkstra from `source` to `target`, both ends included
    fn shortest_path(&self, source: u32, target: u32) -> Option<Vec<u32>> {
        let n = self.neighbors.len();
        let mut dist = vec![f64::INFINITY; n];
        let mut prev: Vec<Option<u32>> = vec![None; n];
        let mut heap = BinaryHeap::new();

        dist[source as usize] = 0.0;
        heap.push(DijkstraState {
            cost: 0.0,
            node: source,
        });

        while let Some(DijkstraState { cost, node }) = heap.pop() {
            if node == target {
                break;
            }
            if cost > dist[node as usize] {
                continue;
            }
            for &(neighbor, weight) in &self.neighbors[node as usize] {
                let next_cost = cost + weight;
                if next_cost < dist[neighbor as usize] {
                    dist[neighbor as usize] = next_cost;
                    prev[neighbor as usize] = Some(node);
                    heap.push(DijkstraState {
                        cost: next_cost,
                        node: neighbor,
                    });
                }
            }
        }

        if dist[target as usize].is_infinite() {
            return None;
        }
        let mut path = vec![target];
        let mut current = target;
        while let Some(p) = prev[current as usize] {
            path.push(p);
            current = p;
        }
        path.reverse();
        Some(path)
    }
}

/// Min-heap entry for Dijkstra
#[derive(Debug, Clone, PartialEq)]
struct DijkstraState {
    cost: f64,
    node: u32,
}

impl Eq for DijkstraState {}

impl PartialOrd for DijkstraState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DijkstraState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}

/// Resample a curve so no step exceeds `spacing`
fn resample(curve: &[Point3<f64>], spacing: f64, closed: bool) -> Vec<Point3<f64>> {
    if spacing <= 0.0 || curve.len() < 2 {
        return curve.to_vec();
    }
    let segments = if closed { curve.len() } else { curve.len() - 1 };
    let mut samples = Vec::with_capacity(curve.len());
    for i in 0..segments {
        let (a, b) = (curve[i], curve[(i + 1) % curve.len()]);
        let steps = ((b - a).norm() / spacing).ceil().max(1.0) as usize;
        samples.extend((0..steps).map(|s| a + (b - a) * (s as f64 / steps as f64)));
    }
    if !closed {
        samples.push(curve[curve.len() - 1]);
    }
    samples
}

/// Least-squares plane through `points`: their centroid and the
/// eigenvector of the smallest covariance eigenvalue
fn fit_plane(points: &[Point3<f64>]) -> Option<(Point3<f64>, Vector3<f64>)> {
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords);
    let centroid = Point3::from(sum / points.len() as f64);
    let covariance = points.iter().fold(Matrix3::zeros(), |acc, p| {
        let d = p - centroid;
        acc + d * d.transpose()
    });
    let eigen = covariance.symmetric_eigen();
    let normal: Vector3<f64> = eigen.eigenvectors.column(eigen.eigenvalues.imin()).into_owned();
    normal.try_normalize(f64::EPSILON).map(|n| (centroid, n))
}

/// Vertices closing an open curve: the ones nearest its two ends pushed a
/// bounding diagonal along the fitted plane normal, oriented away from the
/// centre of the surface. Returned as `(first, last)`.
fn outer_anchors(
    surface: &Mesh,
    locator: &PointLocator,
    curve: &[Point3<f64>],
) -> Option<(u32, u32)> {
    let (origin, mut normal) = fit_plane(curve)?;
    let (min, max) = surface.bounds()?;
    let centre = nalgebra::center(&min, &max);
    if normal.dot(&(centre - origin)) > 0.0 {
        normal = -normal;
    }
    let reach = normal * surface.diagonal_length();
    let first = locator.find_closest_point(&(curve[0] + reach))?;
    let last = locator.find_closest_point(&(curve[curve.len() - 1] + reach))?;
    Some((first as u32, last as u32))
}

/// Snap curve points to mesh vertices, dropping repeats
fn snap_to_vertices(locator: &PointLocator, samples: &[Point3<f64>]) -> Vec<u32> {
    let mut snapped: Vec<u32> = Vec::with_capacity(samples.len());
    for p in samples {
        if let Some(i) = locator.find_closest_point(p) {
            let i = i as u32;
            if snapped.last() != Some(&i) {
                snapped.push(i);
            }
        }
    }
    while snapped.len() > 1 && snapped.first() == snapped.last() {
        snapped.pop();
    }
    snapped
}

/// Label faces by flooding across edges that are not on the loop
fn label_sides(mesh: &Mesh, loop_edges: &FxHashSet<(u32, u32)>) -> (Vec<usize>, usize) {
    let mut edge_faces: FxHashMap<(u32, u32), SmallVec<[usize; 2]>> = FxHashMap::default();
    for (f, face) in mesh.faces.iter().enumerate() {
        for (a, b) in face.polygon_edges() {
            edge_faces.entry(edge_key(a, b)).or_default().push(f);
        }
    }

    const UNVISITED: usize = usize::MAX;
    let mut region = vec![UNVISITED; mesh.face_count()];
    let mut count = 0;
    let mut queue = VecDeque::new();
    for start in 0..mesh.face_count() {
        if region[start] != UNVISITED {
            continue;
        }
        region[start] = count;
        queue.push_back(start);
        while let Some(f) = queue.pop_front() {
            for (a, b) in mesh.faces[f].polygon_edges() {
                let key = edge_key(a, b);
                if loop_edges.contains(&key) {
                    continue;
                }
                for &g in &edge_faces[&key] {
                    if region[g] == UNVISITED {
                        region[g] = count;
                        queue.push_back(g);
                    }
                }
            }
        }
        count += 1;
    }
    (region, count)
}

/// Select the smallest surface region enclosed by `curve`.
///
/// Closed curves join their last point back to the first. Open curves run
/// from their last point to the vertices a bounding diagonal beyond both
/// ends, along the normal of the curve's best-fit plane, and back to the
/// first. The normal is oriented away from the surface centre, so the loop
/// passes round the outer side. Only polygonal faces take part.
///
/// An empty mesh or a loop that snaps to fewer than three vertices is
/// reported as empty input. A loop crossing disconnected parts of the
/// surface or not splitting it into two regions is invalid.
pub fn select_loop_region(
    mesh: &Mesh,
    curve: &[Point3<f64>],
    options: &LoopSelectOptions,
) -> Result<Mesh> {
    if mesh.is_empty() {
        return Err(Error::empty("loop selection input"));
    }
    let needed = if options.closed { 3 } else { 2 };
    if curve.len() < needed {
        return Err(Error::degenerate(format!(
            "selection curve needs at least {needed} points, got {}",
            curve.len()
        )));
    }
    mesh.validate()?;

    let triangles = mesh.triangulate();
    let polygons = triangles
        .faces
        .iter()
        .enumerate()
        .filter(|(_, f)| f.kind == FaceKind::Polygon)
        .map(|(i, _)| i);
    let surface = triangles.select_faces(polygons).compact();
    if surface.faces.is_empty() {
        return Err(Error::empty("no polygons to select from"));
    }

    let graph = EdgeGraph::new(&surface);
    let mut locator = PointLocator::new(options.locator);
    locator.build(&surface.positions);

    let samples = if options.straight {
        curve.to_vec()
    } else {
        resample(curve, graph.mean_edge_length(), options.closed)
    };
    let mut snapped = snap_to_vertices(&locator, &samples);
    if !options.closed {
        let (first, last) = outer_anchors(&surface, &locator, curve)
            .ok_or_else(|| Error::degenerate("open selection curve has no fitting plane"))?;
        for anchor in [last, first] {
            if snapped.last() != Some(&anchor) {
                snapped.push(anchor);
            }
        }
        while snapped.len() > 1 && snapped.first() == snapped.last() {
            snapped.pop();
        }
    }
    if snapped.len() < 3 {
        return Err(Error::degenerate(
            "selection loop collapses onto fewer than 3 vertices",
        ));
    }

    let mut loop_edges: FxHashSet<(u32, u32)> = FxHashSet::default();
    let mut loop_points: Vec<u32> = Vec::new();
    for (i, &a) in snapped.iter().enumerate() {
        let b = snapped[(i + 1) % snapped.len()];
        let path = if graph.is_adjacent(a, b) {
            vec![a, b]
        } else {
            graph.shortest_path(a, b).ok_or_else(|| {
                Error::invalid("selection loop spans disconnected parts of the surface")
            })?
        };
        for pair in path.windows(2) {
            loop_edges.insert(edge_key(pair[0], pair[1]));
        }
        loop_points.extend_from_slice(&path[..path.len() - 1]);
    }

    let (face_region, region_count) = label_sides(&surface, &loop_edges);
    if region_count < 2 {
        return Err(Error::invalid("selection loop does not enclose a region"));
    }
    let mut sizes = vec![0usize; region_count];
    for &r in &face_region {
        sizes[r] += 1;
    }
    let smallest = sizes
        .iter()
        .enumerate()
        .min_by(|(ia, a), (ib, b)| a.cmp(b).then(ia.cmp(ib)))
        .map(|(r, _)| r)
        .unwrap_or(0);

    let mut on_loop = vec![false; surface.point_count()];
    for &i in &loop_points {
        on_loop[i as usize] = true;
    }
    let mut inside = vec![false; surface.point_count()];
    for (f, face) in surface.faces.iter().enumerate() {
        if face_region[f] == smallest {
            for &i in &face.indices {
                inside[i as usize] = true;
            }
        }
    }

    let loop_positions: Vec<Point3<f64>> = loop_points
        .iter()
        .map(|&i| surface.positions[i as usize])
        .collect();
    let mut loop_locator = PointLocator::new(options.locator);
    loop_locator.build(&loop_positions);

    let scalars: Vec<f64> = surface
        .positions
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if on_loop[i] {
                return 0.0;
            }
            let d = loop_locator
                .find_closest_point(p)
                .map_or(f64::EPSILON, |c| (p - loop_positions[c]).norm())
                .max(f64::EPSILON);
            if inside[i] {
                -d
            } else {
                d
            }
        })
        .collect();

    tracing::debug!(
        loop_vertices = loop_points.len(),
        regions = region_count,
        selected_faces = sizes[smallest],
        "selected loop region"
    );

    let clipped = clip_with_scalars(
        &surface,
        &scalars,
        &ClipOptions {
            value: 0.0,
            inside_out: true,
            generate_clipped_output: false,
        },
    )?;
    Ok(extract_largest_region(&clipped.kept))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{disc, disc_ring, uv_sphere};

    fn ring_curve(mesh: &Mesh, ring: usize, segments: usize) -> Vec<Point3<f64>> {
        disc_ring(ring, segments)
            .into_iter()
            .map(|i| mesh.positions[i as usize] + nalgebra::Vector3::new(0.0, 0.0, 0.01))
            .collect()
    }

    #[test]
    fn test_selects_inside_of_ring() {
        let mesh = disc(Point3::origin(), 4.0, 4, 16);
        let curve = ring_curve(&mesh, 2, 16);
        for straight in [true, false] {
            let selected = select_loop_region(
                &mesh,
                &curve,
                &LoopSelectOptions {
                    straight,
                    ..Default::default()
                },
            )
            .unwrap();
            assert_eq!(selected.face_count(), 16 + 2 * 16);
            assert!(selected.positions.iter().all(|p| p.coords.norm() <= 2.0 + 1e-9));
        }
    }

    #[test]
    fn test_sparse_curve_is_closed_along_edges() {
        let mesh = disc(Point3::origin(), 4.0, 4, 16);
        let ring = disc_ring(2, 16);
        let curve: Vec<Point3<f64>> = [0, 4, 8, 12]
            .iter()
            .map(|&j| mesh.positions[ring[j] as usize])
            .collect();
        let selected = select_loop_region(
            &mesh,
            &curve,
            &LoopSelectOptions {
                straight: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(selected.face_count() > 0);
        assert!(selected.positions.iter().any(|p| p.coords.norm() < 1e-9));
        assert!(selected.positions.iter().all(|p| p.coords.norm() <= 2.0 + 1e-9));
    }

    #[test]
    fn test_rejects_degenerate_curves() {
        let mesh = disc(Point3::origin(), 4.0, 4, 16);
        let options = LoopSelectOptions::default();

        let short = [Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        assert!(matches!(
            select_loop_region(&mesh, &short, &options),
            Err(Error::Degenerate(_))
        ));

        let collapsed = [Point3::new(0.01, 0.0, 0.0); 4];
        let err = select_loop_region(&mesh, &collapsed, &options).unwrap_err();
        assert!(matches!(err, Error::Degenerate(_)));
        assert!(err.is_empty_input());

        let err = select_loop_region(&Mesh::new(), &short, &options).unwrap_err();
        assert!(err.is_empty_input());

        let open = LoopSelectOptions {
            closed: false,
            ..Default::default()
        };
        let err = select_loop_region(&mesh, &short[..1], &open).unwrap_err();
        assert!(err.is_empty_input());
    }

    #[test]
    fn test_open_arc_closes_round_the_outer_side() {
        // Quarter of the 60 degree latitude ring, from theta 0 to 90
        let (stacks, slices) = (12, 16);
        let mesh = uv_sphere(Point3::origin(), 1.0, stacks, slices);
        let ring = |i: usize, j: usize| mesh.positions[1 + (i - 1) * slices + j];
        let arc: Vec<Point3<f64>> = (0..=4).map(|j| ring(4, j)).collect();

        // The fitted plane is z = 0.5 and its outer side points to +z, so
        // the loop climbs both meridians and crosses the first ring
        let selected = select_loop_region(
            &mesh,
            &arc,
            &LoopSelectOptions {
                straight: true,
                closed: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(selected.face_count(), 3 * 4 * 2);
        let top = ring(1, 0).z;
        assert!(selected.positions.iter().all(|p| {
            p.x >= -1e-9 && p.y >= -1e-9 && p.z >= 0.5 - 1e-9 && p.z <= top + 1e-9
        }));
        assert!(selected.positions.iter().any(|p| (p.z - top).abs() < 1e-9));
    }

    #[test]
    fn test_open_resampling_does_not_wrap() {
        let curve = [Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        let open = resample(&curve, 0.25, false);
        assert_eq!(open.len(), 5);
        assert_eq!(open[4], curve[1]);
        assert_eq!(resample(&curve, 0.25, true).len(), 8);
    }
}
