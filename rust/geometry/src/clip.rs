// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scalar-field clipping of surface meshes
//!
//! Every point gets a scalar, either supplied directly or sampled from an
//! [`ImplicitFunction`]. Faces entirely on the kept side are copied, faces
//! straddling the iso-value are split with Sutherland-Hodgman, and the
//! intersection points are shared between neighbouring faces through a
//! per-edge cache so the output stays connected.

use crate::error::{Error, Result};
use crate::implicit::ImplicitFunction;
use crate::mesh::{Face, FaceKind, Mesh};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Point count at which scalar fields are sampled on the rayon pool
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

/// Clip configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipOptions {
    /// Iso-value separating the two sides
    pub value: f64,
    /// Keep `s < value` instead of `s > value`
    pub inside_out: bool,
    /// Also build the complementary piece
    pub generate_clipped_output: bool,
}

impl Default for ClipOptions {
    fn default() -> Self {
        Self {
            value: 0.0,
            inside_out: false,
            generate_clipped_output: false,
        }
    }
}

/// Result of a clip
#[derive(Debug, Clone, Default)]
pub struct ClipOutput {
    /// Faces on the kept side
    pub kept: Mesh,
    /// Complement, when requested
    pub clipped: Option<Mesh>,
}

/// Sample `function` at every point of `mesh`
pub fn evaluate_scalars(
    mesh: &Mesh,
    function: &dyn ImplicitFunction,
    parallel_threshold: usize,
) -> Vec<f64> {
    if mesh.positions.len() >= parallel_threshold {
        mesh.positions
            .par_iter()
            .map(|p| function.evaluate(p))
            .collect()
    } else {
        mesh.positions.iter().map(|p| function.evaluate(p)).collect()
    }
}

/// Clip against an implicit function
pub fn clip_mesh(
    mesh: &Mesh,
    function: &dyn ImplicitFunction,
    options: &ClipOptions,
    parallel_threshold: usize,
) -> Result<ClipOutput> {
    let scalars = evaluate_scalars(mesh, function, parallel_threshold);
    clip_with_scalars(mesh, &scalars, options)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Kept,
    On,
    Removed,
}

impl Side {
    #[inline]
    fn opposite(self) -> Side {
        match self {
            Side::Kept => Side::Removed,
            Side::Removed => Side::Kept,
            Side::On => Side::On,
        }
    }
}

#[inline]
fn crosses(a: Side, b: Side) -> bool {
    matches!((a, b), (Side::Kept, Side::Removed) | (Side::Removed, Side::Kept))
}

/// Output mesh under construction for one side of the clip
struct Piece<'a> {
    source: &'a Mesh,
    scalars: &'a [f64],
    value: f64,
    mesh: Mesh,
    vertex_map: Vec<u32>,
    edge_map: FxHashMap<(u32, u32), u32>,
}

impl<'a> Piece<'a> {
    const UNMAPPED: u32 = u32::MAX;

    fn new(source: &'a Mesh, scalars: &'a [f64], value: f64) -> Self {
        Self {
            source,
            scalars,
            value,
            mesh: source.empty_like(),
            vertex_map: vec![Self::UNMAPPED; source.positions.len()],
            edge_map: FxHashMap::default(),
        }
    }

    fn vertex(&mut self, i: u32) -> u32 {
        let slot = self.vertex_map[i as usize];
        if slot != Self::UNMAPPED {
            return slot;
        }
        let index = self.mesh.add_point(self.source.positions[i as usize]);
        self.mesh
            .point_data
            .copy_tuple(&self.source.point_data, i as usize);
        self.vertex_map[i as usize] = index;
        index
    }

    /// Iso-value crossing on edge `a`-`b`, created once per edge
    fn edge(&mut self, a: u32, b: u32) -> u32 {
        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(&index) = self.edge_map.get(&key) {
            return index;
        }
        let (lo, hi) = (key.0 as usize, key.1 as usize);
        let (s_lo, s_hi) = (self.scalars[lo], self.scalars[hi]);
        let t = (self.value - s_lo) / (s_hi - s_lo);
        let p_lo = self.source.positions[lo];
        let p_hi = self.source.positions[hi];
        let index = self.mesh.add_point(p_lo + (p_hi - p_lo) * t);
        self.mesh
            .point_data
            .interpolate_tuple(&self.source.point_data, lo, hi, t);
        self.edge_map.insert(key, index);
        index
    }

    fn push_face(&mut self, face: Face, source_face: usize) {
        self.mesh.faces.push(face);
        self.mesh
            .face_data
            .copy_tuple(&self.source.face_data, source_face);
    }

    fn copy_face(&mut self, kind: FaceKind, corners: &[u32], source_face: usize) {
        let indices: SmallVec<[u32; 4]> = corners.iter().map(|&i| self.vertex(i)).collect();
        self.push_face(Face { kind, indices }, source_face);
    }

    /// Sutherland-Hodgman pass keeping `target` and on-value corners
    fn clip_chain(
        &mut self,
        corners: &[u32],
        sides: &[Side],
        target: Side,
        closed: bool,
        source_face: usize,
    ) {
        let n = corners.len();
        let edges = if closed { n } else { n - 1 };
        let mut out: SmallVec<[u32; 8]> = SmallVec::new();
        for i in 0..n {
            if sides[i] != target.opposite() {
                out.push(self.vertex(corners[i]));
            }
            if i < edges {
                let j = (i + 1) % n;
                if crosses(sides[i], sides[j]) {
                    out.push(self.edge(corners[i], corners[j]));
                }
            }
        }

        if closed {
            // The clipped part of a triangle is convex, a fan is exact
            for k in 1..out.len().saturating_sub(1) {
                self.push_face(Face::triangle(out[0], out[k], out[k + 1]), source_face);
            }
        } else if out.len() >= 2 {
            self.push_face(Face::line(out), source_face);
        }
    }
}

/// Clip with a precomputed scalar per point.
///
/// A point is kept when `s > value` (`s < value` with `inside_out`) and is
/// "on" the cut when `s == value`. Faces with no removed corner are copied
/// whole, including faces lying entirely on the cut. Polygons and strips
/// come out as triangles, polylines as two-point segments.
pub fn clip_with_scalars(mesh: &Mesh, scalars: &[f64], options: &ClipOptions) -> Result<ClipOutput> {
    if scalars.len() != mesh.point_count() {
        return Err(Error::invalid(format!(
            "{} scalars for {} points",
            scalars.len(),
            mesh.point_count()
        )));
    }
    mesh.validate()?;

    let source = mesh.triangulate();
    let side = |s: f64| {
        if s == options.value {
            Side::On
        } else if (s > options.value) != options.inside_out {
            Side::Kept
        } else {
            Side::Removed
        }
    };
    let sides: Vec<Side> = scalars.iter().map(|&s| side(s)).collect();

    let mut kept = Piece::new(&source, scalars, options.value);
    let mut clipped = options
        .generate_clipped_output
        .then(|| Piece::new(&source, scalars, options.value));
    let mut split = 0usize;

    for (index, face) in source.faces.iter().enumerate() {
        match face.kind {
            FaceKind::Vertex => {
                let (inside, outside): (SmallVec<[u32; 4]>, SmallVec<[u32; 4]>) = face
                    .indices
                    .iter()
                    .copied()
                    .partition(|&i| sides[i as usize] != Side::Removed);
                if !inside.is_empty() {
                    kept.copy_face(FaceKind::Vertex, &inside, index);
                }
                if let (Some(c), false) = (clipped.as_mut(), outside.is_empty()) {
                    c.copy_face(FaceKind::Vertex, &outside, index);
                }
            }
            FaceKind::Line => {
                for segment in face.indices.windows(2) {
                    split += clip_cell(segment, &sides, false, index, &mut kept, clipped.as_mut());
                }
            }
            FaceKind::Polygon | FaceKind::Strip => {
                if face.len() >= 3 {
                    split +=
                        clip_cell(&face.indices, &sides, true, index, &mut kept, clipped.as_mut());
                }
            }
        }
    }

    tracing::debug!(
        input_faces = source.face_count(),
        kept_faces = kept.mesh.face_count(),
        clipped_faces = clipped.as_ref().map(|c| c.mesh.face_count()),
        split_faces = split,
        "clipped mesh"
    );

    Ok(ClipOutput {
        kept: kept.mesh,
        clipped: clipped.map(|c| c.mesh),
    })
}

/// Route one cell to the pieces; returns 1 when it had to be split
fn clip_cell(
    corners: &[u32],
    sides: &[Side],
    closed: bool,
    source_face: usize,
    kept: &mut Piece<'_>,
    clipped: Option<&mut Piece<'_>>,
) -> usize {
    let kind = if closed { FaceKind::Polygon } else { FaceKind::Line };
    let corner_sides: SmallVec<[Side; 4]> = corners.iter().map(|&i| sides[i as usize]).collect();
    let removed = corner_sides.iter().filter(|&&s| s == Side::Removed).count();
    let inside = corner_sides.iter().filter(|&&s| s == Side::Kept).count();

    if removed == 0 {
        kept.copy_face(kind, corners, source_face);
        0
    } else if inside == 0 {
        if let Some(c) = clipped {
            c.copy_face(kind, corners, source_face);
        }
        0
    } else {
        kept.clip_chain(corners, &corner_sides, Side::Kept, closed, source_face);
        if let Some(c) = clipped {
            c.clip_chain(corners, &corner_sides, Side::Removed, closed, source_face);
        }
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::implicit::Plane;
    use crate::mesh::AttributeArray;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    /// Unit square in the XY plane split into two triangles
    fn square() -> Mesh {
        Mesh::from_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            &[[0, 1, 2], [0, 2, 3]],
        )
    }

    fn area(mesh: &Mesh) -> f64 {
        mesh.faces
            .iter()
            .filter(|f| f.is_triangle())
            .map(|f| {
                let p = mesh.face_points(f);
                (p[1] - p[0]).cross(&(p[2] - p[0])).norm() * 0.5
            })
            .sum()
    }

    #[test]
    fn test_scalar_count_mismatch_is_rejected() {
        let result = clip_with_scalars(&square(), &[0.0; 3], &ClipOptions::default());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_clip_halves_square() {
        let mesh = square();
        let plane = Plane::new(Point3::new(0.5, 0.0, 0.0), Vector3::x()).unwrap();
        let options = ClipOptions {
            generate_clipped_output: true,
            ..ClipOptions::default()
        };
        let out = clip_mesh(&mesh, &plane, &options, DEFAULT_PARALLEL_THRESHOLD).unwrap();
        let clipped = out.clipped.unwrap();

        assert_relative_eq!(area(&out.kept), 0.5, epsilon = 1e-12);
        assert_relative_eq!(area(&clipped), 0.5, epsilon = 1e-12);
        assert!(out.kept.positions.iter().all(|p| p.x >= 0.5 - 1e-12));
        assert!(clipped.positions.iter().all(|p| p.x <= 0.5 + 1e-12));
        out.kept.validate().unwrap();
        clipped.validate().unwrap();
    }

    #[test]
    fn test_shared_edges_reuse_intersection_points() {
        let mesh = square();
        // The diagonal 0-2 is crossed by both triangles
        let scalars = [-1.0, 0.5, 1.0, 0.5];
        let out = clip_with_scalars(&mesh, &scalars, &ClipOptions::default()).unwrap();
        // 3 original points above zero plus crossings on edges 0-1, 0-2, 0-3
        assert_eq!(out.kept.point_count(), 6);
    }

    #[test]
    fn test_inside_out_keeps_low_side() {
        let mesh = square();
        let scalars = [0.0, 1.0, 2.0, 1.0];
        let options = ClipOptions {
            value: 1.5,
            inside_out: true,
            generate_clipped_output: false,
        };
        let out = clip_with_scalars(&mesh, &scalars, &options).unwrap();
        assert!(out.clipped.is_none());
        assert!(out.kept.positions.iter().all(|p| p.x + p.y <= 1.5 + 1e-12));
        assert_relative_eq!(area(&out.kept), 1.0 - 0.125, epsilon = 1e-12);
    }

    #[test]
    fn test_faces_on_the_cut_stay_kept() {
        let mesh = square();
        let out = clip_with_scalars(&mesh, &[0.0; 4], &ClipOptions::default()).unwrap();
        assert_eq!(out.kept.face_count(), 2);
    }

    #[test]
    fn test_attributes_are_interpolated_and_copied() {
        let mut mesh = square();
        mesh.point_data
            .insert(AttributeArray::from_values("t", 1, vec![0.0, 10.0, 10.0, 0.0]));
        mesh.face_data
            .insert(AttributeArray::from_values("id", 1, vec![1.0, 2.0]));
        let plane = Plane::new(Point3::new(0.5, 0.0, 0.0), Vector3::x()).unwrap();
        let out = clip_mesh(&mesh, &plane, &ClipOptions::default(), usize::MAX).unwrap();

        let t = out.kept.point_data.get("t").unwrap();
        for (i, p) in out.kept.positions.iter().enumerate() {
            assert_relative_eq!(t.tuple(i)[0], p.x * 10.0, epsilon = 1e-9);
        }
        let ids = &out.kept.face_data.get("id").unwrap().values;
        assert_eq!(ids.len(), out.kept.face_count());
        assert!(ids.iter().all(|&id| id == 1.0 || id == 2.0));
        out.kept.validate().unwrap();
    }

    #[test]
    fn test_lines_are_clipped_into_segments() {
        let mut mesh = Mesh::new();
        for x in [0.0, 1.0, 2.0] {
            mesh.add_point(Point3::new(x, 0.0, 0.0));
        }
        mesh.add_face(Face::line([0, 1, 2]));
        let out = clip_with_scalars(&mesh, &[0.0, 1.0, 2.0], &ClipOptions {
            value: 1.5,
            ..ClipOptions::default()
        })
        .unwrap();
        assert_eq!(out.kept.face_count(), 1);
        assert_relative_eq!(out.kept.positions[0].x, 1.5);
    }

    #[test]
    fn test_parallel_and_serial_sampling_agree() {
        let mesh = square();
        let plane = Plane::new(Point3::new(0.3, 0.3, 0.0), Vector3::new(1.0, 1.0, 0.0)).unwrap();
        assert_eq!(
            evaluate_scalars(&mesh, &plane, 0),
            evaluate_scalars(&mesh, &plane, usize::MAX)
        );
    }
}
