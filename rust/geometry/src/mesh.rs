// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Surface mesh data structures
//!
//! A [`Mesh`] is a list of points plus a list of faces indexing into it.
//! Per-point and per-face attribute arrays ride along opaquely and are
//! carried through every operation in this crate.

use crate::error::{Error, Result};
use crate::triangulation::triangulate_face;
use nalgebra::{Matrix4, Point3, Vector3};
use smallvec::SmallVec;

/// Vertex indices of one face
pub type FaceIndices = SmallVec<[u32; 4]>;

/// Name of the per-point array treated as surface normals by transforms
pub const NORMALS: &str = "Normals";

/// Cell type of a face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceKind {
    /// One or more isolated points
    Vertex,
    /// Open polyline
    Line,
    /// Closed polygon
    Polygon,
    /// Triangle strip
    Strip,
}

/// A single face of a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub kind: FaceKind,
    pub indices: FaceIndices,
}

impl Face {
    pub fn new(kind: FaceKind, indices: impl IntoIterator<Item = u32>) -> Self {
        Self {
            kind,
            indices: indices.into_iter().collect(),
        }
    }

    #[inline]
    pub fn triangle(a: u32, b: u32, c: u32) -> Self {
        Self::new(FaceKind::Polygon, [a, b, c])
    }

    #[inline]
    pub fn polygon(indices: impl IntoIterator<Item = u32>) -> Self {
        Self::new(FaceKind::Polygon, indices)
    }

    #[inline]
    pub fn line(indices: impl IntoIterator<Item = u32>) -> Self {
        Self::new(FaceKind::Line, indices)
    }

    #[inline]
    pub fn vertex(index: u32) -> Self {
        Self::new(FaceKind::Vertex, [index])
    }

    #[inline]
    pub fn strip(indices: impl IntoIterator<Item = u32>) -> Self {
        Self::new(FaceKind::Strip, indices)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Polygon face with exactly three vertices
    #[inline]
    pub fn is_triangle(&self) -> bool {
        self.kind == FaceKind::Polygon && self.indices.len() == 3
    }

    /// Edges of a polygon face in winding order, closing edge included
    pub fn polygon_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let n = self.indices.len();
        (0..n).map(move |i| (self.indices[i], self.indices[(i + 1) % n]))
    }
}

/// A named attribute array with a fixed number of components per tuple
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeArray {
    pub name: String,
    pub components: usize,
    pub values: Vec<f64>,
}

impl AttributeArray {
    pub fn new(name: impl Into<String>, components: usize) -> Self {
        Self {
            name: name.into(),
            components: components.max(1),
            values: Vec::new(),
        }
    }

    pub fn from_values(name: impl Into<String>, components: usize, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            components: components.max(1),
            values,
        }
    }

    #[inline]
    pub fn tuple_count(&self) -> usize {
        self.values.len() / self.components
    }

    #[inline]
    pub fn tuple(&self, index: usize) -> &[f64] {
        let start = index * self.components;
        &self.values[start..start + self.components]
    }

    #[inline]
    pub fn push_tuple(&mut self, tuple: &[f64]) {
        debug_assert_eq!(tuple.len(), self.components);
        self.values.extend_from_slice(tuple);
    }

    #[inline]
    fn push_zero(&mut self) {
        self.values
            .extend(std::iter::repeat(0.0).take(self.components));
    }

    /// Push `a + t * (b - a)` taken from two tuples of `source`
    fn push_interpolated(&mut self, source: &AttributeArray, a: usize, b: usize, t: f64) {
        let ta = source.tuple(a);
        let tb = source.tuple(b);
        self.values
            .extend(ta.iter().zip(tb).map(|(va, vb)| va + t * (vb - va)));
    }

    fn empty_like(&self) -> Self {
        Self::new(self.name.clone(), self.components)
    }
}

/// Ordered collection of attribute arrays sharing one tuple count
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    arrays: Vec<AttributeArray>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeArray> {
        self.arrays.iter()
    }

    pub fn get(&self, name: &str) -> Option<&AttributeArray> {
        self.arrays.iter().find(|a| a.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut AttributeArray> {
        self.arrays.iter_mut().find(|a| a.name == name)
    }

    /// Insert an array, replacing any existing array with the same name
    pub fn insert(&mut self, array: AttributeArray) {
        match self.arrays.iter_mut().find(|a| a.name == array.name) {
            Some(existing) => *existing = array,
            None => self.arrays.push(array),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<AttributeArray> {
        let pos = self.arrays.iter().position(|a| a.name == name)?;
        Some(self.arrays.remove(pos))
    }

    /// Same arrays, no tuples
    pub fn empty_like(&self) -> Self {
        Self {
            arrays: self.arrays.iter().map(AttributeArray::empty_like).collect(),
        }
    }

    /// Copy tuple `index` of every array in `source`.
    ///
    /// `self` must have the layout of `source` (see [`AttributeSet::empty_like`]).
    pub fn copy_tuple(&mut self, source: &AttributeSet, index: usize) {
        for (dst, src) in self.arrays.iter_mut().zip(&source.arrays) {
            dst.push_tuple(src.tuple(index));
        }
    }

    /// Append the linear interpolation between tuples `a` and `b` of `source`
    pub fn interpolate_tuple(&mut self, source: &AttributeSet, a: usize, b: usize, t: f64) {
        for (dst, src) in self.arrays.iter_mut().zip(&source.arrays) {
            dst.push_interpolated(src, a, b, t);
        }
    }

    /// Append a zero tuple to every array
    pub fn push_zero_tuple(&mut self) {
        for array in &mut self.arrays {
            array.push_zero();
        }
    }

    /// Keep only arrays that `other` also has with the same component count
    pub fn retain_common(&mut self, other: &AttributeSet) {
        self.arrays.retain(|a| {
            other
                .get(&a.name)
                .is_some_and(|o| o.components == a.components)
        });
    }

    /// Append every tuple of the matching arrays in `other`
    fn extend_from(&mut self, other: &AttributeSet) {
        for array in &mut self.arrays {
            if let Some(src) = other.get(&array.name) {
                array.values.extend_from_slice(&src.values);
            }
        }
    }

    /// Check every array holds `count` tuples
    fn check_len(&self, count: usize, what: &str) -> Result<()> {
        for array in &self.arrays {
            if array.values.len() != count * array.components {
                return Err(Error::invalid(format!(
                    "{} array '{}' holds {} values, expected {}",
                    what,
                    array.name,
                    array.values.len(),
                    count * array.components
                )));
            }
        }
        Ok(())
    }
}

/// Surface mesh: points, faces and their attribute arrays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<Point3<f64>>,
    pub faces: Vec<Face>,
    pub point_data: AttributeSet,
    pub face_data: AttributeSet,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create mesh with capacity
    pub fn with_capacity(point_count: usize, face_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(point_count),
            faces: Vec::with_capacity(face_count),
            point_data: AttributeSet::new(),
            face_data: AttributeSet::new(),
        }
    }

    /// Triangle soup helper used by builders and tests
    pub fn from_triangles(positions: Vec<Point3<f64>>, triangles: &[[u32; 3]]) -> Self {
        let mut mesh = Self::with_capacity(positions.len(), triangles.len());
        mesh.positions = positions;
        for t in triangles {
            mesh.add_triangle(t[0], t[1], t[2]);
        }
        mesh
    }

    /// Mesh with the attribute layout of `self` but no points or faces
    pub fn empty_like(&self) -> Self {
        Self {
            positions: Vec::new(),
            faces: Vec::new(),
            point_data: self.point_data.empty_like(),
            face_data: self.face_data.empty_like(),
        }
    }

    /// Add a point and return its index
    #[inline]
    pub fn add_point(&mut self, position: Point3<f64>) -> u32 {
        self.positions.push(position);
        (self.positions.len() - 1) as u32
    }

    #[inline]
    pub fn add_face(&mut self, face: Face) {
        self.faces.push(face);
    }

    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.faces.push(Face::triangle(i0, i1, i2));
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Number of polygon faces
    pub fn polygon_count(&self) -> usize {
        self.faces
            .iter()
            .filter(|f| f.kind == FaceKind::Polygon)
            .count()
    }

    /// A mesh without points has nothing to operate on
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn clear(&mut self) {
        *self = self.empty_like();
    }

    /// Check face indices and attribute lengths
    pub fn validate(&self) -> Result<()> {
        let count = self.positions.len();
        for (face, f) in self.faces.iter().enumerate() {
            if let Some(&index) = f.indices.iter().find(|&&i| i as usize >= count) {
                return Err(Error::InvalidFaceIndex { face, index, count });
            }
        }
        self.point_data.check_len(count, "point")?;
        self.face_data.check_len(self.faces.len(), "face")
    }

    /// Axis-aligned bounds, `None` for an empty mesh
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.positions.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in &self.positions[1..] {
            min = min.inf(p);
            max = max.sup(p);
        }
        Some((min, max))
    }

    /// Length of the bounding box diagonal, 0 for an empty mesh
    pub fn diagonal_length(&self) -> f64 {
        self.bounds()
            .map(|(min, max)| (max - min).norm())
            .unwrap_or(0.0)
    }

    /// Average of all points
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.positions.is_empty() {
            return None;
        }
        let sum = self
            .positions
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Some(Point3::from(sum / self.positions.len() as f64))
    }

    /// Points of one face in face order
    pub fn face_points(&self, face: &Face) -> Vec<Point3<f64>> {
        face.indices
            .iter()
            .map(|&i| self.positions[i as usize])
            .collect()
    }

    /// Append another mesh. Attribute arrays survive only when both meshes
    /// carry them, unless `self` is still blank.
    pub fn merge(&mut self, other: &Mesh) {
        if self.positions.is_empty() && self.faces.is_empty() {
            self.point_data = other.point_data.empty_like();
            self.face_data = other.face_data.empty_like();
        } else {
            self.point_data.retain_common(&other.point_data);
            self.face_data.retain_common(&other.face_data);
        }

        let offset = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.faces.extend(other.faces.iter().map(|f| Face {
            kind: f.kind,
            indices: f.indices.iter().map(|&i| i + offset).collect(),
        }));
        self.point_data.extend_from(&other.point_data);
        self.face_data.extend_from(&other.face_data);
    }

    /// Batch merge
    pub fn merge_all(&mut self, meshes: &[&Mesh]) {
        let points: usize = meshes.iter().map(|m| m.positions.len()).sum();
        let faces: usize = meshes.iter().map(|m| m.faces.len()).sum();
        self.positions.reserve(points);
        self.faces.reserve(faces);
        for mesh in meshes {
            self.merge(mesh);
        }
    }

    /// Reverse the winding of every polygon and strip. Normals are untouched.
    pub fn reverse_faces(&mut self) {
        for face in &mut self.faces {
            match face.kind {
                FaceKind::Polygon | FaceKind::Line => face.indices.reverse(),
                FaceKind::Strip if face.indices.len() % 2 == 1 => face.indices.reverse(),
                // Even strips keep their triangles only with a leading repeat
                FaceKind::Strip if !face.indices.is_empty() => {
                    let first = face.indices[0];
                    face.indices.insert(0, first);
                }
                _ => {}
            }
        }
    }

    /// Apply an affine transform to every point. A 3-component `Normals`
    /// array is mapped through the inverse transpose of the linear part.
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        for p in &mut self.positions {
            *p = matrix.transform_point(p);
        }

        let linear = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let normal_matrix = linear
            .try_inverse()
            .map(|inv| inv.transpose())
            .unwrap_or(linear);
        if let Some(normals) = self.point_data.get_mut(NORMALS) {
            if normals.components == 3 {
                for n in normals.values.chunks_exact_mut(3) {
                    let v = normal_matrix * Vector3::new(n[0], n[1], n[2]);
                    let v = v.try_normalize(f64::EPSILON).unwrap_or(v);
                    n.copy_from_slice(v.as_slice());
                }
            }
        }
    }

    /// Drop points no face references, remapping face indices
    pub fn compact(&self) -> Mesh {
        const UNUSED: u32 = u32::MAX;
        let mut remap = vec![UNUSED; self.positions.len()];
        let mut out = self.empty_like();
        out.faces.reserve(self.faces.len());

        for face in &self.faces {
            let indices: FaceIndices = face
                .indices
                .iter()
                .map(|&i| {
                    let slot = &mut remap[i as usize];
                    if *slot == UNUSED {
                        *slot = out.add_point(self.positions[i as usize]);
                        out.point_data.copy_tuple(&self.point_data, i as usize);
                    }
                    *slot
                })
                .collect();
            out.faces.push(Face {
                kind: face.kind,
                indices,
            });
        }
        out.face_data = self.face_data.clone();
        out
    }

    /// Keep only the listed faces, sharing the point array unchanged
    pub fn select_faces(&self, faces: impl IntoIterator<Item = usize>) -> Mesh {
        let mut out = Mesh {
            positions: self.positions.clone(),
            faces: Vec::new(),
            point_data: self.point_data.clone(),
            face_data: self.face_data.empty_like(),
        };
        for index in faces {
            out.faces.push(self.faces[index].clone());
            out.face_data.copy_tuple(&self.face_data, index);
        }
        out
    }

    /// Convert polygons and strips to triangles. Vertices and lines are kept.
    /// Face attributes are replicated onto every generated triangle.
    pub fn triangulate(&self) -> Mesh {
        if self
            .faces
            .iter()
            .all(|f| f.kind != FaceKind::Strip && (f.kind != FaceKind::Polygon || f.len() <= 3))
        {
            return self.clone();
        }

        let mut out = Mesh {
            positions: self.positions.clone(),
            faces: Vec::with_capacity(self.faces.len() * 2),
            point_data: self.point_data.clone(),
            face_data: self.face_data.empty_like(),
        };

        for (index, face) in self.faces.iter().enumerate() {
            match face.kind {
                FaceKind::Polygon if face.len() > 3 => {
                    let points = self.face_points(face);
                    for [a, b, c] in triangulate_face(&points) {
                        out.add_triangle(face.indices[a], face.indices[b], face.indices[c]);
                        out.face_data.copy_tuple(&self.face_data, index);
                    }
                }
                FaceKind::Strip => {
                    for i in 0..face.len().saturating_sub(2) {
                        let (a, b) = if i % 2 == 0 { (i, i + 1) } else { (i + 1, i) };
                        let (a, b, c) = (face.indices[a], face.indices[b], face.indices[i + 2]);
                        if a == b || b == c || a == c {
                            continue;
                        }
                        out.add_triangle(a, b, c);
                        out.face_data.copy_tuple(&self.face_data, index);
                    }
                }
                _ => {
                    out.faces.push(face.clone());
                    out.face_data.copy_tuple(&self.face_data, index);
                }
            }
        }
        out
    }
}
