// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Implicit functions used as clip and membership tests
//!
//! The convention throughout is that `f(x) >= 0` is inside. Planes are
//! inside on the side their normal points to, booleans combine insides
//! and the distance functions grow away from their reference points.

use crate::error::{Error, Result};
use crate::locator::{LocatorOptions, PointLocator};
use crate::mesh::Mesh;
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

/// Scalar field over 3D space
pub trait ImplicitFunction: Send + Sync {
    fn evaluate(&self, x: &Point3<f64>) -> f64;

    /// Gradient of the field at `x`, `None` where the function does not
    /// provide one
    fn gradient(&self, x: &Point3<f64>) -> Option<Vector3<f64>>;
}

/// Plane definition for clipping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Point on the plane
    pub origin: Point3<f64>,
    /// Unit normal
    pub normal: Vector3<f64>,
}

impl Plane {
    /// Create a plane, normalizing `normal`
    pub fn new(origin: Point3<f64>, normal: Vector3<f64>) -> Result<Self> {
        let normal = normal
            .try_normalize(f64::EPSILON)
            .ok_or(Error::DegeneratePlane)?;
        Ok(Self { origin, normal })
    }

    /// Calculate signed distance from point to plane
    /// Positive = in front, Negative = behind
    #[inline]
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        (point - self.origin).dot(&self.normal)
    }

    /// Half-space test
    #[inline]
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        self.signed_distance(point) >= 0.0
    }

    /// Reflection across this plane as an affine matrix:
    /// translate to the origin, apply `I - 2 n n^T`, translate back
    pub fn reflection_matrix(&self) -> Matrix4<f64> {
        let householder = Matrix3::identity() - 2.0 * self.normal * self.normal.transpose();
        Matrix4::new_translation(&self.origin.coords)
            * householder.to_homogeneous()
            * Matrix4::new_translation(&-self.origin.coords)
    }
}

impl ImplicitFunction for Plane {
    #[inline]
    fn evaluate(&self, x: &Point3<f64>) -> f64 {
        self.signed_distance(x)
    }

    #[inline]
    fn gradient(&self, _x: &Point3<f64>) -> Option<Vector3<f64>> {
        Some(self.normal)
    }
}

/// How the members of an [`ImplicitBoolean`] combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BooleanOperation {
    /// Inside any member: `max(f_i)`
    #[default]
    Union,
    /// Inside every member: `min(f_i)`
    Intersection,
    /// Inside the first member and outside all others: `min(f_0, -f_1, ...)`
    Difference,
}

impl BooleanOperation {
    pub const ALL: [BooleanOperation; 3] = [
        BooleanOperation::Union,
        BooleanOperation::Intersection,
        BooleanOperation::Difference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BooleanOperation::Union => "Union",
            BooleanOperation::Intersection => "Intersection",
            BooleanOperation::Difference => "Difference",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

/// Combination of several implicit functions
pub struct ImplicitBoolean {
    operation: BooleanOperation,
    functions: Vec<Box<dyn ImplicitFunction>>,
}

impl ImplicitBoolean {
    pub fn new(operation: BooleanOperation) -> Self {
        Self {
            operation,
            functions: Vec::new(),
        }
    }

    /// Boolean over a set of planes
    pub fn from_planes(operation: BooleanOperation, planes: &[Plane]) -> Self {
        let mut combined = Self::new(operation);
        for plane in planes {
            combined.add(Box::new(*plane));
        }
        combined
    }

    pub fn add(&mut self, function: Box<dyn ImplicitFunction>) {
        self.functions.push(function);
    }

    #[inline]
    pub fn operation(&self) -> BooleanOperation {
        self.operation
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Index and sign of the member that decides the value at `x`
    fn active(&self, x: &Point3<f64>) -> Option<(usize, f64, f64)> {
        let mut best: Option<(usize, f64, f64)> = None;
        for (i, f) in self.functions.iter().enumerate() {
            let sign = match self.operation {
                BooleanOperation::Difference if i > 0 => -1.0,
                _ => 1.0,
            };
            let value = sign * f.evaluate(x);
            let better = match (self.operation, best) {
                (_, None) => true,
                (BooleanOperation::Union, Some((_, _, b))) => value > b,
                (_, Some((_, _, b))) => value < b,
            };
            if better {
                best = Some((i, sign, value));
            }
        }
        best
    }
}

impl ImplicitFunction for ImplicitBoolean {
    /// An empty boolean contains nothing
    fn evaluate(&self, x: &Point3<f64>) -> f64 {
        self.active(x).map_or(-f64::MAX, |(_, _, value)| value)
    }

    fn gradient(&self, x: &Point3<f64>) -> Option<Vector3<f64>> {
        let (index, sign, _) = self.active(x)?;
        self.functions[index].gradient(x).map(|g| g * sign)
    }
}

/// Squared distance to the nearest vertex of a reference mesh
///
/// Without a reference mesh every query returns the configured fallback
/// value and gradient.
#[derive(Debug, Clone)]
pub struct PointDistance {
    locator: PointLocator,
    no_value: f64,
    no_gradient: Vector3<f64>,
}

impl PointDistance {
    pub fn new(options: LocatorOptions) -> Self {
        Self {
            locator: PointLocator::new(options),
            no_value: 0.0,
            no_gradient: Vector3::z(),
        }
    }

    /// Bind a reference mesh. Rebuilds the locator and resets the fallback
    /// value to the mesh's bounding diagonal.
    pub fn set_input(&mut self, mesh: &Mesh) {
        self.locator.build(&mesh.positions);
        self.no_value = mesh.diagonal_length();
    }

    #[inline]
    pub fn has_input(&self) -> bool {
        !self.locator.is_empty()
    }

    #[inline]
    pub fn no_value(&self) -> f64 {
        self.no_value
    }

    pub fn set_no_value(&mut self, value: f64) {
        self.no_value = value;
    }

    #[inline]
    pub fn no_gradient(&self) -> Vector3<f64> {
        self.no_gradient
    }

    pub fn set_no_gradient(&mut self, gradient: Vector3<f64>) {
        self.no_gradient = gradient;
    }

    /// Nearest reference vertex, if any
    pub fn closest_point(&self, x: &Point3<f64>) -> Option<Point3<f64>> {
        self.locator
            .find_closest_point(x)
            .map(|i| self.locator.point(i))
    }
}

impl Default for PointDistance {
    fn default() -> Self {
        Self::new(LocatorOptions::default())
    }
}

impl ImplicitFunction for PointDistance {
    fn evaluate(&self, x: &Point3<f64>) -> f64 {
        match self.closest_point(x) {
            Some(p) => (x - p).norm_squared(),
            None => self.no_value,
        }
    }

    fn gradient(&self, x: &Point3<f64>) -> Option<Vector3<f64>> {
        Some(match self.closest_point(x) {
            Some(p) => x - p,
            None => self.no_gradient,
        })
    }
}

/// Default search radius of [`CellDistance`]
pub const DEFAULT_CELL_SEARCH_RADIUS: f64 = 1.0;

/// Squared distance to the nearest reference vertex inside a bounded
/// search radius.
///
/// Meant for "is x near the reference" membership tests. Queries with
/// nothing inside the radius return [`CellDistance::no_value`], which
/// defaults to `f64::MAX`.
///
/// Known limitation: this function has no gradient. [`ImplicitFunction::gradient`]
/// always returns `None`, and callers must not depend on it.
#[derive(Debug, Clone)]
pub struct CellDistance {
    locator: PointLocator,
    radius: f64,
    no_value: f64,
}

impl CellDistance {
    pub fn new(options: LocatorOptions, radius: f64) -> Self {
        Self {
            locator: PointLocator::new(options),
            radius,
            no_value: f64::MAX,
        }
    }

    pub fn set_input(&mut self, mesh: &Mesh) {
        self.locator.build(&mesh.positions);
    }

    #[inline]
    pub fn has_input(&self) -> bool {
        !self.locator.is_empty()
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f64) {
        self.radius = radius;
    }

    #[inline]
    pub fn no_value(&self) -> f64 {
        self.no_value
    }

    pub fn set_no_value(&mut self, value: f64) {
        self.no_value = value;
    }

    /// Whether any reference vertex lies within the search radius
    pub fn is_near(&self, x: &Point3<f64>) -> bool {
        self.locator
            .find_closest_point_within_radius(self.radius, x)
            .is_some()
    }
}

impl Default for CellDistance {
    fn default() -> Self {
        Self::new(LocatorOptions::default(), DEFAULT_CELL_SEARCH_RADIUS)
    }
}

impl ImplicitFunction for CellDistance {
    fn evaluate(&self, x: &Point3<f64>) -> f64 {
        self.locator
            .find_closest_point_within_radius(self.radius, x)
            .map_or(self.no_value, |(_, d2)| d2)
    }

    fn gradient(&self, _x: &Point3<f64>) -> Option<Vector3<f64>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn x_plane(at: f64, dir: f64) -> Plane {
        Plane::new(Point3::new(at, 0.0, 0.0), Vector3::new(dir, 0.0, 0.0)).unwrap()
    }

    #[test]
    fn test_plane_rejects_zero_normal() {
        assert_eq!(
            Plane::new(Point3::origin(), Vector3::zeros()),
            Err(Error::DegeneratePlane)
        );
    }

    #[test]
    fn test_plane_signed_distance_normalizes() {
        let plane = Plane::new(Point3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, 5.0)).unwrap();
        assert_relative_eq!(plane.signed_distance(&Point3::new(3.0, 3.0, 4.0)), 3.0);
        assert!(plane.contains(&Point3::new(0.0, 0.0, 1.0)));
        assert!(!plane.contains(&Point3::new(0.0, 0.0, 0.5)));
    }

    #[test]
    fn test_reflection_matrix() {
        let plane = Plane::new(Point3::new(1.0, 0.0, 0.0), Vector3::x()).unwrap();
        let m = plane.reflection_matrix();
        let p = m.transform_point(&Point3::new(3.0, 2.0, -1.0));
        assert_relative_eq!(p, Point3::new(-1.0, 2.0, -1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_boolean_operations() {
        let planes = [x_plane(0.0, 1.0), x_plane(2.0, -1.0)];
        let x = Point3::new(3.0, 0.0, 0.0);

        // f0 = 3, f1 = -1
        let union = ImplicitBoolean::from_planes(BooleanOperation::Union, &planes);
        assert_relative_eq!(union.evaluate(&x), 3.0);
        let inter = ImplicitBoolean::from_planes(BooleanOperation::Intersection, &planes);
        assert_relative_eq!(inter.evaluate(&x), -1.0);
        let diff = ImplicitBoolean::from_planes(BooleanOperation::Difference, &planes);
        assert_relative_eq!(diff.evaluate(&x), 1.0);
        assert_relative_eq!(diff.gradient(&x).unwrap(), Vector3::new(1.0, 0.0, 0.0));

        let empty = ImplicitBoolean::new(BooleanOperation::Union);
        assert!(empty.evaluate(&x) < 0.0);
        assert!(empty.gradient(&x).is_none());
    }

    #[test]
    fn test_operation_names_round_trip() {
        for op in BooleanOperation::ALL {
            assert_eq!(BooleanOperation::parse(op.as_str()), Some(op));
        }
        assert_eq!(BooleanOperation::parse("Xor"), None);
    }

    #[test]
    fn test_point_distance_without_input_uses_fallback() {
        let mut distance = PointDistance::default();
        distance.set_no_value(7.5);
        let x = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(distance.evaluate(&x), 7.5);
        assert_eq!(distance.gradient(&x), Some(Vector3::z()));
    }

    #[test]
    fn test_point_distance_evaluates_squared_distance() {
        let mesh = Mesh::from_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(4.0, 0.0, 0.0),
                Point3::new(0.0, 3.0, 0.0),
            ],
            &[[0, 1, 2]],
        );
        let mut distance = PointDistance::default();
        distance.set_input(&mesh);
        assert_relative_eq!(distance.no_value(), 5.0);

        let x = Point3::new(4.0, 1.0, 2.0);
        assert_relative_eq!(distance.evaluate(&x), 5.0);
        assert_relative_eq!(distance.gradient(&x).unwrap(), Vector3::new(0.0, 1.0, 2.0));
    }

    #[test]
    fn test_cell_distance_is_bounded() {
        let mesh = Mesh::from_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            &[[0, 1, 2]],
        );
        let mut distance = CellDistance::default();
        distance.set_input(&mesh);

        assert_relative_eq!(distance.evaluate(&Point3::new(0.0, 0.0, 0.5)), 0.25);
        assert_eq!(distance.evaluate(&Point3::new(5.0, 5.0, 5.0)), f64::MAX);
        assert!(distance.is_near(&Point3::new(1.5, 0.0, 0.0)));
        assert!(distance.gradient(&Point3::origin()).is_none());
    }
}
