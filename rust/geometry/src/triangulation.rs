// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon triangulation for polygon faces and clip caps
//!
//! Loops are given in 3D, flattened onto their Newell plane and handed to
//! earcutr. Small convex loops skip earcut and fan out from the first point.

use crate::{Error, Point2, Point3, Result, Vector3};

/// Largest loop that may be fanned without running earcut
const FAN_LIMIT: usize = 8;

fn is_convex(points: &[Point2<f64>]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut turn = 0.0f64;
    (0..n).all(|i| {
        let (a, b, c) = (points[i], points[(i + 1) % n], points[(i + 2) % n]);
        let cross = (b - a).perp(&(c - b));
        if cross.abs() <= 1e-10 {
            return true;
        }
        if turn == 0.0 {
            turn = cross.signum();
        }
        cross.signum() == turn
    })
}

fn fan(n: usize) -> Vec<usize> {
    (1..n.saturating_sub(1)).flat_map(|i| [0, i, i + 1]).collect()
}

/// Triangulate a simple 2D polygon without holes.
///
/// Returns flat triangle indices into `points`.
pub fn triangulate_polygon(points: &[Point2<f64>]) -> Result<Vec<usize>> {
    match points.len() {
        0..=2 => {
            return Err(Error::TriangulationError(format!(
                "polygon has {} points, need at least 3",
                points.len()
            )))
        }
        3 => return Ok(vec![0, 1, 2]),
        n if n <= FAN_LIMIT && is_convex(points) => return Ok(fan(n)),
        _ => {}
    }

    let coords: Vec<f64> = points.iter().flat_map(|p| [p.x, p.y]).collect();
    let indices = earcutr::earcut(&coords, &[], 2)
        .map_err(|e| Error::TriangulationError(format!("{e:?}")))?;
    if indices.is_empty() {
        return Err(Error::TriangulationError("polygon has no area".into()));
    }
    Ok(indices)
}

/// Triangulate a planar loop given in 3D.
///
/// Triangles keep the winding of the loop. Loops earcut rejects fall back
/// to a fan.
pub fn triangulate_face(points: &[Point3<f64>]) -> Vec<[usize; 3]> {
    match points.len() {
        0..=2 => return Vec::new(),
        3 => return vec![[0, 1, 2]],
        _ => {}
    }

    let flat = flatten(points, &calculate_polygon_normal(points));
    let indices = triangulate_polygon(&flat).unwrap_or_else(|_| fan(points.len()));

    indices
        .chunks_exact(3)
        .map(|t| {
            // The 2D basis is right-handed around the loop normal
            let area = (flat[t[1]] - flat[t[0]]).perp(&(flat[t[2]] - flat[t[0]]));
            if area < 0.0 {
                [t[0], t[2], t[1]]
            } else {
                [t[0], t[1], t[2]]
            }
        })
        .collect()
}

/// Express `points` in an orthonormal basis `(u, v)` of the plane with
/// the given normal, where `u x v == normal`.
fn flatten(points: &[Point3<f64>], normal: &Vector3<f64>) -> Vec<Point2<f64>> {
    let Some(origin) = points.first() else {
        return Vec::new();
    };
    let reference = match normal.iamin() {
        0 => Vector3::x(),
        1 => Vector3::y(),
        _ => Vector3::z(),
    };
    let u = reference.cross(normal).normalize();
    let v = normal.cross(&u).normalize();
    points
        .iter()
        .map(|p| {
            let d = p - origin;
            Point2::new(d.dot(&u), d.dot(&v))
        })
        .collect()
}

/// Unit normal of a loop by Newell's method, `+Z` for degenerate loops.
pub fn calculate_polygon_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    if points.len() < 3 {
        return Vector3::z();
    }
    let sum = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .fold(Vector3::zeros(), |acc, (a, b)| {
            acc + Vector3::new(
                (a.y - b.y) * (a.z + b.z),
                (a.z - b.z) * (a.x + b.x),
                (a.x - b.x) * (a.y + b.y),
            )
        });
    let len = sum.norm();
    if len > 1e-10 {
        sum / len
    } else {
        Vector3::z()
    }
}
