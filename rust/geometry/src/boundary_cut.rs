// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cut a surface along borders made of its own vertices
//!
//! A border is either a curve whose points sit on mesh vertices, or a
//! plane whose trace on the mesh is recovered as the rim of the faces
//! strictly in front of it. A small neighbourhood of every border point
//! is clipped away, which disconnects the surface along the borders, and
//! the piece nearest a seed point is returned. The neighbourhood is
//! measured either to the nearest border point anywhere or only within a
//! search radius around each query.

use crate::append::merge_points;
use crate::clip::{clip_mesh, ClipOptions, DEFAULT_PARALLEL_THRESHOLD};
use crate::connectivity::extract_closest_region;
use crate::edges::{boundary_edges, strip_polylines};
use crate::error::{Error, Result};
use crate::implicit::{CellDistance, ImplicitFunction, Plane, PointDistance};
use crate::locator::LocatorOptions;
use crate::mesh::{Face, FaceKind, Mesh};
use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashSet;

/// Squared distance to the border under which a point is removed
pub const DEFAULT_BOUNDARY_EPSILON: f64 = 1e-5;

/// One cutting border
#[derive(Debug, Clone, PartialEq)]
pub enum Border {
    /// Open polyline through mesh vertices
    Curve(Vec<Point3<f64>>),
    Plane(Plane),
}

/// Distance field measured to the border points
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BorderDistance {
    /// Nearest border point, wherever it is
    #[default]
    Point,
    /// Nearest border point within `radius`. Farther points count as
    /// infinitely far and are never cut.
    Cell { radius: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryCutOptions {
    pub epsilon: f64,
    pub distance: BorderDistance,
    /// Point picking the piece to keep. Defaults to the mean of the border
    /// centres: curve centroids and plane origins.
    pub seed: Option<Point3<f64>>,
    pub locator: LocatorOptions,
    pub parallel_threshold: usize,
}

impl Default for BoundaryCutOptions {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_BOUNDARY_EPSILON,
            distance: BorderDistance::Point,
            seed: None,
            locator: LocatorOptions::default(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

/// Trace of `plane` on `mesh` as line faces over the mesh's own points.
///
/// The trace is the rim of the polygons whose points are all strictly in
/// front of the plane, minus edges already on the mesh boundary.
pub fn plane_border(mesh: &Mesh, plane: &Plane) -> Mesh {
    let front: Vec<usize> = mesh
        .faces
        .iter()
        .enumerate()
        .filter(|(_, f)| {
            f.kind == FaceKind::Polygon
                && f.indices
                    .iter()
                    .all(|&i| plane.signed_distance(&mesh.positions[i as usize]) > 0.0)
        })
        .map(|(i, _)| i)
        .collect();

    let key = |[a, b]: [u32; 2]| if a < b { (a, b) } else { (b, a) };
    let open: FxHashSet<(u32, u32)> = boundary_edges(mesh).into_iter().map(key).collect();
    let rim: Vec<[u32; 2]> = boundary_edges(&mesh.select_faces(front))
        .into_iter()
        .filter(|&e| !open.contains(&key(e)))
        .collect();

    let mut border = Mesh {
        positions: mesh.positions.clone(),
        ..Mesh::default()
    };
    for polyline in strip_polylines(&rim) {
        let mut indices = polyline.indices;
        if polyline.closed {
            indices.push(indices[0]);
        }
        border.add_face(Face::line(indices));
    }
    border.compact()
}

fn curve_border(points: &[Point3<f64>]) -> Mesh {
    let mut border = Mesh::with_capacity(points.len(), 1);
    for p in points {
        border.add_point(*p);
    }
    if points.len() > 1 {
        border.add_face(Face::line(0..points.len() as u32));
    } else if !points.is_empty() {
        border.add_face(Face::vertex(0));
    }
    border
}

/// Cut `mesh` along `borders` and keep the piece closest to the seed
pub fn boundary_cut(mesh: &Mesh, borders: &[Border], options: &BoundaryCutOptions) -> Result<Mesh> {
    if mesh.is_empty() {
        return Err(Error::empty("boundary cut input"));
    }
    if borders.is_empty() {
        return Err(Error::invalid("boundary cut needs at least one border"));
    }

    let mut pieces = Vec::with_capacity(borders.len());
    let mut centres = Vec::with_capacity(borders.len());
    for border in borders {
        match border {
            Border::Curve(points) => {
                pieces.push(curve_border(points));
                let sum = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords);
                if !points.is_empty() {
                    centres.push(Point3::from(sum / points.len() as f64));
                }
            }
            Border::Plane(plane) => {
                pieces.push(plane_border(mesh, plane));
                centres.push(plane.origin);
            }
        }
    }

    let mut combined = Mesh::new();
    combined.merge_all(&pieces.iter().collect::<Vec<_>>());
    let combined = merge_points(&combined, 0.0, options.locator);
    if combined.is_empty() {
        return Err(Error::degenerate("boundary cut borders do not touch the mesh"));
    }

    let distance: Box<dyn ImplicitFunction> = match options.distance {
        BorderDistance::Point => {
            let mut distance = PointDistance::new(options.locator);
            distance.set_input(&combined);
            Box::new(distance)
        }
        BorderDistance::Cell { radius } => {
            let mut distance = CellDistance::new(options.locator, radius);
            distance.set_input(&combined);
            Box::new(distance)
        }
    };
    let output = clip_mesh(
        mesh,
        distance.as_ref(),
        &ClipOptions {
            value: options.epsilon,
            inside_out: true,
            generate_clipped_output: true,
        },
        options.parallel_threshold,
    )?;
    let cut = output.clipped.unwrap_or_else(|| mesh.empty_like());

    let seed = match options.seed {
        Some(seed) => seed,
        None => {
            let sum = centres.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords);
            Point3::from(sum / centres.len().max(1) as f64)
        }
    };

    tracing::debug!(
        borders = borders.len(),
        border_points = combined.point_count(),
        seed = ?seed,
        "boundary cut"
    );
    Ok(extract_closest_region(&cut, &seed, options.locator))
}
