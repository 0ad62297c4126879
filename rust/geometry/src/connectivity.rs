// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connected regions of a mesh
//!
//! Two faces belong to the same region when they share a point.

use crate::locator::{LocatorOptions, PointLocator};
use crate::mesh::Mesh;
use nalgebra::Point3;
use std::collections::VecDeque;

/// Region id per face plus the number of regions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionLabels {
    pub face_region: Vec<usize>,
    pub region_count: usize,
}

impl RegionLabels {
    /// Face count of every region
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.region_count];
        for &r in &self.face_region {
            sizes[r] += 1;
        }
        sizes
    }

    /// Faces of one region, in mesh order
    pub fn faces_of(&self, region: usize) -> impl Iterator<Item = usize> + '_ {
        self.face_region
            .iter()
            .enumerate()
            .filter(move |&(_, &r)| r == region)
            .map(|(f, _)| f)
    }
}

/// Label connected regions with a breadth-first flood over shared points
pub fn label_regions(mesh: &Mesh) -> RegionLabels {
    let mut point_faces: Vec<Vec<usize>> = vec![Vec::new(); mesh.point_count()];
    for (f, face) in mesh.faces.iter().enumerate() {
        for &i in &face.indices {
            point_faces[i as usize].push(f);
        }
    }

    const UNVISITED: usize = usize::MAX;
    let mut face_region = vec![UNVISITED; mesh.face_count()];
    let mut region_count = 0;
    let mut queue = VecDeque::new();

    for start in 0..mesh.face_count() {
        if face_region[start] != UNVISITED {
            continue;
        }
        face_region[start] = region_count;
        queue.push_back(start);

        while let Some(face) = queue.pop_front() {
            for &i in &mesh.faces[face].indices {
                for &neighbor in &point_faces[i as usize] {
                    if face_region[neighbor] == UNVISITED {
                        face_region[neighbor] = region_count;
                        queue.push_back(neighbor);
                    }
                }
            }
        }
        region_count += 1;
    }

    RegionLabels {
        face_region,
        region_count,
    }
}

/// Extract the listed regions, dropping unused points
pub fn extract_regions(mesh: &Mesh, labels: &RegionLabels, regions: &[usize]) -> Mesh {
    let faces = labels
        .face_region
        .iter()
        .enumerate()
        .filter(|(_, r)| regions.contains(*r))
        .map(|(f, _)| f);
    mesh.select_faces(faces).compact()
}

/// Region with the most faces; ties go to the lowest region id
pub fn extract_largest_region(mesh: &Mesh) -> Mesh {
    let labels = label_regions(mesh);
    let sizes = labels.sizes();
    let largest = sizes
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.cmp(b).then(ib.cmp(ia)))
        .map(|(r, _)| r);

    tracing::debug!(regions = labels.region_count, sizes = ?sizes, "largest region");
    match largest {
        Some(r) => extract_regions(mesh, &labels, &[r]),
        None => mesh.empty_like(),
    }
}

/// Region owning the face point closest to `reference`
pub fn extract_closest_region(
    mesh: &Mesh,
    reference: &Point3<f64>,
    options: LocatorOptions,
) -> Mesh {
    let compact = mesh.compact();
    let mut locator = PointLocator::new(options);
    locator.build(&compact.positions);
    let Some(closest) = locator.find_closest_point(reference) else {
        return compact.empty_like();
    };

    let labels = label_regions(&compact);
    let region = compact
        .faces
        .iter()
        .position(|f| f.indices.contains(&(closest as u32)))
        .map(|f| labels.face_region[f]);

    tracing::debug!(
        regions = labels.region_count,
        region = ?region,
        "closest point region"
    );
    match region {
        Some(r) => extract_regions(&compact, &labels, &[r]),
        None => compact.empty_like(),
    }
}
