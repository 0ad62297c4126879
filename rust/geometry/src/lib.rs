// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dynmod Geometry
//!
//! Surface mesh operations behind the dynamic modeler: implicit-function
//! clipping with caps, loop and boundary region selection, mirroring,
//! appending and duplicate-face cleanup. Uses nalgebra for the math,
//! earcutr for cap triangulation and rayon for large scalar fields.

pub mod append;
pub mod boundary_cut;
pub mod clip;
pub mod connectivity;
pub mod dedup;
pub mod edges;
pub mod error;
pub mod implicit;
pub mod locator;
pub mod mesh;
pub mod plane_cut;
pub mod select;
pub mod shapes;
pub mod transform;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3};

pub use append::{append_and_clean, append_meshes, merge_points};
pub use boundary_cut::{
    boundary_cut, plane_border, Border, BorderDistance, BoundaryCutOptions, DEFAULT_BOUNDARY_EPSILON,
};
pub use clip::{clip_mesh, clip_with_scalars, evaluate_scalars, ClipOptions, ClipOutput, DEFAULT_PARALLEL_THRESHOLD};
pub use connectivity::{extract_closest_region, extract_largest_region, label_regions, RegionLabels};
pub use dedup::{remove_duplicate_faces, DedupReport};
pub use edges::{boundary_edges, boundary_loops, cap_boundaries, strip_polylines, Polyline};
pub use error::{Error, Result};
pub use implicit::{
    BooleanOperation, CellDistance, ImplicitBoolean, ImplicitFunction, Plane, PointDistance,
    DEFAULT_CELL_SEARCH_RADIUS,
};
pub use locator::{LocatorOptions, PointLocator, DEFAULT_POINTS_PER_BUCKET, DEFAULT_TOLERANCE};
pub use mesh::{AttributeArray, AttributeSet, Face, FaceKind, Mesh, NORMALS};
pub use plane_cut::{plane_cut, PlaneCutOptions, PlaneCutOutput};
pub use select::{select_loop_region, LoopSelectOptions};
pub use transform::{mirror, transform_mesh};
pub use triangulation::{calculate_polygon_normal, triangulate_face, triangulate_polygon};
