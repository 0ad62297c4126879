// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bucketed point locator for nearest-point queries.
//!
//! Points are hashed into a uniform grid sized so that each bucket holds
//! roughly `points_per_bucket` points. The locator never observes its
//! source: callers rebuild it whenever the point set changes.
//!
//! Candidates whose distances differ by no more than the tolerance count
//! as equally close, and the lowest index wins. Queries are therefore
//! independent of the bucket scan order.

use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Default bucket occupancy
pub const DEFAULT_POINTS_PER_BUCKET: usize = 10;

/// Default distance under which two points are considered coincident
pub const DEFAULT_TOLERANCE: f64 = 1e-12;

/// Build parameters for a [`PointLocator`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocatorOptions {
    pub points_per_bucket: usize,
    pub tolerance: f64,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            points_per_bucket: DEFAULT_POINTS_PER_BUCKET,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

type BucketKey = (i64, i64, i64);

/// Uniform grid over a static point set
#[derive(Debug, Clone)]
pub struct PointLocator {
    options: LocatorOptions,
    points: Vec<Point3<f64>>,
    origin: Point3<f64>,
    spacing: Vector3<f64>,
    divisions: [i64; 3],
    buckets: FxHashMap<BucketKey, SmallVec<[u32; 16]>>,
}

impl PointLocator {
    pub fn new(options: LocatorOptions) -> Self {
        Self {
            options: LocatorOptions {
                points_per_bucket: options.points_per_bucket.max(1),
                tolerance: options.tolerance.max(0.0),
            },
            points: Vec::new(),
            origin: Point3::origin(),
            spacing: Vector3::repeat(1.0),
            divisions: [0; 3],
            buckets: FxHashMap::default(),
        }
    }

    /// Build a locator over `points` with default options
    pub fn from_points(points: &[Point3<f64>]) -> Self {
        let mut locator = Self::new(LocatorOptions::default());
        locator.build(points);
        locator
    }

    #[inline]
    pub fn options(&self) -> LocatorOptions {
        self.options
    }

    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.options.tolerance
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn point(&self, index: usize) -> Point3<f64> {
        self.points[index]
    }

    /// Index a point set, discarding any previous contents
    pub fn build(&mut self, points: &[Point3<f64>]) {
        self.points = points.to_vec();
        self.buckets.clear();

        let Some(first) = points.first() else {
            self.divisions = [0; 3];
            return;
        };

        let (mut min, mut max) = (*first, *first);
        for p in &points[1..] {
            min = min.inf(p);
            max = max.sup(p);
        }
        let extent = max - min;
        let largest = extent.max();

        // Axes thinner than this are flattened to a single bucket
        let flat = largest * 1e-3;
        let active: SmallVec<[usize; 3]> = (0..3).filter(|&a| extent[a] > flat).collect();

        let target = points.len().div_ceil(self.options.points_per_bucket).max(1) as f64;
        let mut divisions = [1i64; 3];
        if !active.is_empty() {
            let measure: f64 = active.iter().map(|&a| extent[a]).product();
            let h = (measure / target).powf(1.0 / active.len() as f64);
            for &a in &active {
                divisions[a] = ((extent[a] / h).ceil() as i64).clamp(1, 1 << 10);
            }
        }

        let mut spacing = Vector3::zeros();
        for a in 0..3 {
            spacing[a] = if extent[a] > 0.0 {
                extent[a] / divisions[a] as f64
            } else {
                1.0
            };
        }

        self.origin = min;
        self.spacing = spacing;
        self.divisions = divisions;

        for (index, p) in points.iter().enumerate() {
            let key = self.bucket_of(p);
            self.buckets.entry(key).or_default().push(index as u32);
        }

        tracing::trace!(
            points = points.len(),
            buckets = self.buckets.len(),
            divisions = ?self.divisions,
            "built point locator"
        );
    }

    /// Bucket containing `p`, clamped into the grid
    #[inline]
    fn bucket_of(&self, p: &Point3<f64>) -> BucketKey {
        let axis = |a: usize| {
            let i = ((p[a] - self.origin[a]) / self.spacing[a]).floor();
            (i as i64).clamp(0, self.divisions[a] - 1)
        };
        (axis(0), axis(1), axis(2))
    }

    /// Scan every bucket overlapping the box `[x - r, x + r]`, ignoring
    /// points farther than `r`
    fn scan_box(&self, x: &Point3<f64>, r: f64, best: &mut Option<(usize, f64)>) {
        let lo = self.bucket_of(&(x - Vector3::repeat(r)));
        let hi = self.bucket_of(&(x + Vector3::repeat(r)));
        for i in lo.0..=hi.0 {
            for j in lo.1..=hi.1 {
                for k in lo.2..=hi.2 {
                    self.scan_bucket((i, j, k), x, r * r, best);
                }
            }
        }
    }

    #[inline]
    fn scan_bucket(
        &self,
        key: BucketKey,
        x: &Point3<f64>,
        limit: f64,
        best: &mut Option<(usize, f64)>,
    ) {
        if let Some(bucket) = self.buckets.get(&key) {
            for &index in bucket {
                let index = index as usize;
                let d2 = (self.points[index] - x).norm_squared();
                if d2 <= limit && self.is_closer((index, d2), *best) {
                    *best = Some((index, d2));
                }
            }
        }
    }

    /// Whether `candidate` beats `best`, both as `(index, squared distance)`
    #[inline]
    fn is_closer(&self, candidate: (usize, f64), best: Option<(usize, f64)>) -> bool {
        let Some((best_index, best_d2)) = best else {
            return true;
        };
        let (index, d2) = candidate;
        if (d2.sqrt() - best_d2.sqrt()).abs() <= self.options.tolerance {
            index < best_index
        } else {
            d2 < best_d2
        }
    }

    /// Nearest indexed point, `None` when nothing is indexed
    pub fn find_closest_point(&self, x: &Point3<f64>) -> Option<usize> {
        if self.points.is_empty() {
            return None;
        }

        // Grow shells around the home bucket until something turns up
        let home = self.bucket_of(x);
        let max_level = self.divisions.iter().copied().max().unwrap_or(1);
        let mut best = None;
        for level in 0..=max_level {
            for i in home.0 - level..=home.0 + level {
                for j in home.1 - level..=home.1 + level {
                    for k in home.2 - level..=home.2 + level {
                        let shell = (i - home.0)
                            .abs()
                            .max((j - home.1).abs())
                            .max((k - home.2).abs());
                        if shell == level {
                            self.scan_bucket((i, j, k), x, f64::INFINITY, &mut best);
                        }
                    }
                }
            }
            if best.is_some() {
                break;
            }
        }

        // A closer point may sit in a bucket outside the first shell
        let (_, d2) = best?;
        self.scan_box(x, d2.sqrt() + self.options.tolerance, &mut best);
        best.map(|(index, _)| index)
    }

    /// Nearest point within `radius` of `x` with its squared distance
    pub fn find_closest_point_within_radius(
        &self,
        radius: f64,
        x: &Point3<f64>,
    ) -> Option<(usize, f64)> {
        if self.points.is_empty() || radius < 0.0 {
            return None;
        }
        let mut best = None;
        self.scan_box(x, radius, &mut best);
        best
    }

    /// Every point within `radius` of `x`, in index order
    pub fn find_points_within_radius(&self, radius: f64, x: &Point3<f64>) -> Vec<usize> {
        if self.points.is_empty() || radius < 0.0 {
            return Vec::new();
        }
        let r2 = radius * radius;
        let lo = self.bucket_of(&(x - Vector3::repeat(radius)));
        let hi = self.bucket_of(&(x + Vector3::repeat(radius)));
        let mut found = Vec::new();
        for i in lo.0..=hi.0 {
            for j in lo.1..=hi.1 {
                for k in lo.2..=hi.2 {
                    if let Some(bucket) = self.buckets.get(&(i, j, k)) {
                        found.extend(
                            bucket
                                .iter()
                                .map(|&index| index as usize)
                                .filter(|&index| (self.points[index] - x).norm_squared() <= r2),
                        );
                    }
                }
            }
        }
        found.sort_unstable();
        found
    }
}
