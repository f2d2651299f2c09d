//! Density-based crown segmentation in the horizontal plane.
//!
//! Points are grouped with DBSCAN semantics on their (x, y) projection:
//! - eps-sized uniform grid for radius neighbor queries
//! - `rayon` for parallel core point identification and merging
//! - Atomic union-find for lock-free merging of core points
//!
//! # Example
//!
//! ```no_run
//! use canopy_pipeline::processors::segmentation::segment;
//!
//! let points = vec![[0.0, 0.0, 12.0], [0.5, 0.0, 14.0], [40.0, 40.0, 3.0]];
//! let labels = segment(&points, 1.0, 2).unwrap();
//! assert_eq!(labels[2], -1);
//! ```

use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use rayon::prelude::*;

use super::error::{ensure_positive, ProcessingError, Result};
use super::geometry::Point;
use crate::config::{InputConfig, SegmentationConfig};
use crate::core::loaders::{load_points, PointCloud};
use crate::core::transforms::subsample_points;
use crate::core::writers::write_labels_csv;

/// Label assigned to points that belong to no crown.
pub const NOISE: i32 = -1;

/// Lock-free union-find used to merge core points from many threads.
///
/// Roots always point towards the larger index, so concurrent unions converge
/// on the same representative regardless of scheduling.
pub struct AtomicUnionFind {
    parent: Vec<AtomicUsize>,
}

impl AtomicUnionFind {
    /// Create `size` singleton sets.
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size).map(AtomicUsize::new).collect(),
        }
    }

    /// Find the representative of `x`, halving the path on the way up.
    #[inline]
    pub fn find(&self, mut x: usize) -> usize {
        loop {
            let p = self.parent[x].load(Ordering::Relaxed);
            if p == x {
                return x;
            }
            let gp = self.parent[p].load(Ordering::Relaxed);
            if gp != p {
                // losing this race only skips a compression step
                let _ = self.parent[x].compare_exchange_weak(
                    p,
                    gp,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                );
            }
            x = p;
        }
    }

    /// Merge the sets of `x` and `y`. Returns false if they were already joined.
    #[inline]
    pub fn union(&self, x: usize, y: usize) -> bool {
        loop {
            let rx = self.find(x);
            let ry = self.find(y);
            if rx == ry {
                return false;
            }

            let (child, root) = if rx < ry { (rx, ry) } else { (ry, rx) };
            if self.parent[child]
                .compare_exchange_weak(child, root, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }
}

#[inline]
fn planar_dist_sq(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Cell keys are clamped so that widening a key range never overflows.
const MAX_CELL_KEY: f64 = (1u64 << 52) as f64;

/// Uniform grid over the planar projection with eps-sized cells.
///
/// Point indices are stored sorted by cell, and each occupied cell maps to a
/// contiguous range of that order, so the index holds O(N) entries no matter
/// how many points share a coordinate.
struct PlanarGrid {
    planar: Vec<[f64; 2]>,
    origin: [f64; 2],
    eps: f64,
    eps_sq: f64,
    order: Vec<usize>,
    cells: HashMap<(i64, i64), Range<usize>>,
}

impl PlanarGrid {
    fn new(planar: Vec<[f64; 2]>, eps: f64) -> Self {
        let origin = planar.iter().fold([f64::MAX, f64::MAX], |acc, p| {
            [acc[0].min(p[0]), acc[1].min(p[1])]
        });
        let mut grid = Self {
            order: (0..planar.len()).collect(),
            planar,
            origin,
            eps,
            eps_sq: eps * eps,
            cells: HashMap::new(),
        };

        let keys: Vec<(i64, i64)> = grid.planar.iter().map(|p| grid.key_of(p)).collect();
        grid.order.sort_unstable_by_key(|&i| (keys[i], i));

        let mut start = 0;
        while start < grid.order.len() {
            let key = keys[grid.order[start]];
            let mut end = start + 1;
            while end < grid.order.len() && keys[grid.order[end]] == key {
                end += 1;
            }
            grid.cells.insert(key, start..end);
            start = end;
        }
        grid
    }

    #[inline]
    fn axis_key(&self, v: f64, axis: usize) -> i64 {
        ((v - self.origin[axis]) / self.eps)
            .floor()
            .clamp(-MAX_CELL_KEY, MAX_CELL_KEY) as i64
    }

    #[inline]
    fn key_of(&self, p: &[f64; 2]) -> (i64, i64) {
        (self.axis_key(p[0], 0), self.axis_key(p[1], 1))
    }

    /// Indices within `eps` of point `i` (itself included), in no particular order.
    fn neighbors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        let query = self.planar[i];
        // slack keeps points at exactly eps inside the scanned key range
        let reach = self.eps * (1.0 + 1e-9);
        let (x0, y0) = self.key_of(&[query[0] - reach, query[1] - reach]);
        let (x1, y1) = self.key_of(&[query[0] + reach, query[1] + reach]);

        (x0..=x1)
            .flat_map(move |kx| (y0..=y1).map(move |ky| (kx, ky)))
            .filter_map(move |key| self.cells.get(&key))
            .flat_map(move |range| self.order[range.clone()].iter().copied())
            .filter(move |&j| planar_dist_sq(&query, &self.planar[j]) <= self.eps_sq)
    }
}

/// Group points into crown clusters by planar density.
///
/// Two points are directly connected when their (x, y) distance is `<= eps`.
/// A core point has at least `min_samples` points within `eps`, itself
/// included. Clusters are the connected components of core points plus the
/// border points attached to them; everything else is [`NOISE`].
///
/// Labels are dense (`0..k`) and numbered in order of each cluster's lowest
/// core point index, so repeated calls on the same input produce the same
/// labelling. A border point reachable from several clusters joins the one
/// owning its lowest-indexed core neighbor.
///
/// Auxiliary memory is linear in the number of points: neighborhoods are
/// scanned from the grid each time they are needed and never stored.
///
/// # Arguments
///
/// * `points` - Point set; only x and y take part in grouping
/// * `eps` - Neighborhood radius (> 0)
/// * `min_samples` - Neighbors, self included, needed for a core point (>= 1)
///
/// # Errors
///
/// Returns [`ProcessingError::InvalidParameter`] for a non-positive `eps`,
/// `min_samples == 0`, or non-finite planar coordinates. Empty input yields
/// an empty labelling.
pub fn segment(points: &[Point], eps: f64, min_samples: usize) -> Result<Vec<i32>> {
    ensure_positive("eps", eps)?;
    if min_samples < 1 {
        return Err(ProcessingError::invalid("min_samples", "must be >= 1"));
    }

    let n = points.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let planar: Vec<[f64; 2]> = points.iter().map(|p| [p[0], p[1]]).collect();
    if let Some(i) = planar.iter().position(|p| !p[0].is_finite() || !p[1].is_finite()) {
        return Err(ProcessingError::invalid(
            "points",
            format!("point {} has a non-finite planar coordinate", i),
        ));
    }

    // Phase 1: spatial index over the planar projection
    let grid = PlanarGrid::new(planar, eps);

    // Phase 2: core points, counting neighbors (self included) up to min_samples
    let is_core: Vec<bool> = (0..n)
        .into_par_iter()
        .map(|i| grid.neighbors(i).take(min_samples).count() >= min_samples)
        .collect();

    // Phase 3: connect core points that are direct neighbors
    let uf = AtomicUnionFind::new(n);
    (0..n).into_par_iter().filter(|&i| is_core[i]).for_each(|i| {
        for j in grid.neighbors(i) {
            if j > i && is_core[j] {
                uf.union(i, j);
            }
        }
    });

    // Phase 4: dense labels in order of first core index
    let mut root_to_label: HashMap<usize, i32> = HashMap::new();
    let mut labels = vec![NOISE; n];

    for i in 0..n {
        if is_core[i] {
            let next = root_to_label.len() as i32;
            labels[i] = *root_to_label.entry(uf.find(i)).or_insert(next);
        }
    }

    // Phase 5: border points join their lowest-indexed core neighbor
    let border: Vec<(usize, usize)> = (0..n)
        .into_par_iter()
        .filter(|&i| !is_core[i])
        .filter_map(|i| grid.neighbors(i).filter(|&j| is_core[j]).min().map(|j| (i, j)))
        .collect();
    for (i, j) in border {
        labels[i] = labels[j];
    }

    log::debug!(
        "segment: {} points in {} grid cells, {} clusters, {} noise (eps={}, min_samples={})",
        n,
        grid.cells.len(),
        count_clusters(&labels),
        noise_count(&labels),
        eps,
        min_samples
    );

    Ok(labels)
}

/// Number of distinct non-noise labels.
pub fn count_clusters(labels: &[i32]) -> usize {
    let mut seen: Vec<i32> = labels.iter().copied().filter(|&l| l >= 0).collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

/// Number of points labelled as noise.
pub fn noise_count(labels: &[i32]) -> usize {
    labels.iter().filter(|&&l| l < 0).count()
}

/// Points that were segmented together with their labels.
#[derive(Debug, Clone)]
pub struct SegmentedCloud {
    pub points: Vec<Point>,
    pub labels: Vec<i32>,
    /// Approximate subsampling ratio applied before segmentation (1 = none).
    pub stride: usize,
}

/// Segment a loaded cloud, applying the configured point cap first.
pub fn segment_cloud(cloud: &PointCloud, config: &SegmentationConfig) -> Result<SegmentedCloud> {
    let (points, stride) = subsample_points(&cloud.to_points(), config.max_points, config.seed);
    let labels = segment(&points, config.eps, config.min_samples)?;

    Ok(SegmentedCloud {
        points,
        labels,
        stride,
    })
}

/// Load a point file, segment it, and write `<stem>_crown_labels.csv`.
///
/// # Arguments
///
/// * `input_path` - CSV, PLY or LAS/LAZ point file
/// * `output_dir` - Output directory (defaults to the input's parent directory)
/// * `config` - Segmentation parameters
/// * `input_config` - Loader limits
///
/// # Returns
///
/// Tuple of (output CSV path, segmented cloud).
pub fn process_segmentation(
    input_path: &Path,
    output_dir: Option<&Path>,
    config: &SegmentationConfig,
    input_config: &InputConfig,
) -> anyhow::Result<(PathBuf, SegmentedCloud)> {
    let cloud = load_points(input_path, input_config)
        .with_context(|| format!("loading {}", input_path.display()))?;

    let segmented = segment_cloud(&cloud, config)?;
    let file_name = input_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    log::info!(
        "{}: segmented {} points (approx stride={}) into {} crowns, {} noise",
        file_name,
        segmented.points.len(),
        segmented.stride,
        count_clusters(&segmented.labels),
        noise_count(&segmented.labels)
    );

    let out_dir = output_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| input_path.parent().unwrap_or(Path::new(".")).to_path_buf());
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let csv_path = out_dir.join(format!("{}_crown_labels.csv", stem));

    write_labels_csv(&csv_path, &segmented.points, &segmented.labels)?;
    log::info!("Labels CSV -> {}", csv_path.display());

    Ok((csv_path, segmented))
}
