//! Point-set primitives shared by every processing stage.

use serde::{Deserialize, Serialize};

use super::error::{ProcessingError, Result};

/// A single sample: planar position (x, y) and elevation z.
pub type Point = [f64; 3];

/// Mean Earth radius in meters used by [`great_circle_distance`].
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Percentile used as the local ground estimate.
pub const GROUND_PERCENTILE: f64 = 5.0;

/// Axis-aligned 3D bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    /// Extent along x.
    #[inline]
    pub fn width(&self) -> f64 {
        (self.max[0] - self.min[0]).max(0.0)
    }

    /// Extent along y.
    #[inline]
    pub fn depth(&self) -> f64 {
        (self.max[1] - self.min[1]).max(0.0)
    }

    /// Extent along z.
    #[inline]
    pub fn height(&self) -> f64 {
        (self.max[2] - self.min[2]).max(0.0)
    }

    pub fn volume(&self) -> f64 {
        self.width() * self.depth() * self.height()
    }

    /// Planar (x, y) area of the box.
    pub fn planar_area(&self) -> f64 {
        self.width() * self.depth()
    }
}

/// Compute the axis-aligned bounding box of a point set.
///
/// # Errors
///
/// Returns [`ProcessingError::EmptyInput`] when `points` is empty.
pub fn bbox(points: &[Point]) -> Result<BoundingBox> {
    let first = points
        .first()
        .ok_or(ProcessingError::EmptyInput { operation: "bbox" })?;

    let mut min = *first;
    let mut max = *first;
    for p in &points[1..] {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }

    Ok(BoundingBox { min, max })
}

/// Volume of the bounding box of `points`.
pub fn bbox_volume(points: &[Point]) -> Result<f64> {
    Ok(bbox(points)?.volume())
}

/// Percentile of `values` with linear interpolation between closest ranks.
///
/// `p` is in percent (0..=100). The rank is `p / 100 * (n - 1)`, so a single
/// value is returned unchanged and a constant slice yields that constant
/// exactly. Returns `None` for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(percentile_of_sorted(&sorted, p))
}

/// Same as [`percentile`] on an already ascending, non-empty slice.
pub(crate) fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());

    let last = sorted.len() - 1;
    let rank = (p.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;

    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Estimate a tree height as `max(z) - p5(z)`.
///
/// The 5th percentile stands in for ground elevation. A single point, or a
/// set with no z variance, yields exactly 0.0. An empty set also yields 0.0.
pub fn height_from_points(points: &[Point]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }

    let mut z: Vec<f64> = points.iter().map(|p| p[2]).collect();
    z.sort_by(f64::total_cmp);

    let top = z[z.len() - 1];
    let ground = percentile_of_sorted(&z, GROUND_PERCENTILE);
    (top - ground).max(0.0)
}

/// Haversine distance in meters between two (lat, lon) pairs given in degrees.
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = phi2 - phi1;
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_basic() {
        let pts = vec![[0.0, 5.0, -1.0], [2.0, 1.0, 3.0], [1.0, 3.0, 0.0]];
        let b = bbox(&pts).unwrap();
        assert_eq!(b.min, [0.0, 1.0, -1.0]);
        assert_eq!(b.max, [2.0, 5.0, 3.0]);
        assert_eq!(b.width(), 2.0);
        assert_eq!(b.depth(), 4.0);
        assert_eq!(b.height(), 4.0);
    }

    #[test]
    fn test_bbox_empty() {
        let pts: Vec<Point> = vec![];
        assert_eq!(
            bbox(&pts),
            Err(ProcessingError::EmptyInput { operation: "bbox" })
        );
    }

    #[test]
    fn test_bbox_volume() {
        let pts = vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]];
        assert_eq!(bbox_volume(&pts).unwrap(), 1.0);
    }

    #[test]
    fn test_percentile_interpolation() {
        let v = vec![4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(percentile(&v, 0.0), Some(1.0));
        assert_eq!(percentile(&v, 50.0), Some(3.0));
        assert_eq!(percentile(&v, 100.0), Some(5.0));
        // rank = 0.25 * 4 = 1.0 -> second smallest
        assert_eq!(percentile(&v, 25.0), Some(2.0));

        let two = vec![0.0, 10.0];
        let p5 = percentile(&two, 5.0).unwrap();
        assert!((p5 - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_empty() {
        assert_eq!(percentile(&[], 5.0), None);
    }

    #[test]
    fn test_height_zero_variance_is_exactly_zero() {
        let pts: Vec<Point> = (0..17).map(|i| [i as f64, 0.3, 12.345]).collect();
        assert_eq!(height_from_points(&pts), 0.0);
    }

    #[test]
    fn test_height_single_point() {
        assert_eq!(height_from_points(&[[1.0, 2.0, 30.0]]), 0.0);
    }

    #[test]
    fn test_height_robust_to_ground() {
        let zs = [0.0, 0.1, 0.2, 10.0, 9.0];
        let pts: Vec<Point> = zs.iter().map(|&z| [0.0, 0.0, z]).collect();
        let h = height_from_points(&pts);
        assert!(h >= 9.5 && h <= 10.0, "height {}", h);
    }

    #[test]
    fn test_great_circle_symmetry() {
        let a = great_circle_distance(0.0, 0.0, 0.0, 1.0);
        let b = great_circle_distance(0.0, 1.0, 0.0, 0.0);
        assert!((a - b).abs() < 1e-6);
        // One degree of longitude at the equator
        assert!((a - 111_194.9).abs() < 1.0, "distance {}", a);
    }

    #[test]
    fn test_great_circle_same_point() {
        assert_eq!(great_circle_distance(45.0, 7.0, 45.0, 7.0), 0.0);
    }
}
