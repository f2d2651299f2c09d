//! Crown footprint area estimators.
//!
//! The feature extractor asks a [`FootprintEstimator`] for the planar area of
//! a cluster. When the estimator cannot produce one, the bounding-box area is
//! used instead, so a footprint is always available.

use crate::config::FootprintMethod;

/// Trait for planar footprint area estimation.
///
/// # Example
///
/// ```rust,ignore
/// use canopy_pipeline::processors::footprint::{ConvexHullEstimator, FootprintEstimator};
///
/// let square = [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [1.0, 1.0]];
/// assert_eq!(ConvexHullEstimator.area(&square), Some(4.0));
/// ```
pub trait FootprintEstimator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Planar area covered by `xy`, or `None` when no estimate is possible.
    fn area(&self, xy: &[[f64; 2]]) -> Option<f64>;
}

/// Convex hull area (Andrew's monotone chain + shoelace formula).
///
/// Exactly collinear input has a zero-area hull and yields `Some(0.0)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvexHullEstimator;

/// Axis-aligned bounding-box area `spread_x * spread_y`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundingBoxEstimator;

impl FootprintEstimator for ConvexHullEstimator {
    fn name(&self) -> &'static str {
        "convex_hull"
    }

    fn area(&self, xy: &[[f64; 2]]) -> Option<f64> {
        if xy.iter().any(|p| !p[0].is_finite() || !p[1].is_finite()) {
            return None;
        }
        Some(polygon_area(&convex_hull(xy)))
    }
}

impl FootprintEstimator for BoundingBoxEstimator {
    fn name(&self) -> &'static str {
        "bounding_box"
    }

    fn area(&self, xy: &[[f64; 2]]) -> Option<f64> {
        Some(bbox_area(xy))
    }
}

/// Estimator selected by configuration.
pub fn estimator_for(method: FootprintMethod) -> Box<dyn FootprintEstimator> {
    match method {
        FootprintMethod::ConvexHull => Box::new(ConvexHullEstimator),
        FootprintMethod::BoundingBox => Box::new(BoundingBoxEstimator),
    }
}

/// `spread_x * spread_y` of the planar points, 0.0 when empty.
pub fn bbox_area(xy: &[[f64; 2]]) -> f64 {
    let Some(first) = xy.first() else {
        return 0.0;
    };
    let (mut x0, mut x1, mut y0, mut y1) = (first[0], first[0], first[1], first[1]);
    for p in &xy[1..] {
        x0 = x0.min(p[0]);
        x1 = x1.max(p[0]);
        y0 = y0.min(p[1]);
        y1 = y1.max(p[1]);
    }
    (x1 - x0) * (y1 - y0)
}

#[inline]
fn cross(o: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// Convex hull vertices in counter-clockwise order.
///
/// Collinear points on hull edges are dropped; fully collinear input
/// collapses to its two end points.
pub fn convex_hull(xy: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut pts = xy.to_vec();
    pts.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
    pts.dedup();

    if pts.len() < 3 {
        return pts;
    }

    let mut hull: Vec<[f64; 2]> = Vec::with_capacity(pts.len() * 2);

    // lower chain
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }

    // upper chain
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }

    hull.pop();
    hull
}

/// Shoelace area of a simple polygon; fewer than 3 vertices is 0.0.
pub fn polygon_area(vertices: &[[f64; 2]]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let twice: f64 = vertices
        .iter()
        .zip(vertices.iter().cycle().skip(1))
        .map(|(a, b)| a[0] * b[1] - b[0] * a[1])
        .sum();
    twice.abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convex_hull_square_with_interior() {
        let pts = [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [1.0, 1.0], [0.5, 1.5]];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&[1.0, 1.0]));
        assert_eq!(polygon_area(&hull), 4.0);
    }

    #[test]
    fn test_convex_hull_collinear() {
        let pts = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let hull = convex_hull(&pts);
        assert_eq!(hull, vec![[0.0, 0.0], [4.0, 4.0]]);
        assert_eq!(ConvexHullEstimator.area(&pts), Some(0.0));
    }

    #[test]
    fn test_convex_hull_duplicates() {
        let pts = [[1.0, 1.0]; 4];
        assert_eq!(convex_hull(&pts), vec![[1.0, 1.0]]);
        assert_eq!(ConvexHullEstimator.area(&pts), Some(0.0));
    }

    #[test]
    fn test_triangle_area() {
        let pts = [[0.0, 0.0], [4.0, 0.0], [0.0, 3.0]];
        assert_eq!(ConvexHullEstimator.area(&pts), Some(6.0));
        assert_eq!(BoundingBoxEstimator.area(&pts), Some(12.0));
    }

    #[test]
    fn test_hull_rejects_non_finite() {
        let pts = [[0.0, 0.0], [f64::NAN, 1.0], [1.0, 0.0]];
        assert_eq!(ConvexHullEstimator.area(&pts), None);
    }

    #[test]
    fn test_bbox_area() {
        assert_eq!(bbox_area(&[]), 0.0);
        assert_eq!(bbox_area(&[[1.0, 1.0], [3.0, 2.0], [2.0, 5.0]]), 8.0);
        // diagonal line: nonzero box even though the hull is degenerate
        assert_eq!(bbox_area(&[[0.0, 0.0], [2.0, 2.0]]), 4.0);
    }

    #[test]
    fn test_estimator_for() {
        assert_eq!(estimator_for(FootprintMethod::ConvexHull).name(), "convex_hull");
        assert_eq!(estimator_for(FootprintMethod::BoundingBox).name(), "bounding_box");
    }
}
