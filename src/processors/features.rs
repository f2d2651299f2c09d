//! Per-tree structural features from labelled points.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{ProcessingError, Result};
use super::footprint::{bbox_area, ConvexHullEstimator, FootprintEstimator};
use super::geometry::{height_from_points, percentile_of_sorted, Point};

/// Clusters with fewer members than this are dropped without error.
pub const MIN_CLUSTER_POINTS: usize = 3;

/// Structural summary of one crown cluster.
///
/// Field names are the exchange format shared with export and reporting.
/// `density` is `f64::INFINITY` when `footprint` is exactly 0 (collinear
/// members); callers must branch on that sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeFeatures {
    pub label: u32,
    pub height: f64,
    pub point_count: usize,
    pub footprint: f64,
    pub p95_height: f64,
    pub p50_height: f64,
    #[serde(with = "density_serde")]
    pub density: f64,
    pub centroid_x: f64,
    pub centroid_y: f64,
}

impl TreeFeatures {
    /// True when the footprint collapsed and density is the infinite sentinel.
    pub fn is_degenerate(&self) -> bool {
        self.density.is_infinite()
    }
}

/// Infinite density is written as an empty value / null.
mod density_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

/// Extract features with the convex hull footprint estimator.
///
/// See [`extract_features_with`].
pub fn extract_features(points: &[Point], labels: &[i32]) -> Result<Vec<TreeFeatures>> {
    extract_features_with(points, labels, &ConvexHullEstimator)
}

/// Build one [`TreeFeatures`] per non-noise cluster with at least
/// [`MIN_CLUSTER_POINTS`] members, ordered by ascending label.
///
/// # Arguments
///
/// * `points` - The segmented point set
/// * `labels` - Cluster labels aligned with `points` (-1 = noise)
/// * `estimator` - Footprint strategy; the bounding-box area is used when it returns `None`
///
/// # Errors
///
/// Returns [`ProcessingError::InvalidParameter`] when `labels` and `points`
/// differ in length. An input with no qualifying cluster yields an empty vec.
pub fn extract_features_with(
    points: &[Point],
    labels: &[i32],
    estimator: &dyn FootprintEstimator,
) -> Result<Vec<TreeFeatures>> {
    if points.len() != labels.len() {
        return Err(ProcessingError::invalid(
            "labels",
            format!(
                "expected {} labels to match the point count, got {}",
                points.len(),
                labels.len()
            ),
        ));
    }

    let mut members: BTreeMap<i32, Vec<Point>> = BTreeMap::new();
    for (p, &label) in points.iter().zip(labels) {
        if label >= 0 {
            members.entry(label).or_default().push(*p);
        }
    }

    let mut skipped = 0usize;
    let mut features = Vec::with_capacity(members.len());

    for (label, pts) in members {
        if pts.len() < MIN_CLUSTER_POINTS {
            skipped += 1;
            continue;
        }
        features.push(cluster_features(label as u32, &pts, estimator));
    }

    log::debug!(
        "extract_features: {} trees, {} clusters below the {}-point floor (footprint={})",
        features.len(),
        skipped,
        MIN_CLUSTER_POINTS,
        estimator.name()
    );

    Ok(features)
}

fn cluster_features(label: u32, pts: &[Point], estimator: &dyn FootprintEstimator) -> TreeFeatures {
    let n = pts.len();

    let mut z: Vec<f64> = pts.iter().map(|p| p[2]).collect();
    z.sort_by(f64::total_cmp);

    let xy: Vec<[f64; 2]> = pts.iter().map(|p| [p[0], p[1]]).collect();
    let footprint = estimator.area(&xy).unwrap_or_else(|| bbox_area(&xy));
    let density = if footprint > 0.0 {
        n as f64 / footprint
    } else {
        f64::INFINITY
    };

    let (sum_x, sum_y) = pts
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));

    TreeFeatures {
        label,
        height: height_from_points(pts),
        point_count: n,
        footprint,
        p95_height: percentile_of_sorted(&z, 95.0),
        p50_height: percentile_of_sorted(&z, 50.0),
        density,
        centroid_x: sum_x / n as f64,
        centroid_y: sum_y / n as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::footprint::BoundingBoxEstimator;
    use crate::processors::segmentation::segment;
    use crate::processors::synthetic::{grid_centers, synthetic_plot_around, SyntheticPlotConfig};

    struct Unavailable;

    impl FootprintEstimator for Unavailable {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        fn area(&self, _xy: &[[f64; 2]]) -> Option<f64> {
            None
        }
    }

    fn square_cluster(cx: f64, cy: f64) -> Vec<Point> {
        vec![
            [cx, cy, 0.0],
            [cx + 2.0, cy, 5.0],
            [cx + 2.0, cy + 2.0, 10.0],
            [cx, cy + 2.0, 15.0],
            [cx + 1.0, cy + 1.0, 20.0],
        ]
    }

    #[test]
    fn test_basic_record() {
        let pts = square_cluster(10.0, 20.0);
        let labels = vec![4; 5];
        let feats = extract_features(&pts, &labels).unwrap();

        assert_eq!(feats.len(), 1);
        let f = &feats[0];
        assert_eq!(f.label, 4);
        assert_eq!(f.point_count, 5);
        assert_eq!(f.footprint, 4.0);
        assert_eq!(f.density, 1.25);
        assert_eq!(f.centroid_x, 11.0);
        assert_eq!(f.centroid_y, 21.0);
        assert_eq!(f.p50_height, 10.0);
        // rank 0.95 * 4 = 3.8 -> 15 + 0.8 * 5
        assert!((f.p95_height - 19.0).abs() < 1e-12);
        // max 20 minus p5 (rank 0.2 -> 1.0)
        assert!((f.height - 19.0).abs() < 1e-12);
        assert!(!f.is_degenerate());
    }

    #[test]
    fn test_noise_and_small_clusters_are_skipped() {
        let mut pts = square_cluster(0.0, 0.0);
        let mut labels = vec![0; 5];

        // two-point cluster: below the floor
        pts.push([50.0, 50.0, 3.0]);
        pts.push([50.5, 50.0, 4.0]);
        labels.extend([1, 1]);

        // noise points, even many of them, never form a record
        for i in 0..10 {
            pts.push([i as f64, 80.0, 1.0]);
            labels.push(-1);
        }

        let feats = extract_features(&pts, &labels).unwrap();
        assert_eq!(feats.len(), 1);
        assert_eq!(feats[0].label, 0);
    }

    #[test]
    fn test_collinear_cluster_is_degenerate() {
        let pts: Vec<Point> = (0..5).map(|i| [i as f64, i as f64 * 2.0, 10.0 + i as f64]).collect();
        let labels = vec![2; 5];

        let feats = extract_features(&pts, &labels).unwrap();
        assert_eq!(feats.len(), 1);
        assert_eq!(feats[0].footprint, 0.0);
        assert_eq!(feats[0].density, f64::INFINITY);
        assert!(feats[0].is_degenerate());
    }

    #[test]
    fn test_fallback_to_bbox_when_estimator_unavailable() {
        let pts = vec![[0.0, 0.0, 1.0], [4.0, 0.0, 1.0], [0.0, 3.0, 1.0]];
        let labels = vec![0; 3];

        let feats = extract_features_with(&pts, &labels, &Unavailable).unwrap();
        assert_eq!(feats[0].footprint, 12.0);

        let hull = extract_features(&pts, &labels).unwrap();
        assert_eq!(hull[0].footprint, 6.0);

        let bbox = extract_features_with(&pts, &labels, &BoundingBoxEstimator).unwrap();
        assert_eq!(bbox[0].footprint, 12.0);
    }

    #[test]
    fn test_records_sorted_by_label() {
        let mut pts = square_cluster(0.0, 0.0);
        pts.extend(square_cluster(30.0, 0.0));
        let mut labels = vec![9; 5];
        labels.extend([3; 5]);

        let feats = extract_features(&pts, &labels).unwrap();
        let order: Vec<u32> = feats.iter().map(|f| f.label).collect();
        assert_eq!(order, vec![3, 9]);
        assert_eq!(feats[0].centroid_x, 31.0);
    }

    #[test]
    fn test_empty_and_all_noise() {
        assert!(extract_features(&[], &[]).unwrap().is_empty());

        let pts = square_cluster(0.0, 0.0);
        assert!(extract_features(&pts, &[-1; 5]).unwrap().is_empty());
    }

    #[test]
    fn test_label_length_mismatch() {
        let pts = square_cluster(0.0, 0.0);
        assert!(matches!(
            extract_features(&pts, &[0, 0]),
            Err(ProcessingError::InvalidParameter { name: "labels", .. })
        ));
    }

    #[test]
    fn test_density_json_sentinel() {
        let pts: Vec<Point> = (0..3).map(|i| [i as f64, 0.0, 1.0]).collect();
        let feats = extract_features(&pts, &[0, 0, 0]).unwrap();

        let json = serde_json::to_string(&feats[0]).unwrap();
        assert!(json.contains("\"density\":null"));

        let back: TreeFeatures = serde_json::from_str(&json).unwrap();
        assert_eq!(back.density, f64::INFINITY);
    }

    #[test]
    fn test_segment_then_extract_round_trip() {
        let config = SyntheticPlotConfig {
            clusters: 20,
            points_per_cluster: 80,
            ..SyntheticPlotConfig::default()
        };
        // 5 x 4 grid, 25 m apart: crowns with 1 m jitter never touch at eps = 2
        let centers = grid_centers(20, 25.0);
        let points = synthetic_plot_around(&centers, &config);
        assert_eq!(points.len(), 1600);

        let labels = segment(&points, 2.0, 5).unwrap();
        let feats = extract_features(&points, &labels).unwrap();

        assert_eq!(feats.len(), 20);
        for f in &feats {
            assert!(f.point_count >= 70 && f.point_count <= 80, "count {}", f.point_count);
            assert!(f.footprint > 0.0);
            assert!(f.density.is_finite());
            assert!(f.height >= 0.0);
            assert!(f.p95_height >= f.p50_height);
        }

        let total: usize = feats.iter().map(|f| f.point_count).sum();
        let clustered = labels.iter().filter(|&&l| l >= 0).count();
        assert_eq!(total, clustered);
    }
}
