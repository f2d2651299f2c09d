//! Plot-level aggregates over tree records and the templated narrative.

use serde::{Deserialize, Serialize};

use super::features::TreeFeatures;

/// Aggregate statistics over one batch of tree records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSummary {
    pub num_trees: usize,
    pub avg_height: f64,
    pub max_height: f64,
    /// Mean footprint over trees with a non-zero footprint
    pub avg_footprint: f64,
    /// Points carried by the summarized trees
    pub total_points: usize,
    /// Trees whose footprint collapsed to zero
    pub degenerate_trees: usize,
}

/// Summarize a batch; an empty batch gives all-zero statistics.
pub fn summarize(features: &[TreeFeatures]) -> PlotSummary {
    let num_trees = features.len();
    if num_trees == 0 {
        return PlotSummary {
            num_trees: 0,
            avg_height: 0.0,
            max_height: 0.0,
            avg_footprint: 0.0,
            total_points: 0,
            degenerate_trees: 0,
        };
    }

    let avg_height = features.iter().map(|f| f.height).sum::<f64>() / num_trees as f64;
    let max_height = features.iter().map(|f| f.height).fold(0.0, f64::max);

    let footprints: Vec<f64> = features
        .iter()
        .map(|f| f.footprint)
        .filter(|&a| a > 0.0)
        .collect();
    let avg_footprint = if footprints.is_empty() {
        0.0
    } else {
        footprints.iter().sum::<f64>() / footprints.len() as f64
    };

    PlotSummary {
        num_trees,
        avg_height,
        max_height,
        avg_footprint,
        total_points: features.iter().map(|f| f.point_count).sum(),
        degenerate_trees: features.iter().filter(|f| f.is_degenerate()).count(),
    }
}

/// Deterministic plain-text narrative for a summary.
///
/// This is the text a report falls back to when no generated narrative is
/// available.
pub fn narrative(summary: &PlotSummary) -> String {
    if summary.num_trees == 0 {
        return "No tree crowns were detected in this plot. Check the segmentation \
                radius and minimum sample count against the point density."
            .to_string();
    }

    let mut text = format!(
        "This stand contains approximately {} trees with an average height of {:.1} m \
         (tallest {:.1} m) and a mean crown footprint of {:.1} m².",
        summary.num_trees, summary.avg_height, summary.max_height, summary.avg_footprint
    );
    if summary.degenerate_trees > 0 {
        text.push_str(&format!(
            " {} crown(s) had a collapsed footprint and report unbounded density.",
            summary.degenerate_trees
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(height: f64, footprint: f64, point_count: usize) -> TreeFeatures {
        TreeFeatures {
            label: 0,
            height,
            point_count,
            footprint,
            p95_height: height,
            p50_height: height / 2.0,
            density: if footprint > 0.0 {
                point_count as f64 / footprint
            } else {
                f64::INFINITY
            },
            centroid_x: 0.0,
            centroid_y: 0.0,
        }
    }

    #[test]
    fn test_summarize() {
        let s = summarize(&[tree(10.0, 4.0, 20), tree(20.0, 8.0, 30), tree(6.0, 0.0, 5)]);
        assert_eq!(s.num_trees, 3);
        assert_eq!(s.avg_height, 12.0);
        assert_eq!(s.max_height, 20.0);
        assert_eq!(s.avg_footprint, 6.0);
        assert_eq!(s.total_points, 55);
        assert_eq!(s.degenerate_trees, 1);
    }

    #[test]
    fn test_summarize_empty() {
        let s = summarize(&[]);
        assert_eq!(s.num_trees, 0);
        assert_eq!(s.avg_height, 0.0);
    }

    #[test]
    fn test_narrative() {
        let s = summarize(&[tree(10.0, 4.0, 20), tree(20.0, 8.0, 30)]);
        let text = narrative(&s);
        assert!(text.starts_with("This stand contains approximately 2 trees"));
        assert!(text.contains("average height of 15.0 m"));
        assert!(!text.contains("collapsed"));

        let empty = narrative(&summarize(&[]));
        assert!(empty.starts_with("No tree crowns"));
    }
}
