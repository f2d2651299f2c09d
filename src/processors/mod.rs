//! Point set processing: geometry, segmentation, rasterization and features.

pub mod chm;
pub mod error;
pub mod export;
pub mod features;
pub mod footprint;
pub mod geometry;
pub mod pipeline;
pub mod segmentation;
pub mod summary;
pub mod synthetic;

// Re-export key types for convenience
pub use chm::{compute_chm, ChmGrid};
pub use error::{ProcessingError, Result};
pub use export::{features_to_geojson, ExportError};
pub use features::{extract_features, extract_features_with, TreeFeatures};
pub use footprint::{estimator_for, BoundingBoxEstimator, ConvexHullEstimator, FootprintEstimator};
pub use geometry::{bbox, great_circle_distance, height_from_points, percentile, BoundingBox, Point};
pub use pipeline::{analyze_plot, process_plot, PlotAnalysis};
pub use segmentation::{segment, segment_cloud, NOISE};
pub use summary::{narrative, summarize, PlotSummary};
pub use synthetic::{synthetic_plot, SyntheticPlotConfig};
