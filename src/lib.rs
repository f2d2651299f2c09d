//! Forest point cloud pipeline: crown segmentation, canopy height models and
//! per-tree structural features.
//!
//! This crate provides tools for:
//! - Loading point sets from CSV and ASCII PLY files
//! - DBSCAN crown segmentation in the horizontal plane (parallelized)
//! - Canopy Height Model rasterization
//! - Per-tree feature records with CSV, JSON and GeoJSON export
//!
//! # Example
//!
//! ```no_run
//! use canopy_pipeline::processors::{compute_chm, extract_features, segment};
//!
//! let points = vec![[0.0, 0.0, 12.0], [0.5, 0.2, 14.0], [0.2, 0.6, 13.0]];
//! let labels = segment(&points, 2.0, 3).unwrap();
//! let trees = extract_features(&points, &labels).unwrap();
//! let chm = compute_chm(&points, 1.0).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{
    ChmConfig, FeatureConfig, FootprintMethod, InputConfig, OutputConfig, PipelineConfig,
    SegmentationConfig,
};
pub use core::loaders::PointCloud;
pub use processors::{ChmGrid, Point, ProcessingError, TreeFeatures};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
