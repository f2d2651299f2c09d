//! End-to-end plot analysis: segmentation, tree records and canopy raster.
//!
//! [`analyze_plot`] is the in-memory composition. [`process_plot`] wraps it
//! with loading and writes every artifact next to each other under one stem.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use super::chm::{compute_chm, ChmGrid};
use super::error::Result;
use super::export::features_to_geojson;
use super::features::{extract_features_with, TreeFeatures};
use super::footprint::estimator_for;
use super::geometry::Point;
use super::segmentation::{count_clusters, noise_count, segment};
use super::summary::{summarize, PlotSummary};
use crate::config::PipelineConfig;
use crate::core::loaders::load_points;
use crate::core::transforms::subsample_points;
use crate::core::writers::{
    write_chm_csv, write_features_csv, write_features_json, write_geojson, write_json,
    write_labels_csv,
};

/// Everything derived from one plot.
#[derive(Debug, Clone)]
pub struct PlotAnalysis {
    /// Points that were segmented (capped at `segmentation.max_points`)
    pub points: Vec<Point>,
    /// Labels aligned with `points`
    pub labels: Vec<i32>,
    /// One record per retained crown, ascending label
    pub features: Vec<TreeFeatures>,
    /// Canopy height model over the full input
    pub chm: ChmGrid,
    pub summary: PlotSummary,
    /// Approximate subsampling ratio (1 = none)
    pub stride: usize,
}

/// Run segmentation, feature extraction and CHM rasterization on one plot.
///
/// The point cap applies to segmentation only; the CHM always sees every
/// input point.
///
/// # Errors
///
/// Propagates [`ProcessingError`](super::error::ProcessingError) from the
/// core steps, including `EmptyInput` for an empty plot.
pub fn analyze_plot(points: &[Point], config: &PipelineConfig) -> Result<PlotAnalysis> {
    let seg = &config.segmentation;

    let chm = compute_chm(points, config.chm.cell_size)?;

    let (sampled, stride) = subsample_points(points, seg.max_points, seg.seed);
    let labels = segment(&sampled, seg.eps, seg.min_samples)?;

    let estimator = estimator_for(config.features.footprint);
    let features = extract_features_with(&sampled, &labels, estimator.as_ref())?;
    let summary = summarize(&features);

    log::info!(
        "Plot: {} points, {} crowns ({} kept), {} noise, CHM {}x{}",
        sampled.len(),
        count_clusters(&labels),
        features.len(),
        noise_count(&labels),
        chm.nx(),
        chm.ny()
    );

    Ok(PlotAnalysis {
        points: sampled,
        labels,
        features,
        chm,
        summary,
        stride,
    })
}

/// Paths of the files written by [`write_artifacts`].
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactPaths {
    pub labels_csv: PathBuf,
    pub features_csv: PathBuf,
    pub features_json: PathBuf,
    pub geojson: PathBuf,
    pub chm_csv: PathBuf,
    pub summary_json: PathBuf,
}

/// Summary report written alongside the other artifacts.
#[derive(Debug, Serialize)]
struct Report<'a> {
    summary: &'a PlotSummary,
    narrative: String,
    chm_shape: (usize, usize),
    chm_max_height: f64,
    stride: usize,
}

/// Write every artifact of an analysis as `<dir>/<stem>_*.{csv,json,geojson}`.
pub fn write_artifacts(
    analysis: &PlotAnalysis,
    dir: &Path,
    stem: &str,
) -> anyhow::Result<ArtifactPaths> {
    let paths = ArtifactPaths {
        labels_csv: dir.join(format!("{}_crown_labels.csv", stem)),
        features_csv: dir.join(format!("{}_trees.csv", stem)),
        features_json: dir.join(format!("{}_trees.json", stem)),
        geojson: dir.join(format!("{}_trees.geojson", stem)),
        chm_csv: dir.join(format!("{}_chm.csv", stem)),
        summary_json: dir.join(format!("{}_summary.json", stem)),
    };

    write_labels_csv(&paths.labels_csv, &analysis.points, &analysis.labels)?;
    write_features_csv(&paths.features_csv, &analysis.features)?;
    write_features_json(&paths.features_json, &analysis.features)?;

    let collection = features_to_geojson(&analysis.features)?;
    write_geojson(&paths.geojson, &collection)?;

    write_chm_csv(&paths.chm_csv, &analysis.chm)?;

    let report = Report {
        summary: &analysis.summary,
        narrative: super::summary::narrative(&analysis.summary),
        chm_shape: analysis.chm.shape(),
        chm_max_height: analysis.chm.max_height(),
        stride: analysis.stride,
    };
    write_json(&paths.summary_json, &report)?;

    log::info!("Artifacts -> {}", dir.display());
    Ok(paths)
}

/// Load a point file, analyze it and write all artifacts.
///
/// # Arguments
///
/// * `input_path` - CSV, PLY or LAS/LAZ point file
/// * `output_dir` - Output directory (defaults to `config.output.artifacts_dir`)
/// * `config` - Pipeline configuration
///
/// # Returns
///
/// Tuple of (written artifact paths, analysis).
pub fn process_plot(
    input_path: &Path,
    output_dir: Option<&Path>,
    config: &PipelineConfig,
) -> anyhow::Result<(ArtifactPaths, PlotAnalysis)> {
    let cloud = load_points(input_path, &config.input)
        .with_context(|| format!("loading {}", input_path.display()))?;

    let analysis = analyze_plot(&cloud.to_points(), config)
        .with_context(|| format!("analyzing {}", input_path.display()))?;

    let out_dir = output_dir.unwrap_or(config.output.artifacts_dir.as_path());
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("plot");

    let paths = write_artifacts(&analysis, out_dir, stem)?;
    Ok((paths, analysis))
}
