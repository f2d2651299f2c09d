//! Writers for segmentation labels, tree records and canopy rasters.
//!
//! This module provides functions for writing results to various file formats:
//! - CSV with labeled coordinates for segmentation results
//! - PLY (ASCII) with per-point RGB colors
//! - Tree feature records as CSV or JSON
//! - GeoJSON documents
//! - Canopy height grids as CSV

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use super::loaders::PointCloud;
use crate::processors::chm::ChmGrid;
use crate::processors::features::TreeFeatures;
use crate::processors::geometry::Point;

/// Default color for points when no colors are specified (light gray).
const DEFAULT_COLOR: [u8; 3] = [180, 180, 180];

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// JSON serialization error.
    #[error("JSON write error for '{path}': {source}")]
    JsonError {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Mismatched array lengths.
    #[error("array length mismatch: coords has {coords_len} elements, labels has {labels_len} elements")]
    LengthMismatch { coords_len: usize, labels_len: usize },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path, creating parents first.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

fn write_err(path: &Path) -> impl Fn(std::io::Error) -> WriteError + '_ {
    move |source| WriteError::WriteFile {
        path: path.display().to_string(),
        source,
    }
}

fn csv_err(path: &Path) -> impl Fn(csv::Error) -> WriteError + '_ {
    move |source| WriteError::CsvError {
        path: path.display().to_string(),
        source,
    }
}

/// Write labeled coordinates to CSV.
///
/// Creates a CSV file with headers "x,y,z,label" containing one row per
/// point with its crown label (-1 = noise).
///
/// # Errors
///
/// Returns an error if:
/// - `points` and `labels` have different lengths
/// - Parent directories cannot be created
/// - File cannot be created or written to
///
/// # Example
///
/// ```no_run
/// use canopy_pipeline::core::writers::write_labels_csv;
/// use std::path::Path;
///
/// let points = vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
/// let labels = vec![0i32, -1];
/// write_labels_csv(Path::new("labels.csv"), &points, &labels).unwrap();
/// ```
pub fn write_labels_csv(path: &Path, points: &[Point], labels: &[i32]) -> Result<()> {
    if points.len() != labels.len() {
        return Err(WriteError::LengthMismatch {
            coords_len: points.len(),
            labels_len: labels.len(),
        });
    }

    let mut csv_writer = csv::Writer::from_writer(create_buffered_writer(path)?);

    csv_writer
        .write_record(["x", "y", "z", "label"])
        .map_err(csv_err(path))?;

    for (p, label) in points.iter().zip(labels) {
        csv_writer
            .write_record(&[
                p[0].to_string(),
                p[1].to_string(),
                p[2].to_string(),
                label.to_string(),
            ])
            .map_err(csv_err(path))?;
    }

    csv_writer.flush().map_err(write_err(path))?;
    Ok(())
}

/// Write a point cloud to an ASCII PLY file with RGB colors.
///
/// If the cloud has no colors, a default light gray (180, 180, 180) is used.
pub fn write_ply(path: &Path, cloud: &PointCloud) -> Result<()> {
    let mut writer = create_buffered_writer(path)?;
    let err = write_err(path);

    let header = format!(
        "ply\nformat ascii 1.0\nelement vertex {}\n\
         property double x\nproperty double y\nproperty double z\n\
         property uchar red\nproperty uchar green\nproperty uchar blue\nend_header",
        cloud.len()
    );
    writeln!(writer, "{}", header).map_err(&err)?;

    for i in 0..cloud.len() {
        let [r, g, b] = cloud
            .colors
            .as_ref()
            .and_then(|c| c.get(i).copied())
            .unwrap_or(DEFAULT_COLOR);

        writeln!(
            writer,
            "{} {} {} {} {} {}",
            cloud.x[i], cloud.y[i], cloud.z[i], r, g, b
        )
        .map_err(&err)?;
    }

    writer.flush().map_err(&err)?;
    Ok(())
}

/// Write tree records as CSV, one row per tree in record order.
///
/// An infinite density is written as an empty field.
pub fn write_features_csv(path: &Path, features: &[TreeFeatures]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(create_buffered_writer(path)?);

    if features.is_empty() {
        // serde only emits headers alongside the first record
        csv_writer
            .write_record([
                "label",
                "height",
                "point_count",
                "footprint",
                "p95_height",
                "p50_height",
                "density",
                "centroid_x",
                "centroid_y",
            ])
            .map_err(csv_err(path))?;
    }

    for tree in features {
        csv_writer.serialize(tree).map_err(csv_err(path))?;
    }

    csv_writer.flush().map_err(write_err(path))?;
    Ok(())
}

/// Write any serializable value as pretty-printed JSON.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut writer = create_buffered_writer(path)?;

    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| WriteError::JsonError {
        path: path.display().to_string(),
        source: e,
    })?;
    writeln!(writer).map_err(write_err(path))?;
    writer.flush().map_err(write_err(path))?;
    Ok(())
}

/// Write tree records as a JSON array (infinite density becomes `null`).
pub fn write_features_json(path: &Path, features: &[TreeFeatures]) -> Result<()> {
    write_json(path, features)
}

/// Write a GeoJSON document.
pub fn write_geojson(path: &Path, collection: &serde_json::Value) -> Result<()> {
    write_json(path, collection)
}

/// Write a canopy height grid as CSV with one row per cell.
///
/// Columns are `ix,iy,x,y,height`, with `x`/`y` at the cell center. Rows run
/// x-major (all `iy` for `ix = 0`, then `ix = 1`, ...).
pub fn write_chm_csv(path: &Path, grid: &ChmGrid) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(create_buffered_writer(path)?);

    csv_writer
        .write_record(["ix", "iy", "x", "y", "height"])
        .map_err(csv_err(path))?;

    for ix in 0..grid.nx() {
        for iy in 0..grid.ny() {
            let (x, y) = grid.cell_center(ix, iy);
            let height = grid.get(ix, iy).unwrap_or(0.0);
            csv_writer
                .write_record(&[
                    ix.to_string(),
                    iy.to_string(),
                    format!("{:.6}", x),
                    format!("{:.6}", y),
                    format!("{:.6}", height),
                ])
                .map_err(csv_err(path))?;
        }
    }

    csv_writer.flush().map_err(write_err(path))?;
    Ok(())
}
