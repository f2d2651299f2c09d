//! Point set loaders for CSV, ASCII PLY and LAS/LAZ files.
//!
//! This module provides parsers for:
//! - Point CSV files (x, y, z columns, extra columns ignored)
//! - ASCII PLY point cloud files (x, y, z vertex properties)
//! - LAS and LAZ LiDAR files (scaled x, y, z of every point record)
//!
//! [`load_points`] picks the parser from the file extension and refuses
//! files above the configured size limit before reading them.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use las::Read as _;
use thiserror::Error;

use crate::config::InputConfig;
use crate::processors::features::TreeFeatures;
use crate::processors::geometry::Point;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("LAS error: {0}")]
    Las(#[from] las::Error),

    #[error("Invalid PLY file: {0}")]
    InvalidPly(String),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported file type '{extension}' for {path} (expected .csv, .ply, .las or .laz)")]
    UnsupportedExtension { path: PathBuf, extension: String },

    #[error("{path} is {size_mb:.1} MB, above the {limit_mb} MB input limit")]
    TooLarge {
        path: PathBuf,
        size_mb: f64,
        limit_mb: f64,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Container for 3D point data in structure-of-arrays layout.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    /// X coordinates of all points.
    pub x: Vec<f64>,
    /// Y coordinates of all points.
    pub y: Vec<f64>,
    /// Z coordinates of all points.
    pub z: Vec<f64>,
    /// Optional RGB colors, set by callers that render the cloud to PLY.
    /// Loaders leave this `None`.
    pub colors: Option<Vec<[u8; 3]>>,
}

impl PointCloud {
    /// Creates a new empty point cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new point cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            colors: None,
        }
    }

    /// Builds a cloud from `[x, y, z]` rows.
    pub fn from_points(points: &[Point]) -> Self {
        let mut cloud = Self::with_capacity(points.len());
        for p in points {
            cloud.push(p[0], p[1], p[2]);
        }
        cloud
    }

    /// Returns the number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Converts the cloud to `[x, y, z]` rows.
    pub fn to_points(&self) -> Vec<Point> {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((&x, &y), &z)| [x, y, z])
            .collect()
    }

    /// Adds a point to the cloud.
    #[inline]
    pub fn push(&mut self, x: f64, y: f64, z: f64) {
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
    }
}

fn parse_field(value: Option<&str>, column: &str, row: usize) -> Result<f64> {
    let raw = value.ok_or_else(|| {
        LoaderError::ParseError(format!("row {}: missing '{}' value", row, column))
    })?;
    raw.trim().parse().map_err(|_| {
        LoaderError::ParseError(format!("row {}: invalid {} value '{}'", row, column, raw))
    })
}

/// Load a point set from a CSV file with x, y, z columns.
///
/// The CSV must have a header row. Columns named `x`, `y`, `z`
/// (case-insensitive) are used when present, otherwise the first three
/// columns. Blank lines are skipped; an unparsable coordinate is an error.
///
/// # Errors
///
/// Returns an error if the file cannot be read, has fewer than three
/// columns, holds a malformed value, or has no data rows.
pub fn load_xyz_csv<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let col_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_lowercase(), i))
        .collect();

    let named = ["x", "y", "z"].iter().all(|c| col_map.contains_key(*c));
    if !named && headers.len() < 3 {
        return Err(LoaderError::MissingColumns(format!(
            "{} needs x, y, z columns",
            path.display()
        )));
    }
    let (x_idx, y_idx, z_idx) = if named {
        (col_map["x"], col_map["y"], col_map["z"])
    } else {
        (0, 1, 2)
    };

    let mut cloud = PointCloud::with_capacity(10_000);

    for (row, result) in reader.records().enumerate() {
        let record = result?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        // header is line 1
        let line = row + 2;
        let x = parse_field(record.get(x_idx), "x", line)?;
        let y = parse_field(record.get(y_idx), "y", line)?;
        let z = parse_field(record.get(z_idx), "z", line)?;
        cloud.push(x, y, z);
    }

    if cloud.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(cloud)
}

/// Load a point cloud from an ASCII PLY file.
///
/// Only the x, y, z properties of the vertex element are read; any other
/// vertex properties (colors, normals, intensity) are skipped.
///
/// # Errors
///
/// Returns an error if the file is not an ASCII PLY, lacks x/y/z properties,
/// or holds fewer vertices than its header declares.
pub fn load_ply<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let first_line = lines
        .next()
        .ok_or_else(|| LoaderError::InvalidPly("Empty file".to_string()))??;

    if !first_line.trim().starts_with("ply") {
        return Err(LoaderError::InvalidPly(format!(
            "{} is not a PLY file",
            path.display()
        )));
    }

    let mut num_vertices: Option<usize> = None;
    let mut prop_names: Vec<String> = Vec::new();
    let mut in_vertex_element = false;
    let mut header_done = false;

    for line in &mut lines {
        let line = line?;
        let stripped = line.trim();

        if stripped.starts_with("format") && !stripped.contains("ascii") {
            return Err(LoaderError::InvalidPly(format!(
                "only ASCII PLY is supported, got '{}'",
                stripped
            )));
        } else if stripped.starts_with("element") {
            in_vertex_element = stripped.starts_with("element vertex");
            if in_vertex_element {
                num_vertices = stripped
                    .split_whitespace()
                    .last()
                    .and_then(|count| count.parse().ok());
            }
        } else if stripped.starts_with("property") && in_vertex_element {
            if let Some(name) = stripped.split_whitespace().last() {
                prop_names.push(name.to_string());
            }
        } else if stripped == "end_header" {
            header_done = true;
            break;
        }
    }

    if !header_done {
        return Err(LoaderError::InvalidPly("Missing end_header".to_string()));
    }
    let num_vertices = num_vertices
        .ok_or_else(|| LoaderError::InvalidPly("No vertex count in header".to_string()))?;

    let prop_idx: HashMap<&str, usize> = prop_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let index_of = |name: &str| {
        prop_idx
            .get(name)
            .copied()
            .ok_or_else(|| LoaderError::MissingColumns(name.to_string()))
    };
    let x_idx = index_of("x")?;
    let y_idx = index_of("y")?;
    let z_idx = index_of("z")?;

    let mut cloud = PointCloud::with_capacity(num_vertices);

    for line in lines {
        if cloud.len() >= num_vertices {
            break;
        }

        let line = line?;
        let values: Vec<&str> = line.split_whitespace().collect();
        if values.len() < prop_names.len() {
            continue;
        }

        let coord = |idx: usize, axis: &str| -> Result<f64> {
            values[idx]
                .parse()
                .map_err(|_| LoaderError::ParseError(format!("Invalid {} value: {}", axis, values[idx])))
        };
        cloud.push(coord(x_idx, "x")?, coord(y_idx, "y")?, coord(z_idx, "z")?);
    }

    if cloud.len() < num_vertices {
        return Err(LoaderError::InvalidPly(format!(
            "Expected {} vertices, found {}",
            num_vertices,
            cloud.len()
        )));
    }
    if cloud.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }
    Ok(cloud)
}

/// Load a point cloud from a LAS or LAZ file.
///
/// Coordinates come back with the header's scale and offset applied. Point
/// attributes other than x, y, z (classification, returns, intensity) are
/// not kept.
pub fn load_las<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let mut reader = las::Reader::from_path(path)?;

    let declared = reader.header().number_of_points() as usize;
    let mut cloud = PointCloud::with_capacity(declared);
    for point in reader.points() {
        let point = point?;
        cloud.push(point.x, point.y, point.z);
    }

    if cloud.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }
    Ok(cloud)
}

/// Load a labels CSV written by segmentation (`x,y,z,label`).
///
/// # Returns
///
/// Tuple of (points, labels) in file order.
pub fn load_labels_csv<P: AsRef<Path>>(path: P) -> Result<(Vec<Point>, Vec<i32>)> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| LoaderError::MissingColumns(name.to_string()))
    };
    let (x_idx, y_idx, z_idx, label_idx) = (find("x")?, find("y")?, find("z")?, find("label")?);

    let mut points = Vec::new();
    let mut labels = Vec::new();

    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let line = row + 2;
        points.push([
            parse_field(record.get(x_idx), "x", line)?,
            parse_field(record.get(y_idx), "y", line)?,
            parse_field(record.get(z_idx), "z", line)?,
        ]);
        let raw = record.get(label_idx).unwrap_or_default();
        let label = raw.parse().map_err(|_| {
            LoaderError::ParseError(format!("row {}: invalid label '{}'", line, raw))
        })?;
        labels.push(label);
    }

    if points.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }
    Ok((points, labels))
}

/// Load tree records written as a JSON array.
pub fn load_features_json<P: AsRef<Path>>(path: P) -> Result<Vec<TreeFeatures>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| LoaderError::ParseError(format!("{}: {}", path.display(), e)))
}

/// Load a point file, choosing the parser from its extension.
///
/// `.csv` goes to [`load_xyz_csv`], `.ply` to [`load_ply`] and `.las`/`.laz`
/// to [`load_las`] (case-insensitive). Files larger than `config.max_input_mb` are rejected
/// without being parsed.
pub fn load_points<P: AsRef<Path>>(path: P, config: &InputConfig) -> Result<PointCloud> {
    let path = path.as_ref();

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !matches!(extension.as_str(), "csv" | "ply" | "las" | "laz") {
        return Err(LoaderError::UnsupportedExtension {
            path: path.to_path_buf(),
            extension,
        });
    }

    let size_mb = std::fs::metadata(path)?.len() as f64 / (1024.0 * 1024.0);
    if size_mb > config.max_input_mb {
        return Err(LoaderError::TooLarge {
            path: path.to_path_buf(),
            size_mb,
            limit_mb: config.max_input_mb,
        });
    }

    let cloud = match extension.as_str() {
        "csv" => load_xyz_csv(path)?,
        "ply" => load_ply(path)?,
        _ => load_las(path)?,
    };
    log::debug!("Loaded {} points from {}", cloud.len(), path.display());
    Ok(cloud)
}
