//! Visualization tools for segmented plots and canopy height models.
//!
//! This module renders PNG images with the plotters library:
//! - top-down scatter of a segmented plot, colored by crown
//! - CHM heatmap, one rectangle per cell

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::processors::chm::ChmGrid;
use crate::processors::geometry::Point;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Empty point cloud")]
    EmptyPointCloud,

    #[error("labels has {labels_len} elements, expected {points_len}")]
    LengthMismatch { points_len: usize, labels_len: usize },
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

fn plot_err<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1920;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 1080;

/// Color palette for crown visualization.
const CLUSTER_COLORS: &[[u8; 3]] = &[
    [228, 26, 28],   // Red
    [55, 126, 184],  // Blue
    [77, 175, 74],   // Green
    [152, 78, 163],  // Purple
    [255, 127, 0],   // Orange
    [255, 255, 51],  // Yellow
    [166, 86, 40],   // Brown
    [247, 129, 191], // Pink
    [0, 206, 209],   // Turquoise
    [138, 43, 226],  // Blue Violet
    [50, 205, 50],   // Lime Green
    [255, 20, 147],  // Deep Pink
    [0, 191, 255],   // Deep Sky Blue
    [255, 215, 0],   // Gold
];

/// Noise color (gray) for unclustered points (label = -1).
const NOISE_COLOR: [u8; 3] = [128, 128, 128];

/// Low and high ends of the CHM color ramp (pale to dark green).
const CHM_LOW: [u8; 3] = [247, 252, 245];
const CHM_HIGH: [u8; 3] = [0, 68, 27];

/// Palette color for a crown label; noise is gray.
pub fn label_color(label: i32) -> [u8; 3] {
    if label < 0 {
        NOISE_COLOR
    } else {
        CLUSTER_COLORS[label as usize % CLUSTER_COLORS.len()]
    }
}

/// Ramp color for `height` on a `[0, max_height]` scale.
pub fn height_color(height: f64, max_height: f64) -> [u8; 3] {
    let t = if max_height > 0.0 {
        (height / max_height).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    [
        mix(CHM_LOW[0], CHM_HIGH[0]),
        mix(CHM_LOW[1], CHM_HIGH[1]),
        mix(CHM_LOW[2], CHM_HIGH[2]),
    ]
}

/// Plot a top-down scatter (x vs y) of a segmented plot, colored by crown.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `points` - Segmented points
/// * `labels` - Crown labels aligned with `points`
/// * `max_points` - Maximum number of points to plot (strided if exceeded)
pub fn plot_labeled_points(
    output_path: &Path,
    points: &[Point],
    labels: &[i32],
    max_points: usize,
) -> Result<()> {
    if points.is_empty() {
        return Err(VisualizationError::EmptyPointCloud);
    }
    if points.len() != labels.len() {
        return Err(VisualizationError::LengthMismatch {
            points_len: points.len(),
            labels_len: labels.len(),
        });
    }

    let n = points.len();
    let step = if max_points > 0 && n > max_points {
        n.div_ceil(max_points)
    } else {
        1
    };

    let plotted: Vec<(f64, f64, RGBColor)> = (0..n)
        .step_by(step)
        .map(|i| {
            let [r, g, b] = label_color(labels[i]);
            (points[i][0], points[i][1], RGBColor(r, g, b))
        })
        .collect();

    let (x_min, x_max, y_min, y_max) = compute_bounds(plotted.iter().map(|(x, y, _)| (*x, *y)));
    let x_padding = (x_max - x_min) * 0.05;
    let y_padding = (y_max - y_min) * 0.05;

    let root =
        BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(
            (x_min - x_padding)..(x_max + x_padding),
            (y_min - y_padding)..(y_max + y_padding),
        )
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .draw()
        .map_err(plot_err)?;

    // Noise first so crowns stay on top
    let (noise, crowns): (Vec<_>, Vec<_>) = plotted
        .iter()
        .partition(|(_, _, c)| [c.0, c.1, c.2] == NOISE_COLOR);

    for layer in [noise, crowns] {
        chart
            .draw_series(
                layer
                    .into_iter()
                    .map(|&(x, y, color)| Circle::new((x, y), 2, color.filled())),
            )
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Render a canopy height model as a heatmap PNG.
///
/// Each cell is one filled rectangle colored on a pale-to-dark green ramp up
/// to the grid's tallest cell. Cells with height 0 are left white.
pub fn plot_chm(output_path: &Path, grid: &ChmGrid) -> Result<()> {
    let (nx, ny) = grid.shape();
    if nx == 0 || ny == 0 {
        return Err(VisualizationError::EmptyPointCloud);
    }

    // Square cells scaled to fit the default canvas; grids wider than the
    // canvas get sub-pixel cells, each drawn at least one pixel wide
    let fit = (DEFAULT_WIDTH as f64 / nx as f64).min(DEFAULT_HEIGHT as f64 / ny as f64);
    let scale = if fit >= 1.0 { fit.floor() } else { fit };
    let size = (
        ((nx as f64 * scale).ceil() as u32).clamp(1, DEFAULT_WIDTH),
        ((ny as f64 * scale).ceil() as u32).clamp(1, DEFAULT_HEIGHT),
    );

    let root = BitMapBackend::new(output_path, size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let max_height = grid.max_height();
    let (right, top) = (size.0 as i32, size.1 as i32);
    let edge = |i: usize| (i as f64 * scale).floor() as i32;

    for ix in 0..nx {
        for iy in 0..ny {
            let height = grid.get(ix, iy).unwrap_or(0.0);
            if height <= 0.0 {
                continue;
            }
            let [r, g, b] = height_color(height, max_height);

            // y grows upwards on the map, downwards in the image
            let x0 = edge(ix).min(right - 1);
            let x1 = edge(ix + 1).max(x0 + 1);
            let y0 = (top - edge(iy + 1)).min(top - 1);
            let y1 = (top - edge(iy)).max(y0 + 1);
            let rect = Rectangle::new([(x0, y0), (x1, y1)], RGBColor(r, g, b).filled());
            root.draw(&rect).map_err(plot_err)?;
        }
    }

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Compute the bounds (min/max) for x and y coordinates.
fn compute_bounds(points: impl Iterator<Item = (f64, f64)>) -> (f64, f64, f64, f64) {
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for (x, y) in points {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }

    (x_min, x_max, y_min, y_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::chm::compute_chm;
    use tempfile::tempdir;

    #[test]
    fn test_label_color() {
        assert_eq!(label_color(-1), NOISE_COLOR);
        assert_eq!(label_color(0), CLUSTER_COLORS[0]);
        assert_eq!(label_color(CLUSTER_COLORS.len() as i32), CLUSTER_COLORS[0]);
        assert!(CLUSTER_COLORS.iter().all(|c| *c != NOISE_COLOR));
    }

    #[test]
    fn test_height_color_ramp() {
        assert_eq!(height_color(0.0, 10.0), CHM_LOW);
        assert_eq!(height_color(10.0, 10.0), CHM_HIGH);
        assert_eq!(height_color(25.0, 10.0), CHM_HIGH);
        assert_eq!(height_color(3.0, 0.0), CHM_LOW);
    }

    #[test]
    fn test_compute_bounds_pads_flat_axis() {
        let (x0, x1, y0, y1) = compute_bounds([(2.0, 5.0), (4.0, 5.0)].into_iter());
        assert_eq!((x0, x1), (2.0, 4.0));
        assert_eq!((y0, y1), (4.0, 6.0));
    }

    #[test]
    fn test_plot_labeled_points_rejects_bad_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plot.png");

        assert!(matches!(
            plot_labeled_points(&path, &[], &[], 100),
            Err(VisualizationError::EmptyPointCloud)
        ));
        assert!(matches!(
            plot_labeled_points(&path, &[[0.0, 0.0, 0.0]], &[0, 1], 100),
            Err(VisualizationError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_plot_labeled_points_writes_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crowns.png");
        let points = vec![[0.0, 0.0, 5.0], [1.0, 0.5, 6.0], [8.0, 8.0, 2.0], [4.0, 9.0, 1.0]];
        let labels = vec![0, 0, 1, -1];

        plot_labeled_points(&path, &points, &labels, 2).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_plot_chm_wide_grid_fits_canvas() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.png");
        let points = vec![[0.0, 0.0, 1.0], [0.1, 0.0, 6.0], [4999.5, 2.0, 3.0]];
        let grid = compute_chm(&points, 1.0).unwrap();
        assert_eq!(grid.shape(), (5000, 3));

        plot_chm(&path, &grid).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_plot_chm_writes_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chm.png");
        let points = vec![
            [0.0, 0.0, 1.0],
            [0.2, 0.3, 9.0],
            [3.5, 2.5, 2.0],
            [3.6, 2.4, 12.0],
        ];
        let grid = compute_chm(&points, 1.0).unwrap();

        plot_chm(&path, &grid).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
