//! Canopy Height Model rasterization.
//!
//! Each point falls into the cell `(floor((x - xmin) / c), floor((y - ymin) / c))`.
//! A cell's value is its highest z minus the 5th percentile of its own z
//! values, so a single low outlier cannot zero out a canopy cell. Cells no
//! point falls into hold 0.0.

use serde::{Deserialize, Serialize};

use super::error::{ensure_positive, ProcessingError, Result};
use super::geometry::{bbox, percentile_of_sorted, Point, GROUND_PERCENTILE};

/// Default raster cell size in map units.
pub const DEFAULT_CELL_SIZE: f64 = 1.0;

/// Largest raster, in cells, that [`compute_chm`] will allocate.
pub const MAX_CHM_CELLS: usize = 50_000_000;

/// Dense canopy height raster.
///
/// Heights are stored x-major: cell `(ix, iy)` lives at `ix * ny + iy`, so the
/// first axis runs along x.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChmGrid {
    nx: usize,
    ny: usize,
    heights: Vec<f64>,
    /// Grid origin (minimum x of the input)
    pub xmin: f64,
    /// Grid origin (minimum y of the input)
    pub ymin: f64,
    pub cell_size_x: f64,
    pub cell_size_y: f64,
}

impl ChmGrid {
    /// Number of cells along x.
    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Number of cells along y.
    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// `(nx, ny)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    /// Height at cell `(ix, iy)`, `None` outside the grid.
    #[inline]
    pub fn get(&self, ix: usize, iy: usize) -> Option<f64> {
        if ix < self.nx && iy < self.ny {
            Some(self.heights[ix * self.ny + iy])
        } else {
            None
        }
    }

    /// All cell heights, x-major.
    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    /// Map coordinates of the center of cell `(ix, iy)`.
    pub fn cell_center(&self, ix: usize, iy: usize) -> (f64, f64) {
        (
            self.xmin + (ix as f64 + 0.5) * self.cell_size_x,
            self.ymin + (iy as f64 + 0.5) * self.cell_size_y,
        )
    }

    /// Tallest cell value, 0.0 for an all-zero grid.
    pub fn max_height(&self) -> f64 {
        self.heights.iter().copied().fold(0.0, f64::max)
    }

    /// Number of cells with a strictly positive height.
    pub fn covered_cells(&self) -> usize {
        self.heights.iter().filter(|&&h| h > 0.0).count()
    }
}

/// Rasterize a point set into a canopy height model.
///
/// # Arguments
///
/// * `points` - Non-empty point set
/// * `cell_size` - Cell edge length (> 0); [`DEFAULT_CELL_SIZE`] is the usual choice
///
/// # Errors
///
/// [`ProcessingError::EmptyInput`] for an empty set,
/// [`ProcessingError::InvalidParameter`] for a non-positive cell size,
/// non-finite coordinates, or an extent needing more than [`MAX_CHM_CELLS`]
/// cells.
pub fn compute_chm(points: &[Point], cell_size: f64) -> Result<ChmGrid> {
    ensure_positive("cell_size", cell_size)?;
    if points.is_empty() {
        return Err(ProcessingError::EmptyInput {
            operation: "compute_chm",
        });
    }
    if let Some(i) = points.iter().position(|p| p.iter().any(|v| !v.is_finite())) {
        return Err(ProcessingError::invalid(
            "points",
            format!("point {} has a non-finite coordinate", i),
        ));
    }

    let bounds = bbox(points)?;
    let (xmin, ymin) = (bounds.min[0], bounds.min[1]);

    // floor is monotone, so the extremes of the bbox give the last cell index
    let span_x = ((bounds.max[0] - xmin) / cell_size).floor() + 1.0;
    let span_y = ((bounds.max[1] - ymin) / cell_size).floor() + 1.0;
    let too_large = || {
        ProcessingError::invalid(
            "cell_size",
            format!(
                "a {}x{} raster exceeds the {} cell limit",
                span_x, span_y, MAX_CHM_CELLS
            ),
        )
    };
    if !(span_x * span_y <= MAX_CHM_CELLS as f64) {
        return Err(too_large());
    }
    let (nx, ny) = (span_x as usize, span_y as usize);
    let cell_count = nx
        .checked_mul(ny)
        .filter(|&c| c <= MAX_CHM_CELLS)
        .ok_or_else(too_large)?;

    let cell_of = |p: &Point| -> (usize, usize) {
        let ix = ((p[0] - xmin) / cell_size).floor() as usize;
        let iy = ((p[1] - ymin) / cell_size).floor() as usize;
        (ix.min(nx - 1), iy.min(ny - 1))
    };

    // Arena of per-cell z buckets keyed by flat cell index
    let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); cell_count];
    for p in points {
        let (ix, iy) = cell_of(p);
        buckets[ix * ny + iy].push(p[2]);
    }

    let heights: Vec<f64> = buckets
        .into_iter()
        .map(|mut zs| {
            // empty cells are 0 by convention; a lone point is its own ground
            if zs.len() < 2 {
                return 0.0;
            }
            zs.sort_by(f64::total_cmp);
            let max_z = zs[zs.len() - 1];
            max_z - percentile_of_sorted(&zs, GROUND_PERCENTILE)
        })
        .collect();

    log::debug!(
        "compute_chm: {} points -> {}x{} grid (cell_size={})",
        points.len(),
        nx,
        ny,
        cell_size
    );

    Ok(ChmGrid {
        nx,
        ny,
        heights,
        xmin,
        ymin,
        cell_size_x: cell_size,
        cell_size_y: cell_size,
    })
}
