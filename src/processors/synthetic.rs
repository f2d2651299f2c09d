//! Seeded synthetic forest plots for demos and tests.
//!
//! Each crown is a Gaussian blob in the plane with returns spread uniformly
//! over a height band.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::geometry::Point;

/// Parameters of a synthetic plot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticPlotConfig {
    /// Number of crowns
    pub clusters: usize,
    /// Returns per crown
    pub points_per_cluster: usize,
    /// Side of the square plot the crown centers are drawn from
    pub extent: f64,
    /// Planar standard deviation around each center
    pub jitter: f64,
    /// Lowest return height
    pub z_min: f64,
    /// Width of the height band above `z_min`
    pub z_range: f64,
    pub seed: u64,
}

impl Default for SyntheticPlotConfig {
    fn default() -> Self {
        Self {
            clusters: 20,
            points_per_cluster: 80,
            extent: 100.0,
            jitter: 1.0,
            z_min: 15.0,
            z_range: 10.0,
            seed: 123,
        }
    }
}

/// Generate a plot with crown centers drawn uniformly over the extent.
///
/// Centers are not kept apart, so neighboring crowns may overlap.
pub fn synthetic_plot(config: &SyntheticPlotConfig) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let centers: Vec<[f64; 2]> = (0..config.clusters)
        .map(|_| {
            [
                rng.gen_range(0.0..config.extent),
                rng.gen_range(0.0..config.extent),
            ]
        })
        .collect();

    scatter(&mut rng, &centers, config)
}

/// Generate crowns around the given centers; `config.clusters` and
/// `config.extent` are ignored.
pub fn synthetic_plot_around(centers: &[[f64; 2]], config: &SyntheticPlotConfig) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    scatter(&mut rng, centers, config)
}

/// `count` centers on a near-square grid with the given spacing.
pub fn grid_centers(count: usize, spacing: f64) -> Vec<[f64; 2]> {
    let cols = (count as f64).sqrt().ceil().max(1.0) as usize;
    (0..count)
        .map(|i| [(i % cols) as f64 * spacing, (i / cols) as f64 * spacing])
        .collect()
}

fn scatter(rng: &mut StdRng, centers: &[[f64; 2]], config: &SyntheticPlotConfig) -> Vec<Point> {
    let mut points = Vec::with_capacity(centers.len() * config.points_per_cluster);

    // a negative or non-finite jitter stacks every return on its center
    let normal = Normal::new(0.0, config.jitter).ok();

    for c in centers {
        for _ in 0..config.points_per_cluster {
            let (dx, dy) = match &normal {
                Some(n) => (n.sample(rng), n.sample(rng)),
                None => (0.0, 0.0),
            };
            let z = config.z_min + config.z_range * rng.gen::<f64>();
            points.push([c[0] + dx, c[1] + dy, z]);
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_plot_size_and_bounds() {
        let config = SyntheticPlotConfig::default();
        let points = synthetic_plot(&config);

        assert_eq!(points.len(), 20 * 80);
        assert!(points.iter().all(|p| p[2] >= 15.0 && p[2] < 25.0));
    }

    #[test]
    fn test_synthetic_plot_is_seeded() {
        let config = SyntheticPlotConfig {
            clusters: 3,
            points_per_cluster: 10,
            ..SyntheticPlotConfig::default()
        };
        assert_eq!(synthetic_plot(&config), synthetic_plot(&config));

        let other = SyntheticPlotConfig {
            seed: 7,
            ..config.clone()
        };
        assert_ne!(synthetic_plot(&config), synthetic_plot(&other));
    }

    #[test]
    fn test_grid_centers() {
        let centers = grid_centers(20, 25.0);
        assert_eq!(centers.len(), 20);
        assert_eq!(centers[0], [0.0, 0.0]);
        assert_eq!(centers[4], [100.0, 0.0]);
        assert_eq!(centers[5], [0.0, 25.0]);
        assert_eq!(centers[19], [100.0, 75.0]);
    }

    #[test]
    fn test_zero_jitter_stacks_points() {
        let config = SyntheticPlotConfig {
            points_per_cluster: 4,
            jitter: 0.0,
            ..SyntheticPlotConfig::default()
        };
        let points = synthetic_plot_around(&[[5.0, 6.0]], &config);
        assert!(points.iter().all(|p| p[0] == 5.0 && p[1] == 6.0));
    }
}
