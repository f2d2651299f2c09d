//! Point set operations applied before processing.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::processors::geometry::Point;

/// Randomly subsample points down to `max_points`.
///
/// Sampling is without replacement and seeded, so the same input, cap and
/// seed always keep the same points. Kept points stay in input order.
///
/// # Arguments
///
/// * `points` - Input points
/// * `max_points` - Maximum number of points to keep (0 disables the cap)
/// * `seed` - Seed for the sampling RNG
///
/// # Returns
///
/// Tuple of (subsampled points, stride_factor) where stride_factor is the
/// approximate ratio of original to kept points (1 when nothing was dropped).
pub fn subsample_points(points: &[Point], max_points: usize, seed: u64) -> (Vec<Point>, usize) {
    let n = points.len();

    if max_points == 0 || n <= max_points {
        return (points.to_vec(), 1);
    }

    let stride_factor = n.div_ceil(max_points);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices = rand::seq::index::sample(&mut rng, n, max_points).into_vec();

    // Sort indices for cache-friendly access
    indices.sort_unstable();

    log::debug!(
        "Subsampled {} -> {} points (approx stride={})",
        n,
        max_points,
        stride_factor
    );

    (indices.iter().map(|&i| points[i]).collect(), stride_factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<Point> {
        (0..n).map(|i| [i as f64, 0.0, 0.0]).collect()
    }

    #[test]
    fn test_subsample_under_cap_is_identity() {
        let points = line(10);
        let (kept, stride) = subsample_points(&points, 10, 1);
        assert_eq!(kept, points);
        assert_eq!(stride, 1);

        let (kept, stride) = subsample_points(&points, 0, 1);
        assert_eq!(kept.len(), 10);
        assert_eq!(stride, 1);
    }

    #[test]
    fn test_subsample_caps_and_keeps_order() {
        let points = line(1000);
        let (kept, stride) = subsample_points(&points, 300, 42);

        assert_eq!(kept.len(), 300);
        assert_eq!(stride, 4);
        assert!(kept.windows(2).all(|w| w[0][0] < w[1][0]));
    }

    #[test]
    fn test_subsample_is_seeded() {
        let points = line(500);
        let (a, _) = subsample_points(&points, 50, 7);
        let (b, _) = subsample_points(&points, 50, 7);
        let (c, _) = subsample_points(&points, 50, 8);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
