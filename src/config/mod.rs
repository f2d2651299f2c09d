//! Configuration types for the canopy pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading, saving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Crown segmentation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Planar neighborhood radius
    #[serde(default = "default_eps")]
    pub eps: f64,

    /// Neighbors (self included) needed for a core point
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Maximum points to segment; larger clouds are subsampled
    #[serde(default = "default_segmentation_max_points")]
    pub max_points: usize,

    /// Seed for reproducible subsampling
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_eps() -> f64 {
    2.0
}

fn default_min_samples() -> usize {
    5
}

fn default_segmentation_max_points() -> usize {
    2_000_000
}

fn default_seed() -> u64 {
    42
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            eps: default_eps(),
            min_samples: default_min_samples(),
            max_points: default_segmentation_max_points(),
            seed: default_seed(),
        }
    }
}

/// Canopy height model parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChmConfig {
    /// Raster cell size in map units
    #[serde(default = "default_cell_size")]
    pub cell_size: f64,
}

fn default_cell_size() -> f64 {
    1.0
}

impl Default for ChmConfig {
    fn default() -> Self {
        Self {
            cell_size: default_cell_size(),
        }
    }
}

/// How a crown footprint area is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FootprintMethod {
    #[default]
    ConvexHull,
    BoundingBox,
}

impl std::str::FromStr for FootprintMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "convex_hull" | "hull" => Ok(Self::ConvexHull),
            "bounding_box" | "bbox" => Ok(Self::BoundingBox),
            other => Err(format!(
                "unknown footprint method '{}' (expected convex_hull or bounding_box)",
                other
            )),
        }
    }
}

/// Per-tree feature extraction parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub footprint: FootprintMethod,
}

/// Limits applied when reading point files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Largest accepted input file in megabytes
    #[serde(default = "default_max_input_mb")]
    pub max_input_mb: f64,
}

fn default_max_input_mb() -> f64 {
    50.0
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_input_mb: default_max_input_mb(),
        }
    }
}

/// Where derived artifacts are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    #[serde(default)]
    pub chm: ChmConfig,

    #[serde(default)]
    pub features: FeatureConfig,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file and validate it.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject parameter values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let seg = &self.segmentation;
        if !seg.eps.is_finite() || seg.eps <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "segmentation.eps must be > 0, got {}",
                seg.eps
            )));
        }
        if seg.min_samples < 1 {
            return Err(ConfigError::Invalid(
                "segmentation.min_samples must be >= 1".to_string(),
            ));
        }
        if seg.max_points == 0 {
            return Err(ConfigError::Invalid(
                "segmentation.max_points must be >= 1".to_string(),
            ));
        }
        if !self.chm.cell_size.is_finite() || self.chm.cell_size <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "chm.cell_size must be > 0, got {}",
                self.chm.cell_size
            )));
        }
        if self.input.max_input_mb.is_nan() || self.input.max_input_mb <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "input.max_input_mb must be > 0, got {}",
                self.input.max_input_mb
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.segmentation.eps, 2.0);
        assert_eq!(config.segmentation.min_samples, 5);
        assert_eq!(config.chm.cell_size, 1.0);
        assert_eq!(config.features.footprint, FootprintMethod::ConvexHull);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "segmentation:\n  eps: 1.5\nfeatures:\n  footprint: bounding_box\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.segmentation.eps, 1.5);
        assert_eq!(config.segmentation.min_samples, 5);
        assert_eq!(config.features.footprint, FootprintMethod::BoundingBox);
        assert_eq!(config.output.artifacts_dir, PathBuf::from("artifacts"));
    }

    #[test]
    fn test_yaml_round_trip_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");

        let mut config = PipelineConfig::default();
        config.chm.cell_size = 0.5;
        config.to_yaml(&path).unwrap();

        let loaded = PipelineConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.chm.cell_size, 0.5);
    }

    #[test]
    fn test_footprint_method_from_str() {
        assert_eq!("convex-hull".parse::<FootprintMethod>(), Ok(FootprintMethod::ConvexHull));
        assert_eq!("BBOX".parse::<FootprintMethod>(), Ok(FootprintMethod::BoundingBox));
        assert!("alpha_shape".parse::<FootprintMethod>().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.segmentation.eps = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PipelineConfig::default();
        config.segmentation.min_samples = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.chm.cell_size = -2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_yaml_rejects_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "chm:\n  cell_size: 0.0\n").unwrap();
        assert!(matches!(
            PipelineConfig::from_yaml(&path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
