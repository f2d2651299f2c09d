//! Errors raised by the geometric processing core.

use thiserror::Error;

/// Errors that can occur in segmentation, rasterization and feature extraction.
///
/// Degenerate geometry (zero footprint, infinite density) is not an error and
/// never surfaces here.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("{operation} requires at least one point")]
    EmptyInput { operation: &'static str },

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl ProcessingError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ProcessingError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Result type for core processing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Reject non-finite or non-positive radii and cell sizes.
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ProcessingError::invalid(
            name,
            format!("must be a finite value > 0, got {}", value),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_positive() {
        assert!(ensure_positive("eps", 0.5).is_ok());
        assert!(ensure_positive("eps", 0.0).is_err());
        assert!(ensure_positive("eps", -1.0).is_err());
        assert!(ensure_positive("eps", f64::NAN).is_err());
        assert!(ensure_positive("eps", f64::INFINITY).is_err());
    }

    #[test]
    fn test_error_messages() {
        let err = ProcessingError::EmptyInput { operation: "bbox" };
        assert_eq!(err.to_string(), "bbox requires at least one point");

        let err = ProcessingError::invalid("min_samples", "must be >= 1");
        assert_eq!(
            err.to_string(),
            "invalid parameter `min_samples`: must be >= 1"
        );
    }
}
