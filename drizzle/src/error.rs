//! Error and warning types for resampling operations.

use std::fmt;

use common::Dimensions;
use thiserror::Error;

use crate::config::InputRegion;
use crate::kernel::Kernel;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by the accumulator, the blot resampler and the parsers.
///
/// Every error is raised before the output state is touched.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Kernel '{0}' is not supported")]
    InvalidKernel(String),

    #[error("'out_ctx' must be either a 2D or 3D array, got rank {rank}")]
    InvalidContextShape { rank: usize },

    #[error("Invalid context image ID range (begin {begin}, max {max:?}): {reason}")]
    InvalidContextRange {
        begin: i64,
        max: Option<i64>,
        reason: &'static str,
    },

    #[error("Context ID {ctx_id} exceeds the maximum allowed ID {max_ctx_id}")]
    ContextExhausted { ctx_id: u64, max_ctx_id: u64 },

    #[error("Inconsistent output state: {reason}")]
    InconsistentState { reason: String },

    #[error("Invalid exposure time {exptime}: {reason}")]
    InvalidExposureTime { exptime: f64, reason: &'static str },

    #[error("Inconsistent exposure time and context and/or weight images: {reason}")]
    InconsistentExposureTime { total_exptime: f64, reason: &'static str },

    #[error("'{what}' shape is not consistent: {detail}")]
    ShapeMismatch { what: &'static str, detail: String },

    #[error("could not convert string to float: '{value}'")]
    FillValueParse { value: String },

    #[error("pixfrac must be in (0, 1], got {pixfrac}")]
    InvalidPixfrac { pixfrac: f64 },

    #[error("'{name}' must be finite and {constraint}, got {value}")]
    InvalidScale {
        name: &'static str,
        value: f64,
        constraint: &'static str,
    },

    #[error("Input region {region} lies outside the {dims} image")]
    InvalidRegion {
        region: InputRegion,
        dims: Dimensions,
    },

    #[error("Input units '{0}' are not supported, expected 'cps' or 'counts'")]
    InvalidUnits(String),

    #[error("Interpolation '{0}' is not supported")]
    InvalidInterpolation(String),

    #[error("Kernel '{kernel}' is not a flux-conserving kernel")]
    NonConservingKernel { kernel: Kernel },
}

impl Error {
    pub(crate) fn shape_mismatch(
        what: &'static str,
        expected: Dimensions,
        actual: Dimensions,
    ) -> Self {
        Error::ShapeMismatch {
            what,
            detail: format!("expected {expected}, got {actual}"),
        }
    }
}

/// Non-fatal condition reported by `add_image`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrizzleWarning {
    /// The kernel does not conserve flux; surface brightness is only approximately preserved.
    NonConservingKernel { kernel: Kernel },
}

impl fmt::Display for DrizzleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrizzleWarning::NonConservingKernel { kernel } => {
                write!(f, "Kernel '{kernel}' is not a flux-conserving kernel")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_kernel_message() {
        let err = Error::InvalidKernel("magic_image_improver".to_string());
        assert_eq!(
            err.to_string(),
            "Kernel 'magic_image_improver' is not supported"
        );
    }

    #[test]
    fn test_context_shape_message() {
        let err = Error::InvalidContextShape { rank: 1 };
        assert!(
            err.to_string()
                .starts_with("'out_ctx' must be either a 2D or 3D array")
        );
    }

    #[test]
    fn test_fill_value_parse_message() {
        let err = Error::FillValueParse {
            value: "fillval".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "could not convert string to float: 'fillval'"
        );
    }

    #[test]
    fn test_shape_mismatch_names_array() {
        let err = Error::shape_mismatch("pixmap", Dimensions::new(4, 3), Dimensions::new(4, 4));
        let msg = err.to_string();
        assert!(msg.contains("'pixmap'"));
        assert!(msg.contains("expected 4x3, got 4x4"));
    }

    #[test]
    fn test_warning_display_matches_error() {
        let warning = DrizzleWarning::NonConservingKernel {
            kernel: Kernel::Gaussian,
        };
        let err = Error::NonConservingKernel {
            kernel: Kernel::Gaussian,
        };
        assert_eq!(warning.to_string(), err.to_string());
        assert!(warning.to_string().contains("gaussian"));
    }
}
