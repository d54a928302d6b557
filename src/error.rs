//! Error types for the QSM core.
//!
//! All fallible entry points validate their inputs up front and fail fast
//! with one of the variants below. Each variant carries the name of the
//! offending parameter so callers can produce actionable messages without
//! matching on strings.

use thiserror::Error;

/// Errors returned by QSM core entry points.
#[derive(Debug, Error)]
pub enum QsmError {
    /// Array dimensions or extents are inconsistent across inputs/outputs.
    #[error("shape mismatch in `{name}`: {details}")]
    ShapeMismatch {
        name: &'static str,
        details: String,
    },

    /// Field rank outside the supported set {3, 4}.
    #[error("invalid rank for `{name}`: expected 3 or 4, got {rank}")]
    InvalidRank {
        name: &'static str,
        rank: usize,
    },

    /// A string or enum option outside its allowed set.
    #[error("invalid option for `{name}`: `{value}`")]
    InvalidOption {
        name: &'static str,
        value: String,
    },

    /// A non-finite or out-of-range numeric input, e.g. a non-positive
    /// voxel size or a zero B-field direction vector.
    #[error("invalid value for `{name}`: {value}")]
    InvalidValue {
        name: &'static str,
        value: f64,
    },

    /// A denominator identically zero on a path with no zero fallback.
    /// Every current inverse-kernel path falls back to zero instead, so
    /// this variant is reserved.
    #[error("degenerate denominator in `{name}`")]
    NumericDegenerate {
        name: &'static str,
    },
}

impl QsmError {
    pub(crate) fn shape_mismatch(name: &'static str, details: impl Into<String>) -> Self {
        QsmError::ShapeMismatch {
            name,
            details: details.into(),
        }
    }

    pub(crate) fn invalid_option(name: &'static str, value: impl Into<String>) -> Self {
        QsmError::InvalidOption {
            name,
            value: value.into(),
        }
    }

    pub(crate) fn invalid_value(name: &'static str, value: f64) -> Self {
        QsmError::InvalidValue { name, value }
    }
}
