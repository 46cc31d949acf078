//! Error types for column reconciliation.

use column_common::GridError;
use thiserror::Error;

/// Errors that can occur while reconciling model and satellite columns.
///
/// Only structural problems are returned as errors. Recoverable conditions
/// (empty domain intersections, too few time samples, non-finite AMF ratios)
/// are handled where they occur and reported through `tracing`.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A required variable is absent from a model field or swath granule.
    #[error("missing variable '{name}' in {container}")]
    MissingVariable { container: String, name: String },

    /// Degenerate or empty spatial geometry.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Fewer time steps than required contributed to a window.
    #[error("insufficient samples: required {required}, found {found}")]
    InsufficientSamples { required: usize, found: usize },

    /// An AMF ratio could not be computed.
    #[error("non-physical AMF ratio: {0}")]
    NonPhysicalRatio(String),

    /// Array dimensions disagree with the declared shape.
    #[error("shape mismatch for '{what}': expected {expected} values, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// Configuration values out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The run was cancelled before this operation started.
    #[error("operation cancelled")]
    Cancelled,

    /// Grid or time-axis construction failed.
    #[error(transparent)]
    Grid(#[from] GridError),
}

impl ReconcileError {
    /// Create a MissingVariable error.
    pub fn missing_variable(container: impl Into<String>, name: impl Into<String>) -> Self {
        Self::MissingVariable {
            container: container.into(),
            name: name.into(),
        }
    }

    /// Create an InvalidGeometry error.
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}

impl From<serde_yaml::Error> for ReconcileError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(format!("YAML error: {}", err))
    }
}

impl From<serde_json::Error> for ReconcileError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {}", err))
    }
}

/// Result type for column reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
