//! Error types for grid and time primitives.

use thiserror::Error;

/// Result type alias using GridError.
pub type GridResult<T> = Result<T, GridError>;

/// Errors raised while constructing grids, bounding boxes or time axes.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("Shape mismatch for '{what}': expected {expected} values, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Grid has no points: {0}")]
    EmptyGrid(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Time axis is not strictly increasing at index {0}")]
    UnorderedTimeAxis(usize),
}

impl GridError {
    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}
