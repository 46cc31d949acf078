//! Shared test utilities for the column-pairing workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic grid, profile and swath generators
//! - Common test fixtures (domains, vertical structures, days)
//! - Approximate-equality assertion macros
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, fixtures, create_swath_coords};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for relative floating-point equality, for values such as columns
/// in molecules/cm² where an absolute tolerance is meaningless.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_rel_eq;
///
/// assert_rel_eq!(3.0e15_f32, 3.0000001e15_f32, 1e-6);
/// ```
#[macro_export]
macro_rules! assert_rel_eq {
    ($left:expr, $right:expr, $rel:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let scale = left.abs().max(right.abs()).max(f64::MIN_POSITIVE);
        $crate::assert_approx_eq!(left / scale, right / scale, $rel);
    }};
}

/// Assert every value of a slice is NaN.
#[macro_export]
macro_rules! assert_all_nan {
    ($values:expr) => {{
        if let Some((idx, v)) = $values.iter().enumerate().find(|(_, v)| !v.is_nan()) {
            panic!("assertion failed: expected NaN at index {}, found {:?}", idx, v);
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_rejects_nan() {
        assert_approx_eq!(f64::NAN, 1.0, 0.001);
    }

    #[test]
    fn test_assert_rel_eq_passes() {
        assert_rel_eq!(3.0e15, 3.000001e15, 1e-5);
    }

    #[test]
    fn test_assert_all_nan() {
        assert_all_nan!([f32::NAN, f32::NAN]);
    }

    #[test]
    #[should_panic(expected = "expected NaN at index 1")]
    fn test_assert_all_nan_fails() {
        assert_all_nan!(vec![f32::NAN, 2.0]);
    }
}
