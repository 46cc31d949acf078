//! Horizontal regridding between the model grid and swath footprints.
//!
//! Both grids are curvilinear: every point carries its own longitude and
//! latitude. Source cells are the quadrilaterals formed by neighbouring
//! points; a target point takes bilinear weights from the cell enclosing it,
//! found through a bucket index over cell bounding boxes.
//!
//! The same [`Regridder`] serves both directions (model → swath for the AMF
//! correction, swath → model for aggregation).

mod interpolation;
mod regridder;

pub use interpolation::{bilinear_weights, inverse_bilinear, is_degenerate};
pub use regridder::{regrid, Regridder};
