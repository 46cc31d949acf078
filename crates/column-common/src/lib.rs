//! Common types and utilities shared across the column-pairing crates.

pub mod bbox;
pub mod constants;
pub mod error;
pub mod grid;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{GridError, GridResult};
pub use grid::CurvilinearGrid;
pub use time::{ObservationDay, TimeAxis};
