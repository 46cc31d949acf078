//! Satellite/Model Trace-Gas Column Reconciliation
//!
//! This crate pairs chemical-transport-model output with satellite swath
//! retrievals of a trace gas column. It:
//!
//! - **Derives model columns**: per-layer partial columns and tropospheric totals
//! - **Aligns in time**: averages model steps onto the local overpass time
//! - **Regrids**: bilinear mapping between swath footprints and the model grid
//! - **Corrects retrievals**: recomputes the tropospheric AMF with the model
//!   profile and the retrieval averaging kernel
//!
//! # Architecture
//!
//! ```text
//! DailyObservationSet + ModelField
//!      │
//!      ▼
//! SwathAggregator::run()
//!      │
//!      └─► for each day
//!               │
//!               ├─► LocalTimeAligner::select_window (overpass local time)
//!               │
//!               ├─► ColumnCalculator (partial + tropospheric columns)
//!               │
//!               └─► for each granule
//!                        │
//!                        ├─► Regridder model → swath
//!                        ├─► AmfCorrector::recompute_ratio
//!                        └─► Regridder swath → model
//!               │
//!               ▼
//!          daily mean → GriddedResult[day]
//! ```
//!
//! # Example
//!
//! ```ignore
//! use column_processor::{ReconcileConfig, SwathAggregator};
//!
//! let aggregator = SwathAggregator::new(ReconcileConfig::from_env())?;
//! let result = aggregator.run(&model, &observations, "no2", None)?;
//!
//! for day in &result.days {
//!     let plane = result.corrected(*day).unwrap();
//!     // ...
//! }
//! ```

pub mod aggregate;
pub mod amf;
pub mod column;
pub mod config;
pub mod error;
pub mod local_time;
pub mod preprocess;
pub mod regrid;
pub mod types;
pub mod vertical;

// Re-export commonly used types at crate root
pub use aggregate::{CancelFlag, SwathAggregator};
pub use amf::{AmfCorrection, AmfCorrector, ModelProfileOnSwath};
pub use column::{ColumnCalculator, ColumnOutput, COLUMN_UNITS};
pub use config::{CorrectionMode, ExtrapolationPolicy, LocalTimeMode, ReconcileConfig, RegridMethod};
pub use error::{ReconcileError, Result};
pub use local_time::{LocalTimeAligner, LocalTimeField, WindowWeights};
pub use preprocess::{average_between_hours, run_preprocessing, FieldValues, PreprocessOutput, PreprocessStep};
pub use regrid::{regrid, Regridder};
pub use types::{
    names, DailyObservationSet, DaySlice, DayStatus, GriddedResult, LayeredField, ModelField,
    SurfaceField, SwathGranule, VariableAttrs,
};
pub use vertical::{
    interpolate_to_pressure, pair_profiles, Extrapolation, LogPressureProfile, ModelProfiles,
    PairedRecord, ProfileObservation, VerticalInterpolation,
};
