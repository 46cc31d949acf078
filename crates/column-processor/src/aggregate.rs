//! Daily aggregation of swath granules onto the model grid.
//!
//! For every observation day the aggregator:
//!
//! 1. averages the model onto the overpass local time,
//! 2. derives model partial and tropospheric columns,
//! 3. for each granule regrids the model profile onto the swath, recomputes
//!    the AMF ratio and regrids the corrected column back onto the model grid,
//! 4. averages the regridded granules into the day's slice.
//!
//! A failing granule is skipped and a failing day is recorded as
//! [`DayStatus::Failed`]; neither aborts the run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use column_common::{BoundingBox, ObservationDay};
use tracing::{debug, error, info, warn};

use crate::amf::{AmfCorrector, ModelProfileOnSwath};
use crate::column::ColumnCalculator;
use crate::config::{CorrectionMode, ReconcileConfig};
use crate::error::{ReconcileError, Result};
use crate::local_time::LocalTimeAligner;
use crate::regrid::Regridder;
use crate::types::{
    names, DailyObservationSet, DaySlice, DayStatus, GriddedResult, ModelField, SwathGranule,
};

/// Cooperative cancellation handle, checked once per day.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Model quantities shared by all granules of one day.
struct DayModel<'a> {
    field: &'a ModelField,
    bbox: Option<BoundingBox>,
    /// `[z, y, x]` mid-layer pressure at the overpass.
    pressure: &'a [f32],
    /// `[z, y, x]` partial column at the overpass.
    partial_column: &'a [f32],
}

/// Running per-cell sum and count of valid samples.
struct DailyMean {
    sum: Vec<f64>,
    count: Vec<u32>,
    positive_only: bool,
}

impl DailyMean {
    fn new(len: usize, positive_only: bool) -> Self {
        Self {
            sum: vec![0.0; len],
            count: vec![0; len],
            positive_only,
        }
    }

    /// Add one regridded granule; returns the number of samples taken.
    fn add(&mut self, values: &[f32]) -> usize {
        let mut taken = 0;
        for (idx, &v) in values.iter().enumerate() {
            if v.is_finite() && (!self.positive_only || v > 0.0) {
                self.sum[idx] += v as f64;
                self.count[idx] += 1;
                taken += 1;
            }
        }
        taken
    }

    fn finish(self) -> Vec<f32> {
        self.sum
            .iter()
            .zip(&self.count)
            .map(|(&s, &n)| if n == 0 { f32::NAN } else { (s / n as f64) as f32 })
            .collect()
    }
}

/// Orchestrates the per-day reconciliation of a model field with swaths.
#[derive(Debug, Clone)]
pub struct SwathAggregator {
    config: ReconcileConfig,
    aligner: LocalTimeAligner,
    columns: ColumnCalculator,
    corrector: AmfCorrector,
}

impl SwathAggregator {
    /// Create an aggregator; fails with `InvalidConfig` on out-of-range settings.
    pub fn new(config: ReconcileConfig) -> Result<Self> {
        config.validate().map_err(ReconcileError::InvalidConfig)?;
        Ok(Self {
            aligner: LocalTimeAligner::new(&config),
            columns: ColumnCalculator::new(&config),
            corrector: AmfCorrector::new(&config),
            config,
        })
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Aggregate every day of `observations` onto the model grid.
    ///
    /// Only a model field lacking the variables needed for `species` columns
    /// fails the run; all other failures are confined to their granule or day.
    pub fn run(
        &self,
        model: &ModelField,
        observations: &DailyObservationSet,
        species: &str,
        cancel: Option<&CancelFlag>,
    ) -> Result<GriddedResult> {
        for name in [
            species,
            names::PRESSURE_MID,
            names::TEMPERATURE,
            names::LAYER_THICKNESS,
        ] {
            model.require_layered(name)?;
        }

        let plane = model.grid.len();
        let mut slices = Vec::with_capacity(observations.len());

        for (day, granules) in observations.iter() {
            let outcome = check_cancelled(cancel)
                .and_then(|()| self.process_day(model, day, granules, species));

            match outcome {
                Ok(slice) => slices.push(slice),
                Err(ReconcileError::Cancelled) => {
                    info!(day = %day, "Run cancelled; day not processed");
                    slices.push(DaySlice::missing(day, plane, DayStatus::Cancelled));
                }
                Err(e) => {
                    error!(day = %day, error = %e, "Day failed; leaving it missing");
                    slices.push(DaySlice::missing(day, plane, DayStatus::Failed(e.to_string())));
                }
            }
        }

        GriddedResult::assemble(model.grid.clone(), slices)
    }

    /// Reconcile one day.
    pub fn process_day(
        &self,
        model: &ModelField,
        day: ObservationDay,
        granules: &[SwathGranule],
        species: &str,
    ) -> Result<DaySlice> {
        let target = day.at(self.config.overpass_local_time);
        let windowed = self.aligner.select_window(model, &[target])?;

        let partial = self.columns.partial_column(&windowed, species)?.values;
        let tropospheric = self.columns.total_column(&windowed, species)?.values;
        let pressure = windowed.require_layered(names::PRESSURE_MID)?;

        let day_model = DayModel {
            field: &windowed,
            bbox: model.grid.bbox(),
            pressure: pressure.time_slice(0),
            partial_column: partial.time_slice(0),
        };

        let mut mean = DailyMean::new(model.grid.len(), self.config.positive_only);
        let mut used = 0usize;
        let mut skipped = 0usize;

        for (idx, granule) in granules.iter().enumerate() {
            match self.process_granule(&day_model, granule) {
                Ok(Some(values)) => {
                    let samples = mean.add(&values);
                    if samples == 0 {
                        debug!(day = %day, granule = idx, "Granule contributes no valid samples");
                    }
                    info!(day = %day, granule = idx, samples = samples, "Done with swath regridding");
                    used += 1;
                }
                Ok(None) => {
                    warn!(
                        day = %day,
                        granule = idx,
                        "Granule has no observations within the model domain; excluded"
                    );
                    skipped += 1;
                }
                Err(e) => {
                    warn!(day = %day, granule = idx, error = %e, "Granule failed; skipped");
                    skipped += 1;
                }
            }
        }

        Ok(DaySlice {
            day,
            corrected_column: mean.finish(),
            model_tropospheric_column: tropospheric.time_slice(0).to_vec(),
            status: DayStatus::Completed {
                granules_used: used,
                granules_skipped: skipped,
            },
        })
    }

    /// The granule's (corrected) column on the model grid, or `None` when no
    /// pixel lies inside the model domain.
    fn process_granule(&self, model: &DayModel<'_>, granule: &SwathGranule) -> Result<Option<Vec<f32>>> {
        granule.validate()?;
        let method = self.config.regrid_method;
        let ignore_degenerate = self.config.ignore_degenerate;

        let column = match self.config.correction_mode {
            CorrectionMode::Direct => granule.column.clone(),
            CorrectionMode::AveragingKernel => {
                let nz = model.field.nz;
                let to_swath = Regridder::new(&model.field.grid, &granule.grid, method, ignore_degenerate)?;
                let profile = ModelProfileOnSwath::new(
                    nz,
                    to_swath.apply_layers(model.pressure, nz)?,
                    to_swath.apply_layers(model.partial_column, nz)?,
                )?;

                let correction = self
                    .corrector
                    .recompute_ratio(granule, &profile, model.bbox.as_ref())?;
                if correction.in_domain_count() == 0 {
                    return Ok(None);
                }
                correction.apply(&granule.column)?
            }
        };

        let to_model = Regridder::new(&granule.grid, &model.field.grid, method, ignore_degenerate)?;
        Ok(Some(to_model.apply(&column)?))
    }
}

fn check_cancelled(cancel: Option<&CancelFlag>) -> Result<()> {
    if cancel.is_some_and(CancelFlag::is_cancelled) {
        return Err(ReconcileError::Cancelled);
    }
    Ok(())
}
