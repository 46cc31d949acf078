//! Local-time alignment of model output with satellite overpass times.
//!
//! Each grid cell's local time is its UTC time plus a longitude-derived
//! offset. Windowed values at a target local time are the weighted mean of
//! model steps within the window, weighted by `1 - |Δt| / spacing`.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use column_common::constants::DEGREES_PER_HOUR;
use column_common::TimeAxis;
use tracing::{debug, info};

use crate::config::{LocalTimeMode, ReconcileConfig};
use crate::error::{ReconcileError, Result};
use crate::types::{LayeredField, ModelField, SurfaceField};

/// Longitudes beyond one full turn are treated as fill values.
const MAX_ABS_LONGITUDE: f64 = 360.0;

/// Per-cell local time of a model field, `(time, y, x)`.
///
/// Stored as the UTC axis plus one offset per cell; cells with a non-finite
/// longitude have no local time.
#[derive(Debug, Clone)]
pub struct LocalTimeField {
    times: Vec<DateTime<Utc>>,
    ny: usize,
    nx: usize,
    offsets: Vec<Option<Duration>>,
}

impl LocalTimeField {
    /// Local time at `(t, y, x)`.
    pub fn get(&self, t: usize, y: usize, x: usize) -> Option<NaiveDateTime> {
        self.offsets[y * self.nx + x].map(|offset| self.times[t].naive_utc() + offset)
    }

    /// UTC offset of cell `(y, x)`.
    pub fn offset(&self, y: usize, x: usize) -> Option<Duration> {
        self.offsets[y * self.nx + x]
    }

    /// Materialize all local times, `[time, y, x]` row-major.
    pub fn values(&self) -> Vec<Option<NaiveDateTime>> {
        let mut out = Vec::with_capacity(self.times.len() * self.ny * self.nx);
        for t in 0..self.times.len() {
            for y in 0..self.ny {
                for x in 0..self.nx {
                    out.push(self.get(t, y, x));
                }
            }
        }
        out
    }
}

/// Computes local times and overpass-window averages of model fields.
#[derive(Debug, Clone)]
pub struct LocalTimeAligner {
    mode: LocalTimeMode,
    half_width: Option<Duration>,
    min_samples: usize,
}

impl Default for LocalTimeAligner {
    fn default() -> Self {
        Self::new(&ReconcileConfig::default())
    }
}

impl LocalTimeAligner {
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            mode: config.local_time_mode,
            half_width: config.window_half_width(),
            min_samples: config.min_window_samples,
        }
    }

    /// UTC offset for a longitude under the configured mode.
    ///
    /// Longitudes that are non-finite or beyond one full turn (fill values)
    /// have no offset.
    pub fn utc_offset(&self, lon: f64) -> Option<Duration> {
        if !lon.is_finite() || lon.abs() > MAX_ABS_LONGITUDE {
            return None;
        }
        let hours = lon / DEGREES_PER_HOUR;
        match self.mode {
            LocalTimeMode::HourBand => Duration::try_hours(hours.round() as i64),
            LocalTimeMode::Geographic => Duration::try_milliseconds((hours * 3_600_000.0) as i64),
        }
    }

    /// Local time of every model cell and step.
    pub fn to_local_time(&self, field: &ModelField) -> LocalTimeField {
        LocalTimeField {
            times: field.times.times().to_vec(),
            ny: field.grid.ny,
            nx: field.grid.nx,
            offsets: field
                .grid
                .longitude
                .iter()
                .map(|&lon| self.utc_offset(lon))
                .collect(),
        }
    }

    /// Average every variable of `field` onto the target local times.
    ///
    /// The returned field has one step per target; its time coordinate holds
    /// the target local times.
    pub fn select_window(&self, field: &ModelField, targets: &[NaiveDateTime]) -> Result<ModelField> {
        let local = self.to_local_time(field);
        let weights = self.window_weights(&local, targets)?;
        let axis = TimeAxis::new(targets.iter().map(|t| Utc.from_utc_datetime(t)).collect())?;
        let mut out = ModelField::new(field.grid.clone(), axis, field.nz);

        for name in field.layered_names() {
            let values = field.require_layered(name)?;
            let windowed = self.select_window_layered(&weights, values)?;
            out = out.with_layered(name, windowed)?;
            if let Some(attrs) = field.attrs(name) {
                out = out.with_attrs(name, attrs.clone());
            }
        }
        for name in field.surface_names() {
            let values = field.require_surface(name)?;
            let windowed = self.select_window_surface(&weights, values)?;
            out = out.with_surface(name, windowed)?;
            if let Some(attrs) = field.attrs(name) {
                out = out.with_attrs(name, attrs.clone());
            }
        }
        Ok(out)
    }

    /// Window weights of every `(target, cell)`, shared by all variables.
    pub fn window_weights(
        &self,
        local: &LocalTimeField,
        targets: &[NaiveDateTime],
    ) -> Result<WindowWeights> {
        let (spacing, half_width) = self.window(local)?;
        let cells = local.ny * local.nx;
        let mut weights = Vec::with_capacity(targets.len() * cells);
        for &target in targets {
            for cell in 0..cells {
                weights.push(cell_weights(local, cell, target, spacing, half_width));
            }
        }
        Ok(WindowWeights {
            targets: targets.len(),
            ny: local.ny,
            nx: local.nx,
            weights,
        })
    }

    /// Windowed mean of a `(time, z, y, x)` variable; output is `(target, z, y, x)`.
    pub fn select_window_layered(
        &self,
        weights: &WindowWeights,
        values: &LayeredField,
    ) -> Result<LayeredField> {
        weights.check_shape(values.ny, values.nx)?;
        let mut out = LayeredField::filled(weights.targets, values.nz, values.ny, values.nx, f32::NAN);
        let mut insufficient = 0usize;

        for k in 0..weights.targets {
            for y in 0..values.ny {
                for x in 0..values.nx {
                    let cell = weights.cell(k, y, x);
                    for z in 0..values.nz {
                        let mean = weighted_mean(cell, |t| values.get(t, z, y, x));
                        match mean_or_missing(mean, self.min_samples) {
                            Some(v) => {
                                let idx = out.index(k, z, y, x);
                                out.data[idx] = v;
                            }
                            None => insufficient += 1,
                        }
                    }
                }
            }
        }

        report_insufficient(insufficient, self.min_samples);
        Ok(out)
    }

    /// Windowed mean of a `(time, y, x)` variable; output is `(target, y, x)`.
    pub fn select_window_surface(
        &self,
        weights: &WindowWeights,
        values: &SurfaceField,
    ) -> Result<SurfaceField> {
        weights.check_shape(values.ny, values.nx)?;
        let mut out = SurfaceField::filled(weights.targets, values.ny, values.nx, f32::NAN);
        let mut insufficient = 0usize;

        for k in 0..weights.targets {
            for y in 0..values.ny {
                for x in 0..values.nx {
                    let mean = weighted_mean(weights.cell(k, y, x), |t| values.get(t, y, x));
                    match mean_or_missing(mean, self.min_samples) {
                        Some(v) => {
                            let idx = out.index(k, y, x);
                            out.data[idx] = v;
                        }
                        None => insufficient += 1,
                    }
                }
            }
        }

        report_insufficient(insufficient, self.min_samples);
        Ok(out)
    }

    /// Model step spacing and window half width.
    fn window(&self, local: &LocalTimeField) -> Result<(Duration, Duration)> {
        let spacing = match local.times.as_slice() {
            [first, second, ..] => *second - *first,
            _ => {
                return Err(ReconcileError::InsufficientSamples {
                    required: 2,
                    found: local.times.len(),
                })
            }
        };
        let half_width = self.half_width.unwrap_or(spacing);
        debug!(
            spacing_minutes = spacing.num_minutes(),
            half_width_minutes = half_width.num_minutes(),
            "Local time window"
        );
        Ok((spacing, half_width))
    }
}

/// Precomputed `(step, weight)` pairs per `(target, y, x)`.
#[derive(Debug, Clone)]
pub struct WindowWeights {
    targets: usize,
    ny: usize,
    nx: usize,
    weights: Vec<Vec<(usize, f64)>>,
}

impl WindowWeights {
    /// Number of target local times.
    pub fn targets(&self) -> usize {
        self.targets
    }

    /// Contributing steps of `(target, y, x)`.
    pub fn cell(&self, k: usize, y: usize, x: usize) -> &[(usize, f64)] {
        &self.weights[(k * self.ny + y) * self.nx + x]
    }

    fn check_shape(&self, ny: usize, nx: usize) -> Result<()> {
        if (ny, nx) != (self.ny, self.nx) {
            return Err(ReconcileError::shape_mismatch(
                "window cells",
                self.ny * self.nx,
                ny * nx,
            ));
        }
        Ok(())
    }
}

/// `(step, weight)` pairs for the steps of `cell` inside the window.
///
/// The axis is sorted, so only the UTC range `target - offset ± half_width`
/// is visited.
fn cell_weights(
    local: &LocalTimeField,
    cell: usize,
    target: NaiveDateTime,
    spacing: Duration,
    half_width: Duration,
) -> Vec<(usize, f64)> {
    let Some(offset) = local.offsets[cell] else {
        return Vec::new();
    };
    let spacing_ms = spacing.num_milliseconds() as f64;
    let half_width_ms = half_width.num_milliseconds() as f64;
    let (Some(start), Some(end)) = (
        target.checked_sub_signed(offset + half_width),
        target.checked_sub_signed(offset - half_width),
    ) else {
        return Vec::new();
    };
    let lo = local.times.partition_point(|t| t.naive_utc() <= start);
    let hi = local.times.partition_point(|t| t.naive_utc() < end);

    (lo..hi)
        .filter_map(|t| {
            let lt = local.times[t].naive_utc() + offset;
            let dt = (lt - target).num_milliseconds().abs() as f64;
            if dt >= half_width_ms {
                return None;
            }
            let w = 1.0 - dt / spacing_ms;
            (w > 0.0).then_some((t, w))
        })
        .collect()
}

/// Weighted mean over finite samples, with the number of contributors.
fn weighted_mean(weights: &[(usize, f64)], value: impl Fn(usize) -> f32) -> (f64, usize) {
    let mut num = 0.0;
    let mut den = 0.0;
    let mut count = 0;
    for &(t, w) in weights {
        let v = value(t);
        if v.is_finite() {
            num += w * v as f64;
            den += w;
            count += 1;
        }
    }
    if count == 0 {
        (f64::NAN, 0)
    } else {
        (num / den, count)
    }
}

fn mean_or_missing((mean, count): (f64, usize), min_samples: usize) -> Option<f32> {
    (count >= min_samples).then_some(mean as f32)
}

fn report_insufficient(cells: usize, min_samples: usize) {
    if cells > 0 {
        info!(
            values = cells,
            min_samples = min_samples,
            "Window values set to NaN: fewer contributing model steps than required"
        );
    }
}
