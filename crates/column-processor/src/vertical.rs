//! Vertical interpolation of model profiles in log-pressure space.
//!
//! Profiles are interpolated linearly in `ln(p)`. Non-positive or non-finite
//! pressures (and non-finite values) are dropped before interpolating.
//! Target pressures outside the model range are handled by an
//! [`ExtrapolationPolicy`]; a parallel fail-as-missing pass flags them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use column_common::TimeAxis;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{ExtrapolationPolicy, ReconcileConfig};
use crate::error::{ReconcileError, Result};

/// Where a target pressure sits relative to the model levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extrapolation {
    /// Higher pressure than every model level.
    BelowLowestLevel,
    /// Lower pressure than every model level.
    AboveHighestLevel,
}

/// A profile prepared for repeated interpolation: valid `(ln p, value)`
/// pairs sorted by ascending `ln p`.
#[derive(Debug, Clone)]
pub struct LogPressureProfile {
    points: Vec<(f64, f64)>,
}

impl LogPressureProfile {
    /// Build from parallel value/pressure slices, dropping invalid pairs.
    pub fn new(values: &[f32], pressures: &[f32]) -> Self {
        let mut points: Vec<(f64, f64)> = values
            .iter()
            .zip(pressures)
            .filter(|(v, p)| v.is_finite() && p.is_finite() && **p > 0.0)
            .map(|(&v, &p)| ((p as f64).ln(), v as f64))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        points.dedup_by(|a, b| a.0 == b.0);
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether `pressure` lies outside the profile's pressure range.
    pub fn classify(&self, pressure: f32) -> Option<Extrapolation> {
        let (first, last) = (self.points.first()?, self.points.last()?);
        let lp = (pressure as f64).ln();
        if lp > last.0 {
            Some(Extrapolation::BelowLowestLevel)
        } else if lp < first.0 {
            Some(Extrapolation::AboveHighestLevel)
        } else {
            None
        }
    }

    /// Value at `pressure`; not-a-number for invalid targets or empty profiles.
    pub fn at(&self, pressure: f32, policy: ExtrapolationPolicy) -> f64 {
        if !pressure.is_finite() || pressure <= 0.0 || self.points.is_empty() {
            return f64::NAN;
        }
        let lp = (pressure as f64).ln();
        let n = self.points.len();
        let (first, last) = (self.points[0], self.points[n - 1]);

        if lp < first.0 || lp > last.0 {
            return match policy {
                ExtrapolationPolicy::Missing => f64::NAN,
                ExtrapolationPolicy::Nearest => {
                    if lp < first.0 {
                        first.1
                    } else {
                        last.1
                    }
                }
                ExtrapolationPolicy::Linear if n < 2 => first.1,
                ExtrapolationPolicy::Linear => {
                    let (a, b) = if lp < first.0 {
                        (first, self.points[1])
                    } else {
                        (self.points[n - 2], last)
                    };
                    lerp(a, b, lp)
                }
            };
        }

        // partition_point finds the first level with ln p >= lp
        let hi = self.points.partition_point(|pt| pt.0 < lp);
        if hi < n && self.points[hi].0 == lp {
            return self.points[hi].1;
        }
        lerp(self.points[hi - 1], self.points[hi], lp)
    }
}

#[inline]
fn lerp(a: (f64, f64), b: (f64, f64), x: f64) -> f64 {
    a.1 + (b.1 - a.1) * (x - a.0) / (b.0 - a.0)
}

/// Interpolation result with per-target extrapolation flags.
#[derive(Debug, Clone, PartialEq)]
pub struct VerticalInterpolation {
    pub values: Vec<f32>,
    pub extrapolated: Vec<Option<Extrapolation>>,
}

/// Re-sample a model profile onto `target_pressures`.
///
/// The fail-as-missing pass over the model pressure itself flags every target
/// that required extrapolation, independently of `policy`.
pub fn interpolate_to_pressure(
    model_profile: &[f32],
    model_pressure: &[f32],
    target_pressures: &[f32],
    policy: ExtrapolationPolicy,
) -> VerticalInterpolation {
    let profile = LogPressureProfile::new(model_profile, model_pressure);
    let pressure_check = LogPressureProfile::new(model_pressure, model_pressure);

    let values = target_pressures
        .iter()
        .map(|&p| profile.at(p, policy) as f32)
        .collect();
    let extrapolated = target_pressures
        .iter()
        .map(|&p| {
            if pressure_check.at(p, ExtrapolationPolicy::Missing).is_nan() {
                pressure_check.classify(p)
            } else {
                None
            }
        })
        .collect();

    VerticalInterpolation {
        values,
        extrapolated,
    }
}

/// Model profiles sampled at observation positions, `(time, z, point)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfiles {
    pub times: TimeAxis,
    pub nz: usize,
    /// `(latitude, longitude)` of each sampled point.
    pub points: Vec<(f64, f64)>,
    /// Model mid-layer pressure, `[time, z, point]`.
    pub pressure: Vec<f32>,
    /// Additional variables, each `[time, z, point]`.
    pub variables: BTreeMap<String, Vec<f32>>,
}

impl ModelProfiles {
    pub fn new(
        times: TimeAxis,
        nz: usize,
        points: Vec<(f64, f64)>,
        pressure: Vec<f32>,
    ) -> Result<Self> {
        let expected = times.len() * nz * points.len();
        if pressure.len() != expected {
            return Err(ReconcileError::shape_mismatch("pressure", expected, pressure.len()));
        }
        Ok(Self {
            times,
            nz,
            points,
            pressure,
            variables: BTreeMap::new(),
        })
    }

    pub fn with_variable(mut self, name: impl Into<String>, data: Vec<f32>) -> Result<Self> {
        let name = name.into();
        if data.len() != self.pressure.len() {
            return Err(ReconcileError::shape_mismatch(name, self.pressure.len(), data.len()));
        }
        self.variables.insert(name, data);
        Ok(self)
    }

    fn column(&self, data: &[f32], t: usize, point: usize) -> Vec<f32> {
        let np = self.points.len();
        (0..self.nz)
            .map(|z| data[(t * self.nz + z) * np + point])
            .collect()
    }

    fn nearest_point(&self, lat: f64, lon: f64) -> Option<usize> {
        self.points
            .iter()
            .enumerate()
            .map(|(idx, &(plat, plon))| (idx, (plat - lat).powi(2) + (plon - lon).powi(2)))
            .filter(|(_, d)| d.is_finite())
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(idx, _)| idx)
    }
}

/// One observation to pair with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileObservation {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Observation pressure (Pa).
    pub pressure: f32,
}

/// A paired observation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedRecord {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub pressure_obs: f32,
    /// Model pressure interpolated to the observation level.
    pub pressure_model: f32,
    pub values: BTreeMap<String, f32>,
    pub extrapolation: Option<Extrapolation>,
}

/// Pair observations with model profiles.
///
/// For each observation the model point nearest in position and the model
/// step nearest in time are selected; the model pressure is interpolated with
/// the configured pressure policy and every requested variable with the
/// variable policy. Observations needing extrapolation are reported.
pub fn pair_profiles(
    model: &ModelProfiles,
    observations: &[ProfileObservation],
    variables: &[&str],
    config: &ReconcileConfig,
) -> Result<Vec<PairedRecord>> {
    let mut selected = Vec::with_capacity(variables.len());
    for &name in variables {
        let data = model
            .variables
            .get(name)
            .ok_or_else(|| ReconcileError::missing_variable("model profiles", name))?;
        selected.push((name, data));
    }

    let mut records = Vec::with_capacity(observations.len());
    for (row, obs) in observations.iter().enumerate() {
        let (Some(point), Some(t)) = (
            model.nearest_point(obs.latitude, obs.longitude),
            model.times.nearest_index(obs.time),
        ) else {
            warn!(row = row, "No model profile available for observation; skipped");
            continue;
        };

        let pressure = model.column(&model.pressure, t, point);
        let target = [obs.pressure];
        let interp = interpolate_to_pressure(&pressure, &pressure, &target, config.pressure_extrapolation);
        let extrapolation = interp.extrapolated[0];

        match extrapolation {
            Some(Extrapolation::BelowLowestLevel) => info!(
                row = row,
                pressure_obs = obs.pressure,
                "Note: observation is below the mid-point of the lowest model level; extrapolating"
            ),
            Some(Extrapolation::AboveHighestLevel) => warn!(
                row = row,
                pressure_obs = obs.pressure,
                "Observation is above the mid-point of the highest model level; extrapolating beyond the model top, proceed with caution"
            ),
            None => {}
        }

        let values = selected
            .iter()
            .map(|&(name, data)| {
                let column = model.column(data, t, point);
                let profile = LogPressureProfile::new(&column, &pressure);
                (
                    name.to_string(),
                    profile.at(obs.pressure, config.variable_extrapolation) as f32,
                )
            })
            .collect();

        records.push(PairedRecord {
            time: obs.time,
            latitude: obs.latitude,
            longitude: obs.longitude,
            pressure_obs: obs.pressure,
            pressure_model: interp.values[0],
            values,
            extrapolation,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_log_pressure_interpolation() {
        let values = [10.0, 20.0];
        let pressures = [100_000.0, 10_000.0];
        let mid = (100_000.0f64 * 10_000.0).sqrt() as f32;
        let out = interpolate_to_pressure(&values, &pressures, &[mid], ExtrapolationPolicy::Missing);
        assert!((out.values[0] - 15.0).abs() < 1e-4);
        assert_eq!(out.extrapolated[0], None);
    }

    #[test]
    fn test_invalid_pressures_excluded() {
        let values = [10.0, 99.0, 20.0];
        let pressures = [100_000.0, -5.0, 10_000.0];
        let profile = LogPressureProfile::new(&values, &pressures);
        assert!((profile.at(100_000.0, ExtrapolationPolicy::Missing) - 10.0).abs() < 1e-9);
        assert!(profile.at(0.0, ExtrapolationPolicy::Nearest).is_nan());
    }

    #[test]
    fn test_extrapolation_policies() {
        let values = [10.0, 20.0];
        let pressures = [100_000.0, 10_000.0];
        let target = [1_000.0];

        let linear = interpolate_to_pressure(&values, &pressures, &target, ExtrapolationPolicy::Linear);
        assert!((linear.values[0] - 30.0).abs() < 1e-4);
        assert_eq!(linear.extrapolated[0], Some(Extrapolation::AboveHighestLevel));

        let nearest = interpolate_to_pressure(&values, &pressures, &target, ExtrapolationPolicy::Nearest);
        assert_eq!(nearest.values[0], 20.0);

        let missing = interpolate_to_pressure(&values, &pressures, &target, ExtrapolationPolicy::Missing);
        assert!(missing.values[0].is_nan());

        let below = interpolate_to_pressure(&values, &pressures, &[101_000.0], ExtrapolationPolicy::Nearest);
        assert_eq!(below.values[0], 10.0);
        assert_eq!(below.extrapolated[0], Some(Extrapolation::BelowLowestLevel));
    }

    #[test]
    fn test_pair_profiles_nearest_time_and_point() {
        let start = Utc.with_ymd_and_hms(2019, 7, 15, 12, 0, 0).unwrap();
        let times = TimeAxis::regular(start, Duration::hours(1), 2).unwrap();
        // Two points, two levels: [time, z, point]
        let pressure = vec![
            100_000.0, 100_000.0, 50_000.0, 50_000.0, // t0
            100_000.0, 100_000.0, 50_000.0, 50_000.0, // t1
        ];
        let o3 = vec![
            1.0, 2.0, 3.0, 4.0, // t0
            5.0, 6.0, 7.0, 8.0, // t1
        ];
        let model = ModelProfiles::new(times, 2, vec![(40.0, -105.0), (41.0, -104.0)], pressure)
            .unwrap()
            .with_variable("o3", o3)
            .unwrap();

        let obs = vec![
            ProfileObservation {
                time: start + Duration::minutes(50),
                latitude: 41.0,
                longitude: -104.0,
                pressure: 50_000.0,
            },
            ProfileObservation {
                time: start,
                latitude: 40.0,
                longitude: -105.0,
                pressure: 20_000.0,
            },
        ];

        let rows = pair_profiles(&model, &obs, &["o3"], &ReconcileConfig::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values["o3"], 8.0);
        assert_eq!(rows[0].extrapolation, None);
        // Above the model top: nearest value, linear pressure
        assert_eq!(rows[1].values["o3"], 3.0);
        assert_eq!(rows[1].extrapolation, Some(Extrapolation::AboveHighestLevel));
        assert!(rows[1].pressure_model < 50_000.0);
    }

    #[test]
    fn test_pair_profiles_missing_variable() {
        let start = Utc.with_ymd_and_hms(2019, 7, 15, 12, 0, 0).unwrap();
        let times = TimeAxis::regular(start, Duration::hours(1), 1).unwrap();
        let model = ModelProfiles::new(times, 1, vec![(40.0, -105.0)], vec![90_000.0]).unwrap();
        let err = pair_profiles(&model, &[], &["no2"], &ReconcileConfig::default()).unwrap_err();
        assert!(matches!(err, ReconcileError::MissingVariable { .. }));
    }
}
