//! Named preprocessing steps applied to a model field before pairing.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use column_common::TimeAxis;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::column::ColumnCalculator;
use crate::config::ReconcileConfig;
use crate::error::{ReconcileError, Result};
use crate::types::{LayeredField, ModelField, SurfaceField, VariableAttrs};

/// Block average of a `(time, ...)` series.
///
/// For every start time that is present on `times` (sorted, duplicates
/// removed), the mean over all steps in `[start, start + nhours]` inclusive.
/// Non-finite values are ignored; a block without finite values is NaN.
/// Returns the retained start times and the `[start, ...]` means.
pub fn average_between_hours(
    times: &TimeAxis,
    data: &[f32],
    start_times: &[DateTime<Utc>],
    nhours: i64,
) -> Result<(TimeAxis, Vec<f32>)> {
    if times.is_empty() {
        return Ok((TimeAxis::new(Vec::new())?, Vec::new()));
    }
    if data.len() % times.len() != 0 {
        return Err(ReconcileError::shape_mismatch(
            "averaged series",
            times.len() * (data.len() / times.len()).max(1),
            data.len(),
        ));
    }
    let block = data.len() / times.len();

    let mut starts: Vec<DateTime<Utc>> = start_times
        .iter()
        .copied()
        .filter(|s| times.times().contains(s))
        .collect();
    starts.sort();
    starts.dedup();

    let span = Duration::hours(nhours);
    let mut out = Vec::with_capacity(starts.len() * block);
    for &start in &starts {
        let steps: Vec<usize> = times
            .times()
            .iter()
            .enumerate()
            .filter(|(_, &t)| t >= start && t <= start + span)
            .map(|(idx, _)| idx)
            .collect();

        for k in 0..block {
            let (sum, n) = steps
                .iter()
                .map(|&t| data[t * block + k])
                .filter(|v| v.is_finite())
                .fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
            out.push(if n == 0 { f32::NAN } else { (sum / n as f64) as f32 });
        }
    }

    debug!(
        requested = start_times.len(),
        retained = starts.len(),
        nhours = nhours,
        "Averaged between hours"
    );
    Ok((TimeAxis::new(starts)?, out))
}

/// A preprocessing step, resolved by variant rather than by name lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreprocessStep {
    /// `nhours` block means of `variable` starting at each of `start_hours`.
    Average {
        variable: String,
        start_hours: Vec<DateTime<Utc>>,
        nhours: i64,
    },
    /// Tropospheric column of `species`.
    TotalColumn { species: String },
}

impl PreprocessStep {
    /// Name of the variable this step produces.
    pub fn output_name(&self) -> String {
        match self {
            Self::Average { variable, .. } => format!("{}_average", variable),
            Self::TotalColumn { species } => format!("{}_total_column", species),
        }
    }
}

/// Values produced by a preprocessing step.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValues {
    Layered(LayeredField),
    Surface(SurfaceField),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessOutput {
    pub times: TimeAxis,
    pub values: FieldValues,
    pub attrs: VariableAttrs,
}

/// Run `steps` over `field`, keyed by each step's output name.
pub fn run_preprocessing(
    field: &ModelField,
    steps: &[PreprocessStep],
    config: &ReconcileConfig,
) -> Result<BTreeMap<String, PreprocessOutput>> {
    let mut outputs = BTreeMap::new();
    for step in steps {
        let output = match step {
            PreprocessStep::Average {
                variable,
                start_hours,
                nhours,
            } => average_variable(field, variable, start_hours, *nhours)?,
            PreprocessStep::TotalColumn { species } => {
                let column = ColumnCalculator::new(config).total_column(field, species)?;
                PreprocessOutput {
                    times: field.times.clone(),
                    values: FieldValues::Surface(column.values),
                    attrs: column.attrs,
                }
            }
        };
        outputs.insert(step.output_name(), output);
    }
    Ok(outputs)
}

fn average_variable(
    field: &ModelField,
    variable: &str,
    start_hours: &[DateTime<Utc>],
    nhours: i64,
) -> Result<PreprocessOutput> {
    let units = field
        .attrs(variable)
        .map(|a| a.units.clone())
        .unwrap_or_default();
    let attrs = VariableAttrs::new(units, format!("{} hour means, starting at reported time", nhours));

    if let Some(values) = field.layered(variable) {
        let (times, data) = average_between_hours(&field.times, &values.data, start_hours, nhours)?;
        let layered = LayeredField::new(times.len(), values.nz, values.ny, values.nx, data)?;
        return Ok(PreprocessOutput {
            times,
            values: FieldValues::Layered(layered),
            attrs,
        });
    }

    let values = field.require_surface(variable)?;
    let (times, data) = average_between_hours(&field.times, &values.data, start_hours, nhours)?;
    let surface = SurfaceField::new(times.len(), values.ny, values.nx, data)?;
    Ok(PreprocessOutput {
        times,
        values: FieldValues::Surface(surface),
        attrs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::names;
    use chrono::TimeZone;
    use column_common::CurvilinearGrid;

    fn hourly(count: usize) -> TimeAxis {
        let start = Utc.with_ymd_and_hms(2019, 7, 15, 0, 0, 0).unwrap();
        TimeAxis::regular(start, Duration::hours(1), count).unwrap()
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 7, 15, h, 0, 0).unwrap()
    }

    #[test]
    fn test_average_is_inclusive() {
        let times = hourly(6);
        let data = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let (axis, out) = average_between_hours(&times, &data, &[at(3), at(1), at(9)], 2).unwrap();
        assert_eq!(axis.times(), &[at(1), at(3)]);
        assert_eq!(out, vec![2.0, 4.0]);
    }

    #[test]
    fn test_average_skips_nan() {
        let times = hourly(3);
        let data = vec![1.0, f32::NAN, 3.0, f32::NAN, f32::NAN, f32::NAN];
        let (_, out) = average_between_hours(&times, &data, &[at(0)], 2).unwrap();
        assert_eq!(out[0], 2.0);
        assert!(out[1].is_nan());
    }

    #[test]
    fn test_run_named_steps() {
        let grid = CurvilinearGrid::regular(1, 1, 0.0, 0.0, 1.0, 1.0).unwrap();
        let field = ModelField::new(grid, hourly(4), 1)
            .with_layered("no2", LayeredField::filled(4, 1, 1, 1, 2.0))
            .unwrap()
            .with_layered(names::PRESSURE_MID, LayeredField::filled(4, 1, 1, 1, 90_000.0))
            .unwrap()
            .with_layered(names::TEMPERATURE, LayeredField::filled(4, 1, 1, 1, 290.0))
            .unwrap()
            .with_layered(names::LAYER_THICKNESS, LayeredField::filled(4, 1, 1, 1, 50.0))
            .unwrap();

        let steps = vec![
            PreprocessStep::Average {
                variable: "no2".to_string(),
                start_hours: vec![at(0), at(2)],
                nhours: 1,
            },
            PreprocessStep::TotalColumn {
                species: "no2".to_string(),
            },
        ];
        let out = run_preprocessing(&field, &steps, &ReconcileConfig::default()).unwrap();

        let avg = &out["no2_average"];
        assert_eq!(avg.times.len(), 2);
        assert!(matches!(&avg.values, FieldValues::Layered(f) if f.data == vec![2.0, 2.0]));

        let total = &out["no2_total_column"];
        assert_eq!(total.attrs.units, "molecules/cm2");
        assert!(matches!(&total.values, FieldValues::Surface(f) if f.data.len() == 4));
    }

    #[test]
    fn test_step_from_yaml() {
        let yaml = "type: total_column\nspecies: no2\n";
        let step: PreprocessStep = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(step.output_name(), "no2_total_column");
    }

    #[test]
    fn test_unknown_variable() {
        let grid = CurvilinearGrid::regular(1, 1, 0.0, 0.0, 1.0, 1.0).unwrap();
        let field = ModelField::new(grid, hourly(2), 1);
        let steps = vec![PreprocessStep::Average {
            variable: "o3".to_string(),
            start_hours: vec![at(0)],
            nhours: 1,
        }];
        let err = run_preprocessing(&field, &steps, &ReconcileConfig::default()).unwrap_err();
        assert!(matches!(err, ReconcileError::MissingVariable { .. }));
    }
}
