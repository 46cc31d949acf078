//! Model partial and total trace-gas columns.
//!
//! The partial column of a layer follows from the ideal gas law:
//!
//! ```text
//! column = c_ppbv * 1e-9 * N_A / 1e4 * dz * p_mid / (R * T)     [molecules/cm²]
//! ```

use column_common::constants::{AVOGADRO, GAS_CONSTANT, M2_TO_CM2, PPBV_TO_MOL_PER_MOL};
use tracing::{debug, warn};

use crate::config::ReconcileConfig;
use crate::error::{ReconcileError, Result};
use crate::types::{names, LayeredField, ModelField, SurfaceField, VariableAttrs};

pub const COLUMN_UNITS: &str = "molecules/cm2";

/// A derived array together with its units and description.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnOutput<T> {
    pub values: T,
    pub attrs: VariableAttrs,
}

/// Derives per-layer and total columns from a model field.
#[derive(Debug, Clone, Default)]
pub struct ColumnCalculator {
    require_tropopause: bool,
}

impl ColumnCalculator {
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            require_tropopause: config.require_tropopause,
        }
    }

    /// Per-layer column of `species` (ppbv) in molecules/cm².
    pub fn partial_column(
        &self,
        field: &ModelField,
        species: &str,
    ) -> Result<ColumnOutput<LayeredField>> {
        let conc = field.require_layered(species)?;
        let pressure = field.require_layered(names::PRESSURE_MID)?;
        let temperature = field.require_layered(names::TEMPERATURE)?;
        let thickness = field.require_layered(names::LAYER_THICKNESS)?;

        let factor = PPBV_TO_MOL_PER_MOL * AVOGADRO / M2_TO_CM2;
        let data = conc
            .data
            .iter()
            .zip(&pressure.data)
            .zip(&temperature.data)
            .zip(&thickness.data)
            .map(|(((&c, &p), &t), &dz)| {
                (c as f64 * factor * dz as f64 * p as f64 / (GAS_CONSTANT * t as f64)) as f32
            })
            .collect();

        Ok(ColumnOutput {
            values: LayeredField::new(conc.nt, conc.nz, conc.ny, conc.nx, data)?,
            attrs: VariableAttrs::new(COLUMN_UNITS, format!("{} partial column", species)),
        })
    }

    /// Tropospheric column of `species`: the sum of partial columns over
    /// layers at or below the tropopause (`pressure_mid >= tropopause`).
    ///
    /// Without a tropopause pressure the whole column counts as tropospheric
    /// and a warning is emitted, unless the calculator requires one. Layers
    /// below the surface (`pressure_mid > surface_pressure`) are excluded when
    /// a surface pressure is present.
    pub fn total_column(
        &self,
        field: &ModelField,
        species: &str,
    ) -> Result<ColumnOutput<SurfaceField>> {
        let partial = self.partial_column(field, species)?.values;
        let pressure = field.require_layered(names::PRESSURE_MID)?;

        let tropopause = match field.tropopause_pressure() {
            Some(trop) => Some(trop),
            None if self.require_tropopause => {
                return Err(ReconcileError::missing_variable(
                    "model field",
                    names::TROPOPAUSE_PRESSURE,
                ));
            }
            None => {
                warn!(
                    species = %species,
                    "No tropopause pressure available; treating the full model column as tropospheric"
                );
                None
            }
        };
        let surface = field.surface(names::SURFACE_PRESSURE);

        let (nt, ny, nx) = (partial.nt, partial.ny, partial.nx);
        let mut data = Vec::with_capacity(nt * ny * nx);
        let mut undefined_tropopause = 0usize;

        for t in 0..nt {
            for y in 0..ny {
                for x in 0..nx {
                    let trop = tropopause.map(|f| f.get(t, y, x));
                    if matches!(trop, Some(p) if !p.is_finite()) {
                        undefined_tropopause += 1;
                    }
                    let psurf = surface.map(|f| f.get(t, y, x));

                    let mut sum = 0.0f64;
                    let mut kept = 0usize;
                    let mut finite = 0usize;
                    for z in 0..partial.nz {
                        let p = pressure.get(t, z, y, x);
                        if matches!(trop, Some(tp) if p < tp) {
                            continue;
                        }
                        if matches!(psurf, Some(ps) if p > ps) {
                            continue;
                        }
                        kept += 1;
                        let value = partial.get(t, z, y, x);
                        if value.is_finite() {
                            sum += value as f64;
                            finite += 1;
                        }
                    }

                    data.push(if kept > 0 && finite == 0 {
                        f32::NAN
                    } else {
                        sum as f32
                    });
                }
            }
        }

        if undefined_tropopause > 0 {
            debug!(
                cells = undefined_tropopause,
                "Non-finite tropopause pressure; full column kept for those cells"
            );
        }

        Ok(ColumnOutput {
            values: SurfaceField::new(nt, ny, nx, data)?,
            attrs: VariableAttrs::new(COLUMN_UNITS, format!("{} tropospheric column", species)),
        })
    }
}
