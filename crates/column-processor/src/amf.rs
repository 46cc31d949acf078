//! Tropospheric air-mass-factor recomputation with the model profile.
//!
//! For each swath pixel the retrieval averaging kernel is rescaled to the
//! troposphere (`ak * amf_total / amf_troposphere`), interpolated in
//! log-pressure onto the model layers and weighted by the model partial
//! columns:
//!
//! ```text
//! amf_model = Σ_trop(ak_trop · pc) / Σ_trop(pc) · amf_troposphere
//! ratio     = amf_troposphere / amf_model
//! ```
//!
//! Multiplying the observed column by `ratio` replaces the retrieval's a
//! priori profile with the model's.

use column_common::BoundingBox;
use tracing::{debug, info, warn};

use crate::config::{ExtrapolationPolicy, ReconcileConfig};
use crate::error::{ReconcileError, Result};
use crate::types::SwathGranule;
use crate::vertical::LogPressureProfile;

/// Model pressure and partial columns regridded onto a swath, `[z, y, x]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProfileOnSwath {
    pub nz: usize,
    /// Mid-layer pressure (Pa).
    pub pressure: Vec<f32>,
    /// Partial column (molecules/cm²).
    pub partial_column: Vec<f32>,
}

impl ModelProfileOnSwath {
    pub fn new(nz: usize, pressure: Vec<f32>, partial_column: Vec<f32>) -> Result<Self> {
        if pressure.len() != partial_column.len() {
            return Err(ReconcileError::shape_mismatch(
                "partial_column",
                pressure.len(),
                partial_column.len(),
            ));
        }
        Ok(Self {
            nz,
            pressure,
            partial_column,
        })
    }

    fn pixels(&self) -> usize {
        if self.nz == 0 {
            0
        } else {
            self.pressure.len() / self.nz
        }
    }
}

/// Per-pixel AMF correction of one granule.
#[derive(Debug, Clone, PartialEq)]
pub struct AmfCorrection {
    /// `amf_troposphere / amf_model`, 1.0 where undefined.
    pub ratio: Vec<f32>,
    /// Recomputed tropospheric AMF; NaN outside the model domain or where undefined.
    pub amf_model: Vec<f32>,
    /// Whether each pixel lies inside the model bounding box.
    pub in_domain: Vec<bool>,
    /// In-domain pixels whose ratio fell back to 1.0.
    pub fallback_count: usize,
}

impl AmfCorrection {
    pub fn in_domain_count(&self) -> usize {
        self.in_domain.iter().filter(|&&d| d).count()
    }

    /// Observed column scaled by the ratio.
    pub fn apply(&self, column: &[f32]) -> Result<Vec<f32>> {
        if column.len() != self.ratio.len() {
            return Err(ReconcileError::shape_mismatch(
                "column",
                self.ratio.len(),
                column.len(),
            ));
        }
        Ok(column
            .iter()
            .zip(&self.ratio)
            .map(|(&c, &r)| c * r)
            .collect())
    }
}

/// Recomputes tropospheric AMFs from model profiles and averaging kernels.
#[derive(Debug, Clone)]
pub struct AmfCorrector {
    align_surface_pressure: bool,
}

impl Default for AmfCorrector {
    fn default() -> Self {
        Self::new(&ReconcileConfig::default())
    }
}

impl AmfCorrector {
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            align_surface_pressure: config.align_surface_pressure,
        }
    }

    /// Correction ratio for every pixel of `swath`.
    ///
    /// Pixels outside `model_bbox` keep ratio 1.0 and are marked out of
    /// domain; without a bbox every pixel is in domain. Fails only on missing
    /// kernel variables or mismatched shapes.
    pub fn recompute_ratio(
        &self,
        swath: &SwathGranule,
        model: &ModelProfileOnSwath,
        model_bbox: Option<&BoundingBox>,
    ) -> Result<AmfCorrection> {
        swath.validate()?;
        let kernel = swath.require_averaging_kernel()?;
        let levels = swath.require_pressure_levels()?;
        let tropopause = swath.require_tropopause_pressure()?;
        let amf_total = swath.require_amf_total()?;
        let amf_trop = swath.require_amf_troposphere()?;

        let npix = swath.grid.len();
        if model.pixels() != npix || model.nz * npix != model.pressure.len() {
            return Err(ReconcileError::shape_mismatch(
                "model profile on swath",
                model.nz * npix,
                model.pressure.len(),
            ));
        }
        if model.partial_column.len() != model.pressure.len() {
            return Err(ReconcileError::shape_mismatch(
                "partial_column",
                model.pressure.len(),
                model.partial_column.len(),
            ));
        }

        let mut ratio = vec![1.0f32; npix];
        let mut amf_model = vec![f32::NAN; npix];
        let mut in_domain = vec![false; npix];
        let mut fallback_count = 0usize;

        for pix in 0..npix {
            let (lon, lat) = (swath.grid.longitude[pix], swath.grid.latitude[pix]);
            if model_bbox.is_some_and(|b| !b.contains(lon, lat)) {
                continue;
            }
            in_domain[pix] = true;

            let scale = amf_total[pix] as f64 / amf_trop[pix] as f64;
            let ak_trop: Vec<f32> = (0..swath.nz)
                .map(|k| (kernel[pix * swath.nz + k] as f64 * scale) as f32)
                .collect();
            let mut sat_pressure: Vec<f32> = (0..swath.nz).map(|k| levels[k * npix + pix]).collect();
            let model_pressure: Vec<f32> = (0..model.nz).map(|z| model.pressure[z * npix + pix]).collect();
            let partial: Vec<f32> = (0..model.nz)
                .map(|z| model.partial_column[z * npix + pix])
                .collect();

            if self.align_surface_pressure {
                align_surface(&mut sat_pressure, &model_pressure);
            }

            let amf = amf_trop[pix] as f64;
            let weighted = kernel_weighted_fraction(
                &LogPressureProfile::new(&ak_trop, &sat_pressure),
                &model_pressure,
                &partial,
                tropopause[pix],
            );
            let model_amf = weighted * amf;
            let r = amf / model_amf;

            amf_model[pix] = model_amf as f32;
            if r.is_finite() {
                ratio[pix] = r as f32;
            } else {
                fallback_count += 1;
            }
        }

        let correction = AmfCorrection {
            ratio,
            amf_model,
            in_domain,
            fallback_count,
        };
        report(&correction);
        Ok(correction)
    }
}

/// Replace the highest-pressure retrieval level with the model surface layer pressure.
fn align_surface(sat_pressure: &mut [f32], model_pressure: &[f32]) {
    let model_surface = model_pressure
        .iter()
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0)
        .fold(f32::NAN, f32::max);
    if !model_surface.is_finite() {
        return;
    }
    let surface_level = sat_pressure
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_finite())
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(k, _)| k);
    if let Some(k) = surface_level {
        sat_pressure[k] = model_surface;
    }
}

/// `Σ ak·pc / Σ pc` over tropospheric model layers, surface first.
///
/// Non-finite or non-positive kernel values take the value of the layer
/// above; layers still without a finite kernel are skipped.
fn kernel_weighted_fraction(
    kernel: &LogPressureProfile,
    model_pressure: &[f32],
    partial: &[f32],
    tropopause: f32,
) -> f64 {
    let mut order: Vec<usize> = (0..model_pressure.len())
        .filter(|&z| model_pressure[z].is_finite() && model_pressure[z] > 0.0)
        .collect();
    order.sort_by(|&a, &b| model_pressure[b].total_cmp(&model_pressure[a]));

    let ak: Vec<f64> = order
        .iter()
        .map(|&z| kernel.at(model_pressure[z], ExtrapolationPolicy::Linear))
        .collect();

    let mut numerator = 0.0f64;
    let mut denominator = 0.0f64;
    for (pos, &z) in order.iter().enumerate() {
        // NaN tropopause selects no layer
        if tropopause.is_nan() || model_pressure[z] < tropopause {
            break;
        }
        let mut value = ak[pos];
        if !value.is_finite() || value <= 0.0 {
            if let Some(&above) = ak.get(pos + 1) {
                value = above;
            }
        }
        let pc = partial[z] as f64;
        if !value.is_finite() || !pc.is_finite() {
            continue;
        }
        numerator += value * pc;
        denominator += pc;
    }
    numerator / denominator
}

fn report(correction: &AmfCorrection) {
    let in_domain = correction.in_domain_count();
    if in_domain == 0 {
        warn!("There are no observations within the model domain");
        return;
    }

    let (min, max) = correction
        .ratio
        .iter()
        .zip(&correction.in_domain)
        .filter(|(_, d)| **d)
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), (&r, _)| {
            (lo.min(r), hi.max(r))
        });
    info!(
        pixels = in_domain,
        min = min,
        max = max,
        "Done with averaging kernel revision"
    );
    if correction.fallback_count > 0 {
        let reason = ReconcileError::NonPhysicalRatio(format!(
            "{} in-domain pixels without a finite ratio",
            correction.fallback_count
        ));
        debug!(error = %reason, "AMF ratio replaced by 1.0");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use column_common::CurvilinearGrid;

    /// One pixel, retrieval levels 1000/800/600/400/200 hPa, model layers
    /// 950/850/650/450/250 hPa, tropopause at 500 hPa.
    fn granule(kernel: [f32; 5], amf_total: f32, amf_trop: f32) -> SwathGranule {
        let grid = CurvilinearGrid::new(1, 1, vec![10.0], vec![45.0]).unwrap();
        SwathGranule::new(grid, vec![1.0e15])
            .unwrap()
            .with_kernel(
                5,
                kernel.to_vec(),
                vec![100_000.0, 80_000.0, 60_000.0, 40_000.0, 20_000.0],
                vec![50_000.0],
                vec![amf_total],
                vec![amf_trop],
            )
            .unwrap()
    }

    fn model_profile(partial: [f32; 5]) -> ModelProfileOnSwath {
        ModelProfileOnSwath::new(
            5,
            vec![95_000.0, 85_000.0, 65_000.0, 45_000.0, 25_000.0],
            partial.to_vec(),
        )
        .unwrap()
    }

    fn domain() -> BoundingBox {
        BoundingBox::new(0.0, 40.0, 20.0, 50.0)
    }

    #[test]
    fn test_uniform_kernel_gives_unit_ratio() {
        let swath = granule([1.0; 5], 2.0, 2.0);
        let model = model_profile([1.0e15, 5.0e14, 2.0e14, 1.0e14, 5.0e13]);
        let out = AmfCorrector::default()
            .recompute_ratio(&swath, &model, Some(&domain()))
            .unwrap();
        assert_eq!(out.ratio, vec![1.0]);
        assert_eq!(out.amf_model, vec![2.0]);
        assert_eq!(out.fallback_count, 0);
    }

    #[test]
    fn test_zero_tropospheric_amf_falls_back() {
        let swath = granule([1.0; 5], 2.0, 0.0);
        let model = model_profile([1.0e15; 5]);
        let out = AmfCorrector::default()
            .recompute_ratio(&swath, &model, Some(&domain()))
            .unwrap();
        assert_eq!(out.ratio, vec![1.0]);
        assert_eq!(out.fallback_count, 1);
    }

    #[test]
    fn test_only_tropospheric_layers_count() {
        // Kernel 2 below 500 hPa, 10 above; model layers above the tropopause
        // must not pull the AMF up.
        let swath = granule([2.0, 2.0, 2.0, 10.0, 10.0], 1.0, 1.0);
        let model = model_profile([1.0; 5]);
        let corrector = AmfCorrector::new(&ReconcileConfig {
            align_surface_pressure: false,
            ..ReconcileConfig::default()
        });
        let out = corrector.recompute_ratio(&swath, &model, Some(&domain())).unwrap();
        assert!((out.amf_model[0] - 2.0).abs() < 1e-6);
        assert!((out.ratio[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_non_positive_kernel_is_filled_from_above() {
        let swath = granule([-1.0, -1.0, 3.0, 3.0, 3.0], 1.0, 1.0);
        let model = ModelProfileOnSwath::new(2, vec![90_000.0, 60_000.0], vec![1.0, 1.0]).unwrap();
        let corrector = AmfCorrector::new(&ReconcileConfig {
            align_surface_pressure: false,
            ..ReconcileConfig::default()
        });
        let out = corrector.recompute_ratio(&swath, &model, Some(&domain())).unwrap();
        // Layer at 900 hPa interpolates to -1 and takes 3 from the 600 hPa layer
        assert!((out.amf_model[0] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_outside_domain_keeps_unit_ratio() {
        let swath = granule([5.0; 5], 1.0, 1.0);
        let model = model_profile([1.0; 5]);
        let far = BoundingBox::new(-120.0, 20.0, -60.0, 30.0);
        let out = AmfCorrector::default()
            .recompute_ratio(&swath, &model, Some(&far))
            .unwrap();
        assert_eq!(out.ratio, vec![1.0]);
        assert!(!out.in_domain[0]);
        assert_eq!(out.in_domain_count(), 0);
        assert!(out.amf_model[0].is_nan());
    }

    #[test]
    fn test_no_bbox_means_no_domain_restriction() {
        let swath = granule([1.0; 5], 2.0, 2.0);
        let out = AmfCorrector::default()
            .recompute_ratio(&swath, &model_profile([1.0; 5]), None)
            .unwrap();
        assert_eq!(out.in_domain_count(), 1);
        assert_eq!(out.ratio, vec![1.0]);
    }

    #[test]
    fn test_malformed_granule_is_an_error() {
        let mut swath = granule([1.0; 5], 2.0, 2.0);
        swath.tropopause_pressure = Some(vec![50_000.0; 3]);
        let err = AmfCorrector::default()
            .recompute_ratio(&swath, &model_profile([1.0; 5]), Some(&domain()))
            .unwrap_err();
        assert!(matches!(err, ReconcileError::ShapeMismatch { .. }));

        let mut model = model_profile([1.0; 5]);
        model.partial_column.truncate(2);
        let err = AmfCorrector::default()
            .recompute_ratio(&granule([1.0; 5], 2.0, 2.0), &model, Some(&domain()))
            .unwrap_err();
        assert!(matches!(err, ReconcileError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_missing_kernel_is_an_error() {
        let grid = CurvilinearGrid::new(1, 1, vec![10.0], vec![45.0]).unwrap();
        let swath = SwathGranule::new(grid, vec![1.0]).unwrap();
        let err = AmfCorrector::default()
            .recompute_ratio(&swath, &model_profile([1.0; 5]), Some(&domain()))
            .unwrap_err();
        assert!(matches!(err, ReconcileError::MissingVariable { .. }));
    }

    #[test]
    fn test_apply_scales_column() {
        let correction = AmfCorrection {
            ratio: vec![0.5, 1.0],
            amf_model: vec![2.0, f32::NAN],
            in_domain: vec![true, false],
            fallback_count: 0,
        };
        assert_eq!(correction.apply(&[4.0, 4.0]).unwrap(), vec![2.0, 4.0]);
        assert!(matches!(
            correction.apply(&[4.0]),
            Err(ReconcileError::ShapeMismatch { .. })
        ));
    }
}
