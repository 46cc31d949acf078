//! Pairing model profiles with point observations at arbitrary pressures.

use chrono::{Duration, TimeZone, Utc};
use column_common::TimeAxis;
use column_processor::{
    pair_profiles, Extrapolation, ExtrapolationPolicy, ModelProfiles, ProfileObservation,
    ReconcileConfig,
};
use test_utils::assert_approx_eq;
use test_utils::fixtures::vertical;
use test_utils::{create_layered_from_profile, create_time_ramp};

/// Three hourly steps at two sites, fixture layers, ozone rising 10 ppb per layer
/// and 1 ppb per hour.
fn profiles() -> ModelProfiles {
    let start = Utc.with_ymd_and_hms(2019, 7, 15, 18, 0, 0).unwrap();
    let times = TimeAxis::regular(start, Duration::hours(1), 3).unwrap();
    let nz = vertical::MODEL_LAYERS_PA.len();
    let points = vec![(36.6, -97.5), (40.0, -105.2)];

    let pressure = create_layered_from_profile(3, &vertical::MODEL_LAYERS_PA, 1, points.len());
    let hour_ramp = create_time_ramp(3, 1, 1, 0.0, 1.0);
    let mut ozone = Vec::with_capacity(pressure.len());
    for offset in &hour_ramp {
        for z in 0..nz {
            for _ in 0..points.len() {
                ozone.push(30.0 + 10.0 * z as f32 + offset);
            }
        }
    }

    ModelProfiles::new(times, nz, points, pressure)
        .unwrap()
        .with_variable("o3", ozone)
        .unwrap()
}

fn observation(hour: u32, minute: u32, lat: f64, lon: f64, pressure: f32) -> ProfileObservation {
    ProfileObservation {
        time: Utc.with_ymd_and_hms(2019, 7, 15, hour, minute, 0).unwrap(),
        latitude: lat,
        longitude: lon,
        pressure,
    }
}

#[test]
fn test_pairing_interpolates_in_log_pressure() {
    let model = profiles();
    // Geometric mean of 85 and 70 kPa sits halfway in log-pressure
    let mid = (85_000.0f64 * 70_000.0).sqrt() as f32;
    let obs = vec![observation(19, 10, 36.5, -97.4, mid)];

    let rows = pair_profiles(&model, &obs, &["o3"], &ReconcileConfig::default()).unwrap();
    assert_eq!(rows.len(), 1);
    // Nearest step is 19:00 (offset 1), layers 1 and 2 give 41 and 51
    assert_approx_eq!(rows[0].values["o3"], 46.0, 1e-3);
    assert!(rows[0].pressure_model > 70_000.0 && rows[0].pressure_model < 85_000.0);
    assert_eq!(rows[0].extrapolation, None);
}

#[test]
fn test_pairing_flags_extrapolation() {
    let model = profiles();
    let obs = vec![
        observation(18, 0, 40.0, -105.2, 101_000.0),
        observation(20, 0, 40.0, -105.2, 5_000.0),
    ];

    let rows = pair_profiles(&model, &obs, &["o3"], &ReconcileConfig::default()).unwrap();
    assert_eq!(rows[0].extrapolation, Some(Extrapolation::BelowLowestLevel));
    assert_eq!(rows[0].values["o3"], 30.0);
    assert_eq!(rows[1].extrapolation, Some(Extrapolation::AboveHighestLevel));
    assert_eq!(rows[1].values["o3"], 82.0);
}

#[test]
fn test_missing_policy_for_variables() {
    let model = profiles();
    let obs = vec![observation(18, 0, 36.6, -97.5, 5_000.0)];
    let config = ReconcileConfig {
        variable_extrapolation: ExtrapolationPolicy::Missing,
        ..ReconcileConfig::default()
    };

    let rows = pair_profiles(&model, &obs, &["o3"], &config).unwrap();
    assert!(rows[0].values["o3"].is_nan());
    // Pressure still extrapolates linearly
    assert!(rows[0].pressure_model.is_finite());
}
