//! Configuration for column reconciliation.

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration shared by the aligner, interpolators, corrector and aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Local wall-clock time of the satellite overpass on each observation day.
    pub overpass_local_time: NaiveTime,

    /// Half width of the time window around the overpass, in minutes.
    /// `None` uses the model output spacing.
    pub window_half_width_minutes: Option<i64>,

    /// Minimum number of contributing model steps for a windowed value.
    pub min_window_samples: usize,

    /// How local time is derived from longitude.
    pub local_time_mode: LocalTimeMode,

    /// Extrapolation used for pressure variables during vertical interpolation.
    pub pressure_extrapolation: ExtrapolationPolicy,

    /// Extrapolation used for all other variables during vertical interpolation.
    pub variable_extrapolation: ExtrapolationPolicy,

    /// Horizontal regridding method.
    pub regrid_method: RegridMethod,

    /// Skip degenerate source cells instead of failing.
    pub ignore_degenerate: bool,

    /// Whether observed columns are AMF-corrected before regridding.
    pub correction_mode: CorrectionMode,

    /// Replace the retrieval surface pressure with the model's lowest layer pressure.
    pub align_surface_pressure: bool,

    /// Fail instead of warning when no tropopause pressure is available.
    pub require_tropopause: bool,

    /// Only strictly positive regridded columns count towards the daily mean.
    pub positive_only: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            overpass_local_time: NaiveTime::from_hms_opt(13, 30, 0).unwrap_or_default(),
            window_half_width_minutes: None,
            min_window_samples: 2,
            local_time_mode: LocalTimeMode::HourBand,
            pressure_extrapolation: ExtrapolationPolicy::Linear,
            variable_extrapolation: ExtrapolationPolicy::Nearest,
            regrid_method: RegridMethod::Bilinear,
            ignore_degenerate: true,
            correction_mode: CorrectionMode::AveragingKernel,
            align_surface_pressure: true,
            require_tropopause: false,
            positive_only: true,
        }
    }
}

impl ReconcileConfig {
    /// Load configuration from environment variables over the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("COLUMN_OVERPASS_LOCAL_TIME") {
            if let Ok(t) = NaiveTime::parse_from_str(&val, "%H:%M") {
                config.overpass_local_time = t;
            }
        }

        if let Ok(val) = std::env::var("COLUMN_WINDOW_HALF_WIDTH_MINUTES") {
            if let Ok(minutes) = val.parse() {
                config.window_half_width_minutes = Some(minutes);
            }
        }

        if let Ok(val) = std::env::var("COLUMN_MIN_WINDOW_SAMPLES") {
            if let Ok(n) = val.parse() {
                config.min_window_samples = n;
            }
        }

        if let Ok(val) = std::env::var("COLUMN_LOCAL_TIME_MODE") {
            config.local_time_mode = LocalTimeMode::from_str(&val);
        }

        if let Ok(val) = std::env::var("COLUMN_PRESSURE_EXTRAPOLATION") {
            config.pressure_extrapolation = ExtrapolationPolicy::from_str(&val);
        }

        if let Ok(val) = std::env::var("COLUMN_VARIABLE_EXTRAPOLATION") {
            config.variable_extrapolation = ExtrapolationPolicy::from_str(&val);
        }

        if let Ok(val) = std::env::var("COLUMN_REGRID_METHOD") {
            config.regrid_method = RegridMethod::from_str(&val);
        }

        if let Ok(val) = std::env::var("COLUMN_CORRECTION_MODE") {
            config.correction_mode = CorrectionMode::from_str(&val);
        }

        if let Ok(val) = std::env::var("COLUMN_IGNORE_DEGENERATE") {
            config.ignore_degenerate = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("COLUMN_ALIGN_SURFACE_PRESSURE") {
            config.align_surface_pressure = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("COLUMN_REQUIRE_TROPOPAUSE") {
            config.require_tropopause = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("COLUMN_POSITIVE_ONLY") {
            config.positive_only = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Parse a YAML document; missing keys take their default values.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a JSON document; missing keys take their default values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.min_window_samples == 0 {
            return Err("min_window_samples must be > 0".to_string());
        }

        if let Some(minutes) = self.window_half_width_minutes {
            if minutes <= 0 {
                return Err("window_half_width_minutes must be > 0".to_string());
            }
        }

        if self.pressure_extrapolation == ExtrapolationPolicy::Missing {
            return Err(
                "pressure_extrapolation must be linear or nearest; missing is reserved for diagnostics"
                    .to_string(),
            );
        }

        Ok(())
    }

    /// Explicit window half width, if configured.
    pub fn window_half_width(&self) -> Option<Duration> {
        self.window_half_width_minutes.map(Duration::minutes)
    }
}

/// What happens to target pressures outside the model's pressure range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtrapolationPolicy {
    /// Extend the outermost segment linearly in log-pressure.
    Linear,
    /// Repeat the outermost valid value.
    Nearest,
    /// Produce not-a-number.
    Missing,
}

impl ExtrapolationPolicy {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "linear" => Self::Linear,
            "missing" | "nan" => Self::Missing,
            _ => Self::Nearest,
        }
    }
}

/// Horizontal regridding method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegridMethod {
    /// Bilinear weights from the enclosing source quadrilateral.
    #[default]
    Bilinear,
    /// Value of the closest corner of the enclosing source quadrilateral.
    Nearest,
}

impl RegridMethod {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "nearest" | "nearest_s2d" => Self::Nearest,
            _ => Self::Bilinear,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bilinear => "bilinear",
            Self::Nearest => "nearest",
        }
    }
}

impl std::fmt::Display for RegridMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derivation of local time from longitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalTimeMode {
    /// Whole-hour offset: `round(lon / 15)` hours.
    #[default]
    HourBand,
    /// Continuous offset: `lon / 15` hours, millisecond precision.
    Geographic,
}

impl LocalTimeMode {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "geographic" => Self::Geographic,
            _ => Self::HourBand,
        }
    }
}

/// Whether observed columns are corrected with the model profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMode {
    /// Recompute the tropospheric AMF with the averaging kernel.
    #[default]
    AveragingKernel,
    /// Regrid observed columns unchanged.
    Direct,
}

impl CorrectionMode {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "direct" | "none" => Self::Direct,
            _ => Self::AveragingKernel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReconcileConfig::default();
        assert_eq!(
            config.overpass_local_time,
            NaiveTime::from_hms_opt(13, 30, 0).unwrap()
        );
        assert_eq!(config.min_window_samples, 2);
        assert_eq!(config.pressure_extrapolation, ExtrapolationPolicy::Linear);
        assert_eq!(config.variable_extrapolation, ExtrapolationPolicy::Nearest);
        assert_eq!(config.regrid_method, RegridMethod::Bilinear);
        assert!(config.ignore_degenerate);
        assert!(!config.require_tropopause);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ReconcileConfig::default();
        config.min_window_samples = 0;
        assert!(config.validate().is_err());

        config = ReconcileConfig::default();
        config.window_half_width_minutes = Some(0);
        assert!(config.validate().is_err());

        config = ReconcileConfig::default();
        config.pressure_extrapolation = ExtrapolationPolicy::Missing;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_yaml_partial() {
        let yaml = "overpass_local_time: \"13:00:00\"\nwindow_half_width_minutes: 90\ncorrection_mode: direct\n";
        let config = ReconcileConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(
            config.overpass_local_time,
            NaiveTime::from_hms_opt(13, 0, 0).unwrap()
        );
        assert_eq!(config.window_half_width(), Some(Duration::minutes(90)));
        assert_eq!(config.correction_mode, CorrectionMode::Direct);
        assert_eq!(config.regrid_method, RegridMethod::Bilinear);
    }

    #[test]
    fn test_from_json() {
        let config =
            ReconcileConfig::from_json_str(r#"{"local_time_mode": "geographic", "positive_only": false}"#)
                .unwrap();
        assert_eq!(config.local_time_mode, LocalTimeMode::Geographic);
        assert!(!config.positive_only);
        assert!(ReconcileConfig::from_json_str("{").is_err());
    }

    #[test]
    fn test_from_env_reads_vertical_and_regrid_keys() {
        std::env::set_var("COLUMN_VARIABLE_EXTRAPOLATION", "missing");
        std::env::set_var("COLUMN_IGNORE_DEGENERATE", "false");
        let config = ReconcileConfig::from_env();
        std::env::remove_var("COLUMN_VARIABLE_EXTRAPOLATION");
        std::env::remove_var("COLUMN_IGNORE_DEGENERATE");

        assert_eq!(config.variable_extrapolation, ExtrapolationPolicy::Missing);
        assert!(!config.ignore_degenerate);
        assert_eq!(config.pressure_extrapolation, ExtrapolationPolicy::Linear);
        assert!(config.align_surface_pressure);
    }

    #[test]
    fn test_enum_from_str() {
        assert_eq!(RegridMethod::from_str("NEAREST"), RegridMethod::Nearest);
        assert_eq!(RegridMethod::from_str("patch"), RegridMethod::Bilinear);
        assert_eq!(ExtrapolationPolicy::from_str("nan"), ExtrapolationPolicy::Missing);
        assert_eq!(LocalTimeMode::from_str("Geographic"), LocalTimeMode::Geographic);
        assert_eq!(CorrectionMode::from_str("none"), CorrectionMode::Direct);
    }
}
