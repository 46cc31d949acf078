//! Common test fixtures for column reconciliation tests.
//!
//! This module provides pre-defined domains, vertical structures and times
//! that represent typical satellite/model pairing scenarios.

/// Common bounding box definitions for testing, `(min_lon, min_lat, max_lon, max_lat)`.
pub mod bbox {
    /// Continental United States bounding box
    pub const CONUS: (f64, f64, f64, f64) = (-130.0, 20.0, -60.0, 55.0);

    /// Small regional domain over the southern Great Plains
    pub const PLAINS: (f64, f64, f64, f64) = (-100.0, 33.0, -94.0, 38.0);

    /// Domain far from any test swath
    pub const SOUTH_PACIFIC: (f64, f64, f64, f64) = (-150.0, -40.0, -140.0, -30.0);
}

/// Common model grid specifications for testing.
pub mod grid {
    /// 0.5 degree grid over the southern Great Plains
    pub const PLAINS_HALF_DEGREE: GridSpec = GridSpec {
        nx: 13,
        ny: 11,
        min_lon: -100.0,
        min_lat: 33.0,
        dlon: 0.5,
        dlat: 0.5,
    };

    /// Tiny 4x4 grid for unit-scale scenarios
    pub const TINY_4X4: GridSpec = GridSpec {
        nx: 4,
        ny: 4,
        min_lon: 0.0,
        min_lat: 40.0,
        dlon: 1.0,
        dlat: 1.0,
    };

    /// Regular lon/lat grid specification.
    #[derive(Debug, Clone, Copy)]
    pub struct GridSpec {
        pub nx: usize,
        pub ny: usize,
        pub min_lon: f64,
        pub min_lat: f64,
        pub dlon: f64,
        pub dlat: f64,
    }

    impl GridSpec {
        /// Returns the total number of grid points.
        pub fn size(&self) -> usize {
            self.nx * self.ny
        }

        /// Returns the bounding box as (min_lon, min_lat, max_lon, max_lat).
        pub fn bbox(&self) -> (f64, f64, f64, f64) {
            (
                self.min_lon,
                self.min_lat,
                self.min_lon + (self.nx - 1) as f64 * self.dlon,
                self.min_lat + (self.ny - 1) as f64 * self.dlat,
            )
        }

        /// Returns the centre of the grid.
        pub fn center(&self) -> (f64, f64) {
            let (x0, y0, x1, y1) = self.bbox();
            ((x0 + x1) / 2.0, (y0 + y1) / 2.0)
        }

        /// Returns `(longitude, latitude)` arrays.
        pub fn coords(&self) -> (Vec<f64>, Vec<f64>) {
            crate::generators::create_regular_coords(
                self.ny,
                self.nx,
                self.min_lon,
                self.min_lat,
                self.dlon,
                self.dlat,
            )
        }
    }
}

/// Vertical structures in Pa.
pub mod vertical {
    /// Model mid-layer pressures, surface first
    pub const MODEL_LAYERS_PA: [f32; 6] = [95_000.0, 85_000.0, 70_000.0, 50_000.0, 30_000.0, 15_000.0];

    /// Retrieval pressure levels, surface first
    pub const RETRIEVAL_LEVELS_PA: [f32; 8] = [
        101_325.0, 90_000.0, 80_000.0, 65_000.0, 50_000.0, 35_000.0, 20_000.0, 10_000.0,
    ];

    /// Mid-latitude summer tropopause
    pub const TROPOPAUSE_PA: f32 = 20_000.0;

    /// Layer thickness matching `MODEL_LAYERS_PA` (m)
    pub const LAYER_THICKNESS_M: [f32; 6] = [500.0, 1_000.0, 1_500.0, 2_500.0, 3_500.0, 4_500.0];

    /// Standard-atmosphere-like temperatures matching `MODEL_LAYERS_PA` (K)
    pub const TEMPERATURE_K: [f32; 6] = [290.0, 283.0, 273.0, 253.0, 229.0, 215.0];
}

/// Common time values for testing.
pub mod time {
    /// Observation day used across scenarios
    pub const OBSERVATION_DAY: &str = "2019-07-15";

    /// Second observation day
    pub const NEXT_DAY: &str = "2019-07-16";

    /// Default overpass local time (hour, minute)
    pub const OVERPASS: (u32, u32) = (13, 30);

    /// Hourly model output for two days
    pub const HOURLY_STEPS_TWO_DAYS: usize = 48;
}

/// Typical tropospheric NO2 column magnitudes in molecules/cm².
pub mod column {
    pub const CLEAN: f32 = 1.0e15;
    pub const POLLUTED: f32 = 8.0e15;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_spec_size() {
        assert_eq!(grid::PLAINS_HALF_DEGREE.size(), 143);
        assert_eq!(grid::TINY_4X4.size(), 16);
    }

    #[test]
    fn test_grid_spec_bbox() {
        assert_eq!(grid::PLAINS_HALF_DEGREE.bbox(), (-100.0, 33.0, -94.0, 38.0));
        assert_eq!(grid::TINY_4X4.center(), (1.5, 41.5));
        assert_eq!(grid::TINY_4X4.coords().0.len(), 16);
    }

    #[test]
    fn test_vertical_tables_consistent() {
        assert_eq!(vertical::MODEL_LAYERS_PA.len(), vertical::LAYER_THICKNESS_M.len());
        assert!(vertical::MODEL_LAYERS_PA.windows(2).all(|w| w[1] < w[0]));
        assert!(vertical::RETRIEVAL_LEVELS_PA.windows(2).all(|w| w[1] < w[0]));
    }
}
