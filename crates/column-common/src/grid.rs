//! Two-dimensional curvilinear grids.
//!
//! Both model grids and satellite swaths are described by per-point
//! longitude/latitude arrays of shape `[ny, nx]`, stored row-major
//! (`index = j * nx + i`).

use crate::error::{GridError, GridResult};
use crate::BoundingBox;
use serde::{Deserialize, Serialize};

/// A grid whose points carry explicit 2-D longitude and latitude coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvilinearGrid {
    /// Number of points in the y (row) direction
    pub ny: usize,
    /// Number of points in the x (column) direction
    pub nx: usize,
    /// Longitude of every point, `[ny, nx]` row-major
    pub longitude: Vec<f64>,
    /// Latitude of every point, `[ny, nx]` row-major
    pub latitude: Vec<f64>,
}

impl CurvilinearGrid {
    /// Create a grid from coordinate arrays, validating their lengths.
    pub fn new(ny: usize, nx: usize, longitude: Vec<f64>, latitude: Vec<f64>) -> GridResult<Self> {
        let expected = ny * nx;
        if expected == 0 {
            return Err(GridError::EmptyGrid(format!("{}x{}", ny, nx)));
        }
        if longitude.len() != expected {
            return Err(GridError::shape_mismatch("longitude", expected, longitude.len()));
        }
        if latitude.len() != expected {
            return Err(GridError::shape_mismatch("latitude", expected, latitude.len()));
        }
        Ok(Self {
            ny,
            nx,
            longitude,
            latitude,
        })
    }

    /// Build a regular lon/lat grid with `nx` columns from `first_lon` stepping
    /// `dlon`, and `ny` rows from `first_lat` stepping `dlat`.
    pub fn regular(
        ny: usize,
        nx: usize,
        first_lon: f64,
        first_lat: f64,
        dlon: f64,
        dlat: f64,
    ) -> GridResult<Self> {
        let mut longitude = Vec::with_capacity(ny * nx);
        let mut latitude = Vec::with_capacity(ny * nx);
        for j in 0..ny {
            for i in 0..nx {
                longitude.push(first_lon + i as f64 * dlon);
                latitude.push(first_lat + j as f64 * dlat);
            }
        }
        Self::new(ny, nx, longitude, latitude)
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.ny * self.nx
    }

    /// Check if grid is empty.
    pub fn is_empty(&self) -> bool {
        self.ny == 0 || self.nx == 0
    }

    /// Flat index of point (j, i).
    #[inline]
    pub fn flat_index(&self, j: usize, i: usize) -> usize {
        j * self.nx + i
    }

    /// (lon, lat) of point (j, i).
    #[inline]
    pub fn coord(&self, j: usize, i: usize) -> (f64, f64) {
        let idx = self.flat_index(j, i);
        (self.longitude[idx], self.latitude[idx])
    }

    /// Bounding box of all finite coordinates.
    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.longitude, &self.latitude)
    }

    /// Check that a data array has one value per grid point.
    pub fn check_len(&self, what: &str, len: usize) -> GridResult<()> {
        if len != self.len() {
            return Err(GridError::shape_mismatch(what, self.len(), len));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_grid_coords() {
        let grid = CurvilinearGrid::regular(3, 4, -100.0, 30.0, 0.5, 0.25).unwrap();
        assert_eq!(grid.len(), 12);
        assert_eq!(grid.coord(0, 0), (-100.0, 30.0));
        assert_eq!(grid.coord(2, 3), (-98.5, 30.5));

        let bbox = grid.bbox().unwrap();
        assert_eq!(bbox, BoundingBox::new(-100.0, 30.0, -98.5, 30.5));
    }

    #[test]
    fn test_new_rejects_bad_lengths() {
        let err = CurvilinearGrid::new(2, 2, vec![0.0; 4], vec![0.0; 3]).unwrap_err();
        assert!(matches!(err, GridError::ShapeMismatch { .. }));

        let err = CurvilinearGrid::new(0, 2, vec![], vec![]).unwrap_err();
        assert!(matches!(err, GridError::EmptyGrid(_)));
    }
}
