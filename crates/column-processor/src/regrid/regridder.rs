//! Bilinear regridding between curvilinear grids.

use column_common::{BoundingBox, CurvilinearGrid};
use tracing::debug;

use super::interpolation::{bilinear_weights, inverse_bilinear, is_degenerate, nearest_weights, Point};
use crate::config::RegridMethod;
use crate::error::{ReconcileError, Result};

/// Corner weights below this are treated as zero when checking for NaN.
const WEIGHT_EPS: f64 = 1e-12;

/// Interpolation weights of one target point.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PointWeights {
    corners: [usize; 4],
    weights: [f64; 4],
}

/// A source cell with its corner indices and bounding box.
#[derive(Debug, Clone)]
struct SourceCell {
    corners: [usize; 4],
    quad: [Point; 4],
    bbox: BoundingBox,
}

/// Uniform bucket grid over cell bounding boxes.
struct QuadIndex {
    extent: BoundingBox,
    nbx: usize,
    nby: usize,
    buckets: Vec<Vec<usize>>,
}

impl QuadIndex {
    fn build(cells: &[SourceCell]) -> Option<Self> {
        let mut iter = cells.iter();
        let first = iter.next()?.bbox;
        let extent = iter.fold(first, |acc, c| acc.union(&c.bbox));

        let side = ((cells.len() as f64).sqrt().ceil() as usize).max(1);
        let (nbx, nby) = (side, side);
        let mut buckets = vec![Vec::new(); nbx * nby];

        let mut index = Self {
            extent,
            nbx,
            nby,
            buckets: Vec::new(),
        };
        for (id, cell) in cells.iter().enumerate() {
            let (x0, y0) = index.bucket_of(cell.bbox.min_lon, cell.bbox.min_lat);
            let (x1, y1) = index.bucket_of(cell.bbox.max_lon, cell.bbox.max_lat);
            for by in y0..=y1 {
                for bx in x0..=x1 {
                    buckets[by * nbx + bx].push(id);
                }
            }
        }
        index.buckets = buckets;
        Some(index)
    }

    fn bucket_of(&self, lon: f64, lat: f64) -> (usize, usize) {
        let fx = (lon - self.extent.min_lon) / self.extent.width().max(f64::MIN_POSITIVE);
        let fy = (lat - self.extent.min_lat) / self.extent.height().max(f64::MIN_POSITIVE);
        let bx = ((fx * self.nbx as f64) as usize).min(self.nbx - 1);
        let by = ((fy * self.nby as f64) as usize).min(self.nby - 1);
        (bx, by)
    }

    fn candidates(&self, lon: f64, lat: f64) -> &[usize] {
        if !self.extent.contains(lon, lat) {
            return &[];
        }
        let (bx, by) = self.bucket_of(lon, lat);
        &self.buckets[by * self.nbx + bx]
    }
}

/// Precomputed mapping from a source grid onto a target grid.
///
/// A fresh regridder is built for every pair of grids; nothing is cached
/// between calls.
#[derive(Debug, Clone)]
pub struct Regridder {
    source_len: usize,
    weights: Vec<Option<PointWeights>>,
    degenerate_cells: usize,
}

impl Regridder {
    /// Build weights from `source` cells to `target` points.
    ///
    /// With `ignore_degenerate` unset, a degenerate source cell is an
    /// `InvalidGeometry` error; otherwise it is skipped.
    pub fn new(
        source: &CurvilinearGrid,
        target: &CurvilinearGrid,
        method: RegridMethod,
        ignore_degenerate: bool,
    ) -> Result<Self> {
        for grid in [source, target] {
            grid.check_len("longitude", grid.longitude.len())?;
            grid.check_len("latitude", grid.latitude.len())?;
        }
        if source.ny < 2 || source.nx < 2 {
            return Err(ReconcileError::invalid_geometry(format!(
                "source grid {}x{} has no cells",
                source.ny, source.nx
            )));
        }

        let mut cells = Vec::with_capacity((source.ny - 1) * (source.nx - 1));
        let mut degenerate_cells = 0usize;
        for j in 0..source.ny - 1 {
            for i in 0..source.nx - 1 {
                let corners = [
                    source.flat_index(j, i),
                    source.flat_index(j, i + 1),
                    source.flat_index(j + 1, i + 1),
                    source.flat_index(j + 1, i),
                ];
                let quad = corners.map(|c| (source.longitude[c], source.latitude[c]));
                if is_degenerate(&quad) {
                    if !ignore_degenerate {
                        return Err(ReconcileError::invalid_geometry(format!(
                            "degenerate source cell at ({}, {})",
                            j, i
                        )));
                    }
                    degenerate_cells += 1;
                    continue;
                }
                let (lons, lats): (Vec<f64>, Vec<f64>) = quad.iter().copied().unzip();
                if let Some(bbox) = BoundingBox::from_points(&lons, &lats) {
                    cells.push(SourceCell {
                        corners,
                        quad,
                        bbox,
                    });
                }
            }
        }

        let index = QuadIndex::build(&cells);
        let weights: Vec<Option<PointWeights>> = target
            .longitude
            .iter()
            .zip(&target.latitude)
            .map(|(&lon, &lat)| {
                let index = index.as_ref()?;
                if !lon.is_finite() || !lat.is_finite() {
                    return None;
                }
                index.candidates(lon, lat).iter().find_map(|&id| {
                    let cell = &cells[id];
                    if !cell.bbox.contains(lon, lat) {
                        return None;
                    }
                    let (u, v) = inverse_bilinear(&cell.quad, (lon, lat))?;
                    let weights = match method {
                        RegridMethod::Bilinear => bilinear_weights(u, v),
                        RegridMethod::Nearest => nearest_weights(u, v),
                    };
                    Some(PointWeights {
                        corners: cell.corners,
                        weights,
                    })
                })
            })
            .collect();

        let mapped = weights.iter().filter(|w| w.is_some()).count();
        debug!(
            method = %method,
            source_cells = cells.len(),
            degenerate_cells = degenerate_cells,
            targets = target.len(),
            mapped = mapped,
            "Built regridder"
        );

        Ok(Self {
            source_len: source.len(),
            weights,
            degenerate_cells,
        })
    }

    /// Number of target points.
    pub fn target_len(&self) -> usize {
        self.weights.len()
    }

    /// Number of target points inside the source grid.
    pub fn mapped_points(&self) -> usize {
        self.weights.iter().filter(|w| w.is_some()).count()
    }

    pub fn degenerate_cells(&self) -> usize {
        self.degenerate_cells
    }

    /// Regrid one `[y, x]` plane.
    ///
    /// Targets outside the source grid, and targets whose contributing
    /// corners include a non-finite value, are NaN.
    pub fn apply(&self, source: &[f32]) -> Result<Vec<f32>> {
        if source.len() != self.source_len {
            return Err(ReconcileError::shape_mismatch(
                "regrid source",
                self.source_len,
                source.len(),
            ));
        }
        Ok(self.apply_plane(source))
    }

    /// Regrid `nlayers` stacked planes, `[layer, y, x]`.
    pub fn apply_layers(&self, source: &[f32], nlayers: usize) -> Result<Vec<f32>> {
        let expected = self.source_len * nlayers;
        if source.len() != expected {
            return Err(ReconcileError::shape_mismatch("regrid source", expected, source.len()));
        }
        let mut out = Vec::with_capacity(self.target_len() * nlayers);
        for plane in source.chunks_exact(self.source_len.max(1)).take(nlayers) {
            out.extend(self.apply_plane(plane));
        }
        Ok(out)
    }

    fn apply_plane(&self, plane: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .map(|w| match w {
                Some(pw) => interpolate(plane, pw),
                None => f32::NAN,
            })
            .collect()
    }
}

fn interpolate(plane: &[f32], pw: &PointWeights) -> f32 {
    let mut sum = 0.0f64;
    for (&corner, &weight) in pw.corners.iter().zip(&pw.weights) {
        if weight <= WEIGHT_EPS {
            continue;
        }
        let value = plane[corner];
        if !value.is_finite() {
            return f32::NAN;
        }
        sum += weight * value as f64;
    }
    sum as f32
}

/// Regrid one field from `source_grid` onto `target_grid` with a fresh regridder.
pub fn regrid(
    source_grid: &CurvilinearGrid,
    source_field: &[f32],
    target_grid: &CurvilinearGrid,
    method: RegridMethod,
    ignore_degenerate: bool,
) -> Result<Vec<f32>> {
    Regridder::new(source_grid, target_grid, method, ignore_degenerate)?.apply(source_field)
}
