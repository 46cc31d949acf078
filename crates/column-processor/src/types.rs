//! Core data model: model fields, swath granules and the gridded result.

use std::collections::BTreeMap;

use column_common::{CurvilinearGrid, ObservationDay, TimeAxis};
use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

/// Well-known model variable names.
pub mod names {
    /// Mid-layer pressure (Pa).
    pub const PRESSURE_MID: &str = "pres_pa_mid";
    /// Temperature (K).
    pub const TEMPERATURE: &str = "temperature_k";
    /// Layer thickness (m).
    pub const LAYER_THICKNESS: &str = "dz_m";
    /// Tropopause pressure (Pa), surface field.
    pub const TROPOPAUSE_PRESSURE: &str = "pres_pa_trop";
    /// Surface pressure (Pa), surface field.
    pub const SURFACE_PRESSURE: &str = "surfpres_pa";
}

/// Units and description attached to a derived variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableAttrs {
    pub units: String,
    pub long_name: String,
}

impl VariableAttrs {
    pub fn new(units: impl Into<String>, long_name: impl Into<String>) -> Self {
        Self {
            units: units.into(),
            long_name: long_name.into(),
        }
    }
}

/// A 4-D `(time, z, y, x)` array in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayeredField {
    pub nt: usize,
    pub nz: usize,
    pub ny: usize,
    pub nx: usize,
    pub data: Vec<f32>,
}

impl LayeredField {
    /// Wrap a flat array, checking its length.
    pub fn new(nt: usize, nz: usize, ny: usize, nx: usize, data: Vec<f32>) -> Result<Self> {
        let expected = nt * nz * ny * nx;
        if data.len() != expected {
            return Err(ReconcileError::shape_mismatch("layered field", expected, data.len()));
        }
        Ok(Self {
            nt,
            nz,
            ny,
            nx,
            data,
        })
    }

    /// A field with every value set to `value`.
    pub fn filled(nt: usize, nz: usize, ny: usize, nx: usize, value: f32) -> Self {
        Self {
            nt,
            nz,
            ny,
            nx,
            data: vec![value; nt * nz * ny * nx],
        }
    }

    /// Number of horizontal points.
    pub fn plane_len(&self) -> usize {
        self.ny * self.nx
    }

    #[inline]
    pub fn index(&self, t: usize, z: usize, y: usize, x: usize) -> usize {
        ((t * self.nz + z) * self.ny + y) * self.nx + x
    }

    #[inline]
    pub fn get(&self, t: usize, z: usize, y: usize, x: usize) -> f32 {
        self.data[self.index(t, z, y, x)]
    }

    /// The `[z, y, x]` block of time step `t`.
    pub fn time_slice(&self, t: usize) -> &[f32] {
        let len = self.nz * self.plane_len();
        &self.data[t * len..(t + 1) * len]
    }

    /// The vertical profile at `(t, y, x)`.
    pub fn profile(&self, t: usize, y: usize, x: usize) -> Vec<f32> {
        (0..self.nz).map(|z| self.get(t, z, y, x)).collect()
    }
}

/// A 3-D `(time, y, x)` array in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceField {
    pub nt: usize,
    pub ny: usize,
    pub nx: usize,
    pub data: Vec<f32>,
}

impl SurfaceField {
    /// Wrap a flat array, checking its length.
    pub fn new(nt: usize, ny: usize, nx: usize, data: Vec<f32>) -> Result<Self> {
        let expected = nt * ny * nx;
        if data.len() != expected {
            return Err(ReconcileError::shape_mismatch("surface field", expected, data.len()));
        }
        Ok(Self { nt, ny, nx, data })
    }

    pub fn filled(nt: usize, ny: usize, nx: usize, value: f32) -> Self {
        Self {
            nt,
            ny,
            nx,
            data: vec![value; nt * ny * nx],
        }
    }

    #[inline]
    pub fn index(&self, t: usize, y: usize, x: usize) -> usize {
        (t * self.ny + y) * self.nx + x
    }

    #[inline]
    pub fn get(&self, t: usize, y: usize, x: usize) -> f32 {
        self.data[self.index(t, y, x)]
    }

    /// The `[y, x]` plane of time step `t`.
    pub fn time_slice(&self, t: usize) -> &[f32] {
        let len = self.ny * self.nx;
        &self.data[t * len..(t + 1) * len]
    }
}

/// A chemical-transport-model field on a curvilinear grid.
///
/// Layered variables are `(time, z, y, x)`; surface variables such as the
/// tropopause pressure are `(time, y, x)`. Pressure must be monotonic along z
/// within each column (either direction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelField {
    pub grid: CurvilinearGrid,
    pub times: TimeAxis,
    pub nz: usize,
    layered: BTreeMap<String, LayeredField>,
    surface: BTreeMap<String, SurfaceField>,
    attrs: BTreeMap<String, VariableAttrs>,
}

impl ModelField {
    /// Create an empty field description; add variables with the `with_*` methods.
    pub fn new(grid: CurvilinearGrid, times: TimeAxis, nz: usize) -> Self {
        Self {
            grid,
            times,
            nz,
            layered: BTreeMap::new(),
            surface: BTreeMap::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// Add a `(time, z, y, x)` variable; its shape must match the field.
    pub fn with_layered(mut self, name: impl Into<String>, field: LayeredField) -> Result<Self> {
        let name = name.into();
        let expected = self.times.len() * self.nz * self.grid.len();
        if field.nt != self.times.len()
            || field.nz != self.nz
            || field.ny != self.grid.ny
            || field.nx != self.grid.nx
        {
            return Err(ReconcileError::shape_mismatch(name, expected, field.data.len()));
        }
        self.layered.insert(name, field);
        Ok(self)
    }

    /// Add a `(time, y, x)` variable; its shape must match the field.
    pub fn with_surface(mut self, name: impl Into<String>, field: SurfaceField) -> Result<Self> {
        let name = name.into();
        let expected = self.times.len() * self.grid.len();
        if field.nt != self.times.len() || field.ny != self.grid.ny || field.nx != self.grid.nx {
            return Err(ReconcileError::shape_mismatch(name, expected, field.data.len()));
        }
        self.surface.insert(name, field);
        Ok(self)
    }

    /// Attach units/description to a variable.
    pub fn with_attrs(mut self, name: impl Into<String>, attrs: VariableAttrs) -> Self {
        self.attrs.insert(name.into(), attrs);
        self
    }

    pub fn layered(&self, name: &str) -> Option<&LayeredField> {
        self.layered.get(name)
    }

    pub fn surface(&self, name: &str) -> Option<&SurfaceField> {
        self.surface.get(name)
    }

    pub fn attrs(&self, name: &str) -> Option<&VariableAttrs> {
        self.attrs.get(name)
    }

    /// A layered variable, or `MissingVariable`.
    pub fn require_layered(&self, name: &str) -> Result<&LayeredField> {
        self.layered
            .get(name)
            .ok_or_else(|| ReconcileError::missing_variable("model field", name))
    }

    /// A surface variable, or `MissingVariable`.
    pub fn require_surface(&self, name: &str) -> Result<&SurfaceField> {
        self.surface
            .get(name)
            .ok_or_else(|| ReconcileError::missing_variable("model field", name))
    }

    pub fn layered_names(&self) -> impl Iterator<Item = &str> {
        self.layered.keys().map(String::as_str)
    }

    pub fn surface_names(&self) -> impl Iterator<Item = &str> {
        self.surface.keys().map(String::as_str)
    }

    pub fn tropopause_pressure(&self) -> Option<&SurfaceField> {
        self.surface(names::TROPOPAUSE_PRESSURE)
    }
}

/// One satellite swath granule on its own irregular footprint grid.
///
/// `averaging_kernel` is `[ny, nx, nz]`; `pressure_levels` is `[nz, ny, nx]`;
/// all other per-pixel arrays are `[ny, nx]`. The kernel-related arrays are
/// only needed for averaging-kernel correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwathGranule {
    pub grid: CurvilinearGrid,
    /// Number of retrieval vertical levels.
    pub nz: usize,
    /// Observed tropospheric column (molecules/cm²).
    pub column: Vec<f32>,
    pub averaging_kernel: Option<Vec<f32>>,
    pub pressure_levels: Option<Vec<f32>>,
    pub tropopause_pressure: Option<Vec<f32>>,
    pub amf_total: Option<Vec<f32>>,
    pub amf_troposphere: Option<Vec<f32>>,
}

const GRANULE: &str = "swath granule";

impl SwathGranule {
    /// A granule carrying only the observed column.
    pub fn new(grid: CurvilinearGrid, column: Vec<f32>) -> Result<Self> {
        grid.check_len("column", column.len())?;
        Ok(Self {
            grid,
            nz: 0,
            column,
            averaging_kernel: None,
            pressure_levels: None,
            tropopause_pressure: None,
            amf_total: None,
            amf_troposphere: None,
        })
    }

    /// Attach retrieval kernel information, validating every shape.
    pub fn with_kernel(
        mut self,
        nz: usize,
        averaging_kernel: Vec<f32>,
        pressure_levels: Vec<f32>,
        tropopause_pressure: Vec<f32>,
        amf_total: Vec<f32>,
        amf_troposphere: Vec<f32>,
    ) -> Result<Self> {
        let n = self.grid.len();
        if averaging_kernel.len() != n * nz {
            return Err(ReconcileError::shape_mismatch(
                "averaging_kernel",
                n * nz,
                averaging_kernel.len(),
            ));
        }
        if pressure_levels.len() != n * nz {
            return Err(ReconcileError::shape_mismatch(
                "pressure_levels",
                n * nz,
                pressure_levels.len(),
            ));
        }
        self.grid.check_len("tropopause_pressure", tropopause_pressure.len())?;
        self.grid.check_len("amf_total", amf_total.len())?;
        self.grid.check_len("amf_troposphere", amf_troposphere.len())?;

        self.nz = nz;
        self.averaging_kernel = Some(averaging_kernel);
        self.pressure_levels = Some(pressure_levels);
        self.tropopause_pressure = Some(tropopause_pressure);
        self.amf_total = Some(amf_total);
        self.amf_troposphere = Some(amf_troposphere);
        Ok(self)
    }

    /// Check every array present against the grid and `nz`.
    ///
    /// Granules built through `with_kernel` always pass; deserialized or
    /// hand-assembled ones may not.
    pub fn validate(&self) -> Result<()> {
        let n = self.grid.len();
        self.grid.check_len("longitude", self.grid.longitude.len())?;
        self.grid.check_len("latitude", self.grid.latitude.len())?;
        self.grid.check_len("column", self.column.len())?;
        for (name, data, expected) in [
            ("averaging_kernel", &self.averaging_kernel, n * self.nz),
            ("pressure_levels", &self.pressure_levels, n * self.nz),
            ("tropopause_pressure", &self.tropopause_pressure, n),
            ("amf_total", &self.amf_total, n),
            ("amf_troposphere", &self.amf_troposphere, n),
        ] {
            if let Some(values) = data {
                if values.len() != expected {
                    return Err(ReconcileError::shape_mismatch(name, expected, values.len()));
                }
            }
        }
        Ok(())
    }

    pub fn require_averaging_kernel(&self) -> Result<&[f32]> {
        self.averaging_kernel
            .as_deref()
            .ok_or_else(|| ReconcileError::missing_variable(GRANULE, "averaging_kernel"))
    }

    pub fn require_pressure_levels(&self) -> Result<&[f32]> {
        self.pressure_levels
            .as_deref()
            .ok_or_else(|| ReconcileError::missing_variable(GRANULE, "preslev"))
    }

    pub fn require_tropopause_pressure(&self) -> Result<&[f32]> {
        self.tropopause_pressure
            .as_deref()
            .ok_or_else(|| ReconcileError::missing_variable(GRANULE, "troppres"))
    }

    pub fn require_amf_total(&self) -> Result<&[f32]> {
        self.amf_total
            .as_deref()
            .ok_or_else(|| ReconcileError::missing_variable(GRANULE, "air_mass_factor_total"))
    }

    pub fn require_amf_troposphere(&self) -> Result<&[f32]> {
        self.amf_troposphere.as_deref().ok_or_else(|| {
            ReconcileError::missing_variable(GRANULE, "air_mass_factor_troposphere")
        })
    }
}

/// Swath granules grouped by calendar day, iterated in day order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyObservationSet {
    days: BTreeMap<ObservationDay, Vec<SwathGranule>>,
}

impl DailyObservationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a granule to its day, preserving insertion order within the day.
    pub fn push(&mut self, day: ObservationDay, granule: SwathGranule) {
        self.days.entry(day).or_default().push(granule);
    }

    pub fn days(&self) -> impl Iterator<Item = ObservationDay> + '_ {
        self.days.keys().copied()
    }

    pub fn granules(&self, day: ObservationDay) -> &[SwathGranule] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObservationDay, &[SwathGranule])> {
        self.days.iter().map(|(day, g)| (*day, g.as_slice()))
    }

    /// Number of days.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Outcome of one aggregated day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayStatus {
    Completed {
        granules_used: usize,
        granules_skipped: usize,
    },
    Failed(String),
    Cancelled,
}

/// The per-day output of the aggregator, before assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySlice {
    pub day: ObservationDay,
    pub corrected_column: Vec<f32>,
    pub model_tropospheric_column: Vec<f32>,
    pub status: DayStatus,
}

impl DaySlice {
    /// An all-missing slice for a day that failed or was never processed.
    pub fn missing(day: ObservationDay, len: usize, status: DayStatus) -> Self {
        Self {
            day,
            corrected_column: vec![f32::NAN; len],
            model_tropospheric_column: vec![f32::NAN; len],
            status,
        }
    }
}

/// Daily gridded output with dimensions `(day, y, x)` on the model grid.
///
/// Missing data is not-a-number; a cell without valid swath samples for a
/// day stays not-a-number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GriddedResult {
    pub grid: CurvilinearGrid,
    pub days: Vec<ObservationDay>,
    /// `[day, y, x]`, molecules/cm²
    pub corrected_column: Vec<f32>,
    /// `[day, y, x]`, molecules/cm²
    pub model_tropospheric_column: Vec<f32>,
    pub status: Vec<DayStatus>,
    pub attrs: BTreeMap<String, VariableAttrs>,
}

impl GriddedResult {
    /// Compose the result from per-day slices in day order.
    pub fn assemble(grid: CurvilinearGrid, slices: Vec<DaySlice>) -> Result<Self> {
        let plane = grid.len();
        let mut days = Vec::with_capacity(slices.len());
        let mut corrected_column = Vec::with_capacity(plane * slices.len());
        let mut model_tropospheric_column = Vec::with_capacity(plane * slices.len());
        let mut status = Vec::with_capacity(slices.len());

        for slice in slices {
            grid.check_len("corrected_column", slice.corrected_column.len())?;
            grid.check_len(
                "model_tropospheric_column",
                slice.model_tropospheric_column.len(),
            )?;
            days.push(slice.day);
            corrected_column.extend(slice.corrected_column);
            model_tropospheric_column.extend(slice.model_tropospheric_column);
            status.push(slice.status);
        }

        let mut attrs = BTreeMap::new();
        attrs.insert(
            "corrected_column".to_string(),
            VariableAttrs::new("molecules/cm2", "daily satellite tropospheric column at model grid"),
        );
        attrs.insert(
            "model_tropospheric_column".to_string(),
            VariableAttrs::new("molecules/cm2", "model tropospheric column at overpass time"),
        );

        Ok(Self {
            grid,
            days,
            corrected_column,
            model_tropospheric_column,
            status,
            attrs,
        })
    }

    pub fn day_index(&self, day: ObservationDay) -> Option<usize> {
        self.days.iter().position(|d| *d == day)
    }

    /// The `[y, x]` corrected-column plane of a day.
    pub fn corrected(&self, day: ObservationDay) -> Option<&[f32]> {
        let plane = self.grid.len();
        self.day_index(day)
            .map(|d| &self.corrected_column[d * plane..(d + 1) * plane])
    }

    /// The `[y, x]` model tropospheric column plane of a day.
    pub fn model_column(&self, day: ObservationDay) -> Option<&[f32]> {
        let plane = self.grid.len();
        self.day_index(day)
            .map(|d| &self.model_tropospheric_column[d * plane..(d + 1) * plane])
    }

    pub fn status(&self, day: ObservationDay) -> Option<&DayStatus> {
        self.day_index(day).map(|d| &self.status[d])
    }

    /// Write as YAML; missing values are stored as `.nan`.
    pub fn write_yaml<W: std::io::Write>(&self, writer: W) -> Result<()> {
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    pub fn read_yaml<R: std::io::Read>(reader: R) -> Result<Self> {
        Ok(serde_yaml::from_reader(reader)?)
    }
}
