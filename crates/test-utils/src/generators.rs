//! Synthetic data generators for model fields and satellite swaths.
//!
//! Everything is returned as plain row-major arrays so the generators can be
//! used from any crate in the workspace without creating dependency cycles.

/// Coordinates of a regular lon/lat grid.
///
/// Point `(j, i)` sits at `(lon0 + i * dlon, lat0 + j * dlat)`.
///
/// # Returns
///
/// `(longitude, latitude)`, each of length `ny * nx` in row-major order.
///
/// # Example
///
/// ```
/// use test_utils::create_regular_coords;
///
/// let (lon, lat) = create_regular_coords(2, 3, -100.0, 30.0, 0.5, 0.25);
/// assert_eq!(lon.len(), 6);
/// assert_eq!(lon[2], -99.0);
/// assert_eq!(lat[3], 30.25);
/// ```
pub fn create_regular_coords(
    ny: usize,
    nx: usize,
    lon0: f64,
    lat0: f64,
    dlon: f64,
    dlat: f64,
) -> (Vec<f64>, Vec<f64>) {
    let mut lon = Vec::with_capacity(ny * nx);
    let mut lat = Vec::with_capacity(ny * nx);
    for j in 0..ny {
        for i in 0..nx {
            lon.push(lon0 + i as f64 * dlon);
            lat.push(lat0 + j as f64 * dlat);
        }
    }
    (lon, lat)
}

/// Coordinates of a rotated, slightly sheared swath footprint.
///
/// The swath is centred on `(center_lon, center_lat)`, has pixel spacing
/// `spacing` degrees and is rotated by `angle_deg` counter-clockwise, which
/// mimics the tilted scan lines of a polar-orbiting instrument.
pub fn create_swath_coords(
    ny: usize,
    nx: usize,
    center_lon: f64,
    center_lat: f64,
    spacing: f64,
    angle_deg: f64,
) -> (Vec<f64>, Vec<f64>) {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let cy = (ny as f64 - 1.0) / 2.0;
    let cx = (nx as f64 - 1.0) / 2.0;

    let mut lon = Vec::with_capacity(ny * nx);
    let mut lat = Vec::with_capacity(ny * nx);
    for j in 0..ny {
        for i in 0..nx {
            let across = (i as f64 - cx) * spacing;
            let along = (j as f64 - cy) * spacing;
            // Pixels widen towards the swath edges
            let across = across * (1.0 + 0.05 * (across / spacing / nx as f64).powi(2));
            lon.push(center_lon + across * cos - along * sin);
            lat.push(center_lat + across * sin + along * cos);
        }
    }
    (lon, lat)
}

/// Field values `a + b * lon + c * lat` at the given coordinates.
pub fn create_linear_field(lon: &[f64], lat: &[f64], a: f64, b: f64, c: f64) -> Vec<f32> {
    lon.iter()
        .zip(lat)
        .map(|(x, y)| (a + b * x + c * y) as f32)
        .collect()
}

/// `nz` pressures (Pa) evenly spaced in log-pressure from `surface_pa`
/// down to `top_pa`, surface first.
///
/// # Example
///
/// ```
/// use test_utils::create_pressure_levels;
///
/// let p = create_pressure_levels(3, 100_000.0, 10_000.0);
/// assert_eq!(p.len(), 3);
/// assert!((p[1] - 31_622.777).abs() < 0.1);
/// ```
pub fn create_pressure_levels(nz: usize, surface_pa: f64, top_pa: f64) -> Vec<f32> {
    if nz == 1 {
        return vec![surface_pa as f32];
    }
    let (ln_s, ln_t) = (surface_pa.ln(), top_pa.ln());
    (0..nz)
        .map(|k| {
            let frac = k as f64 / (nz - 1) as f64;
            (ln_s + frac * (ln_t - ln_s)).exp() as f32
        })
        .collect()
}

/// Repeat a vertical profile over every time step and grid point.
///
/// # Returns
///
/// A `[time, z, y, x]` array.
pub fn create_layered_from_profile(nt: usize, profile: &[f32], ny: usize, nx: usize) -> Vec<f32> {
    let plane = ny * nx;
    let mut data = Vec::with_capacity(nt * profile.len() * plane);
    for _ in 0..nt {
        for &value in profile {
            data.extend(std::iter::repeat(value).take(plane));
        }
    }
    data
}

/// Repeat a vertical profile over every swath pixel in the pressure-level
/// layout `[z, y, x]`.
pub fn create_levels_per_pixel(profile: &[f32], npix: usize) -> Vec<f32> {
    create_layered_from_profile(1, profile, 1, npix)
}

/// Repeat a kernel over every swath pixel in the kernel layout `[y, x, z]`.
pub fn create_kernel_per_pixel(kernel: &[f32], npix: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(kernel.len() * npix);
    for _ in 0..npix {
        data.extend_from_slice(kernel);
    }
    data
}

/// A `[time, y, x]` series whose value at step `t` is `base + t * step`.
pub fn create_time_ramp(nt: usize, ny: usize, nx: usize, base: f32, step: f32) -> Vec<f32> {
    let plane = ny * nx;
    let mut data = Vec::with_capacity(nt * plane);
    for t in 0..nt {
        data.extend(std::iter::repeat(base + t as f32 * step).take(plane));
    }
    data
}

/// A constant array with NaN at the listed flat indices.
pub fn create_field_with_nans(len: usize, value: f32, nan_indices: &[usize]) -> Vec<f32> {
    let mut data = vec![value; len];
    for &idx in nan_indices {
        if idx < len {
            data[idx] = f32::NAN;
        }
    }
    data
}

/// Deterministic pseudo-random values in `[lo, hi)`.
///
/// Uses a simple LCG so tests stay reproducible without extra dependencies.
pub fn create_noise_field(len: usize, lo: f32, hi: f32, seed: u64) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
            lo + unit * (hi - lo)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_coords() {
        let (lon, lat) = create_regular_coords(3, 4, 0.0, 40.0, 1.0, 0.5);
        assert_eq!(lon.len(), 12);
        assert_eq!((lon[5], lat[5]), (1.0, 40.5));
    }

    #[test]
    fn test_swath_is_centred() {
        let (lon, lat) = create_swath_coords(5, 5, -95.0, 35.0, 0.1, 20.0);
        // Centre pixel sits exactly on the centre
        assert!((lon[12] + 95.0).abs() < 1e-12);
        assert!((lat[12] - 35.0).abs() < 1e-12);
    }

    #[test]
    fn test_pressure_levels_descend() {
        let p = create_pressure_levels(10, 101_325.0, 5_000.0);
        assert!(p.windows(2).all(|w| w[1] < w[0]));
        assert!((p[0] - 101_325.0).abs() < 0.5);
        assert!((p[9] - 5_000.0).abs() < 0.5);
    }

    #[test]
    fn test_layered_layout() {
        let data = create_layered_from_profile(2, &[1.0, 2.0], 1, 3);
        assert_eq!(data, vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        assert_eq!(create_kernel_per_pixel(&[1.0, 2.0], 2), vec![1.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn test_time_ramp() {
        let data = create_time_ramp(3, 1, 2, 10.0, 5.0);
        assert_eq!(data, vec![10.0, 10.0, 15.0, 15.0, 20.0, 20.0]);
    }

    #[test]
    fn test_field_with_nans() {
        let data = create_field_with_nans(4, 1.0, &[1, 9]);
        assert!(data[1].is_nan());
        assert_eq!(data[0], 1.0);
    }

    #[test]
    fn test_noise_deterministic() {
        let a = create_noise_field(100, 1.0, 2.0, 42);
        let b = create_noise_field(100, 1.0, 2.0, 42);
        assert_eq!(a, b, "Same seed should produce same data");
        assert!(a.iter().all(|&v| (1.0..2.0).contains(&v)));
        assert_ne!(a, create_noise_field(100, 1.0, 2.0, 43));
    }
}
