//! Interpolation inside a single source quadrilateral.
//!
//! Corners are ordered `p0 = (j, i)`, `p1 = (j, i+1)`, `p2 = (j+1, i+1)`,
//! `p3 = (j+1, i)`, so the cell is parameterized as
//! `p(u, v) = p0 + u·e + v·f + u·v·g`.

/// Tolerance on the unit square when accepting a point as inside.
const EDGE_EPS: f64 = 1e-9;

/// Cells with smaller absolute area (deg²) are degenerate.
const MIN_AREA: f64 = 1e-12;

pub type Point = (f64, f64);

#[inline]
fn cross(a: Point, b: Point) -> f64 {
    a.0 * b.1 - a.1 * b.0
}

#[inline]
fn sub(a: Point, b: Point) -> Point {
    (a.0 - b.0, a.1 - b.1)
}

/// Whether a quadrilateral has near-zero area or is not convex.
pub fn is_degenerate(quad: &[Point; 4]) -> bool {
    if quad.iter().any(|p| !p.0.is_finite() || !p.1.is_finite()) {
        return true;
    }

    let area = 0.5
        * (0..4)
            .map(|k| cross(quad[k], quad[(k + 1) % 4]))
            .sum::<f64>();
    if area.abs() < MIN_AREA {
        return true;
    }

    // Convex when every corner turns the same way
    let turns: Vec<f64> = (0..4)
        .map(|k| {
            let a = quad[k];
            let b = quad[(k + 1) % 4];
            let c = quad[(k + 2) % 4];
            cross(sub(b, a), sub(c, b))
        })
        .collect();
    let positive = turns.iter().all(|&t| t > 0.0);
    let negative = turns.iter().all(|&t| t < 0.0);
    !(positive || negative)
}

/// Solve `p(u, v) = point` for the fractional cell position.
///
/// Returns `None` when the point is outside the cell.
pub fn inverse_bilinear(quad: &[Point; 4], point: Point) -> Option<(f64, f64)> {
    let [p0, p1, p2, p3] = *quad;
    let e = sub(p1, p0);
    let f = sub(p3, p0);
    let g = (p0.0 - p1.0 + p2.0 - p3.0, p0.1 - p1.1 + p2.1 - p3.1);
    let h = sub(point, p0);

    let k2 = cross(g, f);
    let k1 = cross(e, f) + cross(h, g);
    let k0 = cross(h, e);

    let scale = cross(e, f).abs().max(MIN_AREA);
    let candidates: Vec<f64> = if k2.abs() < 1e-12 * scale {
        // Parallelogram: the equation in v is linear
        vec![-k0 / k1]
    } else {
        let disc = k1 * k1 - 4.0 * k0 * k2;
        if disc < 0.0 {
            return None;
        }
        // Avoids cancellation between k1 and root for near-parallelograms
        let q = -0.5 * (k1 + k1.signum() * disc.sqrt());
        vec![q / k2, k0 / q]
    };

    candidates
        .into_iter()
        .filter(|v| v.is_finite() && (-EDGE_EPS..=1.0 + EDGE_EPS).contains(v))
        .find_map(|v| {
            let u = solve_u(e, g, h, f, v)?;
            (-EDGE_EPS..=1.0 + EDGE_EPS)
                .contains(&u)
                .then(|| (u.clamp(0.0, 1.0), v.clamp(0.0, 1.0)))
        })
}

/// `u` from `h - f·v = u·(e + g·v)`, using the better-conditioned component.
fn solve_u(e: Point, g: Point, h: Point, f: Point, v: f64) -> Option<f64> {
    let dx = e.0 + g.0 * v;
    let dy = e.1 + g.1 * v;
    let u = if dx.abs() >= dy.abs() {
        (h.0 - f.0 * v) / dx
    } else {
        (h.1 - f.1 * v) / dy
    };
    u.is_finite().then_some(u)
}

/// Corner weights for fractional position `(u, v)`, in corner order.
#[inline]
pub fn bilinear_weights(u: f64, v: f64) -> [f64; 4] {
    [
        (1.0 - u) * (1.0 - v),
        u * (1.0 - v),
        u * v,
        (1.0 - u) * v,
    ]
}

/// Weights that select the corner with the largest bilinear weight.
pub fn nearest_weights(u: f64, v: f64) -> [f64; 4] {
    let w = bilinear_weights(u, v);
    let mut best = 0;
    for k in 1..4 {
        if w[k] > w[best] {
            best = k;
        }
    }
    let mut out = [0.0; 4];
    out[best] = 1.0;
    out
}
