// Centralized tolerances and helpers for canvas geometry

pub const EPS_ZOOM: f64 = 1e-9;           // smallest zoom the transform will divide by
pub const EPS_ROUNDTRIP: f64 = 1e-6;      // relative slack for screen/graph round trips

// Minimum size a resize can shrink a node to
pub const MIN_NODE_SIZE: f64 = 10.0;

#[inline] pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 { x.max(lo).min(hi) }

/// Relative comparison used by round-trip checks: scales the tolerance with
/// the magnitude of the operands so huge coordinates still compare sanely.
#[inline]
pub fn approx_eq_rel(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps * (1.0 + a.abs().max(b.abs()))
}

#[inline]
pub fn safe_div(num: f64, den: f64, fallback: f64) -> f64 {
    if den.abs() <= EPS_ZOOM { fallback } else { num / den }
}
