// Centralized ingestion limits to harden against untrusted documents

// Graph size caps
pub const MAX_NODES: usize = 100_000;
pub const MAX_CONNECTIONS: usize = 250_000;
pub const MAX_PORTS_PER_NODE: usize = 512;
pub const MAX_CONTROL_POINTS: usize = 256;
pub const MAX_ID_LEN: usize = 256;

// Numeric bounds
pub const COORD_MIN: f64 = -10_000_000.0;
pub const COORD_MAX: f64 =  10_000_000.0;
pub const SIZE_MAX: f64 = 1_000_000.0;

#[inline]
pub fn in_coord_bounds(x: f64) -> bool { x.is_finite() && x >= COORD_MIN && x <= COORD_MAX }

#[inline]
pub fn in_size_bounds(w: f64) -> bool { w.is_finite() && w >= 0.0 && w <= SIZE_MAX }

#[inline]
pub fn valid_id(id: &str) -> bool { !id.is_empty() && id.len() <= MAX_ID_LEN }
