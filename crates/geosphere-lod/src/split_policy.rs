//! Distance thresholds and depth limits for patch subdivision.
//!
//! Distances are in planet radii; only the per-body depth limit works in metres.

use std::f64::consts::PI;

/// Hard ceiling on quadtree depth regardless of body size or detail.
pub const MAX_PATCH_DEPTH: u32 = 15;

/// Camera distance (in planet radii) at which a root patch would split,
/// before the distance multiplier is applied.
pub const SUBDIVIDE_AT_CAMDIST: f64 = 5.0;

/// Broad class of the body being rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BodyType {
    Star,
    GasGiant,
    Asteroid,
    #[default]
    Rocky,
}

impl BodyType {
    /// Stars and gas giants keep splitting from further away.
    pub fn is_large(self) -> bool {
        matches!(self, BodyType::Star | BodyType::GasGiant)
    }
}

/// Scale applied to the split distance of a patch at `depth`.
///
/// Shallow patches get a larger multiplier so the first few levels split
/// early; the multiplier bottoms out at 1.
pub fn distance_multiplier(depth: u32, body: BodyType) -> f64 {
    let limit = if body.is_large() { 10 } else { 5 };
    f64::from(limit) / f64::from(depth.clamp(1, limit))
}

/// Camera distance from a patch centroid below which it should split.
pub fn split_length(depth: u32, body: BodyType) -> f64 {
    SUBDIVIDE_AT_CAMDIST / 2f64.powi(depth as i32) * distance_multiplier(depth, body)
}

/// Depth at which triangle edges of a body with `radius_m` drop below
/// `target_triangle_length` metres.
///
/// Each root patch spans a quarter of the circumference with
/// `interior_edge_len - 1` triangle edges; every level halves that.
pub fn body_max_depth(radius_m: f64, interior_edge_len: u32, target_triangle_length: f64) -> u32 {
    let circumference = 2.0 * PI * radius_m;
    let mut edge_metres = circumference / (4.0 * f64::from(interior_edge_len.saturating_sub(1).max(1)));
    let mut depth = 0;
    while edge_metres > target_triangle_length && depth < MAX_PATCH_DEPTH {
        edge_metres *= 0.5;
        depth += 1;
    }
    depth
}
