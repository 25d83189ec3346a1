//! The terrain oracle consumed by generation jobs.

use glam::DVec3;

/// Height and colour source for a planet surface.
///
/// Heights are in planet radii above the unit sphere and never negative.
/// Implementations are called concurrently from worker threads and must
/// not mutate shared state.
pub trait Terrain: Send + Sync {
    /// Height above the unit sphere at `point` (a unit vector).
    fn height(&self, point: DVec3) -> f64;

    /// Surface colour at `point`, given its sampled height and surface normal.
    fn color(&self, point: DVec3, height: f64, normal: DVec3) -> [u8; 3];
}

/// A perfectly smooth sphere of a single colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlatTerrain {
    pub color: [u8; 3],
}

impl FlatTerrain {
    pub fn new(color: [u8; 3]) -> Self {
        Self { color }
    }
}

impl Default for FlatTerrain {
    fn default() -> Self {
        Self::new([128, 128, 128])
    }
}

impl Terrain for FlatTerrain {
    fn height(&self, _point: DVec3) -> f64 {
        0.0
    }

    fn color(&self, _point: DVec3, _height: f64, _normal: DVec3) -> [u8; 3] {
        self.color
    }
}
