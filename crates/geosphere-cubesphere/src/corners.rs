//! Bilinear sphere quads: the four corners that define a patch.

use glam::DVec3;

/// Four unit-sphere corners of a patch.
///
/// The parametric square `(x, y) ∈ [0, 1]²` maps `(0,0) → v0`, `(1,0) → v1`,
/// `(1,1) → v2` and `(0,1) → v3`; interior points are bilinearly blended
/// and pushed back onto the unit sphere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatchCorners {
    pub v0: DVec3,
    pub v1: DVec3,
    pub v2: DVec3,
    pub v3: DVec3,
}

impl PatchCorners {
    #[must_use]
    pub fn new(v0: DVec3, v1: DVec3, v2: DVec3, v3: DVec3) -> Self {
        Self { v0, v1, v2, v3 }
    }

    #[must_use]
    pub fn as_array(&self) -> [DVec3; 4] {
        [self.v0, self.v1, self.v2, self.v3]
    }

    /// Unit-sphere point at parametric `(x, y)`.
    ///
    /// Values slightly outside `[0, 1]` extrapolate, which is how border
    /// samples around a patch are placed.
    #[must_use]
    pub fn sphere_point(&self, x: f64, y: f64) -> DVec3 {
        (self.v0
            + x * (1.0 - y) * (self.v1 - self.v0)
            + x * y * (self.v2 - self.v0)
            + (1.0 - x) * y * (self.v3 - self.v0))
            .normalize()
    }

    /// Arithmetic mean of the corners. Lies inside the sphere.
    #[must_use]
    pub fn clip_centroid(&self) -> DVec3 {
        (self.v0 + self.v1 + self.v2 + self.v3) * 0.25
    }

    /// Mean of the corners projected onto the unit sphere.
    #[must_use]
    pub fn centroid(&self) -> DVec3 {
        self.clip_centroid().normalize()
    }

    /// Largest distance from `center` to any corner.
    #[must_use]
    pub fn bounding_radius(&self, center: DVec3) -> f64 {
        self.as_array()
            .iter()
            .map(|v| v.distance(center))
            .fold(0.0, f64::max)
    }

    /// Corners of the four children produced by splitting this quad.
    ///
    /// Child `i` covers the parametric window starting at
    /// `[(0,0), (½,0), (½,½), (0,½)][i]`.
    #[must_use]
    pub fn split(&self) -> [PatchCorners; 4] {
        let v01 = (self.v0 + self.v1).normalize();
        let v12 = (self.v1 + self.v2).normalize();
        let v23 = (self.v2 + self.v3).normalize();
        let v30 = (self.v3 + self.v0).normalize();
        let cn = self.centroid();
        [
            PatchCorners::new(self.v0, v01, cn, v30),
            PatchCorners::new(v01, self.v1, v12, cn),
            PatchCorners::new(cn, v12, self.v2, v23),
            PatchCorners::new(v30, cn, v23, self.v3),
        ]
    }
}
