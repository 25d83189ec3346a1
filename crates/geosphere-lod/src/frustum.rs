//! View-frustum sphere tests in planet-local f64 space.

use glam::{DMat4, DVec3, DVec4};

/// Plane indices into the frustum planes array.
const LEFT: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const TOP: usize = 3;
const NEAR: usize = 4;
const FAR: usize = 5;

/// A view frustum defined by six inward-pointing planes.
#[derive(Clone, Debug, PartialEq)]
pub struct Frustum {
    /// Each `DVec4(a, b, c, d)` has a unit inward normal `(a, b, c)`.
    planes: [DVec4; 6],
}

impl Frustum {
    /// Extract frustum planes from a combined view-projection matrix
    /// using the Griggs-Hartmann method.
    ///
    /// Expects glam's `[0, 1]` clip depth range (`perspective_rh` and friends).
    pub fn from_view_projection(vp: &DMat4) -> Self {
        let rows = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];

        let mut planes = [DVec4::ZERO; 6];
        planes[LEFT] = rows[3] + rows[0];
        planes[RIGHT] = rows[3] - rows[0];
        planes[BOTTOM] = rows[3] + rows[1];
        planes[TOP] = rows[3] - rows[1];
        planes[NEAR] = rows[2];
        planes[FAR] = rows[3] - rows[2];

        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 0.0 {
                *plane /= len;
            }
        }

        Self { planes }
    }

    /// A frustum that contains every sphere. Used when no camera is attached.
    pub fn everything() -> Self {
        Self {
            planes: [DVec4::new(0.0, 0.0, 0.0, f64::MAX); 6],
        }
    }

    /// Signed distance of `point` from plane `index`; positive is inside.
    pub fn signed_distance(&self, index: usize, point: DVec3) -> f64 {
        let plane = self.planes[index];
        plane.truncate().dot(point) + plane.w
    }

    /// Returns `true` unless the sphere lies entirely outside some plane.
    pub fn test_sphere(&self, center: DVec3, radius: f64) -> bool {
        (0..6).all(|i| self.signed_distance(i, center) >= -radius)
    }

    pub fn planes(&self) -> &[DVec4; 6] {
        &self.planes
    }
}
