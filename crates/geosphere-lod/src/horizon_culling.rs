//! Horizon culling for patches on a spherical body.
//!
//! The body is approximated by a reference sphere at the origin. A patch's
//! bounding sphere is hidden when its view cone lies inside the reference
//! sphere's view cone and it sits entirely behind the plane through the
//! silhouette circle. Everything is expressed in planet radii.

use geosphere_cubesphere::PatchCorners;
use glam::DVec3;

/// Parametric positions of the sample spheres used to refine the test.
pub const HORIZON_SAMPLE_UVS: [(f64, f64); 5] =
    [(0.5, 0.5), (0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];

/// Radius of each sample sphere as a fraction of the patch clip radius.
pub const SAMPLE_RADIUS_FRACTION: f64 = 0.1;

/// Patches whose centre faces the camera more than this are never horizon tested.
const FACING_THRESHOLD: f64 = 0.25;

/// A bounding sphere in planet-local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

impl BoundingSphere {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }
}

/// Horizon culling state for one camera position.
#[derive(Clone, Debug)]
pub struct HorizonCuller {
    camera_pos: DVec3,
    reference_radius: f64,
}

impl HorizonCuller {
    /// Culler for a camera at `camera_pos` around a reference sphere of
    /// `reference_radius` centred on the origin.
    pub fn new(camera_pos: DVec3, reference_radius: f64) -> Self {
        Self {
            camera_pos,
            reference_radius,
        }
    }

    /// Culler against the unit reference sphere.
    pub fn unit(camera_pos: DVec3) -> Self {
        Self::new(camera_pos, 1.0)
    }

    pub fn camera_pos(&self) -> DVec3 {
        self.camera_pos
    }

    /// Cone-vs-sphere test. Returns `false` only if `obj` is fully hidden
    /// behind the reference sphere.
    pub fn is_visible(&self, obj: BoundingSphere) -> bool {
        let o1c = -self.camera_pos;
        let o2c = obj.center - self.camera_pos;
        let d1 = o1c.length();
        let d2 = o2c.length();
        let r1 = self.reference_radius;
        let r2 = obj.radius;

        if d1 <= r1 || d2 <= r2 {
            // Camera inside one of the spheres: no meaningful cone.
            return true;
        }

        let u1 = o1c / d1;
        let u2 = o2c / d2;
        let k = u1.dot(u2);
        let k1 = r1 / d1;
        let k2 = r2 / d2;

        // The object cone must be narrower than the occluder cone and lie within it.
        let inside_cone =
            k2 < k1 && k > k1 * k2 && -2.0 * k * k1 * k2 + k1 * k1 + k2 * k2 >= 1.0 - k * k;
        if !inside_cone {
            return true;
        }

        // Plane through the silhouette circle, normal towards the camera.
        let plane_point = -(r1 * r1 / d1) * u1;
        let distance = (-u1).dot(obj.center - plane_point);
        distance > -r2
    }

    /// Whether a patch is worth horizon testing at all: only patches whose
    /// centre faces away from the camera can be behind the horizon.
    pub fn needs_test(&self, clip: BoundingSphere) -> bool {
        let cam_dir = self.camera_pos - clip.center;
        if cam_dir.length_squared() <= clip.radius * clip.radius {
            return false;
        }
        let facing = cam_dir.normalize().dot(clip.center.normalize_or_zero());
        facing < FACING_THRESHOLD
    }

    /// Full patch test: the clip sphere first, then each sample sphere.
    ///
    /// The patch is hidden only if the clip sphere and every sample sphere are hidden.
    pub fn is_patch_visible(&self, clip: BoundingSphere, samples: &[DVec3]) -> bool {
        if !self.needs_test(clip) || self.is_visible(clip) {
            return true;
        }
        let radius = clip.radius * SAMPLE_RADIUS_FRACTION;
        samples
            .iter()
            .any(|&center| self.is_visible(BoundingSphere::new(center, radius)))
    }
}

/// Sample sphere centres on a patch, at [`HORIZON_SAMPLE_UVS`] scaled by `scale`.
pub fn horizon_samples(corners: &PatchCorners, scale: f64) -> [DVec3; 5] {
    HORIZON_SAMPLE_UVS.map(|(u, v)| corners.sphere_point(u, v) * scale)
}
