//! Camera path for the fly-down demo, in planet radii.

use geosphere_lod::Frustum;
use geosphere_planet::SphereView;
use glam::{DMat4, DVec3};

/// Lowest altitude the camera descends to, in planet radii.
pub const MIN_ALTITUDE: f64 = 1e-5;

const FOV_Y: f64 = std::f64::consts::FRAC_PI_3;
const ASPECT: f64 = 16.0 / 9.0;
const LATITUDE: f64 = 0.3;
const ORBIT_RATE: f64 = 0.002;

/// Exponential descent toward the surface while slowly orbiting.
#[derive(Clone, Debug)]
pub struct FlightPath {
    start_altitude: f64,
    descent_rate: f64,
}

impl FlightPath {
    /// `start_altitude` is in radii; `descent_rate` is the fraction of the
    /// remaining altitude lost per frame.
    pub fn new(start_altitude: f64, descent_rate: f64) -> Self {
        Self {
            start_altitude: start_altitude.max(MIN_ALTITUDE),
            descent_rate: descent_rate.clamp(0.0, 1.0),
        }
    }

    /// Altitude above the unit sphere at `frame`.
    pub fn altitude(&self, frame: u32) -> f64 {
        let remaining = (1.0 - self.descent_rate).powi(frame as i32);
        (self.start_altitude * remaining).max(MIN_ALTITUDE)
    }

    /// Camera position at `frame`.
    pub fn position(&self, frame: u32) -> DVec3 {
        let theta = frame as f64 * ORBIT_RATE;
        let dir = DVec3::new(
            theta.cos() * LATITUDE.cos(),
            LATITUDE.sin(),
            theta.sin() * LATITUDE.cos(),
        );
        dir * (1.0 + self.altitude(frame))
    }

    /// View looking at the planet center from the camera at `frame`.
    pub fn view(&self, frame: u32) -> SphereView {
        let eye = self.position(frame);
        let altitude = self.altitude(frame);
        let near = (altitude * 0.5).max(1e-7);
        let far = eye.length() + 1.0;
        let proj = DMat4::perspective_rh(FOV_Y, ASPECT, near, far);
        let view = DMat4::look_at_rh(eye, DVec3::ZERO, DVec3::Y);
        SphereView::new(eye, Frustum::from_view_projection(&(proj * view)))
    }
}
