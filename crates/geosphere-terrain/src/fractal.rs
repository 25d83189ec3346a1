//! Multi-octave fractal Brownian motion (fBm) planet terrain.
//!
//! Samples 3D simplex noise on the unit sphere so there are no seams
//! between cube faces, remaps the result into `[0, 1]`, floods everything
//! below sea level, and scales to planet radii.

use glam::DVec3;
use noise::{NoiseFn, Simplex};

use crate::oracle::Terrain;

/// Configuration for the fractal terrain.
#[derive(Clone, Debug, PartialEq)]
pub struct FractalParams {
    /// Seed for the simplex permutation table.
    pub seed: u32,
    /// Number of noise octaves to composite.
    pub octaves: u32,
    /// Frequency multiplier between successive octaves. Default: 2.0.
    pub lacunarity: f64,
    /// Amplitude multiplier between successive octaves. Default: 0.5.
    pub persistence: f64,
    /// Frequency of the first octave in cycles per planet radius.
    pub base_frequency: f64,
    /// Height of the tallest possible peak above the sea floor, in metres.
    pub amplitude_m: f64,
    /// Planet radius in metres.
    pub radius_m: f64,
    /// Normalised height in `[0, 1]` below which the surface is ocean.
    pub sea_level: f64,
}

impl Default for FractalParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 8,
            lacunarity: 2.0,
            persistence: 0.5,
            base_frequency: 1.5,
            amplitude_m: 8_000.0,
            radius_m: 6_371_000.0,
            sea_level: 0.45,
        }
    }
}

/// fBm terrain exposed through the [`Terrain`] oracle.
pub struct FractalTerrain {
    noise: Simplex,
    params: FractalParams,
    max_amplitude: f64,
}

impl FractalTerrain {
    pub fn new(params: FractalParams) -> Self {
        let noise = Simplex::new(params.seed);
        let mut max_amplitude = 0.0;
        let mut amp = 1.0;
        for _ in 0..params.octaves {
            max_amplitude += amp;
            amp *= params.persistence;
        }
        Self {
            noise,
            params,
            max_amplitude,
        }
    }

    pub fn params(&self) -> &FractalParams {
        &self.params
    }

    /// Raw fBm in `[-1, 1]` at a point on the unit sphere.
    pub fn sample_3d(&self, point: DVec3) -> f64 {
        if self.max_amplitude <= 0.0 {
            return 0.0;
        }
        let mut total = 0.0;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = 1.0;

        for _ in 0..self.params.octaves {
            let p = point * frequency;
            total += self.noise.get([p.x, p.y, p.z]) * amplitude;
            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }

        (total / self.max_amplitude).clamp(-1.0, 1.0)
    }

    /// Height in `[0, 1]` before sea-level flooding.
    fn normalised(&self, point: DVec3) -> f64 {
        0.5 * (self.sample_3d(point) + 1.0)
    }

    /// Largest height this terrain can return, in planet radii.
    pub fn max_height(&self) -> f64 {
        self.params.amplitude_m / self.params.radius_m
    }
}

impl Terrain for FractalTerrain {
    fn height(&self, point: DVec3) -> f64 {
        let n = self.normalised(point).max(self.params.sea_level);
        let above_floor = (n - self.params.sea_level) / (1.0 - self.params.sea_level).max(f64::EPSILON);
        above_floor * self.max_height()
    }

    fn color(&self, point: DVec3, height: f64, normal: DVec3) -> [u8; 3] {
        const OCEAN: DVec3 = DVec3::new(0.05, 0.15, 0.45);
        const SAND: DVec3 = DVec3::new(0.76, 0.70, 0.50);
        const GRASS: DVec3 = DVec3::new(0.20, 0.45, 0.15);
        const ROCK: DVec3 = DVec3::new(0.40, 0.36, 0.33);
        const SNOW: DVec3 = DVec3::new(0.95, 0.95, 0.97);

        let rel = if self.max_height() > 0.0 {
            height / self.max_height()
        } else {
            0.0
        };
        let flatness = normal.dot(point).clamp(0.0, 1.0);

        let c = if rel <= 0.0 {
            OCEAN
        } else if rel < 0.02 {
            SAND
        } else if rel > 0.7 {
            ROCK.lerp(SNOW, ((rel - 0.7) / 0.3).min(1.0))
        } else {
            ROCK.lerp(GRASS, flatness.powi(4))
        };

        let to_byte = |v: f64| (v * 255.0).clamp(0.0, 255.0) as u8;
        [to_byte(c.x), to_byte(c.y), to_byte(c.z)]
    }
}
