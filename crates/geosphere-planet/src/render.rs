//! Renderer interface for drawing patches.

use geosphere_cubesphere::PatchId;
use geosphere_mesh::PatchVertex;
use glam::DVec3;

/// One drawable patch.
///
/// Vertex positions are relative to the patch clip centroid; `offset`
/// places that centroid relative to the camera, so the backend can work
/// in single precision near the viewer.
#[derive(Clone, Copy, Debug)]
pub struct PatchDraw<'a> {
    pub id: PatchId,
    pub depth: u32,
    pub vertices: &'a [PatchVertex],
    /// Triangle list shared by every patch at the current detail level.
    pub indices: &'a [u32],
    /// Clip centroid minus camera position, in planet radii.
    pub offset: DVec3,
    pub clip_radius: f64,
}

impl PatchDraw<'_> {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Backend that turns patches into draw calls.
pub trait PatchRenderer {
    fn draw_patch(&mut self, draw: &PatchDraw<'_>);
}

/// A renderer that only counts what it is asked to draw.
#[derive(Clone, Debug, Default)]
pub struct DrawStats {
    pub patches: usize,
    pub triangles: usize,
    pub vertices: usize,
    pub deepest: u32,
    /// Drawn patches with their distance from the camera, in draw order.
    pub drawn: Vec<(PatchId, f64)>,
}

impl DrawStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything counted so far.
    pub fn reset(&mut self) {
        self.patches = 0;
        self.triangles = 0;
        self.vertices = 0;
        self.deepest = 0;
        self.drawn.clear();
    }
}

impl PatchRenderer for DrawStats {
    fn draw_patch(&mut self, draw: &PatchDraw<'_>) {
        self.patches += 1;
        self.triangles += draw.triangle_count();
        self.vertices += draw.vertices.len();
        self.deepest = self.deepest.max(draw.depth);
        self.drawn.push((draw.id, draw.offset.length()));
    }
}
