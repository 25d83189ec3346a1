//! Patch generation jobs.
//!
//! Each job samples the terrain oracle over a grid with a one-vertex border,
//! so normals at the patch edge can use central differences, then copies
//! out the interior heights, normals, colours and sample directions. The
//! quad job samples one grid at twice the resolution and cuts all four
//! children from it, so siblings share their common edges exactly.

use std::sync::Arc;

use geosphere_cubesphere::{PatchCorners, PatchId};
use glam::{DVec3, Vec3};

use crate::job_queue::Job;
use crate::oracle::Terrain;

/// Everything a generation job needs, owned by the job.
#[derive(Clone)]
pub struct PatchRequest {
    pub corners: PatchCorners,
    /// Depth of the requesting patch.
    pub depth: u32,
    /// Identifier of the requesting patch.
    pub id: PatchId,
    /// Interior vertices per patch edge.
    pub edge_len: u32,
    pub terrain: Arc<dyn Terrain>,
}

impl PatchRequest {
    fn interior_len(&self) -> usize {
        assert!(
            self.edge_len >= 2,
            "patch request {} needs at least 2 vertices per edge, got {}",
            self.id,
            self.edge_len
        );
        self.edge_len as usize
    }
}

/// Sampled surface of one patch. All arrays are `edge_len²`, row-major.
#[derive(Clone, Debug)]
pub struct PatchData {
    pub id: PatchId,
    pub corners: PatchCorners,
    pub edge_len: u32,
    /// Heights above the unit sphere, in planet radii.
    pub heights: Vec<f64>,
    pub normals: Vec<Vec3>,
    pub colors: Vec<[u8; 3]>,
    /// Unit-sphere sample directions.
    pub positions: Vec<DVec3>,
}

impl PatchData {
    pub fn index(&self, x: u32, y: u32) -> usize {
        (x + y * self.edge_len) as usize
    }

    /// Heights at the four interior corners, in corner order.
    pub fn corner_heights(&self) -> [f64; 4] {
        let last = self.edge_len - 1;
        [(0, 0), (last, 0), (last, last), (0, last)].map(|(x, y)| self.heights[self.index(x, y)])
    }

    pub fn min_height(&self) -> f64 {
        self.heights.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Displaced surface position of vertex `i`.
    pub fn displaced(&self, i: usize) -> DVec3 {
        self.positions[i] * (1.0 + self.heights[i])
    }
}

/// Payload of a completed split.
#[derive(Debug)]
pub enum SplitKind {
    /// Data for the requesting patch itself.
    Single(PatchData),
    /// Data for the four children of the requesting patch.
    Quad(Box<[PatchData; 4]>),
}

/// Output of a generation job, routed back to the requesting patch.
#[derive(Debug)]
pub struct SplitResult {
    pub face: u8,
    pub depth: u32,
    /// Identifier of the requesting patch.
    pub id: PatchId,
    pub kind: SplitKind,
}

/// Terrain samples over a square grid with a one-vertex border.
struct BorderedGrid {
    len: usize,
    directions: Vec<DVec3>,
    heights: Vec<f64>,
    displaced: Vec<DVec3>,
}

impl BorderedGrid {
    /// Sample `len²` points; grid index `g` sits at parameter `(g - 1) · step`.
    fn sample(corners: &PatchCorners, len: usize, step: f64, terrain: &dyn Terrain) -> Self {
        let mut directions = Vec::with_capacity(len * len);
        let mut heights = Vec::with_capacity(len * len);
        let mut displaced = Vec::with_capacity(len * len);
        for gy in 0..len {
            let yfrac = (gy as f64 - 1.0) * step;
            for gx in 0..len {
                let xfrac = (gx as f64 - 1.0) * step;
                let p = corners.sphere_point(xfrac, yfrac);
                let h = terrain.height(p);
                directions.push(p);
                heights.push(h);
                displaced.push(p * (h + 1.0));
            }
        }
        Self {
            len,
            directions,
            heights,
            displaced,
        }
    }

    /// Cut out an `edge × edge` patch whose first interior vertex is grid
    /// cell `(ox + 1, oy + 1)`.
    fn extract(
        &self,
        id: PatchId,
        corners: PatchCorners,
        edge: usize,
        (ox, oy): (usize, usize),
        terrain: &dyn Terrain,
    ) -> PatchData {
        debug_assert!(ox + edge + 1 < self.len && oy + edge + 1 < self.len);
        let n = edge * edge;
        let mut data = PatchData {
            id,
            corners,
            edge_len: edge as u32,
            heights: Vec::with_capacity(n),
            normals: Vec::with_capacity(n),
            colors: Vec::with_capacity(n),
            positions: Vec::with_capacity(n),
        };
        let at = |x: usize, y: usize| x + y * self.len;
        for y in oy + 1..=oy + edge {
            for x in ox + 1..=ox + edge {
                let i = at(x, y);
                let dx = self.displaced[at(x + 1, y)] - self.displaced[at(x - 1, y)];
                let dy = self.displaced[at(x, y + 1)] - self.displaced[at(x, y - 1)];
                let normal = dx.cross(dy).normalize();
                let point = self.directions[i];
                let height = self.heights[i];

                data.heights.push(height);
                data.normals.push(normal.as_vec3());
                data.colors.push(terrain.color(point, height, normal));
                data.positions.push(point);
            }
        }
        data
    }
}

/// Generates data for a single patch: the initial request of a root.
pub struct SinglePatchJob {
    request: PatchRequest,
}

impl SinglePatchJob {
    pub fn new(request: PatchRequest) -> Self {
        Self { request }
    }

    pub fn generate(&self) -> PatchData {
        let req = &self.request;
        let edge = req.interior_len();
        let step = 1.0 / (edge - 1) as f64;
        let grid = BorderedGrid::sample(&req.corners, edge + 2, step, req.terrain.as_ref());
        grid.extract(req.id, req.corners, edge, (0, 0), req.terrain.as_ref())
    }
}

impl Job for SinglePatchJob {
    type Output = SplitResult;

    fn on_run(self) -> SplitResult {
        let data = self.generate();
        SplitResult {
            face: self.request.id.face_idx(),
            depth: self.request.depth,
            id: self.request.id,
            kind: SplitKind::Single(data),
        }
    }
}

/// Generates data for the four children of a patch in one sampling pass.
pub struct QuadPatchJob {
    request: PatchRequest,
}

impl QuadPatchJob {
    pub fn new(request: PatchRequest) -> Self {
        Self { request }
    }

    pub fn generate(&self) -> [PatchData; 4] {
        let req = &self.request;
        let edge = req.interior_len();
        let step = 0.5 / (edge - 1) as f64;
        let grid = BorderedGrid::sample(&req.corners, 2 * edge + 1, step, req.terrain.as_ref());

        let offsets = [(0, 0), (edge - 1, 0), (edge - 1, edge - 1), (0, edge - 1)];
        let child_corners = req.corners.split();
        let ids = req.id.children(req.depth);
        std::array::from_fn(|i| grid.extract(ids[i], child_corners[i], edge, offsets[i], req.terrain.as_ref()))
    }
}

impl Job for QuadPatchJob {
    type Output = SplitResult;

    fn on_run(self) -> SplitResult {
        let kids = self.generate();
        SplitResult {
            face: self.request.id.face_idx(),
            depth: self.request.depth,
            id: self.request.id,
            kind: SplitKind::Quad(Box::new(kids)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fractal::{FractalParams, FractalTerrain};
    use crate::oracle::FlatTerrain;
    use geosphere_cubesphere::CubeFace;

    const EDGE: u32 = 9;

    fn request(face: CubeFace, terrain: Arc<dyn Terrain>) -> PatchRequest {
        PatchRequest {
            corners: face.root_corners(),
            depth: 0,
            id: PatchId::root(face),
            edge_len: EDGE,
            terrain,
        }
    }

    fn bumpy() -> Arc<dyn Terrain> {
        Arc::new(FractalTerrain::new(FractalParams {
            seed: 5,
            amplitude_m: 500_000.0,
            ..Default::default()
        }))
    }

    /// A root on a flat oracle has zero heights and samples its own corners.
    #[test]
    fn test_single_job_on_flat_terrain() {
        let req = request(CubeFace::PosZ, Arc::new(FlatTerrain::default()));
        let corners = req.corners;
        let result = SinglePatchJob::new(req).on_run();

        assert_eq!(result.face, CubeFace::PosZ.index() as u8);
        assert_eq!(result.depth, 0);
        let SplitKind::Single(data) = result.kind else {
            panic!("single job produced a quad result");
        };
        assert_eq!(data.id, PatchId::root(CubeFace::PosZ));
        assert_eq!(data.corner_heights(), [0.0; 4]);
        assert_eq!(data.heights.len(), (EDGE * EDGE) as usize);
        assert_eq!(data.normals.len(), data.heights.len());
        assert_eq!(data.colors.len(), data.heights.len());

        let last = EDGE - 1;
        for ((x, y), v) in [(0, 0), (last, 0), (last, last), (0, last)].into_iter().zip(corners.as_array()) {
            let p = data.positions[data.index(x, y)];
            assert!((p - v).length() < 1e-12, "corner ({x},{y}) sampled at {p}, expected {v}");
        }
    }

    /// On a smooth sphere every normal points straight out.
    #[test]
    fn test_flat_normals_point_outward() {
        let data = SinglePatchJob::new(request(CubeFace::NegX, Arc::new(FlatTerrain::default()))).generate();
        for (n, p) in data.normals.iter().zip(&data.positions) {
            let d = f64::from(n.dot(p.as_vec3()));
            assert!(d > 0.99, "normal {n} not outward at {p}: dot {d}");
        }
    }

    #[test]
    fn test_quad_job_child_ids_and_corners() {
        let req = request(CubeFace::PosX, Arc::new(FlatTerrain::default()));
        let parent = req.id;
        let expected_corners = req.corners.split();
        let result = QuadPatchJob::new(req).on_run();
        assert_eq!(result.id, parent);
        let SplitKind::Quad(kids) = result.kind else {
            panic!("quad job produced a single result");
        };

        for (i, kid) in kids.iter().enumerate() {
            assert_eq!(kid.id, parent.next_patch_id(0, i as u32));
            assert_eq!(kid.corners, expected_corners[i]);
            let last = EDGE - 1;
            let sampled = [(0, 0), (last, 0), (last, last), (0, last)].map(|(x, y)| kid.positions[kid.index(x, y)]);
            for (p, v) in sampled.iter().zip(expected_corners[i].as_array()) {
                assert!((*p - v).length() < 1e-12, "kid {i} corner {p} vs {v}");
            }
        }
    }

    /// Adjacent siblings carry bit-identical samples along their shared edge.
    #[test]
    fn test_quad_job_shared_edges_identical() {
        let kids = QuadPatchJob::new(request(CubeFace::NegY, bumpy())).generate();
        let last = EDGE - 1;
        // (kid a, kid b, a's edge vertex, b's edge vertex) for each shared edge.
        let pairs: [(usize, usize, fn(u32, u32) -> (u32, u32), fn(u32, u32) -> (u32, u32)); 4] = [
            (0, 1, |last, t| (last, t), |_, t| (0, t)),
            (3, 2, |last, t| (last, t), |_, t| (0, t)),
            (0, 3, |last, t| (t, last), |_, t| (t, 0)),
            (1, 2, |last, t| (t, last), |_, t| (t, 0)),
        ];
        for (a, b, ea, eb) in pairs {
            for t in 0..EDGE {
                let (ax, ay) = ea(last, t);
                let (bx, by) = eb(last, t);
                let ia = kids[a].index(ax, ay);
                let ib = kids[b].index(bx, by);
                assert_eq!(kids[a].positions[ia], kids[b].positions[ib], "kids {a}/{b} at {t}");
                assert_eq!(kids[a].heights[ia], kids[b].heights[ib], "kids {a}/{b} at {t}");
                assert_eq!(kids[a].normals[ia], kids[b].normals[ib], "kids {a}/{b} at {t}");
            }
        }
    }

    /// The four children together see the same terrain the parent does.
    #[test]
    fn test_quad_job_matches_parent_samples() {
        let terrain = bumpy();
        let parent = SinglePatchJob::new(request(CubeFace::PosY, terrain.clone())).generate();
        let kids = QuadPatchJob::new(request(CubeFace::PosY, terrain)).generate();
        let last = EDGE - 1;
        // Parent vertex (x, y) is kid 0's vertex (2x, 2y) for x, y <= last / 2.
        for y in 0..=last / 2 {
            for x in 0..=last / 2 {
                let p = parent.index(x, y);
                let k = kids[0].index(2 * x, 2 * y);
                assert!((parent.positions[p] - kids[0].positions[k]).length() < 1e-12);
                assert!((parent.heights[p] - kids[0].heights[k]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_heights_non_negative() {
        let data = SinglePatchJob::new(request(CubeFace::NegZ, bumpy())).generate();
        assert!(data.min_height() >= 0.0, "min height {}", data.min_height());
    }

    #[test]
    #[should_panic(expected = "at least 2 vertices")]
    fn test_degenerate_request_panics() {
        let mut req = request(CubeFace::PosZ, Arc::new(FlatTerrain::default()));
        req.edge_len = 1;
        let _ = SinglePatchJob::new(req).generate();
    }
}
