//! Quadtree node for one patch of a planet surface.
//!
//! A patch is created without data, receives its surface from a generation
//! job, and may later be split into four children (whose data arrive
//! together from one quad job) and merged back. The node's state is
//! derived from which of its fields are populated, so it cannot disagree
//! with them.

use geosphere_cubesphere::{PatchCorners, PatchId};
use geosphere_lod::{BodyType, BoundingSphere, Frustum, HorizonCuller, horizon_samples, split_length};
use geosphere_mesh::{PatchContext, PatchVertex};
use geosphere_terrain::{JobHandle, PatchData, PatchRequest, SplitKind, SplitResult, Terrain};
use glam::{DVec3, Vec2};
use std::sync::Arc;

use crate::render::{PatchDraw, PatchRenderer};

/// Skirt vertices sit this fraction of the way to the lowest point of the patch.
pub const SKIRT_SCALE: f64 = 0.999_995;

/// Life-cycle state of a patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PatchState {
    /// Nothing requested yet.
    NoData,
    /// A generation job is in flight for this patch.
    Requesting,
    /// A renderable leaf.
    HasData,
    /// Split into four children.
    Internal,
}

/// A leaf that wants to be split, tagged with its camera distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplitCandidate {
    pub distance: f64,
    pub id: PatchId,
    pub depth: u32,
}

/// Per-frame inputs to [`GeoPatch::lod_update`].
pub struct LodContext<'a> {
    /// Camera position in planet radii, planet-local.
    pub camera_pos: DVec3,
    pub frustum: &'a Frustum,
    /// `None` disables horizon culling.
    pub horizon: Option<&'a HorizonCuller>,
    /// Deepest depth a patch may reach on this body.
    pub max_depth: u32,
}

/// Renderable surface of a patch.
#[derive(Clone, Debug)]
pub struct PatchMesh {
    /// `edge_len²` vertices including the skirt, positions relative to the clip centroid.
    pub vertices: Vec<PatchVertex>,
    pub min_height: f64,
    pub max_height: f64,
}

/// A node of a face quadtree.
pub struct GeoPatch {
    /// Unit-sphere corners.
    corners: PatchCorners,
    /// Centre of the clip sphere. Pushed out by the mean corner height once data arrive.
    clip_centroid: DVec3,
    /// Corner mean projected onto the unit sphere; used for split distances.
    centroid: DVec3,
    /// Radius of the clip sphere around `clip_centroid`.
    clip_radius: f64,
    /// `1 +` the mean interior corner height, or 1 before data arrive.
    height_scale: f64,
    depth: u32,
    id: PatchId,
    body: BodyType,
    /// Camera distance below which this patch splits.
    split_length: f64,
    /// Exactly four children, or none.
    kids: Option<Box<[GeoPatch; 4]>>,
    /// In-flight generation job. Dropping it cancels the job.
    job: Option<JobHandle>,
    mesh: Option<PatchMesh>,
}

impl GeoPatch {
    pub fn new(corners: PatchCorners, depth: u32, id: PatchId, body: BodyType) -> Self {
        let clip_centroid = corners.clip_centroid();
        Self {
            corners,
            clip_centroid,
            centroid: clip_centroid.normalize(),
            clip_radius: corners.bounding_radius(clip_centroid),
            height_scale: 1.0,
            depth,
            id,
            body,
            split_length: split_length(depth, body),
            kids: None,
            job: None,
            mesh: None,
        }
    }

    pub fn state(&self) -> PatchState {
        if self.job.is_some() {
            PatchState::Requesting
        } else if self.kids.is_some() {
            PatchState::Internal
        } else if self.mesh.is_some() {
            PatchState::HasData
        } else {
            PatchState::NoData
        }
    }

    pub fn id(&self) -> PatchId {
        self.id
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn corners(&self) -> &PatchCorners {
        &self.corners
    }

    pub fn centroid(&self) -> DVec3 {
        self.centroid
    }

    pub fn clip_centroid(&self) -> DVec3 {
        self.clip_centroid
    }

    pub fn clip_radius(&self) -> f64 {
        self.clip_radius
    }

    pub fn split_length(&self) -> f64 {
        self.split_length
    }

    pub fn clip_sphere(&self) -> BoundingSphere {
        BoundingSphere::new(self.clip_centroid, self.clip_radius)
    }

    pub fn mesh(&self) -> Option<&PatchMesh> {
        self.mesh.as_ref()
    }

    pub fn kids(&self) -> Option<&[GeoPatch; 4]> {
        self.kids.as_deref()
    }

    pub fn job(&self) -> Option<&JobHandle> {
        self.job.as_ref()
    }

    pub fn has_job(&self) -> bool {
        self.job.is_some()
    }

    /// Generation request for this patch's own data (single job) or for its
    /// children (quad job); the two differ only in the job that consumes it.
    pub fn request(&self, edge_len: u32, terrain: &Arc<dyn Terrain>) -> PatchRequest {
        PatchRequest {
            corners: self.corners,
            depth: self.depth,
            id: self.id,
            edge_len,
            terrain: Arc::clone(terrain),
        }
    }

    /// Record the job that will deliver this patch's next result.
    pub fn set_job(&mut self, job: JobHandle) {
        debug_assert!(self.job.is_none(), "patch {} already has {:?}", self.id, self.job);
        debug_assert!(self.kids.is_none(), "internal patch {} cannot request data", self.id);
        self.job = Some(job);
    }

    /// Whether this subtree is free of in-flight jobs.
    pub fn can_be_merged(&self) -> bool {
        self.job.is_none()
            && self
                .kids
                .as_deref()
                .is_none_or(|kids| kids.iter().all(GeoPatch::can_be_merged))
    }

    /// Evaluate split and merge for this subtree.
    ///
    /// Leaves that want to split are appended to `candidates`; internal
    /// nodes out of split range drop their children if no descendant is
    /// waiting on a job.
    pub fn lod_update(&mut self, lod: &LodContext<'_>, candidates: &mut Vec<SplitCandidate>) {
        match self.state() {
            PatchState::NoData | PatchState::Requesting => {}
            PatchState::HasData => {
                if self.wants_split(lod) && self.is_visible(lod) {
                    candidates.push(SplitCandidate {
                        distance: self.centroid.distance(lod.camera_pos),
                        id: self.id,
                        depth: self.depth,
                    });
                }
            }
            PatchState::Internal => {
                if self.wants_split(lod) {
                    if let Some(kids) = self.kids.as_deref_mut() {
                        for kid in kids {
                            kid.lod_update(lod, candidates);
                        }
                    }
                } else if self.can_be_merged() {
                    tracing::trace!(id = %self.id, depth = self.depth, "merging patch");
                    self.kids = None;
                }
            }
        }
    }

    /// Roots split whenever the body allows any depth at all; deeper
    /// patches only inside their split distance.
    fn wants_split(&self, lod: &LodContext<'_>) -> bool {
        if self.depth >= lod.max_depth {
            return false;
        }
        self.depth == 0 || self.centroid.distance(lod.camera_pos) < self.split_length
    }

    fn is_visible(&self, lod: &LodContext<'_>) -> bool {
        if !lod.frustum.test_sphere(self.clip_centroid, self.clip_radius) {
            return false;
        }
        match lod.horizon {
            Some(horizon) if self.depth > 0 => {
                let samples = horizon_samples(&self.corners, self.height_scale);
                horizon.is_patch_visible(self.clip_sphere(), &samples)
            }
            _ => true,
        }
    }

    /// Route a generation result to the patch that requested it.
    pub fn receive(&mut self, result: SplitResult, ctx: &PatchContext) {
        if self.depth < result.depth {
            debug_assert!(
                self.kids.is_some(),
                "result for {} routed through leaf {} at depth {}",
                result.id,
                self.id,
                self.depth
            );
            let idx = result.id.patch_idx(self.depth) as usize;
            match self.kids.as_deref_mut() {
                Some(kids) => kids[idx].receive(result, ctx),
                None => tracing::warn!(id = %result.id, at = %self.id, "dropping unroutable patch result"),
            }
            return;
        }

        debug_assert_eq!(self.id, result.id, "result routed to the wrong patch");
        debug_assert!(self.job.is_some(), "patch {} received data it never requested", self.id);
        self.job = None;

        match result.kind {
            SplitKind::Single(data) => self.set_data(data, ctx),
            SplitKind::Quad(kids) => {
                debug_assert!(self.kids.is_none(), "patch {} already has children", self.id);
                let (depth, body) = (self.depth + 1, self.body);
                let kids = (*kids).map(|data| {
                    let mut kid = GeoPatch::new(data.corners, depth, data.id, body);
                    kid.set_data(data, ctx);
                    kid
                });
                self.kids = Some(Box::new(kids));
            }
        }
    }

    /// Install sampled data: rescale the clip sphere and build the vertex buffer.
    pub fn set_data(&mut self, data: PatchData, ctx: &PatchContext) {
        let edge = ctx.edge_len();
        assert_eq!(
            data.edge_len + 2,
            edge,
            "patch {} data edge {} does not fit context edge {edge}",
            self.id,
            data.edge_len
        );

        let mean_corner_height = data.corner_heights().iter().sum::<f64>() / 4.0;
        self.height_scale = 1.0 + mean_corner_height;
        self.clip_centroid = self.corners.clip_centroid() * self.height_scale;

        let min_height = data.min_height();
        let max_height = data.heights.iter().copied().fold(0.0, f64::max);
        let skirt_radius = (1.0 + min_height) * SKIRT_SCALE;
        let last = data.edge_len - 1;
        let frac = ctx.frac();

        let mut radius = self.corners.bounding_radius(self.clip_centroid);
        let mut vertices = Vec::with_capacity(ctx.num_vertices());
        for gy in 0..edge {
            let y = gy.saturating_sub(1).min(last);
            for gx in 0..edge {
                let x = gx.saturating_sub(1).min(last);
                let i = data.index(x, y);
                let skirt = gx == 0 || gy == 0 || gx == edge - 1 || gy == edge - 1;
                let position = if skirt {
                    data.positions[i] * skirt_radius
                } else {
                    data.displaced(i)
                };
                let rel = position - self.clip_centroid;
                radius = radius.max(rel.length());
                let uv = Vec2::new((1.0 - f64::from(x) * frac) as f32, (f64::from(y) * frac) as f32);
                vertices.push(PatchVertex::new(rel.as_vec3(), data.normals[i], data.colors[i], uv));
            }
        }

        self.clip_radius = self.clip_radius.max(radius);
        self.mesh = Some(PatchMesh {
            vertices,
            min_height,
            max_height,
        });
    }

    /// Find the patch `id` at `depth` in this subtree.
    pub fn find_mut(&mut self, id: PatchId, depth: u32) -> Option<&mut GeoPatch> {
        if self.depth == depth {
            return (self.id == id).then_some(self);
        }
        if self.depth > depth {
            return None;
        }
        let idx = id.patch_idx(self.depth) as usize;
        self.kids.as_deref_mut()?[idx].find_mut(id, depth)
    }

    /// Draw every frustum-visible leaf with data.
    pub fn render(
        &self,
        camera_pos: DVec3,
        frustum: &Frustum,
        ctx: &PatchContext,
        renderer: &mut dyn PatchRenderer,
    ) {
        if let Some(kids) = self.kids.as_deref() {
            for kid in kids {
                kid.render(camera_pos, frustum, ctx, renderer);
            }
        } else if let Some(mesh) = &self.mesh {
            if frustum.test_sphere(self.clip_centroid, self.clip_radius) {
                renderer.draw_patch(&self.draw(mesh, camera_pos, ctx));
            }
        }
    }

    /// Append every frustum-visible leaf with data to `out`.
    pub fn gather_visible<'a>(&'a self, frustum: &Frustum, out: &mut Vec<&'a GeoPatch>) {
        if let Some(kids) = self.kids.as_deref() {
            for kid in kids {
                kid.gather_visible(frustum, out);
            }
        } else if self.mesh.is_some() && frustum.test_sphere(self.clip_centroid, self.clip_radius) {
            out.push(self);
        }
    }

    /// Draw this patch unconditionally. Does nothing without data.
    pub fn render_self(&self, camera_pos: DVec3, ctx: &PatchContext, renderer: &mut dyn PatchRenderer) {
        if let Some(mesh) = &self.mesh {
            renderer.draw_patch(&self.draw(mesh, camera_pos, ctx));
        }
    }

    fn draw<'a>(&'a self, mesh: &'a PatchMesh, camera_pos: DVec3, ctx: &'a PatchContext) -> PatchDraw<'a> {
        PatchDraw {
            id: self.id,
            depth: self.depth,
            vertices: &mesh.vertices,
            indices: ctx.indices(),
            offset: self.clip_centroid - camera_pos,
            clip_radius: self.clip_radius,
        }
    }

    /// Visit every node of this subtree, parents before children.
    pub fn visit(&self, f: &mut dyn FnMut(&GeoPatch)) {
        f(self);
        if let Some(kids) = self.kids.as_deref() {
            for kid in kids {
                kid.visit(f);
            }
        }
    }

    /// A node never holds a job and children at once, and children are
    /// exactly one level deeper with their quadrant in the parent's slot.
    pub fn is_consistent(&self) -> bool {
        let Some(kids) = self.kids.as_deref() else {
            return true;
        };
        self.job.is_none()
            && kids.iter().enumerate().all(|(i, kid)| {
                kid.depth == self.depth + 1
                    && kid.id == self.id.next_patch_id(self.depth, i as u32)
                    && kid.is_consistent()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geosphere_cubesphere::CubeFace;
    use geosphere_terrain::{
        FlatTerrain, FractalParams, FractalTerrain, Job, JobClient, JobQueue, QuadPatchJob,
        SinglePatchJob, SyncJobQueue,
    };

    const EDGE: u32 = 7;

    struct Harness {
        queue: Arc<SyncJobQueue>,
        client: JobClient<SplitResult>,
        ctx: PatchContext,
        terrain: Arc<dyn Terrain>,
    }

    impl Harness {
        fn new(terrain: Arc<dyn Terrain>) -> Self {
            let queue = Arc::new(SyncJobQueue::new());
            Self {
                client: JobClient::new(queue.clone() as Arc<dyn JobQueue>),
                queue,
                ctx: PatchContext::new(EDGE + 2),
                terrain,
            }
        }

        fn flat() -> Self {
            Self::new(Arc::new(FlatTerrain::default()))
        }

        fn request_single(&mut self, patch: &mut GeoPatch) {
            let job = SinglePatchJob::new(patch.request(EDGE, &self.terrain));
            patch.set_job(self.client.order(job).unwrap());
        }

        fn request_quad(&mut self, patch: &mut GeoPatch) {
            let job = QuadPatchJob::new(patch.request(EDGE, &self.terrain));
            patch.set_job(self.client.order(job).unwrap());
        }

        /// Run every queued job and deliver the results to `root`.
        fn settle(&mut self, root: &mut GeoPatch) {
            self.queue.run_all();
            for completion in self.client.drain() {
                if let geosphere_terrain::Completion::Finished(_, result) = completion {
                    root.receive(result, &self.ctx);
                }
            }
        }
    }

    fn root(face: CubeFace) -> GeoPatch {
        GeoPatch::new(face.root_corners(), 0, PatchId::root(face), BodyType::Rocky)
    }

    fn lod<'a>(camera_pos: DVec3, frustum: &'a Frustum, max_depth: u32) -> LodContext<'a> {
        LodContext {
            camera_pos,
            frustum,
            horizon: None,
            max_depth,
        }
    }

    #[test]
    fn test_new_patch_geometry() {
        let p = root(CubeFace::PosZ);
        let c = CubeFace::PosZ.root_corners();
        assert_eq!(p.state(), PatchState::NoData);
        assert_eq!(p.clip_centroid(), c.clip_centroid());
        assert!((p.centroid().length() - 1.0).abs() < 1e-12);
        for v in c.as_array() {
            assert!(v.distance(p.clip_centroid()) <= p.clip_radius() + 1e-12);
        }
        assert_eq!(p.split_length(), split_length(0, BodyType::Rocky));
    }

    /// NoData → Requesting → HasData.
    #[test]
    fn test_single_request_lifecycle() {
        let mut h = Harness::flat();
        let mut p = root(CubeFace::NegX);
        h.request_single(&mut p);
        assert_eq!(p.state(), PatchState::Requesting);
        h.settle(&mut p);
        assert_eq!(p.state(), PatchState::HasData);
        assert!(p.job().is_none());
        let mesh = p.mesh().unwrap();
        assert_eq!(mesh.vertices.len(), h.ctx.num_vertices());
    }

    /// On a flat oracle the clip centroid is untouched by data arrival.
    #[test]
    fn test_flat_data_keeps_clip_centroid() {
        let mut h = Harness::flat();
        let mut p = root(CubeFace::PosY);
        let before = p.clip_centroid();
        h.request_single(&mut p);
        h.settle(&mut p);
        assert_eq!(p.clip_centroid(), before);
    }

    /// Constant-height terrain, for checking the clip-centroid rescale.
    struct Plateau(f64);

    impl Terrain for Plateau {
        fn height(&self, _point: DVec3) -> f64 {
            self.0
        }

        fn color(&self, _point: DVec3, _height: f64, _normal: DVec3) -> [u8; 3] {
            [0, 0, 0]
        }
    }

    /// The clip sphere bounds every displaced sample of the patch.
    #[test]
    fn test_clip_sphere_bounds_surface() {
        let terrain: Arc<dyn Terrain> = Arc::new(FractalTerrain::new(FractalParams {
            seed: 11,
            amplitude_m: 400_000.0,
            ..Default::default()
        }));
        let h = Harness::new(terrain.clone());
        for face in CubeFace::ALL {
            let mut p = root(face);
            let data = SinglePatchJob::new(p.request(EDGE, &terrain)).generate();
            let displaced: Vec<DVec3> = (0..data.heights.len()).map(|i| data.displaced(i)).collect();
            p.set_data(data, &h.ctx);

            for q in displaced {
                let d = q.distance(p.clip_centroid());
                assert!(d <= p.clip_radius(), "{face:?}: sample {q} at {d} outside radius {}", p.clip_radius());
            }
        }
    }

    /// Data arrival pushes the clip centroid out by the mean corner height.
    #[test]
    fn test_clip_centroid_rescaled_by_corner_heights() {
        let h = Harness::new(Arc::new(Plateau(0.25)));
        let mut p = root(CubeFace::NegY);
        let data = SinglePatchJob::new(p.request(EDGE, &h.terrain)).generate();
        p.set_data(data, &h.ctx);
        let expected = CubeFace::NegY.root_corners().clip_centroid() * 1.25;
        assert!((p.clip_centroid() - expected).length() < 1e-12, "clip centroid {}", p.clip_centroid());
        assert!(p.clip_radius() >= 1.25 - expected.length());
    }

    /// Skirt vertices sit below the lowest surface point, interior ones on the surface.
    #[test]
    fn test_skirt_below_surface() {
        let mut h = Harness::flat();
        let mut p = root(CubeFace::NegZ);
        h.request_single(&mut p);
        h.settle(&mut p);
        let edge = h.ctx.edge_len() as usize;
        let mesh = p.mesh().unwrap();
        for (i, v) in mesh.vertices.iter().enumerate() {
            let (gx, gy) = (i % edge, i / edge);
            let r = (v.position().as_dvec3() + p.clip_centroid()).length();
            let skirt = gx == 0 || gy == 0 || gx == edge - 1 || gy == edge - 1;
            if skirt {
                assert!((r - SKIRT_SCALE).abs() < 1e-6, "skirt vertex {i} at radius {r}");
            } else {
                assert!((r - 1.0).abs() < 1e-6, "surface vertex {i} at radius {r}");
            }
        }
    }

    #[test]
    fn test_uvs_flip_x() {
        let mut h = Harness::flat();
        let mut p = root(CubeFace::PosZ);
        h.request_single(&mut p);
        h.settle(&mut p);
        let edge = h.ctx.edge_len() as usize;
        let v = &p.mesh().unwrap().vertices;
        let close = |uv: [f32; 2], expected: [f32; 2]| (Vec2::from(uv) - Vec2::from(expected)).length() < 1e-6;
        assert!(close(v[1 + edge].uv, [1.0, 0.0]), "first interior uv {:?}", v[1 + edge].uv);
        let far = (edge - 2) + (edge - 2) * edge;
        assert!(close(v[far].uv, [0.0, 1.0]), "last interior uv {:?}", v[far].uv);
    }

    /// Split the root, then split child `kid` of the root.
    fn two_levels(h: &mut Harness, face: CubeFace, kid: usize) -> GeoPatch {
        let mut p = root(face);
        h.request_single(&mut p);
        h.settle(&mut p);
        h.request_quad(&mut p);
        h.settle(&mut p);
        let kid_id = p.id().next_patch_id(0, kid as u32);
        let k = p.find_mut(kid_id, 1).unwrap();
        let job = QuadPatchJob::new(k.request(EDGE, &h.terrain));
        k.set_job(h.client.order(job).unwrap());
        h.settle(&mut p);
        p
    }

    /// HasData → Requesting → Internal, with children ids in the parent's slot.
    #[test]
    fn test_split_creates_children() {
        let mut h = Harness::flat();
        let mut p = root(CubeFace::PosZ);
        h.request_single(&mut p);
        h.settle(&mut p);

        let frustum = Frustum::everything();
        let near = lod(DVec3::new(0.0, 0.0, 1.01), &frustum, 4);
        let mut candidates = Vec::new();
        p.lod_update(&near, &mut candidates);
        assert_eq!(candidates.len(), 1, "root should want to split");
        assert_eq!(candidates[0].id, p.id());

        h.request_quad(&mut p);
        assert_eq!(p.state(), PatchState::Requesting);
        h.settle(&mut p);
        assert_eq!(p.state(), PatchState::Internal);
        assert!(p.is_consistent());
        let split = p.corners().split();
        for (i, kid) in p.kids().unwrap().iter().enumerate() {
            assert_eq!(kid.id(), PatchId::root(CubeFace::PosZ).next_patch_id(0, i as u32));
            assert_eq!(kid.depth(), 1);
            assert_eq!(kid.state(), PatchState::HasData);
            assert_eq!(*kid.corners(), split[i]);
        }
    }

    /// Internal → HasData once the camera leaves the split distance.
    #[test]
    fn test_merge_when_far() {
        let mut h = Harness::flat();
        let mut p = two_levels(&mut h, CubeFace::PosZ, 0);
        assert_eq!(p.kids().unwrap()[0].state(), PatchState::Internal);
        assert!(p.is_consistent());

        let frustum = Frustum::everything();
        let mut candidates = Vec::new();
        p.lod_update(&lod(DVec3::new(0.0, 0.0, 50.0), &frustum, 4), &mut candidates);
        let kid = &p.kids().unwrap()[0];
        assert_eq!(kid.state(), PatchState::HasData);
        assert!(kid.mesh().is_some(), "merged parent keeps its own data");
        assert_eq!(p.state(), PatchState::Internal, "roots never merge");
    }

    /// A descendant with an in-flight job blocks merging.
    #[test]
    fn test_pending_descendant_blocks_merge() {
        let mut h = Harness::flat();
        let mut p = two_levels(&mut h, CubeFace::PosZ, 2);

        let grandkid_id = p.id().next_patch_id(0, 2).next_patch_id(1, 1);
        let g = p.find_mut(grandkid_id, 2).unwrap();
        let job = QuadPatchJob::new(g.request(EDGE, &h.terrain));
        g.set_job(h.client.order(job).unwrap());
        assert!(!p.kids().unwrap()[2].can_be_merged());

        let frustum = Frustum::everything();
        let far = lod(DVec3::new(0.0, 0.0, 50.0), &frustum, 4);
        let mut candidates = Vec::new();
        p.lod_update(&far, &mut candidates);
        assert_eq!(p.kids().unwrap()[2].state(), PatchState::Internal, "merge must wait for the job");
        assert!(p.is_consistent());

        h.settle(&mut p);
        assert!(p.kids().unwrap()[2].can_be_merged());
        p.lod_update(&far, &mut candidates);
        assert_eq!(p.kids().unwrap()[2].state(), PatchState::HasData);
    }

    /// Requesting patches are skipped by the LOD pass.
    #[test]
    fn test_requesting_patch_not_evaluated() {
        let mut h = Harness::flat();
        let mut p = root(CubeFace::PosZ);
        h.request_single(&mut p);
        let frustum = Frustum::everything();
        let mut candidates = Vec::new();
        p.lod_update(&lod(DVec3::new(0.0, 0.0, 1.01), &frustum, 4), &mut candidates);
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_max_depth_stops_splitting() {
        let mut h = Harness::flat();
        let mut p = root(CubeFace::PosZ);
        h.request_single(&mut p);
        h.settle(&mut p);
        let frustum = Frustum::everything();
        let mut candidates = Vec::new();
        p.lod_update(&lod(DVec3::new(0.0, 0.0, 1.01), &frustum, 0), &mut candidates);
        assert!(candidates.is_empty(), "max depth 0 must keep roots whole");
    }

    /// Only a patch inside its split distance becomes a candidate.
    #[test]
    fn test_split_distance_threshold() {
        let mut h = Harness::flat();
        let mut p = root(CubeFace::PosZ);
        h.request_single(&mut p);
        h.settle(&mut p);
        h.request_quad(&mut p);
        h.settle(&mut p);

        let frustum = Frustum::everything();
        let kid = &p.kids().unwrap()[0];
        let outside = kid.centroid() * (1.0 + kid.split_length() * 1.5);
        let mut candidates = Vec::new();
        p.lod_update(&lod(outside, &frustum, 4), &mut candidates);
        assert!(candidates.iter().all(|c| c.depth == 1));
        assert!(!candidates.iter().any(|c| c.id == p.kids().unwrap()[0].id()));

        let inside = p.kids().unwrap()[0].centroid() * 1.001;
        candidates.clear();
        p.lod_update(&lod(inside, &frustum, 4), &mut candidates);
        assert!(candidates.iter().any(|c| c.id == p.kids().unwrap()[0].id()));
    }

    /// Frustum-invisible leaves are not split.
    #[test]
    fn test_culled_patch_not_split() {
        let mut h = Harness::flat();
        let mut p = root(CubeFace::PosZ);
        h.request_single(&mut p);
        h.settle(&mut p);
        let view = glam::DMat4::look_at_rh(DVec3::new(0.0, 0.0, 1.5), DVec3::new(0.0, 0.0, 5.0), DVec3::Y);
        let proj = glam::DMat4::perspective_rh(1.0, 1.0, 0.01, 10.0);
        let frustum = Frustum::from_view_projection(&(proj * view));
        let mut candidates = Vec::new();
        p.lod_update(&lod(DVec3::new(0.0, 0.0, 1.5), &frustum, 4), &mut candidates);
        assert!(candidates.is_empty(), "patch behind the camera should not split");
    }

    #[test]
    fn test_find_mut() {
        let mut h = Harness::flat();
        let mut p = root(CubeFace::NegY);
        h.request_single(&mut p);
        h.settle(&mut p);
        h.request_quad(&mut p);
        h.settle(&mut p);

        let id = p.id().next_patch_id(0, 3);
        assert_eq!(p.find_mut(id, 1).map(|k| k.id()), Some(id));
        assert!(p.find_mut(id, 2).is_none());
        assert!(p.find_mut(PatchId::root(CubeFace::PosX), 0).is_none());
    }

    #[test]
    fn test_render_draws_leaves_only() {
        let mut h = Harness::flat();
        let mut p = root(CubeFace::PosX);
        h.request_single(&mut p);
        h.settle(&mut p);
        h.request_quad(&mut p);
        h.settle(&mut p);

        let mut stats = crate::render::DrawStats::new();
        p.render(DVec3::new(3.0, 0.0, 0.0), &Frustum::everything(), &h.ctx, &mut stats);
        assert_eq!(stats.patches, 4);
        assert_eq!(stats.deepest, 1);
        assert_eq!(stats.triangles, 4 * h.ctx.triangle_count());

        let mut visible = Vec::new();
        p.gather_visible(&Frustum::everything(), &mut visible);
        assert_eq!(visible.len(), 4);
    }

    /// The job output can be produced without the tree; running it via
    /// `on_run` yields the same routing header.
    #[test]
    fn test_request_carries_identity() {
        let terrain: Arc<dyn Terrain> = Arc::new(FlatTerrain::default());
        let p = root(CubeFace::PosY);
        let result = SinglePatchJob::new(p.request(EDGE, &terrain)).on_run();
        assert_eq!(result.id, p.id());
        assert_eq!(result.depth, 0);
        assert_eq!(result.face, CubeFace::PosY.index() as u8);
    }
}
