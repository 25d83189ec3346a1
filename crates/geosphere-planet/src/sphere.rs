//! Per-body controller owning the six face quadtrees.
//!
//! Each frame the controller applies finished generation jobs to the tree,
//! runs the LOD pass over all roots, and submits split jobs for the closest
//! candidates while staying under its in-flight budget. Candidates beyond
//! the budget are simply picked up again on a later frame.

use std::sync::Arc;

use geosphere_cubesphere::{CubeFace, PatchId};
use geosphere_lod::{BodyType, Frustum, HorizonCuller, MAX_PATCH_DEPTH, body_max_depth};
use geosphere_mesh::{DetailLevel, PatchContext};
use geosphere_terrain::{
    Completion, JobClient, JobError, JobQueue, QuadPatchJob, SinglePatchJob, SplitResult, Terrain,
};
use glam::DVec3;

use crate::patch::{GeoPatch, LodContext, PatchState, SplitCandidate};
use crate::render::PatchRenderer;

/// The body a sphere renders.
#[derive(Clone, Debug, PartialEq)]
pub struct SphereBody {
    pub name: String,
    pub radius_m: f64,
    pub body_type: BodyType,
}

impl SphereBody {
    pub fn new(name: impl Into<String>, radius_m: f64, body_type: BodyType) -> Self {
        Self {
            name: name.into(),
            radius_m,
            body_type,
        }
    }
}

/// Runtime knobs for a sphere.
#[derive(Clone, Debug, PartialEq)]
pub struct SphereSettings {
    pub detail: DetailLevel,
    /// Maximum split jobs in flight at once.
    pub max_split_requests: usize,
    /// Draw visible leaves back to front instead of in tree order.
    pub sort_by_distance: bool,
    pub horizon_culling: bool,
}

impl Default for SphereSettings {
    fn default() -> Self {
        Self {
            detail: DetailLevel::default(),
            max_split_requests: 128,
            sort_by_distance: false,
            horizon_culling: true,
        }
    }
}

/// Camera state for one frame, in planet-local planet radii.
#[derive(Clone, Debug)]
pub struct SphereView {
    pub camera_pos: DVec3,
    pub frustum: Frustum,
}

impl SphereView {
    pub fn new(camera_pos: DVec3, frustum: Frustum) -> Self {
        Self { camera_pos, frustum }
    }

    /// A view that sees every patch; for tools without a projection.
    pub fn headless(camera_pos: DVec3) -> Self {
        Self::new(camera_pos, Frustum::everything())
    }
}

/// Tree and job counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SphereStats {
    pub nodes: usize,
    pub leaves: usize,
    /// Leaves with renderable data.
    pub renderable: usize,
    /// Patches waiting on a generation job.
    pub requesting: usize,
    pub deepest: u32,
    /// Jobs ordered and not yet drained, cancelled ones included.
    pub in_flight: usize,
    /// Split candidates left for a later frame by the last update.
    pub deferred: usize,
    /// Depth limit for this body at the current detail level.
    pub max_depth: u32,
}

/// Level-of-detail controller for one planet.
pub struct GeoSphere {
    body: SphereBody,
    terrain: Arc<dyn Terrain>,
    settings: SphereSettings,
    /// Tessellation shared by every patch at the current detail level.
    context: Arc<PatchContext>,
    client: JobClient<SplitResult>,
    /// One root per cube face, indexed by face.
    roots: Vec<GeoPatch>,
    max_depth: u32,
    candidates: Vec<SplitCandidate>,
    deferred: usize,
}

impl GeoSphere {
    pub fn new(
        body: SphereBody,
        terrain: Arc<dyn Terrain>,
        queue: Arc<dyn JobQueue>,
        settings: SphereSettings,
    ) -> Self {
        let context = Arc::new(PatchContext::for_detail(settings.detail));
        let mut sphere = Self {
            max_depth: Self::compute_max_depth(&body, settings.detail),
            body,
            terrain,
            settings,
            context,
            client: JobClient::new(queue),
            roots: Vec::new(),
            candidates: Vec::new(),
            deferred: 0,
        };
        sphere.build_roots();
        sphere
    }

    fn compute_max_depth(body: &SphereBody, detail: DetailLevel) -> u32 {
        body_max_depth(body.radius_m, detail.interior_edge_len(), detail.target_triangle_length())
            .min(MAX_PATCH_DEPTH)
    }

    fn build_roots(&mut self) {
        self.roots = CubeFace::ALL
            .iter()
            .map(|&face| GeoPatch::new(face.root_corners(), 0, PatchId::root(face), self.body.body_type))
            .collect();
        self.request_roots();
        tracing::info!(
            body = %self.body.name,
            detail = self.settings.detail.level(),
            edge_len = self.context.edge_len(),
            max_depth = self.max_depth,
            "built sphere roots"
        );
    }

    /// Order data for every root that has none and is not waiting for it.
    fn request_roots(&mut self) {
        let edge_len = self.context.interior_edge_len();
        for root in &mut self.roots {
            if root.state() != PatchState::NoData {
                continue;
            }
            let job = SinglePatchJob::new(root.request(edge_len, &self.terrain));
            match self.client.order(job) {
                Ok(handle) => root.set_job(handle),
                Err(err) => {
                    tracing::debug!(id = %root.id(), %err, "root request deferred");
                    break;
                }
            }
        }
    }

    pub fn body(&self) -> &SphereBody {
        &self.body
    }

    pub fn settings(&self) -> &SphereSettings {
        &self.settings
    }

    pub fn context(&self) -> &Arc<PatchContext> {
        &self.context
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn roots(&self) -> &[GeoPatch] {
        &self.roots
    }

    /// One frame: apply finished jobs, evaluate LOD, submit split jobs.
    pub fn update(&mut self, view: &SphereView) {
        self.drain_results();
        self.request_roots();

        let horizon = HorizonCuller::unit(view.camera_pos);
        let lod = LodContext {
            camera_pos: view.camera_pos,
            frustum: &view.frustum,
            horizon: self.settings.horizon_culling.then_some(&horizon),
            max_depth: self.max_depth,
        };
        let mut candidates = std::mem::take(&mut self.candidates);
        candidates.clear();
        for root in &mut self.roots {
            root.lod_update(&lod, &mut candidates);
        }
        candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        self.deferred = 0;
        let budget = self.settings.max_split_requests.saturating_sub(self.client.in_flight());
        for (n, candidate) in candidates.iter().enumerate() {
            if n >= budget {
                self.deferred = candidates.len() - n;
                tracing::debug!(deferred = self.deferred, budget, "split requests at capacity");
                break;
            }
            if let Err(err) = self.request_split(candidate) {
                self.deferred = candidates.len() - n;
                tracing::debug!(id = %candidate.id, %err, deferred = self.deferred, "split request rejected");
                break;
            }
        }
        self.candidates = candidates;
    }

    fn request_split(&mut self, candidate: &SplitCandidate) -> Result<(), JobError> {
        let edge_len = self.context.interior_edge_len();
        let Some(patch) = self
            .roots
            .get_mut(usize::from(candidate.id.face_idx()))
            .and_then(|root| root.find_mut(candidate.id, candidate.depth))
        else {
            tracing::warn!(id = %candidate.id, "split candidate vanished");
            return Ok(());
        };
        let job = QuadPatchJob::new(patch.request(edge_len, &self.terrain));
        let handle = self.client.order(job)?;
        tracing::trace!(id = %candidate.id, depth = candidate.depth, job = %handle.id(), "split requested");
        patch.set_job(handle);
        Ok(())
    }

    /// Apply every finished job to the tree; discard cancelled ones.
    pub fn drain_results(&mut self) -> usize {
        let mut applied = 0;
        for completion in self.client.drain() {
            match completion {
                Completion::Finished(_, result) => {
                    match self.roots.get_mut(usize::from(result.face)) {
                        Some(root) => {
                            root.receive(result, &self.context);
                            applied += 1;
                        }
                        None => tracing::warn!(face = result.face, "result for unknown face"),
                    }
                }
                Completion::Cancelled(job, result) => {
                    tracing::trace!(%job, id = %result.id, "dropped cancelled patch result");
                }
            }
        }
        applied
    }

    /// Draw the current leaf set.
    pub fn render(&self, view: &SphereView, renderer: &mut dyn PatchRenderer) {
        if self.settings.sort_by_distance {
            let mut visible = Vec::new();
            for root in &self.roots {
                root.gather_visible(&view.frustum, &mut visible);
            }
            let distance = |p: &GeoPatch| p.clip_centroid().distance_squared(view.camera_pos);
            visible.sort_by(|a, b| distance(b).total_cmp(&distance(a)));
            for patch in visible {
                patch.render_self(view.camera_pos, &self.context, renderer);
            }
        } else {
            for root in &self.roots {
                root.render(view.camera_pos, &view.frustum, &self.context, renderer);
            }
        }
    }

    /// Switch detail level, rebuilding the whole tree. No-op if unchanged.
    pub fn set_detail(&mut self, detail: DetailLevel) {
        if detail == self.settings.detail {
            return;
        }
        self.settings.detail = detail;
        self.reset();
    }

    /// Cancel all jobs, free every patch, rebuild the shared context, and
    /// request fresh roots.
    pub fn reset(&mut self) {
        self.client.cancel_all();
        self.roots.clear();
        self.candidates.clear();
        self.deferred = 0;
        self.context = Arc::new(PatchContext::for_detail(self.settings.detail));
        self.max_depth = Self::compute_max_depth(&self.body, self.settings.detail);
        tracing::info!(body = %self.body.name, detail = self.settings.detail.level(), "resetting sphere");
        self.build_roots();
    }

    pub fn stats(&self) -> SphereStats {
        let mut stats = SphereStats {
            in_flight: self.client.in_flight(),
            deferred: self.deferred,
            max_depth: self.max_depth,
            ..Default::default()
        };
        for root in &self.roots {
            root.visit(&mut |p| {
                stats.nodes += 1;
                stats.deepest = stats.deepest.max(p.depth());
                match p.state() {
                    PatchState::Requesting => stats.requesting += 1,
                    PatchState::HasData => stats.renderable += 1,
                    PatchState::NoData | PatchState::Internal => {}
                }
                if p.kids().is_none() {
                    stats.leaves += 1;
                }
            });
        }
        stats
    }

    /// Returns `true` if every node satisfies the tree invariants.
    pub fn is_consistent(&self) -> bool {
        self.roots.iter().all(GeoPatch::is_consistent)
    }
}
