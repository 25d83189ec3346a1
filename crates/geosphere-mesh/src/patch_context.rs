//! Per-detail-level tessellation shared by every patch.
//!
//! A patch is a square grid of `edge_len × edge_len` vertices whose outer
//! ring is a skirt. All patches at one detail level share the same
//! triangle topology, so the index list is built and cache-optimised once.

use std::sync::Arc;

use crate::vcache::{VcacheError, VertexCacheOptimizer};

/// Global terrain detail setting in `0..=4`.
///
/// Selects the interior tessellation edge length of every patch and the
/// triangle length (in metres) at which subdivision stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DetailLevel(u8);

impl DetailLevel {
    pub const MAX: u8 = 4;

    const EDGE_LENGTHS: [u32; 5] = [7, 15, 25, 35, 55];
    const TRIANGLE_LENGTHS_M: [f64; 5] = [250.0, 150.0, 100.0, 50.0, 25.0];

    /// Create a detail level, clamping to `0..=4`.
    pub fn new(level: u8) -> Self {
        Self(level.min(Self::MAX))
    }

    pub fn level(self) -> u8 {
        self.0
    }

    /// Vertices along one edge of a patch, excluding the skirt.
    pub fn interior_edge_len(self) -> u32 {
        Self::EDGE_LENGTHS[usize::from(self.0)]
    }

    /// Triangle edge length in metres below which patches stop splitting.
    pub fn target_triangle_length(self) -> f64 {
        Self::TRIANGLE_LENGTHS_M[usize::from(self.0)]
    }
}

impl Default for DetailLevel {
    fn default() -> Self {
        Self(2)
    }
}

/// Immutable tessellation topology for one detail level.
#[derive(Clone, Debug)]
pub struct PatchContext {
    edge_len: u32,
    frac: f64,
    indices: Arc<[u32]>,
}

impl PatchContext {
    /// Build the shared index list for an `edge_len × edge_len` grid,
    /// including the one-vertex skirt on each side.
    ///
    /// # Panics
    ///
    /// Panics if `edge_len` is even or smaller than 5.
    pub fn new(edge_len: u32) -> Self {
        assert!(
            edge_len >= 5 && edge_len % 2 == 1,
            "patch edge length must be odd and at least 5, got {edge_len}"
        );
        let mut indices = grid_indices(edge_len);
        match VertexCacheOptimizer::default()
            .optimize_with_vertex_count(&mut indices, (edge_len * edge_len) as usize)
        {
            Ok(stats) => tracing::info!(
                edge_len,
                triangles = stats.triangles,
                misses_before = stats.misses_before,
                misses_after = stats.misses_after,
                "built patch context"
            ),
            Err(VcacheError::NoVerts) => {
                tracing::warn!(edge_len, "patch context has no triangles, skipping optimisation")
            }
            Err(err) => tracing::error!(edge_len, %err, "patch grid produced invalid indices"),
        }

        Self {
            edge_len,
            frac: 1.0 / f64::from(edge_len - 3),
            indices: indices.into(),
        }
    }

    /// Context for the given global detail level.
    pub fn for_detail(detail: DetailLevel) -> Self {
        Self::new(detail.interior_edge_len() + 2)
    }

    /// Rebuild the index list from scratch.
    pub fn refresh(&mut self) {
        *self = Self::new(self.edge_len);
    }

    /// Vertices along one edge, including the skirt.
    pub fn edge_len(&self) -> u32 {
        self.edge_len
    }

    /// Vertices along one edge of the sampled surface.
    pub fn interior_edge_len(&self) -> u32 {
        self.edge_len - 2
    }

    /// Parametric step between adjacent interior vertices.
    pub fn frac(&self) -> f64 {
        self.frac
    }

    pub fn num_vertices(&self) -> usize {
        (self.edge_len * self.edge_len) as usize
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex-cache-optimised triangle list shared by every patch.
    pub fn indices(&self) -> &Arc<[u32]> {
        &self.indices
    }
}

/// Triangle list covering the whole grid: the inner block, the teeth
/// joining it to the outer ring, and full-detail strips along all 4 edges.
fn grid_indices(edge_len: u32) -> Vec<u32> {
    let e = edge_len;
    let mut out = Vec::with_capacity(6 * ((e - 1) * (e - 1)) as usize);
    let mut tri = |a: u32, b: u32, c: u32| out.extend_from_slice(&[a, b, c]);

    for x in 1..e - 2 {
        for y in 1..e - 2 {
            tri(x + e * y, x + 1 + e * y, x + e * (y + 1));
            tri(x + 1 + e * y, x + 1 + e * (y + 1), x + e * (y + 1));
        }
    }

    for x in (1..e - 3).step_by(2) {
        tri(x + e, x + 1, x + 1 + e);
        tri(x + 1, x + 2 + e, x + 1 + e);
    }
    for x in (1..e - 3).step_by(2) {
        tri(x + e * (e - 2), x + 1 + e * (e - 2), x + 1 + e * (e - 1));
        tri(x + 1 + e * (e - 2), x + 2 + e * (e - 2), x + 1 + e * (e - 1));
    }
    for y in (1..e - 3).step_by(2) {
        tri(e - 2 + y * e, e - 1 + (y + 1) * e, e - 2 + (y + 1) * e);
        tri(e - 2 + (y + 1) * e, e - 1 + (y + 1) * e, e - 2 + (y + 2) * e);
    }
    for y in (1..e - 3).step_by(2) {
        tri(1 + y * e, 1 + (y + 1) * e, (y + 1) * e);
        tri(1 + (y + 1) * e, 1 + (y + 2) * e, (y + 1) * e);
    }

    for x in (0..e - 1).step_by(2) {
        tri(x, x + 1, x + 1 + e);
        tri(x + 1, x + 2, x + 1 + e);
    }
    for y in (0..e - 1).step_by(2) {
        tri(e - 1 + y * e, e - 1 + (y + 1) * e, e - 2 + (y + 1) * e);
        tri(e - 1 + (y + 1) * e, e - 1 + (y + 2) * e, e - 2 + (y + 1) * e);
    }
    for x in (0..e - 1).step_by(2) {
        tri(x + (e - 1) * e, x + 1 + (e - 2) * e, x + 1 + (e - 1) * e);
        tri(x + 1 + (e - 2) * e, x + 2 + (e - 1) * e, x + 1 + (e - 1) * e);
    }
    for y in (0..e - 1).step_by(2) {
        tri(y * e, 1 + (y + 1) * e, (y + 1) * e);
        tri((y + 1) * e, 1 + (y + 1) * e, (y + 2) * e);
    }

    out
}
