//! Vertex-cache optimisation for indexed triangle lists.
//!
//! Reorders triangles so that a simulated FIFO post-transform cache sees as
//! few misses as possible. Vertices are scored by their position in the
//! cache and by how many of their triangles are still waiting to be drawn;
//! the highest-scoring triangle is emitted next and only the scores touched
//! by the cache update are recomputed.

use std::collections::VecDeque;

/// Cache size used by [`VertexCacheOptimizer::default`].
pub const DEFAULT_CACHE_SIZE: usize = 40;

/// Sentinel that is never a valid vertex index.
const INVALID_INDEX: u32 = u32::MAX;

/// Errors reported for malformed optimizer input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VcacheError {
    /// An index is the sentinel value or addresses a vertex past the end.
    #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
    BadIndex {
        position: usize,
        index: u32,
        vertex_count: usize,
    },

    /// The index list is empty.
    #[error("index list contains no vertices")]
    NoVerts,
}

/// A simulated FIFO vertex cache.
///
/// Adding a vertex that is already cached moves it to the top; adding one
/// that is not cached counts a miss and may evict the oldest entry.
#[derive(Clone, Debug)]
pub struct VertexCache {
    slots: VecDeque<u32>,
    capacity: usize,
    misses: usize,
}

impl VertexCache {
    /// Create an empty cache holding up to `capacity` vertices.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "vertex cache capacity must be at least 1");
        Self {
            slots: VecDeque::with_capacity(capacity),
            capacity,
            misses: 0,
        }
    }

    /// Push `vertex` onto the top of the cache. Returns `true` on a hit.
    pub fn add_vertex(&mut self, vertex: u32) -> bool {
        let hit = match self.position(vertex) {
            Some(pos) => {
                self.slots.remove(pos);
                true
            }
            None => {
                self.misses += 1;
                if self.slots.len() == self.capacity {
                    self.slots.pop_back();
                }
                false
            }
        };
        self.slots.push_front(vertex);
        hit
    }

    /// Position of `vertex` counted from the most recent entry.
    pub fn position(&self, vertex: u32) -> Option<usize> {
        self.slots.iter().position(|&v| v == vertex)
    }

    /// Cached vertices, most recent first.
    pub fn cached(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots.iter().copied()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Misses counted since the last [`clear`](Self::clear).
    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.misses = 0;
    }

    /// Replay `indices` through a fresh cache of `capacity` slots and return the miss count.
    pub fn miss_count(indices: &[u32], capacity: usize) -> usize {
        let mut cache = Self::new(capacity);
        for &index in indices {
            cache.add_vertex(index);
        }
        cache.misses()
    }
}

/// Outcome of a successful optimisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OptimizeStats {
    pub triangles: usize,
    /// Simulated misses of the input order at the optimizer's cache size.
    pub misses_before: usize,
    /// Simulated misses of the emitted order at the optimizer's cache size.
    pub misses_after: usize,
    /// `false` when the reordered list was no better and the input was kept.
    pub reordered: bool,
}

/// Scoring parameters and cache size for triangle reordering.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexCacheOptimizer {
    pub cache_size: usize,
    /// Exponent applied to the linear cache-position falloff.
    pub cache_decay_power: f32,
    /// Fixed score for the three vertices of the most recent triangle.
    pub last_tri_score: f32,
    pub valence_boost_scale: f32,
    pub valence_boost_power: f32,
}

impl Default for VertexCacheOptimizer {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            cache_decay_power: 1.5,
            last_tri_score: 0.75,
            valence_boost_scale: 2.0,
            valence_boost_power: 0.5,
        }
    }
}

impl VertexCacheOptimizer {
    /// Default scoring with a different simulated cache size.
    pub fn with_cache_size(cache_size: usize) -> Self {
        Self {
            cache_size,
            ..Self::default()
        }
    }

    /// Reorder the triangles of `indices` in place.
    ///
    /// The vertex count is taken as the largest index plus one.
    pub fn optimize(&self, indices: &mut [u32]) -> Result<OptimizeStats, VcacheError> {
        let max_index = indices
            .iter()
            .copied()
            .filter(|&i| i != INVALID_INDEX)
            .max()
            .ok_or(VcacheError::NoVerts)?;
        self.optimize_with_vertex_count(indices, max_index as usize + 1)
    }

    /// Reorder the triangles of `indices` in place, validating every index
    /// against `vertex_count`. Nothing is modified if validation fails.
    pub fn optimize_with_vertex_count(
        &self,
        indices: &mut [u32],
        vertex_count: usize,
    ) -> Result<OptimizeStats, VcacheError> {
        if indices.is_empty() || vertex_count == 0 {
            return Err(VcacheError::NoVerts);
        }
        debug_assert!(
            indices.len() % 3 == 0,
            "index list length {} is not a multiple of 3",
            indices.len()
        );
        if let Some((position, &index)) = indices
            .iter()
            .enumerate()
            .find(|&(_, &i)| i == INVALID_INDEX || i as usize >= vertex_count)
        {
            return Err(VcacheError::BadIndex {
                position,
                index,
                vertex_count,
            });
        }

        let triangles = indices.len() / 3;
        let cache_size = self.cache_size.max(1);
        let misses_before = VertexCache::miss_count(indices, cache_size);

        let mut state = OptimizerState::new(self, &indices[..triangles * 3], vertex_count);
        let order = state.run();

        let mut reordered = Vec::with_capacity(triangles * 3);
        for tri in order {
            reordered.extend_from_slice(&state.tris[tri].verts);
        }
        let misses_after = VertexCache::miss_count(&reordered, cache_size);

        if misses_after > misses_before {
            tracing::debug!(
                misses_before,
                misses_after,
                "vertex cache reorder did not help, keeping input order"
            );
            return Ok(OptimizeStats {
                triangles,
                misses_before,
                misses_after: misses_before,
                reordered: false,
            });
        }

        indices[..triangles * 3].copy_from_slice(&reordered);
        Ok(OptimizeStats {
            triangles,
            misses_before,
            misses_after,
            reordered: true,
        })
    }
}

#[derive(Debug)]
struct VertexData {
    position_in_cache: Option<usize>,
    score: f32,
    remaining_valence: usize,
    /// Triangles using this vertex; the first `remaining_valence` are not yet rendered.
    tris: Vec<usize>,
    calculated: bool,
}

#[derive(Debug)]
struct TriangleData {
    rendered: bool,
    calculated: bool,
    score: f32,
    verts: [u32; 3],
}

struct OptimizerState<'a> {
    params: &'a VertexCacheOptimizer,
    cache: VertexCache,
    verts: Vec<VertexData>,
    tris: Vec<TriangleData>,
}

impl<'a> OptimizerState<'a> {
    fn new(params: &'a VertexCacheOptimizer, indices: &[u32], vertex_count: usize) -> Self {
        let mut verts: Vec<VertexData> = (0..vertex_count)
            .map(|_| VertexData {
                position_in_cache: None,
                score: 0.0,
                remaining_valence: 0,
                tris: Vec::new(),
                calculated: false,
            })
            .collect();

        let tris: Vec<TriangleData> = indices
            .chunks_exact(3)
            .map(|t| TriangleData {
                rendered: false,
                calculated: false,
                score: 0.0,
                verts: [t[0], t[1], t[2]],
            })
            .collect();

        for (i, &index) in indices.iter().enumerate() {
            let v = &mut verts[index as usize];
            v.remaining_valence += 1;
            v.tris.push(i / 3);
        }

        Self {
            params,
            cache: VertexCache::new(params.cache_size.max(1)),
            verts,
            tris,
        }
    }

    /// Emit every triangle and return the draw order.
    fn run(&mut self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.tris.len());
        let mut best = self.full_recalculation();
        while let Some(tri) = best {
            self.add_to_draw_list(tri);
            order.push(tri);
            best = if self.clean_calculation_flags() {
                self.partial_recalculation()
            } else {
                self.full_recalculation()
            };
        }
        debug_assert_eq!(order.len(), self.tris.len());
        order
    }

    fn vertex_score(&self, vertex: usize) -> f32 {
        let v = &self.verts[vertex];
        if v.remaining_valence == 0 {
            return -1.0;
        }
        let p = self.params;
        let mut score = match v.position_in_cache {
            None => 0.0,
            Some(pos) if pos < 3 => p.last_tri_score,
            Some(pos) => {
                let scaler = 1.0 / (self.cache.capacity() - 3) as f32;
                (1.0 - (pos - 3) as f32 * scaler).powf(p.cache_decay_power)
            }
        };
        score += p.valence_boost_scale * (v.remaining_valence as f32).powf(-p.valence_boost_power);
        score
    }

    /// Rescore everything and return the best un-rendered triangle.
    fn full_recalculation(&mut self) -> Option<usize> {
        for i in 0..self.verts.len() {
            self.verts[i].score = self.vertex_score(i);
        }
        let mut best: Option<(usize, f32)> = None;
        for (i, tri) in self.tris.iter_mut().enumerate() {
            if tri.rendered {
                continue;
            }
            let score = tri
                .verts
                .iter()
                .map(|&v| self.verts[v as usize].score)
                .sum::<f32>();
            tri.score = score;
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        best.map(|(i, _)| i)
    }

    fn add_to_draw_list(&mut self, tri: usize) {
        if self.tris[tri].rendered {
            return;
        }
        for v in self.cache.cached() {
            self.verts[v as usize].position_in_cache = None;
        }
        for v in self.tris[tri].verts {
            self.cache.add_vertex(v);
            let data = &mut self.verts[v as usize];
            data.remaining_valence -= 1;
            if let Some(pos) = data.tris.iter().position(|&t| t == tri) {
                let t = data.tris.remove(pos);
                data.tris.push(t);
            }
        }
        self.tris[tri].rendered = true;
        for (pos, v) in self.cache.cached().enumerate() {
            self.verts[v as usize].position_in_cache = Some(pos);
        }
    }

    /// Clear the calculated flags of every active triangle touching the
    /// cache, and of their vertices. Returns `false` if no such triangle exists.
    fn clean_calculation_flags(&mut self) -> bool {
        let mut found = false;
        let cached: Vec<u32> = self.cache.cached().collect();
        for v in cached {
            let v = v as usize;
            for j in 0..self.verts[v].remaining_valence {
                let t = self.verts[v].tris[j];
                found = true;
                self.tris[t].calculated = false;
                for tv in self.tris[t].verts {
                    self.verts[tv as usize].calculated = false;
                }
            }
        }
        found
    }

    fn triangle_score(&mut self, tri: usize) {
        let mut sum = 0.0;
        for v in self.tris[tri].verts {
            let v = v as usize;
            if !self.verts[v].calculated {
                self.verts[v].score = self.vertex_score(v);
                self.verts[v].calculated = true;
            }
            sum += self.verts[v].score;
        }
        self.tris[tri].score = sum;
        self.tris[tri].calculated = true;
    }

    /// Rescore only triangles touching the cache and return the best of them.
    fn partial_recalculation(&mut self) -> Option<usize> {
        let cached: Vec<u32> = self.cache.cached().collect();
        let mut best: Option<(usize, f32)> = None;
        for v in cached {
            let v = v as usize;
            for j in 0..self.verts[v].remaining_valence {
                let tri = self.verts[v].tris[j];
                if !self.tris[tri].calculated {
                    self.triangle_score(tri);
                }
                let score = self.tris[tri].score;
                if best.is_none_or(|(_, s)| score > s) {
                    best = Some((tri, score));
                }
            }
        }
        best.map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Row-major triangle list for a `n × n` vertex grid.
    fn grid(n: u32) -> Vec<u32> {
        let mut out = Vec::new();
        for y in 0..n - 1 {
            for x in 0..n - 1 {
                let i = x + y * n;
                out.extend_from_slice(&[i, i + 1, i + n, i + 1, i + n + 1, i + n]);
            }
        }
        out
    }

    /// Deterministic Fisher-Yates shuffle of whole triangles.
    fn shuffle_triangles(indices: &[u32], seed: u64) -> Vec<u32> {
        let mut tris: Vec<[u32; 3]> = indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect();
        let mut state = seed;
        for i in (1..tris.len()).rev() {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let j = (state >> 33) as usize % (i + 1);
            tris.swap(i, j);
        }
        tris.into_iter().flatten().collect()
    }

    fn sorted_triangles(indices: &[u32]) -> Vec<[u32; 3]> {
        let mut tris: Vec<[u32; 3]> = indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect();
        tris.sort_unstable();
        tris
    }

    #[test]
    fn test_cache_counts_misses_and_hits() {
        let mut cache = VertexCache::new(3);
        assert!(!cache.add_vertex(1));
        assert!(!cache.add_vertex(2));
        assert!(cache.add_vertex(1));
        assert_eq!(cache.cached().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_cache_evicts_oldest() {
        let mut cache = VertexCache::new(2);
        cache.add_vertex(1);
        cache.add_vertex(2);
        cache.add_vertex(3);
        assert_eq!(cache.position(1), None, "oldest vertex should be evicted");
        assert_eq!(cache.position(3), Some(0));
        assert_eq!(cache.position(2), Some(1));
        assert!(!cache.add_vertex(1));
        assert_eq!(cache.misses(), 4);
    }

    #[test]
    fn test_empty_input_is_no_verts() {
        let mut indices: Vec<u32> = Vec::new();
        let result = VertexCacheOptimizer::default().optimize(&mut indices);
        assert_eq!(result, Err(VcacheError::NoVerts));
    }

    /// Invalid indices are rejected before anything is reordered.
    #[test]
    fn test_bad_index_leaves_input_untouched() {
        let mut indices = vec![0, 1, 2, 2, 1, INVALID_INDEX];
        let original = indices.clone();
        let result = VertexCacheOptimizer::default().optimize(&mut indices);
        assert!(
            matches!(result, Err(VcacheError::BadIndex { position: 5, .. })),
            "got {result:?}"
        );
        assert_eq!(indices, original);

        let mut indices = vec![0, 1, 2, 2, 1, 7];
        let result = VertexCacheOptimizer::default().optimize_with_vertex_count(&mut indices, 4);
        assert_eq!(
            result,
            Err(VcacheError::BadIndex {
                position: 5,
                index: 7,
                vertex_count: 4
            })
        );
    }

    /// A two-triangle quad never misses more than once per distinct vertex.
    #[test]
    fn test_quad_misses_at_most_four() {
        for cache_size in [4, 8, DEFAULT_CACHE_SIZE] {
            let mut indices = vec![0, 1, 2, 2, 1, 3];
            let stats = VertexCacheOptimizer::with_cache_size(cache_size)
                .optimize(&mut indices)
                .unwrap();
            assert!(stats.misses_after <= 4, "cache {cache_size}: {stats:?}");
            assert!(VertexCache::miss_count(&indices, cache_size) <= 4);
        }
    }

    /// Optimizing an already optimized quad returns the same order.
    #[test]
    fn test_quad_order_is_fixed_point() {
        let optimizer = VertexCacheOptimizer::default();
        let mut once = vec![0, 1, 2, 2, 1, 3];
        optimizer.optimize(&mut once).unwrap();
        let mut twice = once.clone();
        optimizer.optimize(&mut twice).unwrap();
        assert_eq!(once, twice);
    }

    /// The output contains exactly the input triangles.
    #[test]
    fn test_output_is_permutation_of_input() {
        let input = shuffle_triangles(&grid(9), 7);
        let mut output = input.clone();
        VertexCacheOptimizer::default().optimize(&mut output).unwrap();
        assert_eq!(sorted_triangles(&input), sorted_triangles(&output));
    }

    /// A scrambled grid gets far fewer misses once optimised.
    #[test]
    fn test_scrambled_grid_improves() {
        let input = shuffle_triangles(&grid(16), 42);
        for cache_size in [8, 16, DEFAULT_CACHE_SIZE] {
            let mut output = input.clone();
            let stats = VertexCacheOptimizer::with_cache_size(cache_size)
                .optimize(&mut output)
                .unwrap();
            assert!(stats.reordered);
            assert!(
                stats.misses_after < stats.misses_before,
                "cache {cache_size}: {} misses after vs {} before",
                stats.misses_after,
                stats.misses_before
            );
            assert_eq!(stats.misses_after, VertexCache::miss_count(&output, cache_size));
        }
    }

    /// The reported miss count never exceeds that of the input order.
    #[test]
    fn test_never_worse_than_input() {
        for n in [3, 5, 12, 30] {
            let mut indices = grid(n);
            let stats = VertexCacheOptimizer::default().optimize(&mut indices).unwrap();
            assert!(stats.misses_after <= stats.misses_before, "n={n}: {stats:?}");
            assert_eq!(stats.triangles, 2 * (n as usize - 1).pow(2));
        }
    }

    /// Identical input produces identical output.
    #[test]
    fn test_deterministic() {
        let input = shuffle_triangles(&grid(10), 3);
        let mut a = input.clone();
        let mut b = input;
        let optimizer = VertexCacheOptimizer::default();
        optimizer.optimize(&mut a).unwrap();
        optimizer.optimize(&mut b).unwrap();
        assert_eq!(a, b);
    }
}
