//! Patch tessellation: vertex-cache optimisation, shared per-detail index buffers, and the patch vertex layout.

mod patch_context;
mod vcache;
mod vertex;

pub use patch_context::{DetailLevel, PatchContext};
pub use vcache::{
    DEFAULT_CACHE_SIZE, OptimizeStats, VcacheError, VertexCache, VertexCacheOptimizer,
};
pub use vertex::PatchVertex;
