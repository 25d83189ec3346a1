//! Planet surface level of detail: the patch quadtree, the per-body sphere
//! controller that drives it each frame, and the renderer interface.

mod patch;
mod render;
mod sphere;

pub use patch::{GeoPatch, LodContext, PatchMesh, PatchState, SKIRT_SCALE, SplitCandidate};
pub use render::{DrawStats, PatchDraw, PatchRenderer};
pub use sphere::{GeoSphere, SphereBody, SphereSettings, SphereStats, SphereView};
