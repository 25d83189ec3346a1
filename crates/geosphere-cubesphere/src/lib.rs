//! Cube-sphere geometry: root faces, 64-bit patch identifiers, and bilinear sphere quads.

mod corners;
mod cube_face;
mod patch_id;

pub use corners::PatchCorners;
pub use cube_face::CubeFace;
pub use patch_id::PatchId;
