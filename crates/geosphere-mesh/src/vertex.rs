//! GPU vertex layout for terrain patches.

use glam::{Vec2, Vec3};

/// A single patch vertex as uploaded to the GPU.
///
/// Layout (36 bytes total):
///   - `[0..12]`  position `[f32; 3]` relative to the patch clip centroid
///   - `[12..24]` normal `[f32; 3]`
///   - `[24..28]` color `[u8; 4]` RGBA
///   - `[28..36]` uv `[f32; 2]`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PatchVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [u8; 4],
    pub uv: [f32; 2],
}

static_assertions::assert_eq_size!(PatchVertex, [u8; 36]);

impl PatchVertex {
    /// Build an opaque vertex.
    pub fn new(position: Vec3, normal: Vec3, color: [u8; 3], uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            color: [color[0], color[1], color[2], 255],
            uv: uv.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }
}
