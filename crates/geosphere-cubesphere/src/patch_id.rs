//! 64-bit identifiers encoding a patch's path through its face quadtree.
//!
//! The cube face lives in bits 61..=63. Each subdivision step writes a 2-bit
//! quadrant into the slot `[2d, 2d + 1]`, where `d` is the depth of the node
//! being split, so a node at depth `n` has slots `0..n` populated.

use std::fmt;

use crate::CubeFace;

const FACE_SHIFT: u32 = 61;
const QUADRANT_MASK: u64 = 0b11;

/// Path of a patch through the cube-sphere quadtree, packed into a `u64`.
///
/// Identifiers are prefix-free: a child's identifier equals its parent's
/// with exactly one 2-bit slot OR-ed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchId(u64);

impl PatchId {
    /// Deepest node depth representable without touching the face bits.
    pub const MAX_DEPTH: u32 = 30;

    /// Identifier of the root patch of `face`.
    #[must_use]
    pub fn root(face: CubeFace) -> Self {
        Self((face as u64) << FACE_SHIFT)
    }

    /// Wrap a raw bit pattern.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw bit pattern.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Identifier of child `quadrant` of a node at `depth`.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `quadrant >= 4`, if `depth` is outside the
    /// usable range, or if the slot for `depth` is already set.
    #[must_use]
    pub fn next_patch_id(self, depth: u32, quadrant: u32) -> Self {
        debug_assert!(quadrant < 4, "quadrant {quadrant} out of range");
        debug_assert!(
            depth < Self::MAX_DEPTH,
            "depth {depth} exceeds maximum {}",
            Self::MAX_DEPTH
        );
        let shift = depth * 2;
        debug_assert!(
            self.0 & (QUADRANT_MASK << shift) == 0,
            "slot {depth} already set in {self}"
        );
        Self(self.0 | (u64::from(quadrant) << shift))
    }

    /// Identifiers of all four children of a node at `depth`, in quadrant order.
    #[must_use]
    pub fn children(self, depth: u32) -> [PatchId; 4] {
        [0, 1, 2, 3].map(|q| self.next_patch_id(depth, q))
    }

    /// The quadrant stored in the slot for `depth`.
    #[must_use]
    pub fn patch_idx(self, depth: u32) -> u32 {
        debug_assert!(depth < Self::MAX_DEPTH, "depth {depth} out of range");
        ((self.0 >> (depth * 2)) & QUADRANT_MASK) as u32
    }

    /// The face index in `0..8` (only `0..6` are produced by [`PatchId::root`]).
    #[must_use]
    pub fn face_idx(self) -> u8 {
        (self.0 >> FACE_SHIFT) as u8
    }

    /// The cube face this patch belongs to, if the face bits are valid.
    #[must_use]
    pub fn face(self) -> Option<CubeFace> {
        CubeFace::from_index(self.face_idx())
    }
}

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:016x}", self.face_idx(), self.0)
    }
}
