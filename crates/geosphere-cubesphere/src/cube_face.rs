//! The six root faces of the cube-sphere and their corner vectors.

use glam::DVec3;

use crate::PatchCorners;

/// The six faces of the cube that is projected onto the sphere.
///
/// The discriminant is the face index stored in the top bits of a
/// [`PatchId`](crate::PatchId), so the order here is fixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CubeFace {
    /// +Z face
    PosZ = 0,
    /// −Y face
    NegY = 1,
    /// +X face
    PosX = 2,
    /// +Y face
    PosY = 3,
    /// −X face
    NegX = 4,
    /// −Z face
    NegZ = 5,
}

impl CubeFace {
    /// All six faces in face-index order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PosZ,
        CubeFace::NegY,
        CubeFace::PosX,
        CubeFace::PosY,
        CubeFace::NegX,
        CubeFace::NegZ,
    ];

    /// Face index in `0..6`.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look up a face by index. Returns `None` for indices `>= 6`.
    #[must_use]
    pub fn from_index(index: u8) -> Option<CubeFace> {
        Self::ALL.get(usize::from(index)).copied()
    }

    /// The face on the other side of the cube.
    #[must_use]
    pub fn opposite(self) -> CubeFace {
        match self {
            CubeFace::PosX => CubeFace::NegX,
            CubeFace::NegX => CubeFace::PosX,
            CubeFace::PosY => CubeFace::NegY,
            CubeFace::NegY => CubeFace::PosY,
            CubeFace::PosZ => CubeFace::NegZ,
            CubeFace::NegZ => CubeFace::PosZ,
        }
    }

    /// Outward-pointing unit normal for this face.
    #[must_use]
    pub fn normal(self) -> DVec3 {
        match self {
            CubeFace::PosX => DVec3::X,
            CubeFace::NegX => DVec3::NEG_X,
            CubeFace::PosY => DVec3::Y,
            CubeFace::NegY => DVec3::NEG_Y,
            CubeFace::PosZ => DVec3::Z,
            CubeFace::NegZ => DVec3::NEG_Z,
        }
    }

    /// The four unit-sphere corners of this face's root patch.
    ///
    /// Corners are wound so that `(v1 - v0) × (v3 - v0)` points away from
    /// the sphere centre.
    #[must_use]
    pub fn root_corners(self) -> PatchCorners {
        let p = cube_vertices();
        let [a, b, c, d] = match self {
            CubeFace::PosZ => [0, 1, 2, 3],
            CubeFace::NegY => [3, 2, 6, 7],
            CubeFace::PosX => [0, 3, 7, 4],
            CubeFace::PosY => [1, 0, 4, 5],
            CubeFace::NegX => [2, 1, 5, 6],
            CubeFace::NegZ => [7, 6, 5, 4],
        };
        PatchCorners::new(p[a], p[b], p[c], p[d])
    }
}

/// The eight cube vertices pushed out onto the unit sphere.
fn cube_vertices() -> [DVec3; 8] {
    [
        DVec3::new(1.0, 1.0, 1.0),
        DVec3::new(-1.0, 1.0, 1.0),
        DVec3::new(-1.0, -1.0, 1.0),
        DVec3::new(1.0, -1.0, 1.0),
        DVec3::new(1.0, 1.0, -1.0),
        DVec3::new(-1.0, 1.0, -1.0),
        DVec3::new(-1.0, -1.0, -1.0),
        DVec3::new(1.0, -1.0, -1.0),
    ]
    .map(DVec3::normalize)
}
