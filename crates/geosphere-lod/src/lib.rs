//! Level-of-detail decisions for planet patches: frustum and horizon visibility, split distances, and depth limits.

mod frustum;
mod horizon_culling;
mod split_policy;

pub use frustum::Frustum;
pub use horizon_culling::{
    BoundingSphere, HORIZON_SAMPLE_UVS, HorizonCuller, SAMPLE_RADIUS_FRACTION, horizon_samples,
};
pub use split_policy::{
    BodyType, MAX_PATCH_DEPTH, SUBDIVIDE_AT_CAMDIST, body_max_depth, distance_multiplier,
    split_length,
};
