//! Terrain sampling and off-thread patch generation: the height/colour oracle,
//! a fractal noise terrain, the job queues, and the patch generation jobs.

mod fractal;
mod generation;
mod job_queue;
mod oracle;

pub use fractal::{FractalParams, FractalTerrain};
pub use generation::{PatchData, PatchRequest, QuadPatchJob, SinglePatchJob, SplitKind, SplitResult};
pub use job_queue::{
    AsyncJobQueue, Completion, Job, JobClient, JobError, JobHandle, JobId, JobQueue, SyncJobQueue,
    Task,
};
pub use oracle::{FlatTerrain, Terrain};
