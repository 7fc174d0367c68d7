//! Checkpoint persistence for resumable executions.
//!
//! A checkpoint is a keyed snapshot of run progress written after every
//! successfully completed step and on pause. Reading it back at the start of
//! a run lets a different process instance continue a paused run mid-sequence
//! instead of starting cold. The store itself is a pluggable key → blob
//! interface; two backends ship here (in-memory and filesystem).

mod api;
mod errors;
mod fs;
mod memory;
mod model;

pub use api::CheckpointStore;
pub use errors::{CheckpointErrKind, CheckpointError};
pub use fs::FsCheckpointStore;
pub use memory::MemoryCheckpointStore;
pub use model::Checkpoint;
