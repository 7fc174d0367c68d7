use async_trait::async_trait;

use webrunner_core_types::RunId;

use crate::errors::CheckpointError;
use crate::model::Checkpoint;

/// Key → blob persistence seam for run checkpoints.
///
/// Keys never collide across runs, so implementations need no cross-run
/// locking; each key is overwrite-only until the run reaches a terminal
/// state, at which point the controller discards it.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist (overwrite) the checkpoint for `run_id`.
    async fn save(&self, run_id: &RunId, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Load the checkpoint for `run_id`, if one exists.
    async fn load(&self, run_id: &RunId) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Remove the checkpoint for `run_id`. Removing a missing key is not an
    /// error.
    async fn discard(&self, run_id: &RunId) -> Result<(), CheckpointError>;
}
