use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use webrunner_core_types::RunId;

use crate::api::CheckpointStore;
use crate::errors::{CheckpointErrKind, CheckpointError};
use crate::model::Checkpoint;

/// Filesystem backend: one JSON file per run id under a root directory.
///
/// Writes go to a `.tmp` sibling first and are renamed into place, so a
/// crash mid-write never leaves a torn checkpoint behind.
#[derive(Debug)]
pub struct FsCheckpointStore {
    root: PathBuf,
}

impl FsCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, run_id: &RunId) -> PathBuf {
        // Run ids are uuids in practice; the filter keeps hostile ids from
        // escaping the root directory.
        let safe: String = run_id
            .0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.root.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl CheckpointStore for FsCheckpointStore {
    async fn save(&self, run_id: &RunId, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        if !checkpoint.is_consistent() {
            warn!(
                run_id = %run_id,
                index = checkpoint.current_step_index,
                log_len = checkpoint.step_log.len(),
                "checkpoint index disagrees with step log"
            );
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| CheckpointErrKind::IoFailed(err.to_string()))?;

        let blob = serde_json::to_vec_pretty(checkpoint)
            .map_err(|err| CheckpointErrKind::EncodeFailed(err.to_string()))?;

        let path = self.entry_path(run_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &blob)
            .await
            .map_err(|err| CheckpointErrKind::IoFailed(err.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|err| CheckpointErrKind::IoFailed(err.to_string()))?;

        debug!(run_id = %run_id, path = %path.display(), "checkpoint saved");
        Ok(())
    }

    async fn load(&self, run_id: &RunId) -> Result<Option<Checkpoint>, CheckpointError> {
        let path = self.entry_path(run_id);
        let blob = match tokio::fs::read(&path).await {
            Ok(blob) => blob,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CheckpointErrKind::IoFailed(err.to_string()).into()),
        };

        let checkpoint: Checkpoint = serde_json::from_slice(&blob)
            .map_err(|err| CheckpointErrKind::Corrupt(err.to_string()))?;
        Ok(Some(checkpoint))
    }

    async fn discard(&self, run_id: &RunId) -> Result<(), CheckpointError> {
        let path = self.entry_path(run_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CheckpointErrKind::IoFailed(err.to_string()).into()),
        }
    }
}
