use async_trait::async_trait;
use dashmap::DashMap;
use tracing::warn;

use webrunner_core_types::RunId;

use crate::api::CheckpointStore;
use crate::errors::CheckpointError;
use crate::model::Checkpoint;

/// In-memory backend for tests and single-process embedding. Does not
/// survive a process restart; production deployments use
/// [`crate::FsCheckpointStore`] or an external implementation.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    entries: DashMap<String, Checkpoint>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, run_id: &RunId, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        if !checkpoint.is_consistent() {
            warn!(
                run_id = %run_id,
                index = checkpoint.current_step_index,
                log_len = checkpoint.step_log.len(),
                "checkpoint index disagrees with step log"
            );
        }
        self.entries.insert(run_id.0.clone(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, run_id: &RunId) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.entries.get(&run_id.0).map(|entry| entry.clone()))
    }

    async fn discard(&self, run_id: &RunId) -> Result<(), CheckpointError> {
        self.entries.remove(&run_id.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use webrunner_core_types::{SessionContext, StepResult};

    fn checkpoint(index: usize) -> Checkpoint {
        let log = (0..index)
            .map(|i| StepResult::success(i, "click", 10))
            .collect();
        Checkpoint::new(index, log, SessionContext::default(), Utc::now())
    }

    #[tokio::test]
    async fn save_load_discard_cycle() {
        let store = MemoryCheckpointStore::new();
        let run_id = RunId("run-1".to_string());

        assert!(store.load(&run_id).await.unwrap().is_none());

        store.save(&run_id, &checkpoint(2)).await.unwrap();
        let loaded = store.load(&run_id).await.unwrap().unwrap();
        assert_eq!(loaded.current_step_index, 2);
        assert_eq!(loaded.step_log.len(), 2);

        store.discard(&run_id).await.unwrap();
        assert!(store.load(&run_id).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn save_overwrites_previous_checkpoint() {
        let store = MemoryCheckpointStore::new();
        let run_id = RunId("run-1".to_string());
        store.save(&run_id, &checkpoint(1)).await.unwrap();
        store.save(&run_id, &checkpoint(3)).await.unwrap();
        let loaded = store.load(&run_id).await.unwrap().unwrap();
        assert_eq!(loaded.current_step_index, 3);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn discard_missing_key_is_ok() {
        let store = MemoryCheckpointStore::new();
        store.discard(&RunId("absent".to_string())).await.unwrap();
    }
}
