//! External sinks consumed by the controller: the run record store and the
//! screenshot artifact store. Both are seams; the in-memory implementations
//! serve tests and single-process embedding.

use async_trait::async_trait;
use dashmap::DashMap;

use webrunner_core_types::{Run, RunId};

use crate::errors::RunError;

/// Sink for run status updates. The controller writes the full run record on
/// every status transition; it never reads it back.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn save(&self, run: &Run) -> Result<(), RunError>;
}

/// Sink for captured screenshot bytes. Returns the stored file path that the
/// [`webrunner_core_types::ScreenshotRef`] will carry.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn store_screenshot(&self, name: &str, bytes: Vec<u8>) -> Result<String, RunError>;
}

#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    runs: DashMap<String, Run>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest persisted record for a run, if any.
    pub fn get(&self, run_id: &RunId) -> Option<Run> {
        self.runs.get(&run_id.0).map(|entry| entry.clone())
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn save(&self, run: &Run) -> Result<(), RunError> {
        self.runs.insert(run.id.0.clone(), run.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: DashMap<String, Vec<u8>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn store_screenshot(&self, name: &str, bytes: Vec<u8>) -> Result<String, RunError> {
        self.artifacts.insert(name.to_string(), bytes);
        Ok(format!("mem://{name}"))
    }
}
