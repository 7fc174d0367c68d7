use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use webrunner_core_types::{SessionContext, StepResult};

/// Persisted snapshot of run progress, keyed by run id.
///
/// Invariant: `step_log.len() == current_step_index` at every write — the
/// log has no gaps and no duplicates, so resumption continues exactly at the
/// next unexecuted step.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub current_step_index: usize,
    pub step_log: Vec<StepResult>,
    pub session_context: SessionContext,
    /// Original run start, preserved across pause/resume cycles.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        current_step_index: usize,
        step_log: Vec<StepResult>,
        session_context: SessionContext,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            current_step_index,
            step_log,
            session_context,
            started_at,
            saved_at: Utc::now(),
        }
    }

    /// Whether the log and index agree. Violations indicate a writer bug;
    /// stores log them but still persist the blob.
    pub fn is_consistent(&self) -> bool {
        self.step_log.len() == self.current_step_index
    }
}
