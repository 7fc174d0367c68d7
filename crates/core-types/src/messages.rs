//! Control-plane and observation messages carried on the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{RunId, RunStatus};

/// Out-of-band instruction targeted at a specific run.
///
/// Delivery is at-least-once; controllers ignore messages addressed to other
/// run ids.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlMessage {
    pub run_id: RunId,
    pub action: ControlAction,
}

impl ControlMessage {
    pub fn new(run_id: RunId, action: ControlAction) -> Self {
        Self { run_id, action }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Pause,
    Resume,
    Stop,
    /// Does not mutate run state; only triggers an immediate status publish.
    Status,
}

/// Progress broadcast emitted after every step and on every handled control
/// message. Purely observational; never read back by the controller.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub run_id: RunId,
    pub status: RunStatus,
    pub progress: RunProgress,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl StatusMessage {
    pub fn now(run_id: RunId, status: RunStatus, progress: RunProgress) -> Self {
        Self {
            run_id,
            status,
            progress,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProgress {
    /// Steps completed so far.
    pub current: usize,
    /// Total steps in the test case.
    pub total: usize,
    pub current_step_name: String,
}

/// Published for external notification handling when the authentication
/// preflight cannot be confirmed successful.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFailureAlert {
    #[serde(rename = "type")]
    pub kind: String,
    pub run_id: RunId,
    pub error: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl AuthFailureAlert {
    pub fn new(run_id: RunId, error: impl Into<String>) -> Self {
        Self {
            kind: "AUTH_FAILURE".to_string(),
            run_id,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Reference to a captured screenshot handed to the external artifact store.
/// The image itself is never embedded in run records.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRef {
    pub run_id: RunId,
    pub browser_label: String,
    pub page_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub file_path: String,
}
