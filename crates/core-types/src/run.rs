//! Mutable run record, per-step results and run-level options.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CaseId, RunId, ScreenshotRef};

/// Lifecycle state of a run.
///
/// Transitions are driven exclusively by the run controller:
/// `pending → running ⇄ paused → {completed | failed | stopped}`.
/// Terminal states are final and never re-entered for the same run id.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Stopped,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Stopped
        )
    }
}

/// Mutable execution record for one attempt of a test case.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: RunId,
    pub case_id: CaseId,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub current_step_index: usize,
    pub step_log: Vec<StepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Run {
    pub fn new(id: RunId, case_id: CaseId) -> Self {
        Self {
            id,
            case_id,
            status: RunStatus::Pending,
            started_at: None,
            completed_at: None,
            current_step_index: 0,
            step_log: Vec::new(),
            error: None,
        }
    }
}

/// Outcome of one attempted step. Appended exactly once per attempt, in
/// index order; never mutated after append.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub index: usize,
    pub action: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<ScreenshotRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resulting_url: Option<String>,
}

impl StepResult {
    pub fn success(index: usize, action: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            index,
            action: action.into(),
            success: true,
            duration_ms,
            error: None,
            screenshot: None,
            resulting_url: None,
        }
    }

    pub fn failure(
        index: usize,
        action: impl Into<String>,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            index,
            action: action.into(),
            success: false,
            duration_ms,
            error: Some(error.into()),
            screenshot: None,
            resulting_url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.resulting_url = Some(url.into());
        self
    }

    pub fn with_screenshot(mut self, screenshot: ScreenshotRef) -> Self {
        self.screenshot = Some(screenshot);
        self
    }
}

/// Browser state needed to resume a checkpointed run mid-flow.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub cookies: Vec<Cookie>,
}

/// Session cookie carried inside a checkpoint's session context.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// When step screenshots are captured.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ScreenshotMode {
    /// Capture after every step; a capture failure fails the step.
    #[serde(rename = "always")]
    Always,
    /// Capture only after failed steps; capture failures are logged only.
    #[serde(rename = "on-failure")]
    OnFailure,
    /// Never capture.
    #[serde(rename = "never")]
    Never,
}

impl Default for ScreenshotMode {
    fn default() -> Self {
        ScreenshotMode::OnFailure
    }
}

/// Browser viewport dimensions requested for the session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Credentials consumed by the authentication preflight.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCredentials {
    pub username: String,
    pub password: String,
    /// Absolute or base-relative login page; defaults to `/login`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_url: Option<String>,
}

/// Run-level execution options supplied by the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    pub base_url: String,
    pub timeout_ms: u64,
    pub screenshot_mode: ScreenshotMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_credentials: Option<AuthCredentials>,
}

impl RunOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: 10_000,
            screenshot_mode: ScreenshotMode::default(),
            viewport: None,
            requires_auth: false,
            auth_credentials: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_screenshot_mode(mut self, mode: ScreenshotMode) -> Self {
        self.screenshot_mode = mode;
        self
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Some(Viewport { width, height });
        self
    }

    pub fn with_auth(mut self, credentials: AuthCredentials) -> Self {
        self.requires_auth = true;
        self.auth_credentials = Some(credentials);
        self
    }
}
