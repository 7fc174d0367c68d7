//! Run-level screenshot capture policy.
//!
//! Capture happens after step execution, never inside the interpreter.
//! Under `always`, a capture failure escalates to a step failure; under
//! `on-failure` it is logged and swallowed.

use chrono::Utc;
use tracing::{debug, warn};

use webrunner_core_types::{RunId, ScreenshotMode, ScreenshotRef, StepResult};
use webrunner_step_interpreter::BrowserSession;

use crate::errors::RunError;
use crate::stores::ArtifactStore;

pub struct CapturePolicy {
    mode: ScreenshotMode,
    browser_label: String,
}

impl CapturePolicy {
    pub fn new(mode: ScreenshotMode, browser_label: impl Into<String>) -> Self {
        Self {
            mode,
            browser_label: browser_label.into(),
        }
    }

    pub fn mode(&self) -> ScreenshotMode {
        self.mode
    }

    /// Apply the policy to a just-executed step, attaching a screenshot
    /// reference or escalating the result as the mode dictates.
    pub async fn after_step(
        &self,
        session: &dyn BrowserSession,
        artifacts: &dyn ArtifactStore,
        run_id: &RunId,
        result: &mut StepResult,
    ) {
        match self.mode {
            ScreenshotMode::Never => {}
            ScreenshotMode::Always => match self.capture(session, artifacts, run_id, result).await
            {
                Ok(screenshot) => result.screenshot = Some(screenshot),
                Err(err) => {
                    warn!(run_id = %run_id, index = result.index, %err, "mandatory capture failed");
                    result.success = false;
                    if result.error.is_none() {
                        result.error = Some(err.to_string());
                    }
                }
            },
            ScreenshotMode::OnFailure => {
                if result.success {
                    return;
                }
                match self.capture(session, artifacts, run_id, result).await {
                    Ok(screenshot) => result.screenshot = Some(screenshot),
                    Err(err) => {
                        // Evidence capture is best-effort here; the step's
                        // own outcome stands.
                        warn!(run_id = %run_id, index = result.index, %err, "failure capture skipped");
                    }
                }
            }
        }
    }

    async fn capture(
        &self,
        session: &dyn BrowserSession,
        artifacts: &dyn ArtifactStore,
        run_id: &RunId,
        result: &StepResult,
    ) -> Result<ScreenshotRef, RunError> {
        let bytes = session
            .screenshot()
            .await
            .map_err(|err| RunError::Capture(err.to_string()))?;

        let name = self.artifact_name(run_id, result.index, &result.action);
        let file_path = artifacts.store_screenshot(&name, bytes).await?;
        debug!(run_id = %run_id, index = result.index, %file_path, "screenshot stored");

        Ok(ScreenshotRef {
            run_id: run_id.clone(),
            browser_label: self.browser_label.clone(),
            page_name: result.action.clone(),
            url: result.resulting_url.clone(),
            file_path,
        })
    }

    /// Deterministic capture name: run id, browser label, step index, action
    /// name and a millisecond timestamp.
    fn artifact_name(&self, run_id: &RunId, index: usize, action: &str) -> String {
        format!(
            "{run_id}_{label}_step{index}_{action}_{ts}.png",
            label = self.browser_label,
            ts = Utc::now().timestamp_millis()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemoryArtifactStore;
    use async_trait::async_trait;
    use webrunner_core_types::Cookie;
    use webrunner_step_interpreter::SessionError;

    struct ShotSession {
        fail_capture: bool,
    }

    #[async_trait]
    impl BrowserSession for ShotSession {
        async fn goto(&self, _url: &str) -> Result<(), SessionError> {
            Ok(())
        }
        async fn click(&self, _selector: &str) -> Result<(), SessionError> {
            Ok(())
        }
        async fn fill(&self, _selector: &str, _value: &str) -> Result<(), SessionError> {
            Ok(())
        }
        async fn select_option(&self, _selector: &str, _value: &str) -> Result<(), SessionError> {
            Ok(())
        }
        async fn press_key(&self, _key: &str) -> Result<(), SessionError> {
            Ok(())
        }
        async fn is_visible(&self, _selector: &str) -> Result<bool, SessionError> {
            Ok(true)
        }
        async fn text_content(&self, _selector: &str) -> Result<String, SessionError> {
            Ok(String::new())
        }
        async fn page_text(&self) -> Result<String, SessionError> {
            Ok(String::new())
        }
        async fn current_url(&self) -> Result<String, SessionError> {
            Ok("https://app.test/".to_string())
        }
        async fn screenshot(&self) -> Result<Vec<u8>, SessionError> {
            if self.fail_capture {
                Err(SessionError::Capture("target crashed".to_string()))
            } else {
                Ok(vec![0u8; 16])
            }
        }
        async fn cookies(&self) -> Result<Vec<Cookie>, SessionError> {
            Ok(Vec::new())
        }
        async fn set_cookies(&self, _cookies: &[Cookie]) -> Result<(), SessionError> {
            Ok(())
        }
        async fn close(&self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    fn run_id() -> RunId {
        RunId("run-1".to_string())
    }

    #[tokio::test]
    async fn always_mode_attaches_reference_on_success() {
        let policy = CapturePolicy::new(ScreenshotMode::Always, "chromium");
        let session = ShotSession { fail_capture: false };
        let artifacts = InMemoryArtifactStore::new();
        let mut result = StepResult::success(0, "navigate", 10).with_url("https://app.test/");

        policy
            .after_step(&session, &artifacts, &run_id(), &mut result)
            .await;

        assert!(result.success);
        let screenshot = result.screenshot.unwrap();
        assert_eq!(screenshot.browser_label, "chromium");
        assert!(screenshot.file_path.contains("step0_navigate"));
        assert_eq!(artifacts.len(), 1);
    }

    #[tokio::test]
    async fn always_mode_capture_failure_fails_the_step() {
        let policy = CapturePolicy::new(ScreenshotMode::Always, "chromium");
        let session = ShotSession { fail_capture: true };
        let artifacts = InMemoryArtifactStore::new();
        let mut result = StepResult::success(1, "click", 10);

        policy
            .after_step(&session, &artifacts, &run_id(), &mut result)
            .await;

        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("capture failed"));
        assert!(artifacts.is_empty());
    }

    #[tokio::test]
    async fn on_failure_mode_skips_successful_steps() {
        let policy = CapturePolicy::new(ScreenshotMode::OnFailure, "chromium");
        let session = ShotSession { fail_capture: false };
        let artifacts = InMemoryArtifactStore::new();
        let mut result = StepResult::success(0, "navigate", 10);

        policy
            .after_step(&session, &artifacts, &run_id(), &mut result)
            .await;

        assert!(result.screenshot.is_none());
        assert!(artifacts.is_empty());
    }

    #[tokio::test]
    async fn on_failure_capture_error_does_not_change_outcome() {
        let policy = CapturePolicy::new(ScreenshotMode::OnFailure, "chromium");
        let session = ShotSession { fail_capture: true };
        let artifacts = InMemoryArtifactStore::new();
        let mut result = StepResult::failure(2, "fill", 10, "no visible candidate");

        policy
            .after_step(&session, &artifacts, &run_id(), &mut result)
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no visible candidate"));
        assert!(result.screenshot.is_none());
    }

    #[tokio::test]
    async fn never_mode_captures_nothing() {
        let policy = CapturePolicy::new(ScreenshotMode::Never, "chromium");
        let session = ShotSession { fail_capture: false };
        let artifacts = InMemoryArtifactStore::new();
        let mut result = StepResult::failure(0, "assert", 10, "mismatch");

        policy
            .after_step(&session, &artifacts, &run_id(), &mut result)
            .await;

        assert!(artifacts.is_empty());
        assert!(result.screenshot.is_none());
    }
}
