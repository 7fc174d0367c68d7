//! Per-action interpretation of declarative steps.

use std::time::{Duration, Instant};

use tracing::{debug, warn};
use url::Url;

use webrunner_core_types::{RunOptions, Step, StepAction, StepResult};

use crate::errors::StepError;
use crate::selector::{fallback_list, first_visible, wait_for_first_visible};
use crate::session::BrowserSession;

/// Executes one step at a time against a [`BrowserSession`].
///
/// The interpreter is stateless across steps; page/form state lives in the
/// browser, and run-level bookkeeping lives in the controller.
pub struct StepInterpreter {
    base_url: Url,
    timeout: Duration,
}

impl StepInterpreter {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self, StepError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| StepError::InvalidStep(format!("invalid base url '{base_url}': {err}")))?;
        Ok(Self {
            base_url,
            timeout: Duration::from_millis(timeout_ms.max(1)),
        })
    }

    pub fn from_options(options: &RunOptions) -> Result<Self, StepError> {
        Self::new(&options.base_url, options.timeout_ms)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Execute one step and report its result.
    ///
    /// Elapsed time and the resulting page URL are recorded regardless of
    /// outcome; the result is appended to the run's step log exactly once by
    /// the controller.
    pub async fn execute(
        &self,
        session: &dyn BrowserSession,
        index: usize,
        step: &Step,
    ) -> StepResult {
        let action = step.kind();
        debug!(index, action = action.name(), "executing step");

        let started = Instant::now();
        let outcome = self.apply(session, &action, step).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let resulting_url = session.current_url().await.ok();

        let mut result = match outcome {
            Ok(()) => StepResult::success(index, action.name(), duration_ms),
            Err(err) => {
                warn!(index, action = action.name(), %err, "step failed");
                StepResult::failure(index, action.name(), duration_ms, err.to_string())
            }
        };
        if let Some(url) = resulting_url {
            result = result.with_url(url);
        }
        result
    }

    async fn apply(
        &self,
        session: &dyn BrowserSession,
        action: &StepAction,
        step: &Step,
    ) -> Result<(), StepError> {
        match action {
            StepAction::Navigate => self.navigate(session, step).await,
            StepAction::Click => {
                let selector = self.resolve(session, step).await?;
                session.click(&selector).await?;
                Ok(())
            }
            StepAction::Fill => {
                let selector = self.resolve(session, step).await?;
                let value = step.value.as_deref().unwrap_or_default();
                session.fill(&selector, value).await?;
                Ok(())
            }
            StepAction::Select => {
                let selector = self.resolve(session, step).await?;
                let value = required_value(step, "select")?;
                session.select_option(&selector, value).await?;
                Ok(())
            }
            StepAction::Wait => self.wait(step).await,
            StepAction::WaitFor => self.wait_for(session, step).await,
            StepAction::Assert => self.assert(session, step).await,
            StepAction::Press => {
                let key = required_value(step, "press")?;
                session.press_key(key).await?;
                Ok(())
            }
            // Capture is driven by the run-level capture policy, not by the
            // step itself.
            StepAction::Screenshot => Ok(()),
            StepAction::Other(name) => {
                warn!(action = %name, "unknown step action, treating as no-op");
                Ok(())
            }
        }
    }

    async fn navigate(&self, session: &dyn BrowserSession, step: &Step) -> Result<(), StepError> {
        let target = required_value(step, "navigate")?;
        let url = match Url::parse(target) {
            Ok(absolute) => absolute,
            // Relative paths are joined against the run's base URL.
            Err(_) => self
                .base_url
                .join(target)
                .map_err(|err| StepError::NavigationFailed(format!("cannot resolve '{target}': {err}")))?,
        };
        session
            .goto(url.as_str())
            .await
            .map_err(|err| StepError::NavigationFailed(err.to_string()))
    }

    async fn wait(&self, step: &Step) -> Result<(), StepError> {
        match step.value.as_deref().map(str::trim).and_then(|v| v.parse::<u64>().ok()) {
            Some(millis) => {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(())
            }
            None => {
                debug!(value = ?step.value, "non-numeric wait value, skipping");
                Ok(())
            }
        }
    }

    async fn wait_for(&self, session: &dyn BrowserSession, step: &Step) -> Result<(), StepError> {
        let candidates = required_selectors(step, "waitFor")?;
        match wait_for_first_visible(session, &candidates, self.timeout).await? {
            Some(_) => Ok(()),
            None => Err(StepError::WaitTimeout(format!(
                "no candidate became visible within {}ms: {}",
                self.timeout.as_millis(),
                candidates.join(", ")
            ))),
        }
    }

    async fn assert(&self, session: &dyn BrowserSession, step: &Step) -> Result<(), StepError> {
        let selector = self.resolve(session, step).await?;
        // Without an expected value, mere existence suffices.
        let Some(expected) = step.value.as_deref() else {
            return Ok(());
        };
        let text = session.text_content(&selector).await?;
        if text.contains(expected) {
            Ok(())
        } else {
            Err(StepError::AssertFailed(format!(
                "element '{selector}' text {text:?} does not contain {expected:?}"
            )))
        }
    }

    /// Ordered-list "first visible candidate wins" resolution, shared by
    /// click/fill/select/assert.
    async fn resolve(&self, session: &dyn BrowserSession, step: &Step) -> Result<String, StepError> {
        let candidates = required_selectors(step, &step.action)?;
        first_visible(session, &candidates)
            .await
            .ok_or_else(|| StepError::SelectorNotFound(candidates.join(", ")))
    }
}

fn required_selectors(step: &Step, action: &str) -> Result<Vec<String>, StepError> {
    let raw = step
        .selector
        .as_deref()
        .ok_or_else(|| StepError::InvalidStep(format!("{action} requires a selector")))?;
    let candidates = fallback_list(raw);
    if candidates.is_empty() {
        return Err(StepError::InvalidStep(format!(
            "{action} selector list is empty"
        )));
    }
    Ok(candidates)
}

fn required_value<'a>(step: &'a Step, action: &str) -> Result<&'a str, StepError> {
    step.value
        .as_deref()
        .ok_or_else(|| StepError::InvalidStep(format!("{action} requires a value")))
}
