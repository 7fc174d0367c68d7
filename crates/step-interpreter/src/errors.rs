//! Error types for step execution.

use thiserror::Error;

use crate::session::SessionError;

/// Failure modes for one interpreted step. Any of these is fatal to the run
/// (fail-fast); the controller records it on the step result and the run's
/// terminal error.
#[derive(Debug, Error, Clone)]
pub enum StepError {
    /// Every candidate in the selector fallback list failed to resolve to a
    /// visible element.
    #[error("no visible element for any of: {0}")]
    SelectorNotFound(String),

    /// An assert/verify step matched an element whose text did not contain
    /// the expected value.
    #[error("assertion failed: {0}")]
    AssertFailed(String),

    /// The target URL could not be resolved or loaded.
    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    /// A bounded wait expired before its condition held.
    #[error("wait timeout: {0}")]
    WaitTimeout(String),

    /// The step definition is unusable (e.g. a click with no selector).
    #[error("invalid step: {0}")]
    InvalidStep(String),

    /// The browser session failed underneath the action.
    #[error("session failure: {0}")]
    Session(String),
}

impl From<SessionError> for StepError {
    fn from(err: SessionError) -> Self {
        StepError::Session(err.to_string())
    }
}
