//! Run-level error taxonomy.

use thiserror::Error;

/// Fatal failure modes of one run. Each is caught at the controller
/// boundary, recorded into the run's terminal state, and re-raised to the
/// immediate caller for logging.
#[derive(Debug, Error, Clone)]
pub enum RunError {
    /// A step's entire selector fallback list failed, an assertion
    /// mismatched, or a mandatory capture failed. Fail-fast: no further
    /// steps run.
    #[error("step {index} failed: {message}")]
    StepExecution { index: usize, message: String },

    /// The preflight login could not be confirmed successful. No steps were
    /// attempted; an alert is published in addition to failing the run.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The browser session could not be created. No steps were attempted.
    #[error("session acquisition failed: {0}")]
    SessionAcquisition(String),

    /// Screenshot capture or artifact storage failed. Fatal only under
    /// `always` capture mode, where it escalates to a step failure.
    #[error("capture failed: {0}")]
    Capture(String),

    /// The run options are unusable (e.g. unparseable base URL).
    #[error("invalid run options: {0}")]
    InvalidOptions(String),
}
