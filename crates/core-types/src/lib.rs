//! Shared data model for the webrunner test-execution kernel.
//!
//! Everything that crosses a crate boundary lives here: typed identifiers,
//! the immutable test-case definition, the mutable run record, and the
//! control/status messages carried on the bus.

use std::fmt;

use uuid::Uuid;

mod case;
mod messages;
mod run;

pub use case::{Step, StepAction, TestCase};
pub use messages::{
    AuthFailureAlert, ControlAction, ControlMessage, RunProgress, ScreenshotRef, StatusMessage,
};
pub use run::{
    AuthCredentials, Cookie, Run, RunOptions, RunStatus, ScreenshotMode, SessionContext,
    StepResult, Viewport,
};

/// Identifier of one execution attempt of a test case.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an immutable test-case definition.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CaseId(pub String);

impl CaseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for CaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
