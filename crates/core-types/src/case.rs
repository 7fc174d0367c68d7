//! Immutable test-case definition types.
//!
//! A [`TestCase`] is owned by the external test-definition store and is
//! read-only from the controller's point of view.

use serde::{Deserialize, Serialize};

use crate::CaseId;

/// Ordered list of declarative browser actions to execute.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: CaseId,
    pub name: String,
    pub steps: Vec<Step>,
}

impl TestCase {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id: CaseId::new(),
            name: name.into(),
            steps,
        }
    }
}

/// One declarative browser action within a test case.
///
/// `selector` may hold a comma-separated fallback list; candidates are tried
/// in order until one resolves to a visible element. `expected_result` is
/// documentation only and is never enforced programmatically except for
/// assert/verify steps, which use `value` instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_result: Option<String>,
}

impl Step {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            selector: None,
            value: None,
            expected_result: None,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_expected_result(mut self, expected: impl Into<String>) -> Self {
        self.expected_result = Some(expected.into());
        self
    }

    /// Parsed action kind for this step.
    pub fn kind(&self) -> StepAction {
        StepAction::parse(&self.action)
    }
}

/// Recognized step action kinds.
///
/// Unrecognized actions parse to [`StepAction::Other`]; the interpreter
/// treats them as logged no-op successes so new step kinds added upstream do
/// not hard-fail older runner deployments.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepAction {
    Navigate,
    Click,
    Fill,
    Select,
    Wait,
    WaitFor,
    Assert,
    Press,
    Screenshot,
    Other(String),
}

impl StepAction {
    /// Parse a raw action string, accepting the aliases used by existing
    /// test-case authoring tools.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "navigate" | "goto" => StepAction::Navigate,
            "click" => StepAction::Click,
            "fill" | "type" => StepAction::Fill,
            "select" => StepAction::Select,
            "wait" => StepAction::Wait,
            "waitfor" | "wait_for" | "wait_for_selector" => StepAction::WaitFor,
            "assert" | "verify" => StepAction::Assert,
            "press" => StepAction::Press,
            "screenshot" => StepAction::Screenshot,
            // Unrecognized actions keep their original casing so logs and
            // step results show what the author actually wrote.
            _ => StepAction::Other(raw.trim().to_string()),
        }
    }

    /// Canonical name used in logs and step results.
    pub fn name(&self) -> &str {
        match self {
            StepAction::Navigate => "navigate",
            StepAction::Click => "click",
            StepAction::Fill => "fill",
            StepAction::Select => "select",
            StepAction::Wait => "wait",
            StepAction::WaitFor => "waitFor",
            StepAction::Assert => "assert",
            StepAction::Press => "press",
            StepAction::Screenshot => "screenshot",
            StepAction::Other(name) => name,
        }
    }
}
