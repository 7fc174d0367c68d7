//! Step interpreter: executes one declarative step against a live browser
//! session and reports a [`webrunner_core_types::StepResult`].
//!
//! The browser itself is behind the [`BrowserSession`] seam; this crate owns
//! per-action semantics and the selector-fallback logic, not the wire
//! protocol driving the browser.

mod errors;
mod interpreter;
mod selector;
mod session;

pub use errors::StepError;
pub use interpreter::StepInterpreter;
pub use selector::{fallback_list, first_visible, wait_for_first_visible};
pub use session::{BrowserSession, SessionError, SessionFactory};
