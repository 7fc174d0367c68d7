//! Contract the controller requires from a browser-driving collaborator.
//!
//! How navigate/click/fill are implemented (CDP, WebDriver, an embedded
//! engine) is out of scope here; the interpreter and controller only rely on
//! the seam below. An in-flight call always runs to completion or its own
//! internal timeout — there is no mid-action cancellation.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use webrunner_core_types::{Cookie, Viewport};

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    /// The browser/session could not be created at all.
    #[error("session acquisition failed: {0}")]
    Acquisition(String),

    /// Transport or protocol failure while driving the browser.
    #[error("browser i/o failure: {0}")]
    Io(String),

    /// Screenshot capture failed.
    #[error("capture failed: {0}")]
    Capture(String),
}

/// One live browser session, exclusively owned by its run's execution unit
/// for the run's lifetime and released on every exit path.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Load an absolute URL and wait for the page to settle.
    async fn goto(&self, url: &str) -> Result<(), SessionError>;

    async fn click(&self, selector: &str) -> Result<(), SessionError>;

    /// Clear the element and type `value` into it.
    async fn fill(&self, selector: &str, value: &str) -> Result<(), SessionError>;

    /// Select the option with the given value in a select element.
    async fn select_option(&self, selector: &str, value: &str) -> Result<(), SessionError>;

    /// Dispatch a keyboard key by name (e.g. "Enter").
    async fn press_key(&self, key: &str) -> Result<(), SessionError>;

    /// Whether `selector` currently resolves to a visible element.
    async fn is_visible(&self, selector: &str) -> Result<bool, SessionError>;

    /// Visible text of the first element matching `selector`.
    async fn text_content(&self, selector: &str) -> Result<String, SessionError>;

    /// Full visible text of the current page.
    async fn page_text(&self) -> Result<String, SessionError>;

    async fn current_url(&self) -> Result<String, SessionError>;

    /// Encoded screenshot of the current page.
    async fn screenshot(&self) -> Result<Vec<u8>, SessionError>;

    async fn cookies(&self) -> Result<Vec<Cookie>, SessionError>;

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), SessionError>;

    /// Release the session. Idempotent.
    async fn close(&self) -> Result<(), SessionError>;
}

/// Yields browser sessions for run execution units.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn acquire(
        &self,
        viewport: Option<Viewport>,
    ) -> Result<Arc<dyn BrowserSession>, SessionError>;
}
