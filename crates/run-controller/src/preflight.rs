//! Authentication preflight: one best-effort heuristic login attempt before
//! stepping begins on a fresh run. Never retried, never re-run on resume.

use std::time::Duration;

use tracing::{debug, info};
use url::Url;

use webrunner_core_types::AuthCredentials;
use webrunner_step_interpreter::{first_visible, BrowserSession};

use crate::errors::RunError;

const DEFAULT_LOGIN_PATH: &str = "/login";

/// Common selectors probed for the login form, in preference order. The
/// first visible match wins, per field.
const USERNAME_SELECTORS: &[&str] = &[
    "input[type=email]",
    "input[name=username]",
    "input[name=email]",
    "#username",
    "#email",
    "#user",
    "input[type=text]",
];

const PASSWORD_SELECTORS: &[&str] = &[
    "input[type=password]",
    "input[name=password]",
    "#password",
    "#pass",
];

const SUBMIT_SELECTORS: &[&str] = &[
    "button[type=submit]",
    "input[type=submit]",
    "button.login",
    "#login-button",
    "button",
];

/// Error indicators checked after submit; any visible match means the login
/// was rejected.
const ERROR_SELECTORS: &[&str] = &[
    ".error",
    ".alert-danger",
    ".login-error",
    "[role=alert]",
];

/// Failure-indicating page text, matched case-insensitively when the browser
/// is still on the login URL after submit.
const FAILURE_TEXT: &[&str] = &["invalid", "incorrect", "wrong password", "try again", "failed"];

/// How long to let the page settle after submitting credentials.
const SETTLE_AFTER_SUBMIT: Duration = Duration::from_millis(500);

/// Perform exactly one login attempt. Success is judged heuristically by the
/// absence of error indicators after submit.
pub(crate) async fn run_preflight(
    session: &dyn BrowserSession,
    base_url: &Url,
    credentials: &AuthCredentials,
) -> Result<(), RunError> {
    let login_url = resolve_login_url(base_url, credentials)?;
    info!(url = %login_url, "running authentication preflight");

    session
        .goto(login_url.as_str())
        .await
        .map_err(|err| RunError::Authentication(format!("login page unreachable: {err}")))?;

    let username_field = probe(session, USERNAME_SELECTORS)
        .await
        .ok_or_else(|| RunError::Authentication("no username field found".to_string()))?;
    session
        .fill(&username_field, &credentials.username)
        .await
        .map_err(|err| RunError::Authentication(err.to_string()))?;

    let password_field = probe(session, PASSWORD_SELECTORS)
        .await
        .ok_or_else(|| RunError::Authentication("no password field found".to_string()))?;
    session
        .fill(&password_field, &credentials.password)
        .await
        .map_err(|err| RunError::Authentication(err.to_string()))?;

    let submit = probe(session, SUBMIT_SELECTORS)
        .await
        .ok_or_else(|| RunError::Authentication("no submit control found".to_string()))?;
    session
        .click(&submit)
        .await
        .map_err(|err| RunError::Authentication(err.to_string()))?;

    tokio::time::sleep(SETTLE_AFTER_SUBMIT).await;
    confirm(session, &login_url).await
}

async fn confirm(session: &dyn BrowserSession, login_url: &Url) -> Result<(), RunError> {
    for selector in ERROR_SELECTORS {
        if session.is_visible(selector).await.unwrap_or(false) {
            return Err(RunError::Authentication(format!(
                "error indicator '{selector}' visible after login submit"
            )));
        }
    }

    let current = session
        .current_url()
        .await
        .map_err(|err| RunError::Authentication(err.to_string()))?;
    if same_page(&current, login_url.as_str()) {
        let text = session.page_text().await.unwrap_or_default().to_lowercase();
        if let Some(needle) = FAILURE_TEXT.iter().find(|needle| text.contains(**needle)) {
            return Err(RunError::Authentication(format!(
                "still on login page with failure text '{needle}'"
            )));
        }
        debug!("still on login URL but no failure indicators; accepting");
    }

    info!("authentication preflight confirmed");
    Ok(())
}

fn resolve_login_url(base_url: &Url, credentials: &AuthCredentials) -> Result<Url, RunError> {
    match credentials.login_url.as_deref() {
        Some(explicit) => Url::parse(explicit).or_else(|_| base_url.join(explicit)).map_err(|err| {
            RunError::Authentication(format!("unusable login url '{explicit}': {err}"))
        }),
        None => base_url.join(DEFAULT_LOGIN_PATH).map_err(|err| {
            RunError::Authentication(format!("cannot derive default login url: {err}"))
        }),
    }
}

async fn probe(session: &dyn BrowserSession, selectors: &[&str]) -> Option<String> {
    let candidates: Vec<String> = selectors.iter().map(|s| s.to_string()).collect();
    first_visible(session, &candidates).await
}

fn same_page(current: &str, login: &str) -> bool {
    current.trim_end_matches('/') == login.trim_end_matches('/')
}
