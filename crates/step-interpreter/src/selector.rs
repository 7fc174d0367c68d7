//! Selector fallback lists: an ordered set of alternative selectors tried in
//! sequence until one resolves to a visible element.

use std::time::Duration;

use tracing::debug;

use crate::session::{BrowserSession, SessionError};

/// Poll interval for bounded visibility waits.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Split a raw selector field into its ordered fallback candidates.
pub fn fallback_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(str::to_string)
        .collect()
}

/// First candidate that currently resolves to a visible element.
///
/// Candidates that error (malformed selector, probe failure) are skipped
/// like non-matching ones; only the overall absence of a match is reported,
/// by returning `None`.
pub async fn first_visible(
    session: &dyn BrowserSession,
    candidates: &[String],
) -> Option<String> {
    for candidate in candidates {
        match session.is_visible(candidate).await {
            Ok(true) => return Some(candidate.clone()),
            Ok(false) => continue,
            Err(err) => {
                debug!(selector = %candidate, %err, "selector probe failed, trying next candidate");
                continue;
            }
        }
    }
    None
}

/// Poll until any candidate becomes visible, up to `timeout`.
pub async fn wait_for_first_visible(
    session: &dyn BrowserSession,
    candidates: &[String],
    timeout: Duration,
) -> Result<Option<String>, SessionError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(matched) = first_visible(session, candidates).await {
            return Ok(Some(matched));
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(POLL_INTERVAL.min(timeout)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_trims_candidates() {
        assert_eq!(
            fallback_list(" #user , input[name=user],, .user-field "),
            vec!["#user", "input[name=user]", ".user-field"]
        );
    }

    #[test]
    fn empty_input_yields_no_candidates() {
        assert!(fallback_list("").is_empty());
        assert!(fallback_list(" , , ").is_empty());
    }
}
