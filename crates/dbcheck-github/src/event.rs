//! Workflow event payload parsing.
//!
//! GitHub Actions writes the triggering event to the file named by
//! `GITHUB_EVENT_PATH`. Pull request events carry `pull_request.number`;
//! `issue_comment` and similar events carry a top-level `number`.

use std::path::Path;

use serde::Deserialize;

use crate::error::GithubError;
use crate::Result;

#[derive(Debug, Deserialize)]
struct EventPayload {
    pull_request: Option<PullRequestRef>,
    number: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PullRequestRef {
    number: u64,
}

/// Extract the pull request number from an event payload, if any.
pub fn pull_request_number(payload: &str) -> Result<Option<u64>> {
    let event: EventPayload =
        serde_json::from_str(payload).map_err(|e| GithubError::Event(e.to_string()))?;
    Ok(event.pull_request.map(|pr| pr.number).or(event.number))
}

/// Read the event payload file and extract the pull request number.
pub fn pull_request_from_event_file(path: &Path) -> Result<Option<u64>> {
    let payload = std::fs::read_to_string(path)
        .map_err(|e| GithubError::Event(format!("{}: {e}", path.display())))?;
    pull_request_number(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_request_event() {
        let payload = r#"{ "action": "synchronize", "number": 7, "pull_request": { "number": 42 } }"#;
        assert_eq!(pull_request_number(payload).unwrap(), Some(42));
    }

    #[test]
    fn test_top_level_number_fallback() {
        let payload = r#"{ "action": "created", "number": 7 }"#;
        assert_eq!(pull_request_number(payload).unwrap(), Some(7));
    }

    #[test]
    fn test_push_event_has_no_pull_request() {
        let payload = r#"{ "ref": "refs/heads/main", "after": "d8fd302" }"#;
        assert_eq!(pull_request_number(payload).unwrap(), None);
    }

    #[test]
    fn test_invalid_payload() {
        assert!(matches!(
            pull_request_number("not json"),
            Err(GithubError::Event(_))
        ));
    }

    #[test]
    fn test_event_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, r#"{ "pull_request": { "number": 3 } }"#).unwrap();
        assert_eq!(pull_request_from_event_file(&path).unwrap(), Some(3));
    }
}
