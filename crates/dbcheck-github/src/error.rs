//! Error types for dbcheck-github

use dbcheck_core::PostError;
use thiserror::Error;

/// Errors that can occur while talking to the GitHub REST API
#[derive(Error, Debug)]
pub enum GithubError {
    /// Repository is not in `owner/name` form
    #[error("invalid repository name: {0:?}")]
    InvalidRepository(String),

    /// No pull request number could be determined
    #[error("no pull request associated with this run")]
    NoPullRequest,

    /// No token configured
    #[error("GitHub token is not configured")]
    MissingToken,

    /// Core API quota is exhausted
    #[error("GitHub API request quota has been reached")]
    RateLimited,

    /// Non-retryable HTTP status
    #[error("GitHub API returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Retries exhausted on a retryable failure
    #[error("GitHub API request failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Event payload could not be read
    #[error("cannot read event payload: {0}")]
    Event(String),
}

impl From<reqwest::Error> for GithubError {
    fn from(err: reqwest::Error) -> Self {
        GithubError::Http(err.to_string())
    }
}

impl From<GithubError> for PostError {
    fn from(err: GithubError) -> Self {
        match err {
            GithubError::NoPullRequest | GithubError::MissingToken => {
                PostError::MissingContext(err.to_string())
            }
            GithubError::InvalidRepository(_) | GithubError::Event(_) => {
                PostError::MissingContext(err.to_string())
            }
            GithubError::RateLimited => PostError::RateLimited,
            GithubError::Status { status, message } => PostError::Rejected { status, message },
            GithubError::RetriesExhausted { .. } | GithubError::Http(_) => {
                PostError::Transport(err.to_string())
            }
        }
    }
}
