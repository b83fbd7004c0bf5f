//! dbcheck-github: pull request comments for database check summaries
//!
//! Implements the [`SummaryPoster`](dbcheck_core::SummaryPoster) seam against
//! the GitHub REST API, plus workflow event parsing to find the pull request.

pub mod client;
pub mod error;
pub mod event;

pub use client::{
    CreatedComment, GithubClient, GithubConfig, DEFAULT_API_URL, DEFAULT_MAX_RETRIES,
};
pub use error::GithubError;
pub use event::{pull_request_from_event_file, pull_request_number};

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, GithubError>;
