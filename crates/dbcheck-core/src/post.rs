//! Capability seam for handing the summary to an outside collaborator.
//!
//! The reconciliation core never talks to the network; a poster is injected
//! into the [`Reporter`](crate::Reporter) and its failure is only logged.

use async_trait::async_trait;

use crate::report::Summary;

/// Errors a summary poster can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PostError {
    #[error("missing posting context: {0}")]
    MissingContext(String),

    #[error("API request quota exhausted")]
    RateLimited,

    #[error("request rejected with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

/// Posts a rendered summary somewhere visible, e.g. a pull request thread.
#[async_trait]
pub trait SummaryPoster: Send + Sync {
    async fn post_summary(&self, summary: &Summary) -> Result<(), PostError>;
}
