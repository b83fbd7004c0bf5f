//! In-memory fakes for the summary poster seam (testing only)
//!
//! Provides `RecordingPoster` and `FailingPoster` that satisfy the
//! [`SummaryPoster`] contract without any network access.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::post::{PostError, SummaryPoster};
use crate::report::Summary;

// ---------------------------------------------------------------------------
// RecordingPoster
// ---------------------------------------------------------------------------

/// Poster that keeps every summary it receives.
#[derive(Debug, Default)]
pub struct RecordingPoster {
    posted: Mutex<Vec<Summary>>,
}

impl RecordingPoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summaries posted so far, oldest first.
    pub fn posted(&self) -> Vec<Summary> {
        self.posted
            .lock()
            .map(|posted| posted.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SummaryPoster for RecordingPoster {
    async fn post_summary(&self, summary: &Summary) -> Result<(), PostError> {
        let mut posted = self
            .posted
            .lock()
            .map_err(|_| PostError::Transport("recording poster lock poisoned".to_string()))?;
        posted.push(summary.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FailingPoster
// ---------------------------------------------------------------------------

/// Poster that always fails with the configured error.
#[derive(Debug, Clone)]
pub struct FailingPoster {
    error: PostError,
}

impl FailingPoster {
    pub fn new(error: PostError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl SummaryPoster for FailingPoster {
    async fn post_summary(&self, _summary: &Summary) -> Result<(), PostError> {
        Err(self.error.clone())
    }
}
