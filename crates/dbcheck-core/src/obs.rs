//! Structured observability hooks for the database check lifecycle.
//!
//! This module provides:
//! - An invocation-scoped tracing span via the `CheckSpan` RAII guard
//! - Emission functions for key lifecycle events: load, reconcile, gate, comment
//!
//! Every event carries a stable `event` field so log pipelines can filter on it.

use std::path::Path;

use tracing::{debug, info, warn};

/// RAII guard that enters an invocation-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = CheckSpan::enter("octocat/Hello-World");
/// // All tracing calls are now associated with repository = "octocat/Hello-World"
/// ```
pub struct CheckSpan {
    _span: tracing::span::EnteredSpan,
}

impl CheckSpan {
    /// Create and enter a span tagged with the repository being checked.
    pub fn enter(repository: &str) -> Self {
        let span = tracing::info_span!("dbcheck.run", repository = %repository);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a source started loading.
pub fn emit_load_started(source: &str, path: &Path) {
    debug!(event = "load.started", source = %source, path = %path.display());
}

/// Emit event: a source finished loading.
pub fn emit_load_completed(source: &str, path: &Path, files: usize, records: usize) {
    info!(
        event = "load.completed",
        source = %source,
        path = %path.display(),
        files = files,
        records = records,
    );
}

/// Emit event: reconciliation produced its verdicts.
///
/// `missing_actual` and `unexpected` break down the keys present on one side
/// only.
pub fn emit_reconcile_completed(
    verdicts: usize,
    regressions: usize,
    unknown: usize,
    missing_actual: usize,
    unexpected: usize,
) {
    info!(
        event = "reconcile.completed",
        verdicts = verdicts,
        regressions = regressions,
        unknown = unknown,
        missing_actual = missing_actual,
        unexpected = unexpected,
    );
}

/// Emit event: a single regression was found (warning level).
pub fn emit_regression(sketch_id: &str, board_id: &str, actual: &str) {
    warn!(
        event = "verdict.regression",
        sketch = %sketch_id,
        board = %board_id,
        actual = %actual,
    );
}

/// Emit event: the aggregate gate decision.
pub fn emit_gate_evaluated(ci_should_fail: bool, digest: &str) {
    info!(event = "gate.evaluated", ci_should_fail = ci_should_fail, digest = %digest);
}

/// Emit event: the summary was posted by the comment collaborator.
pub fn emit_comment_posted() {
    info!(event = "comment.posted");
}

/// Emit event: no comment collaborator is configured.
pub fn emit_comment_skipped(reason: &str) {
    debug!(event = "comment.skipped", reason = %reason);
}

/// Emit event: posting the summary failed (warning level, never fatal).
pub fn emit_comment_post_failed(error: &dyn std::fmt::Display) {
    warn!(event = "comment.post_failed", error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_span_create() {
        let _span = CheckSpan::enter("octocat/Hello-World");
    }

    #[test]
    fn test_emitters_do_not_panic_without_subscriber() {
        emit_load_started("reports", Path::new("sketches-reports"));
        emit_load_completed("reports", Path::new("sketches-reports"), 2, 5);
        emit_reconcile_completed(5, 1, 2, 1, 1);
        emit_regression("Blink", "arduino:avr:uno", "fail");
        emit_gate_evaluated(true, "abc");
        emit_comment_posted();
        emit_comment_skipped("no poster");
        emit_comment_post_failed(&"boom");
    }
}
