//! Summary reporting.
//!
//! Turns an [`Outcome`] into:
//! - a plain-text summary for the invocation log
//! - a Markdown summary for pull request comments
//! - `summary.json`, a machine-readable artifact for downstream tooling
//!
//! The summary carries no timestamps, so identical inputs render
//! byte-identical output.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::obs;
use crate::post::{PostError, SummaryPoster};
use crate::reconcile::{Classification, ClassificationCounts, Outcome, Verdict};
use crate::record::{Metadata, Status};

// ── summary.json schema ───────────────────────────────────────────────────

/// One (sketch, board) line in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub sketch_id: String,
    pub board_id: String,
    pub expected: Option<Status>,
    pub actual: Option<Status>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub sizes: Metadata,
}

impl SummaryEntry {
    fn from_verdict(verdict: &Verdict) -> Self {
        Self {
            sketch_id: verdict.key.sketch_id.clone(),
            board_id: verdict.key.board_id.clone(),
            expected: verdict.expected_status,
            actual: verdict.actual_status,
            sizes: verdict.actual_metadata.clone().unwrap_or_default(),
        }
    }

    fn describe(&self) -> String {
        match (self.expected, self.actual) {
            (Some(expected), None) => format!("missing from reports (expected {expected})"),
            (None, Some(actual)) => format!("no database entry (got {actual})"),
            (Some(expected), Some(actual)) => format!("expected {expected}, got {actual}"),
            (None, None) => "no data".to_string(),
        }
    }
}

/// Human- and machine-readable digest of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub ci_should_fail: bool,
    pub counts: ClassificationCounts,
    /// Ordered by sketch, then board.
    pub regressions: Vec<SummaryEntry>,
    pub expected_failures: Vec<SummaryEntry>,
    /// Keys missing from one side, or skipped under the `unknown` skip policy.
    pub unknown: Vec<SummaryEntry>,
    pub verdicts_digest: String,
}

impl Summary {
    pub fn from_outcome(outcome: &Outcome) -> Self {
        let entries = |classification| {
            outcome
                .with_classification(classification)
                .map(SummaryEntry::from_verdict)
                .collect::<Vec<_>>()
        };

        Self {
            ci_should_fail: outcome.ci_should_fail,
            counts: outcome.counts,
            regressions: entries(Classification::Regression),
            expected_failures: entries(Classification::ExpectedFailure),
            unknown: entries(Classification::Unknown),
            verdicts_digest: outcome.digest(),
        }
    }

    /// Render the summary for the invocation log.
    pub fn render_text(&self) -> String {
        let mut out = String::from("Compilation results database check\n");
        out.push_str(&format!(
            "  regressions:       {}\n  expected failures: {}\n  confirmed:         {}\n  unknown:           {}\n",
            self.counts.regression,
            self.counts.expected_failure,
            self.counts.confirmed,
            self.counts.unknown
        ));

        if !self.regressions.is_empty() {
            out.push_str("\nRegressions (expected to compile):\n");
            for entry in &self.regressions {
                out.push_str(&format!(
                    "  - {} @ {}: {}\n",
                    entry.sketch_id,
                    entry.board_id,
                    entry.describe()
                ));
            }
        }

        if !self.expected_failures.is_empty() {
            out.push_str("\nExpected failures:\n");
            for entry in &self.expected_failures {
                out.push_str(&format!("  - {} @ {}\n", entry.sketch_id, entry.board_id));
            }
        }

        if !self.unknown.is_empty() {
            out.push_str("\nUnknown:\n");
            for entry in &self.unknown {
                out.push_str(&format!(
                    "  - {} @ {}: {}\n",
                    entry.sketch_id,
                    entry.board_id,
                    entry.describe()
                ));
            }
        }

        out.push_str(&format!("\nDigest: {}\n", self.verdicts_digest));
        if self.ci_should_fail {
            out.push_str(&format!(
                "Result: FAILED ({} regression(s))\n",
                self.counts.regression
            ));
        } else {
            out.push_str("Result: PASSED\n");
        }
        out
    }

    /// Render the summary as a pull request comment.
    pub fn render_markdown(&self) -> String {
        let mut md = String::from("## Compilation results database check\n\n");

        if self.ci_should_fail {
            md.push_str(&format!(
                ":x: **{} regression(s)**: sketches the database expects to compile failed to build.\n\n",
                self.counts.regression
            ));
            md.push_str("| Sketch | Board | Expected | Actual |\n|---|---|---|---|\n");
            for entry in &self.regressions {
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    code_span(&entry.sketch_id),
                    code_span(&entry.board_id),
                    status_cell(entry.expected),
                    status_cell(entry.actual)
                ));
            }
            md.push('\n');
        } else {
            md.push_str(":white_check_mark: No regressions against the database.\n\n");
        }

        md.push_str("| Classification | Count |\n|---|---|\n");
        for (label, count) in [
            ("Regression", self.counts.regression),
            ("Expected failure", self.counts.expected_failure),
            ("Confirmed", self.counts.confirmed),
            ("Unknown", self.counts.unknown),
        ] {
            md.push_str(&format!("| {label} | {count} |\n"));
        }

        if !self.unknown.is_empty() {
            md.push_str("\n<details><summary>Unknown</summary>\n\n");
            for entry in &self.unknown {
                md.push_str(&format!(
                    "- {} @ {}: {}\n",
                    code_span(&entry.sketch_id),
                    code_span(&entry.board_id),
                    entry.describe()
                ));
            }
            md.push_str("\n</details>\n");
        }
        md
    }
}

/// Render an id as inline code that is safe inside a Markdown table cell.
///
/// Pipes are escaped; ids containing backticks get a longer fence.
fn code_span(id: &str) -> String {
    let id = id.replace('|', "\\|");
    let longest_run = id
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    if longest_run == 0 {
        format!("`{id}`")
    } else {
        let fence = "`".repeat(longest_run + 1);
        format!("{fence} {id} {fence}")
    }
}

fn status_cell(status: Option<Status>) -> &'static str {
    status.map_or("missing", |s| s.as_str())
}

/// Write summary.json in pretty JSON format.
pub fn write_summary_json(path: &Path, summary: &Summary) -> Result<()> {
    let content = serde_json::to_string_pretty(summary).context("serialize summary")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

// ── Reporter ──────────────────────────────────────────────────────────────

/// What happened to the optional pull request comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentState {
    Posted,
    Skipped,
    Failed(String),
}

/// Final status of a report. `ci_should_fail` drives the exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportStatus {
    pub ci_should_fail: bool,
    pub summary: Summary,
    pub comment: CommentState,
}

/// Prints the summary and hands it to an optional poster.
#[derive(Default, Clone)]
pub struct Reporter {
    poster: Option<Arc<dyn SummaryPoster>>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poster(poster: Arc<dyn SummaryPoster>) -> Self {
        Self {
            poster: Some(poster),
        }
    }

    /// Write the text summary to `out`, then post it best-effort.
    ///
    /// A failed post is logged and reflected in `comment`; it never changes
    /// `ci_should_fail`.
    pub async fn report<W: Write>(
        &self,
        outcome: &Outcome,
        out: &mut W,
    ) -> std::io::Result<ReportStatus> {
        let summary = Summary::from_outcome(outcome);
        out.write_all(summary.render_text().as_bytes())?;
        out.flush()?;

        obs::emit_gate_evaluated(summary.ci_should_fail, &summary.verdicts_digest);

        let comment = match &self.poster {
            None => {
                obs::emit_comment_skipped("no summary poster configured");
                CommentState::Skipped
            }
            Some(poster) => match poster.post_summary(&summary).await {
                Ok(()) => {
                    obs::emit_comment_posted();
                    CommentState::Posted
                }
                Err(PostError::MissingContext(reason)) => {
                    obs::emit_comment_skipped(&reason);
                    CommentState::Skipped
                }
                Err(err) => {
                    obs::emit_comment_post_failed(&err);
                    CommentState::Failed(err.to_string())
                }
            },
        };

        Ok(ReportStatus {
            ci_should_fail: summary.ci_should_fail,
            summary,
            comment,
        })
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("poster", &self.poster.is_some())
            .finish()
    }
}
