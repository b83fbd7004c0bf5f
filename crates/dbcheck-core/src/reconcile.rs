//! Reconciliation engine.
//!
//! Full outer join of the expected database against the actual reports on
//! (sketch, board), one [`Verdict`] per key, then the aggregate [`Outcome`].
//! Only a `Regression` (expected `Pass`, actual did not pass) fails CI; every
//! other classification is informational.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CheckError, Result};
use crate::obs;
use crate::record::{Metadata, RecordKey, RecordSet, Status};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How an actual `Skip` is judged when the database expected `Pass`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipPolicy {
    /// A skipped build that should have passed fails CI.
    #[default]
    Regression,
    /// A skipped build is treated as missing data.
    Unknown,
}

/// Tunable points of the classification table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationPolicy {
    pub skip_when_pass_expected: SkipPolicy,
}

impl ClassificationPolicy {
    pub fn with_skip_policy(mut self, policy: SkipPolicy) -> Self {
        self.skip_when_pass_expected = policy;
        self
    }
}

// ---------------------------------------------------------------------------
// Verdicts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Regression,
    ExpectedFailure,
    Confirmed,
    Unknown,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regression => write!(f, "regression"),
            Self::ExpectedFailure => write!(f, "expected_failure"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Reconciliation result for one (sketch, board) key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub key: RecordKey,
    /// `None` when the database has no entry for this key.
    pub expected_status: Option<Status>,
    /// `None` when the current run produced no report for this key.
    pub actual_status: Option<Status>,
    pub classification: Classification,
    /// Size metrics of the actual build, for reporting only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_metadata: Option<Metadata>,
}

impl Verdict {
    pub fn is_regression(&self) -> bool {
        self.classification == Classification::Regression
    }

    /// The database expected this key but the run did not report it.
    pub fn is_missing_actual(&self) -> bool {
        self.expected_status.is_some() && self.actual_status.is_none()
    }

    /// The run reported this key but the database has no expectation.
    pub fn is_unexpected(&self) -> bool {
        self.expected_status.is_none() && self.actual_status.is_some()
    }
}

/// Number of verdicts per classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationCounts {
    pub regression: usize,
    pub expected_failure: usize,
    pub confirmed: usize,
    pub unknown: usize,
}

impl ClassificationCounts {
    fn record(&mut self, classification: Classification) {
        match classification {
            Classification::Regression => self.regression += 1,
            Classification::ExpectedFailure => self.expected_failure += 1,
            Classification::Confirmed => self.confirmed += 1,
            Classification::Unknown => self.unknown += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.regression + self.expected_failure + self.confirmed + self.unknown
    }

    pub fn get(&self, classification: Classification) -> usize {
        match classification {
            Classification::Regression => self.regression,
            Classification::ExpectedFailure => self.expected_failure,
            Classification::Confirmed => self.confirmed,
            Classification::Unknown => self.unknown,
        }
    }
}

/// Aggregate result of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Sorted by sketch id, then board id.
    pub verdicts: Vec<Verdict>,
    pub counts: ClassificationCounts,
    /// True iff at least one verdict is a regression.
    pub ci_should_fail: bool,
}

impl Outcome {
    pub fn regressions(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(|v| v.is_regression())
    }

    pub fn with_classification(
        &self,
        classification: Classification,
    ) -> impl Iterator<Item = &Verdict> {
        self.verdicts
            .iter()
            .filter(move |v| v.classification == classification)
    }

    /// SHA-256 hex digest of the ordered verdicts.
    ///
    /// Identical inputs always produce the same digest.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(&self.verdicts).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Classify one key from its two source statuses.
///
/// A key absent from both sides cannot come out of a join and is reported as
/// `InternalInconsistency`.
pub fn classify(
    policy: &ClassificationPolicy,
    expected: Option<Status>,
    actual: Option<Status>,
) -> Result<Classification> {
    use Classification::*;

    let classification = match (expected, actual) {
        (None, None) => {
            return Err(CheckError::InternalInconsistency(
                "verdict requested for a key present in neither source".to_string(),
            ))
        }
        (Some(_), None) | (None, Some(_)) => Unknown,
        (Some(Status::Pass), Some(Status::Pass)) => Confirmed,
        (Some(Status::Pass), Some(Status::Fail)) => Regression,
        (Some(Status::Pass), Some(Status::Skip)) => match policy.skip_when_pass_expected {
            SkipPolicy::Regression => Regression,
            SkipPolicy::Unknown => Unknown,
        },
        (Some(Status::Fail), Some(Status::Pass)) => Confirmed,
        (Some(Status::Fail), Some(Status::Fail | Status::Skip)) => ExpectedFailure,
        (Some(Status::Skip), Some(Status::Pass | Status::Skip)) => Confirmed,
        (Some(Status::Skip), Some(Status::Fail)) => ExpectedFailure,
    };
    Ok(classification)
}

/// Joins expected and actual record sets into an [`Outcome`].
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    policy: ClassificationPolicy,
}

impl Reconciler {
    pub fn new(policy: ClassificationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ClassificationPolicy {
        &self.policy
    }

    /// Reconcile `expected` (database) against `actual` (reports).
    ///
    /// Never fails on well-formed input; `InternalInconsistency` signals a bug.
    pub fn reconcile(&self, expected: &RecordSet, actual: &RecordSet) -> Result<Outcome> {
        let keys: BTreeSet<&RecordKey> = expected.keys().chain(actual.keys()).collect();

        let mut verdicts = Vec::with_capacity(keys.len());
        let mut counts = ClassificationCounts::default();

        for key in &keys {
            let expected_record = expected.get(key);
            let actual_record = actual.get(key);
            let expected_status = expected_record.map(|r| r.status());
            let actual_status = actual_record.map(|r| r.status());

            let classification = classify(&self.policy, expected_status, actual_status)?;
            counts.record(classification);

            if classification == Classification::Regression {
                obs::emit_regression(
                    &key.sketch_id,
                    &key.board_id,
                    actual_status.map_or("missing", |s| s.as_str()),
                );
            }

            verdicts.push(Verdict {
                key: (*key).clone(),
                expected_status,
                actual_status,
                classification,
                actual_metadata: actual_record
                    .map(|r| r.metadata().clone())
                    .filter(|m| !m.is_empty()),
            });
        }

        let outcome = Outcome {
            ci_should_fail: counts.regression > 0,
            verdicts,
            counts,
        };
        check_invariants(&outcome, keys.len())?;

        obs::emit_reconcile_completed(
            outcome.verdicts.len(),
            outcome.counts.regression,
            outcome.counts.unknown,
            outcome.verdicts.iter().filter(|v| v.is_missing_actual()).count(),
            outcome.verdicts.iter().filter(|v| v.is_unexpected()).count(),
        );
        Ok(outcome)
    }
}

fn check_invariants(outcome: &Outcome, key_count: usize) -> Result<()> {
    if outcome.verdicts.len() != key_count {
        return Err(CheckError::InternalInconsistency(format!(
            "{} verdicts for {} keys",
            outcome.verdicts.len(),
            key_count
        )));
    }
    if outcome.counts.total() != outcome.verdicts.len() {
        return Err(CheckError::InternalInconsistency(format!(
            "classification counts sum to {} but there are {} verdicts",
            outcome.counts.total(),
            outcome.verdicts.len()
        )));
    }
    if let Some(pair) = outcome.verdicts.windows(2).find(|w| w[0].key >= w[1].key) {
        return Err(CheckError::InternalInconsistency(format!(
            "verdicts out of order at {} / {}",
            pair[0].key, pair[1].key
        )));
    }
    Ok(())
}
