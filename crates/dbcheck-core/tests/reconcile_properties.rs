use std::collections::{BTreeMap, BTreeSet};

use dbcheck_core::{
    Classification, ClassificationPolicy, Metadata, Outcome, Reconciler, Record, RecordKey,
    RecordSet, SkipPolicy, Status,
};
use proptest::prelude::*;

fn set(entries: &[(&str, &str, Status)]) -> RecordSet {
    RecordSet::from_records(
        entries
            .iter()
            .map(|(sketch, board, status)| {
                Record::new(*sketch, *board, *status, Metadata::new()).expect("valid record")
            }),
    )
    .expect("unique keys")
}

fn reconcile(expected: &RecordSet, actual: &RecordSet) -> Outcome {
    Reconciler::default()
        .reconcile(expected, actual)
        .expect("reconcile")
}

// ── Worked examples ───────────────────────────────────────────────────────

#[test]
fn pass_expected_fail_actual_is_regression() {
    let outcome = reconcile(
        &set(&[("A", "uno", Status::Pass)]),
        &set(&[("A", "uno", Status::Fail)]),
    );

    assert_eq!(outcome.verdicts.len(), 1);
    assert_eq!(outcome.verdicts[0].classification, Classification::Regression);
    assert_eq!(outcome.counts.regression, 1);
    assert!(outcome.ci_should_fail);
}

#[test]
fn padded_ids_join_with_unpadded_ids() {
    let outcome = reconcile(
        &set(&[(" examples/Blink ", "arduino:avr:uno", Status::Pass)]),
        &set(&[("examples/Blink", " arduino:avr:uno", Status::Fail)]),
    );

    assert_eq!(outcome.verdicts.len(), 1);
    assert_eq!(outcome.verdicts[0].classification, Classification::Regression);
    assert!(outcome.ci_should_fail);
}

#[test]
fn fail_expected_fail_actual_is_expected_failure() {
    let outcome = reconcile(
        &set(&[("A", "uno", Status::Fail)]),
        &set(&[("A", "uno", Status::Fail)]),
    );

    assert_eq!(outcome.verdicts.len(), 1);
    assert_eq!(
        outcome.verdicts[0].classification,
        Classification::ExpectedFailure
    );
    assert!(!outcome.ci_should_fail);
}

#[test]
fn missing_actual_is_unknown_and_does_not_fail() {
    let outcome = reconcile(&set(&[("A", "uno", Status::Pass)]), &RecordSet::new());

    assert_eq!(outcome.verdicts.len(), 1);
    let verdict = &outcome.verdicts[0];
    assert_eq!(verdict.classification, Classification::Unknown);
    assert_eq!(verdict.expected_status, Some(Status::Pass));
    assert_eq!(verdict.actual_status, None);
    assert!(!outcome.ci_should_fail);
}

#[test]
fn one_confirmed_one_regression() {
    let outcome = reconcile(
        &set(&[("A", "uno", Status::Pass), ("B", "uno", Status::Pass)]),
        &set(&[("A", "uno", Status::Pass), ("B", "uno", Status::Fail)]),
    );

    let classes: Vec<Classification> = outcome.verdicts.iter().map(|v| v.classification).collect();
    assert_eq!(
        classes,
        vec![Classification::Confirmed, Classification::Regression]
    );
    assert_eq!(outcome.counts.confirmed, 1);
    assert_eq!(outcome.counts.regression, 1);
    assert!(outcome.ci_should_fail);
}

// ── Policy ────────────────────────────────────────────────────────────────

#[test]
fn many_informational_verdicts_without_regression_pass() {
    let expected = set(&[
        ("A", "uno", Status::Fail),
        ("B", "uno", Status::Fail),
        ("C", "uno", Status::Pass),
        ("D", "mega", Status::Pass),
    ]);
    let actual = set(&[
        ("A", "uno", Status::Fail),
        ("B", "uno", Status::Fail),
        ("E", "uno", Status::Fail),
        ("F", "zero", Status::Fail),
    ]);

    let outcome = reconcile(&expected, &actual);
    assert_eq!(outcome.counts.expected_failure, 2);
    assert_eq!(outcome.counts.unknown, 4);
    assert_eq!(outcome.counts.regression, 0);
    assert!(!outcome.ci_should_fail);
}

#[test]
fn skip_policy_is_configurable() {
    let expected = set(&[("A", "uno", Status::Pass)]);
    let actual = set(&[("A", "uno", Status::Skip)]);

    let strict = Reconciler::default().reconcile(&expected, &actual).unwrap();
    assert!(strict.ci_should_fail);

    let lenient = Reconciler::new(
        ClassificationPolicy::default().with_skip_policy(SkipPolicy::Unknown),
    )
    .reconcile(&expected, &actual)
    .unwrap();
    assert!(!lenient.ci_should_fail);
    assert_eq!(lenient.verdicts[0].classification, Classification::Unknown);
}

#[test]
fn verdicts_sorted_by_sketch_then_board() {
    let expected = set(&[
        ("Fade", "uno", Status::Pass),
        ("Blink", "zero", Status::Pass),
    ]);
    let actual = set(&[
        ("Blink", "mega", Status::Pass),
        ("Blink", "zero", Status::Pass),
    ]);

    let outcome = reconcile(&expected, &actual);
    let keys: Vec<RecordKey> = outcome.verdicts.iter().map(|v| v.key.clone()).collect();
    assert_eq!(
        keys,
        vec![
            RecordKey::new("Blink", "mega"),
            RecordKey::new("Blink", "zero"),
            RecordKey::new("Fade", "uno"),
        ]
    );
}

// ── Properties ────────────────────────────────────────────────────────────

fn status_strategy() -> impl Strategy<Value = Status> {
    prop_oneof![Just(Status::Pass), Just(Status::Fail), Just(Status::Skip)]
}

/// Small key space so the two sides overlap often.
fn record_set_strategy() -> impl Strategy<Value = BTreeMap<(u8, u8), Status>> {
    prop::collection::btree_map((0u8..6, 0u8..3), status_strategy(), 0..12)
}

fn to_set(entries: &BTreeMap<(u8, u8), Status>) -> RecordSet {
    RecordSet::from_records(entries.iter().map(|((sketch, board), status)| {
        Record::new(
            format!("sketch-{sketch}"),
            format!("board-{board}"),
            *status,
            Metadata::new(),
        )
        .expect("valid record")
    }))
    .expect("unique keys")
}

proptest! {
    #[test]
    fn reconciliation_is_deterministic(
        expected in record_set_strategy(),
        actual in record_set_strategy(),
    ) {
        let expected = to_set(&expected);
        let actual = to_set(&actual);

        let first = reconcile(&expected, &actual);
        let second = reconcile(&expected, &actual);

        prop_assert_eq!(&first.verdicts, &second.verdicts);
        prop_assert_eq!(first.ci_should_fail, second.ci_should_fail);
        prop_assert_eq!(first.digest(), second.digest());
    }

    #[test]
    fn gate_fails_iff_regression_present(
        expected in record_set_strategy(),
        actual in record_set_strategy(),
    ) {
        let outcome = reconcile(&to_set(&expected), &to_set(&actual));
        let has_regression = outcome
            .verdicts
            .iter()
            .any(|v| v.classification == Classification::Regression);
        prop_assert_eq!(outcome.ci_should_fail, has_regression);
    }

    #[test]
    fn every_key_appears_exactly_once(
        expected in record_set_strategy(),
        actual in record_set_strategy(),
    ) {
        let expected = to_set(&expected);
        let actual = to_set(&actual);
        let outcome = reconcile(&expected, &actual);

        let union: BTreeSet<RecordKey> = expected.keys().chain(actual.keys()).cloned().collect();
        let produced: Vec<RecordKey> = outcome.verdicts.iter().map(|v| v.key.clone()).collect();

        prop_assert_eq!(produced.len(), union.len());
        prop_assert_eq!(produced, union.into_iter().collect::<Vec<_>>());
        prop_assert_eq!(outcome.counts.total(), outcome.verdicts.len());
    }

    #[test]
    fn regressions_only_where_pass_was_expected(
        expected in record_set_strategy(),
        actual in record_set_strategy(),
    ) {
        let outcome = reconcile(&to_set(&expected), &to_set(&actual));
        for verdict in outcome.regressions() {
            prop_assert_eq!(verdict.expected_status, Some(Status::Pass));
            prop_assert!(verdict.actual_status.is_some());
            prop_assert_ne!(verdict.actual_status, Some(Status::Pass));
        }
    }
}
