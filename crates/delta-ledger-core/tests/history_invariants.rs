// crates/delta-ledger-core/tests/history_invariants.rs
// ============================================================================
// Module: History Invariant Tests
// Description: Interval invariant checks over stored version histories.
// Purpose: Validate which history shapes pass and which are rejected.
// Dependencies: delta-ledger-core, serde_json
// ============================================================================
//! ## Overview
//! Exercises the SCD2 interval verifier: sorted non-overlapping intervals
//! with at most one open current version pass, including deletion gaps and
//! same-instant empty intervals; overlap, inversion, and current-flag
//! misplacement are rejected with the position of the violation.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use delta_ledger_core::AttributeMap;
use delta_ledger_core::DimensionVersion;
use delta_ledger_core::EventTime;
use delta_ledger_core::HistoryViolation;
use delta_ledger_core::NaturalKey;
use delta_ledger_core::SurrogateKey;
use delta_ledger_core::attribute_hash;
use delta_ledger_core::verify_history;
use serde_json::json;

/// Builds one stored version with a fixed payload.
fn version(surrogate: u64, from_ms: i64, to_ms: Option<i64>, current: bool) -> DimensionVersion {
    let mut attributes = AttributeMap::new();
    attributes.insert("tier".to_owned(), json!("bronze"));
    DimensionVersion {
        surrogate_key: SurrogateKey::from_raw(surrogate).expect("nonzero surrogate"),
        natural_key: NaturalKey::new("k1"),
        attribute_hash: attribute_hash(&attributes).expect("hash attributes"),
        attributes,
        valid_from: EventTime::from_unix_millis(from_ms),
        valid_to: to_ms.map(EventTime::from_unix_millis),
        is_current: current,
    }
}

/// Verifies an empty history passes.
#[test]
fn empty_history_is_sound() {
    verify_history(&NaturalKey::new("k1"), &[]).expect("empty history");
}

/// Verifies a closed run with one open current tail passes.
#[test]
fn closed_run_with_open_tail_is_sound() {
    let history = vec![
        version(1, 1_000, Some(2_000), false),
        version(2, 2_000, Some(3_000), false),
        version(3, 3_000, None, true),
    ];
    verify_history(&NaturalKey::new("k1"), &history).expect("contiguous history");
}

/// Verifies a gap between closed versions passes as explicit deletion.
#[test]
fn deletion_gap_is_sound() {
    let history = vec![version(1, 1_000, Some(2_000), false), version(2, 5_000, None, true)];
    verify_history(&NaturalKey::new("k1"), &history).expect("gap after delete");
}

/// Verifies a same-instant empty interval passes.
#[test]
fn empty_interval_is_sound() {
    let history = vec![version(1, 5_000, Some(5_000), false)];
    verify_history(&NaturalKey::new("k1"), &history).expect("empty interval");
}

/// Verifies a fully deleted history with no current version passes.
#[test]
fn fully_deleted_history_is_sound() {
    let history = vec![
        version(1, 1_000, Some(2_000), false),
        version(2, 2_000, Some(4_000), false),
    ];
    verify_history(&NaturalKey::new("k1"), &history).expect("deleted history");
}

/// Verifies overlapping intervals are rejected at the second version.
#[test]
fn overlap_is_rejected() {
    let history = vec![version(1, 1_000, Some(3_000), false), version(2, 2_000, None, true)];
    let violation = verify_history(&NaturalKey::new("k1"), &history);
    assert!(matches!(violation, Err(HistoryViolation::Overlap { position: 1, .. })));
}

/// Verifies a version ending before it starts is rejected.
#[test]
fn inverted_interval_is_rejected() {
    let history = vec![version(1, 2_000, Some(1_000), false)];
    let violation = verify_history(&NaturalKey::new("k1"), &history);
    assert!(matches!(violation, Err(HistoryViolation::Inverted { position: 0, .. })));
}

/// Verifies versions sorted against `valid_from` order are rejected.
#[test]
fn out_of_order_is_rejected() {
    let history = vec![
        version(1, 2_000, Some(3_000), false),
        version(2, 1_000, Some(1_500), false),
    ];
    let violation = verify_history(&NaturalKey::new("k1"), &history);
    assert!(matches!(violation, Err(HistoryViolation::OutOfOrder { position: 1, .. })));
}

/// Verifies an open version followed by a later one is rejected.
#[test]
fn open_version_not_last_is_rejected() {
    let history = vec![version(1, 1_000, None, true), version(2, 2_000, Some(3_000), false)];
    let violation = verify_history(&NaturalKey::new("k1"), &history);
    assert!(matches!(violation, Err(HistoryViolation::OpenNotLast { .. })));
}

/// Verifies a closed version flagged current is rejected.
#[test]
fn closed_version_flagged_current_is_rejected() {
    let history = vec![version(1, 1_000, Some(2_000), true)];
    let violation = verify_history(&NaturalKey::new("k1"), &history);
    assert!(matches!(violation, Err(HistoryViolation::CurrentClosed { .. })));
}

/// Verifies an open version without the current flag is rejected.
#[test]
fn open_version_without_current_flag_is_rejected() {
    let history = vec![version(1, 1_000, None, false)];
    let violation = verify_history(&NaturalKey::new("k1"), &history);
    assert!(matches!(violation, Err(HistoryViolation::OpenNotCurrent { .. })));
}
