// crates/delta-ledger-core/tests/merge_history.rs
// ============================================================================
// Module: Merge History Tests
// Description: On-time SCD2 merge behavior over the in-memory ledger store.
// Purpose: Validate version transitions, idempotent redelivery, and deletes.
// Dependencies: delta-ledger-core, serde_json
// ============================================================================
//! ## Overview
//! Exercises the classifier and merge planner against stored history for
//! records arriving in event order: first appearance, attribute changes,
//! exact redelivery, same-instant corrections, deletes, and reappearance
//! after a delete.

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

mod common;

use delta_ledger_core::DimensionStore;
use delta_ledger_core::EventTime;
use delta_ledger_core::MemoryLedgerStore;
use delta_ledger_core::NaturalKey;
use delta_ledger_core::VersionMutation;
use delta_ledger_core::verify_history;
use serde_json::json;

/// Verifies the first upsert for a key opens a single current version.
#[test]
fn first_upsert_opens_current_version() {
    let store = MemoryLedgerStore::new();
    let outcome =
        common::merge(&store, &common::origin_watermark(), vec![common::upsert(
            "k1", 1_000, 1_000, "bronze",
        )]);

    assert_eq!(outcome.records_merged, 1);
    assert_eq!(outcome.late_corrections, 0);
    assert_eq!(outcome.noop_records, 0);
    assert_eq!(outcome.plan.insert_count(), 1);

    let history = common::history_of(&store, "k1");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].valid_from, EventTime::from_unix_millis(1_000));
    assert_eq!(history[0].valid_to, None);
    assert!(history[0].is_current);
    assert_eq!(history[0].attributes.get("tier"), Some(&json!("bronze")));
}

/// Verifies an attribute change closes the previous version and opens a new one.
#[test]
fn update_closes_previous_and_opens_new() {
    let store = MemoryLedgerStore::new();
    common::merge(&store, &common::origin_watermark(), vec![common::upsert(
        "k1", 1_000, 1_000, "bronze",
    )]);
    let outcome =
        common::merge(&store, &common::origin_watermark(), vec![common::upsert(
            "k1", 2_000, 2_000, "silver",
        )]);

    assert_eq!(outcome.records_merged, 1);
    assert!(matches!(outcome.plan.mutations[0], VersionMutation::Close { .. }));
    assert!(matches!(outcome.plan.mutations[1], VersionMutation::Insert { .. }));

    let history = common::history_of(&store, "k1");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].valid_to, Some(EventTime::from_unix_millis(2_000)));
    assert!(!history[0].is_current);
    assert_eq!(history[1].valid_from, EventTime::from_unix_millis(2_000));
    assert!(history[1].is_current);
    assert_ne!(history[0].surrogate_key, history[1].surrogate_key);
}

/// Verifies redelivering an already merged record plans nothing.
#[test]
fn duplicate_delivery_plans_nothing() {
    let store = MemoryLedgerStore::new();
    common::merge(&store, &common::origin_watermark(), vec![common::upsert(
        "k1", 1_000, 1_000, "bronze",
    )]);
    let outcome =
        common::merge(&store, &common::origin_watermark(), vec![common::upsert(
            "k1", 1_000, 9_000, "bronze",
        )]);

    assert_eq!(outcome.records_merged, 0);
    assert_eq!(outcome.noop_records, 1);
    assert!(outcome.plan.is_empty());
    assert_eq!(common::history_of(&store, "k1").len(), 1);
}

/// Verifies a changed payload at the same instant rewrites the version in place.
#[test]
fn same_instant_correction_rewrites_open_version() {
    let store = MemoryLedgerStore::new();
    common::merge(&store, &common::origin_watermark(), vec![common::upsert(
        "k1", 1_000, 1_000, "bronze",
    )]);
    let before = common::history_of(&store, "k1");
    let outcome =
        common::merge(&store, &common::origin_watermark(), vec![common::upsert(
            "k1", 1_000, 2_000, "silver",
        )]);

    assert_eq!(outcome.records_merged, 1);
    assert_eq!(outcome.late_corrections, 0);
    assert!(matches!(outcome.plan.mutations[0], VersionMutation::Rewrite { .. }));

    let history = common::history_of(&store, "k1");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].surrogate_key, before[0].surrogate_key);
    assert_eq!(history[0].valid_to, None);
    assert!(history[0].is_current);
    assert_eq!(history[0].attributes.get("tier"), Some(&json!("silver")));
    assert_ne!(history[0].attribute_hash, before[0].attribute_hash);
}

/// Verifies a delete closes the current version and leaves no current one.
#[test]
fn delete_closes_current_version() {
    let store = MemoryLedgerStore::new();
    common::merge(&store, &common::origin_watermark(), vec![common::upsert(
        "k1", 1_000, 1_000, "bronze",
    )]);
    let outcome = common::merge(&store, &common::origin_watermark(), vec![common::delete(
        "k1", 2_000, 2_000,
    )]);

    assert_eq!(outcome.records_merged, 1);
    let history = common::history_of(&store, "k1");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].valid_to, Some(EventTime::from_unix_millis(2_000)));
    assert!(!history[0].is_current);
    assert!(common::current_of(&store, "k1").is_none());
}

/// Verifies reappearance after a delete opens a new version across a gap.
#[test]
fn reappearance_after_delete_leaves_gap() {
    let store = MemoryLedgerStore::new();
    common::merge(&store, &common::origin_watermark(), vec![common::upsert(
        "k1", 1_000, 1_000, "bronze",
    )]);
    common::merge(&store, &common::origin_watermark(), vec![common::delete(
        "k1", 2_000, 2_000,
    )]);
    common::merge(&store, &common::origin_watermark(), vec![common::upsert(
        "k1", 5_000, 5_000, "gold",
    )]);

    let history = common::history_of(&store, "k1");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].valid_to, Some(EventTime::from_unix_millis(2_000)));
    assert_eq!(history[1].valid_from, EventTime::from_unix_millis(5_000));
    assert!(history[1].is_current);

    let table = common::source_table();
    let key = NaturalKey::new("k1");
    let in_gap = store
        .version_at(&table, &key, EventTime::from_unix_millis(3_000))
        .expect("load version");
    assert!(in_gap.is_none());
    let revived = store
        .version_at(&table, &key, EventTime::from_unix_millis(5_500))
        .expect("load version");
    assert_eq!(revived.map(|version| version.surrogate_key), Some(history[1].surrogate_key));
}

/// Verifies an upsert and delete at the same instant leave a legal empty interval.
#[test]
fn same_instant_upsert_then_delete_yields_empty_interval() {
    let store = MemoryLedgerStore::new();
    common::merge(&store, &common::origin_watermark(), vec![common::upsert(
        "k1", 5_000, 5_000, "bronze",
    )]);
    common::merge(&store, &common::origin_watermark(), vec![common::delete(
        "k1", 5_000, 6_000,
    )]);

    let history = common::history_of(&store, "k1");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].valid_from, EventTime::from_unix_millis(5_000));
    assert_eq!(history[0].valid_to, Some(EventTime::from_unix_millis(5_000)));
    assert!(!history[0].is_current);
    assert!(common::current_of(&store, "k1").is_none());
    verify_history(&NaturalKey::new("k1"), &history).expect("empty interval is legal");
}

/// Verifies deleting an already deleted key plans nothing.
#[test]
fn repeated_delete_is_noop() {
    let store = MemoryLedgerStore::new();
    common::merge(&store, &common::origin_watermark(), vec![common::upsert(
        "k1", 1_000, 1_000, "bronze",
    )]);
    common::merge(&store, &common::origin_watermark(), vec![common::delete(
        "k1", 2_000, 2_000,
    )]);
    let outcome = common::merge(&store, &common::origin_watermark(), vec![common::delete(
        "k1", 3_000, 3_000,
    )]);

    assert_eq!(outcome.records_merged, 0);
    assert_eq!(outcome.noop_records, 1);
    let history = common::history_of(&store, "k1");
    assert_eq!(history[0].valid_to, Some(EventTime::from_unix_millis(2_000)));
}

/// Verifies a delete for a key that never appeared plans nothing.
#[test]
fn delete_for_unknown_key_is_noop() {
    let store = MemoryLedgerStore::new();
    let outcome = common::merge(&store, &common::origin_watermark(), vec![common::delete(
        "ghost", 1_000, 1_000,
    )]);

    assert_eq!(outcome.records_merged, 0);
    assert_eq!(outcome.noop_records, 1);
    assert!(outcome.plan.is_empty());
    assert!(common::history_of(&store, "ghost").is_empty());
}

/// Verifies one batch carrying several keys merges each key independently.
#[test]
fn multi_key_batch_merges_independently() {
    let store = MemoryLedgerStore::new();
    let outcome = common::merge(&store, &common::origin_watermark(), vec![
        common::upsert("k1", 1_000, 1_000, "bronze"),
        common::upsert("k2", 1_500, 1_500, "gold"),
    ]);

    assert_eq!(outcome.records_merged, 2);
    let first = common::history_of(&store, "k1");
    let second = common::history_of(&store, "k2");
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_ne!(first[0].surrogate_key, second[0].surrogate_key);
}

/// Verifies a batch with several states of one key builds the full history.
#[test]
fn in_batch_progression_creates_full_history() {
    let store = MemoryLedgerStore::new();
    let outcome = common::merge(&store, &common::origin_watermark(), vec![
        common::upsert("k1", 3_000, 3_000, "gold"),
        common::upsert("k1", 1_000, 1_000, "bronze"),
        common::upsert("k1", 2_000, 2_000, "silver"),
    ]);

    assert_eq!(outcome.records_merged, 3);
    assert_eq!(outcome.plan.insert_count(), 3);

    let history = common::history_of(&store, "k1");
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].valid_to, Some(EventTime::from_unix_millis(2_000)));
    assert_eq!(history[1].valid_to, Some(EventTime::from_unix_millis(3_000)));
    assert_eq!(history[2].valid_to, None);
    assert!(history[2].is_current);
    assert_eq!(history[2].attributes.get("tier"), Some(&json!("gold")));
    verify_history(&NaturalKey::new("k1"), &history).expect("history is sound");
}
