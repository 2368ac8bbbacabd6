// crates/delta-ledger-core/tests/watermark_recovery.rs
// ============================================================================
// Module: Watermark Recovery Tests
// Description: Watermark advancement, checkpoint monotonicity, and replay.
// Purpose: Validate crash recovery through stale-watermark redelivery.
// Dependencies: delta-ledger-core
// ============================================================================
//! ## Overview
//! Covers the dual-cursor watermark, the checkpoint manager's monotone
//! advancement, and the recovery contract: a crash between merge and
//! checkpoint leaves a stale watermark whose redelivered records merge as
//! no-ops, so replay converges on the same history.

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

use delta_ledger_core::CheckpointError;
use delta_ledger_core::CheckpointManager;
use delta_ledger_core::CheckpointStore;
use delta_ledger_core::EventTime;
use delta_ledger_core::MemoryLedgerStore;
use delta_ledger_core::NullAlertSink;
use delta_ledger_core::Pipeline;
use delta_ledger_core::PipelineConfig;
use delta_ledger_core::SourceTableId;
use delta_ledger_core::Watermark;

/// Verifies the origin watermark sits at the epoch on both cursors.
#[test]
fn origin_watermark_sits_at_epoch() {
    let origin = common::origin_watermark();
    assert_eq!(origin.last_event_time.as_unix_millis(), 0);
    assert_eq!(origin.last_extracted_at.as_unix_millis(), 0);
}

/// Verifies advancement takes the componentwise maximum of both cursors.
#[test]
fn advanced_by_takes_componentwise_max() {
    let base = common::watermark(5_000, 6_000);

    let older_event = base.advanced_by(&common::batch(vec![common::upsert("k", 4_000, 7_000, "gold")]));
    assert_eq!(older_event.last_event_time, EventTime::from_unix_millis(5_000));
    assert_eq!(older_event.last_extracted_at, EventTime::from_unix_millis(7_000));

    let older_capture = base.advanced_by(&common::batch(vec![common::upsert("k", 9_000, 5_500, "gold")]));
    assert_eq!(older_capture.last_event_time, EventTime::from_unix_millis(9_000));
    assert_eq!(older_capture.last_extracted_at, EventTime::from_unix_millis(6_000));
}

/// Verifies an empty batch leaves the watermark unchanged.
#[test]
fn empty_batch_leaves_watermark_unchanged() {
    let base = common::watermark(5_000, 6_000);
    assert_eq!(base.advanced_by(&common::batch(vec![])), base);
}

/// Verifies the join of two watermarks takes each cursor's maximum.
#[test]
fn max_with_takes_componentwise_max() {
    let left = common::watermark(5_000, 2_000);
    let right = common::watermark(3_000, 6_000);

    let joined = left.max_with(&right);
    assert_eq!(joined.last_event_time, EventTime::from_unix_millis(5_000));
    assert_eq!(joined.last_extracted_at, EventTime::from_unix_millis(6_000));
    assert_eq!(joined, right.max_with(&left));
}

/// Verifies advancement permission requires both cursors to hold.
#[test]
fn permits_advance_requires_both_cursors() {
    let base = common::watermark(5_000, 6_000);

    assert!(base.permits_advance_to(&base));
    assert!(base.permits_advance_to(&common::watermark(5_000, 7_000)));
    assert!(base.permits_advance_to(&common::watermark(6_000, 6_000)));
    assert!(!base.permits_advance_to(&common::watermark(4_999, 7_000)));
    assert!(!base.permits_advance_to(&common::watermark(6_000, 5_999)));
}

/// Verifies the extraction overlap lowers only the view, floored at the epoch.
#[test]
fn extraction_overlap_lowers_only_the_view() {
    let lowered = common::watermark(5_000, 6_000).with_extraction_overlap(1_500);
    assert_eq!(lowered.last_extracted_at, EventTime::from_unix_millis(4_500));
    assert_eq!(lowered.last_event_time, EventTime::from_unix_millis(5_000));

    let floored = common::watermark(5_000, 500).with_extraction_overlap(10_000);
    assert_eq!(floored.last_extracted_at, EventTime::ORIGIN);
}

/// Verifies resolution falls back to the origin before the first commit.
#[test]
fn resolve_defaults_to_origin() {
    let manager = CheckpointManager::new(MemoryLedgerStore::new());
    let table = common::source_table();

    assert_eq!(manager.resolve(&table).expect("resolve"), common::origin_watermark());
    assert!(manager.stored_watermark(&table).expect("stored watermark").is_none());
}

/// Verifies monotone advancement commits, including on equal cursors.
#[test]
fn advance_commits_monotone_watermarks() {
    let manager = CheckpointManager::new(MemoryLedgerStore::new());
    let table = common::source_table();
    let first = common::watermark(1_000, 2_000);

    manager.advance(&common::origin_watermark(), &first).expect("first advance");
    assert_eq!(manager.resolve(&table).expect("resolve"), first);

    manager.advance(&first, &first).expect("equal cursors are a permitted advance");

    let second = common::watermark(1_000, 3_000);
    manager.advance(&first, &second).expect("second advance");
    assert_eq!(manager.stored_watermark(&table).expect("stored watermark"), Some(second));
}

/// Verifies regressions and cross-source commits are refused.
#[test]
fn advance_rejects_regression_and_cross_source() {
    let manager = CheckpointManager::new(MemoryLedgerStore::new());
    let table = common::source_table();
    let committed = common::watermark(5_000, 6_000);
    manager.advance(&common::origin_watermark(), &committed).expect("advance");

    let regression = manager
        .advance(&committed, &common::watermark(4_000, 7_000))
        .expect_err("regressed cursor must be refused");
    assert!(matches!(regression, CheckpointError::Corrupt(_)));
    assert!(!regression.is_transient());

    let foreign = Watermark {
        source_table: SourceTableId::new("orders"),
        ..committed.clone()
    };
    let crossed = manager
        .advance(&committed, &foreign)
        .expect_err("cross-source advance must be refused");
    assert!(matches!(crossed, CheckpointError::Corrupt(_)));

    assert_eq!(manager.stored_watermark(&table).expect("stored watermark"), Some(committed));
}

/// Verifies redelivery after a lost checkpoint converges on the same history.
#[test]
fn crash_window_replay_merges_nothing_twice() {
    let store = MemoryLedgerStore::new();
    let source = common::TableSource::new(vec![
        common::upsert("k", 1_000, 1_000, "bronze"),
        common::upsert("k", 3_000, 3_000, "gold"),
    ]);
    let pipeline = Pipeline::new(
        source,
        store.clone(),
        store.clone(),
        NullAlertSink,
        common::no_rollup(),
        PipelineConfig::default(),
    )
    .expect("build pipeline");
    let table = common::source_table();

    let first = pipeline.run_once(&table).expect("first run");
    assert_eq!(first.records_extracted, 2);
    assert_eq!(first.records_merged, 2);
    let before = common::history_of(&store, "k");
    assert_eq!(before.len(), 2);

    // Crash window: the merge is durably visible, the checkpoint is not.
    store.commit_watermark(&common::origin_watermark()).expect("drop checkpoint");

    let replay = pipeline.run_once(&table).expect("replay run");
    assert_eq!(replay.records_extracted, 2, "stale watermark redelivers the window");
    assert_eq!(replay.records_merged, 0, "redelivered records must plan nothing");
    assert_eq!(replay.late_corrections, 0);
    assert_eq!(common::history_of(&store, "k"), before);
    assert_eq!(
        store.load_watermark(&table).expect("load watermark"),
        Some(common::watermark(3_000, 3_000))
    );
}

/// Verifies the configured overlap re-reads committed records as no-ops.
#[test]
fn extraction_overlap_redelivers_merged_records_as_noops() {
    let store = MemoryLedgerStore::new();
    let source = common::TableSource::new(vec![
        common::upsert("k", 1_000, 1_000, "bronze"),
        common::upsert("k", 3_000, 3_000, "gold"),
    ]);
    let config = PipelineConfig {
        late_window_ms: 60_000,
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(
        source,
        store.clone(),
        store.clone(),
        NullAlertSink,
        common::no_rollup(),
        config,
    )
    .expect("build pipeline");
    let table = common::source_table();

    let first = pipeline.run_once(&table).expect("first run");
    assert_eq!(first.records_merged, 2);

    let overlap = pipeline.run_once(&table).expect("overlap run");
    assert_eq!(overlap.records_extracted, 2, "overlap re-reads the committed window");
    assert_eq!(overlap.records_merged, 0);
    assert_eq!(
        store.load_watermark(&table).expect("load watermark"),
        Some(common::watermark(3_000, 3_000))
    );
}
