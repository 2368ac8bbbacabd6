// crates/delta-ledger-core/tests/rollup_rebuild.rs
// ============================================================================
// Module: Rollup Recomputation Tests
// Description: Period-scoped aggregate refresh and full rebuild from facts.
// Purpose: Validate wholesale recomputation, grouping, and exact sums.
// Dependencies: delta-ledger-core, bigdecimal, serde_json
// ============================================================================
//! ## Overview
//! Aggregates are recomputed wholesale per touched period, never adjusted in
//! place. These tests cover grain coverage, exact decimal sums, group
//! resolution with fallback and coercion, replacement of stale rows, removal
//! of emptied periods, and the full rebuild that clears everything first.

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

use std::str::FromStr;

use bigdecimal::BigDecimal;
use delta_ledger_core::AggregateFact;
use delta_ledger_core::AggregateStore;
use delta_ledger_core::AttributeMap;
use delta_ledger_core::EventTime;
use delta_ledger_core::FactRecord;
use delta_ledger_core::MemoryLedgerStore;
use delta_ledger_core::NaturalKey;
use delta_ledger_core::PeriodGranularity;
use delta_ledger_core::PeriodKey;
use delta_ledger_core::RollupConfig;
use delta_ledger_core::RollupEngine;
use delta_ledger_core::RollupHook;
use delta_ledger_core::RollupRunner;
use serde_json::Value;
use serde_json::json;

/// Builds a fact carrying one explicit attribute.
fn fact_with(key: &str, event_ms: i64, amount: &str, attribute: &str, value: Value) -> FactRecord {
    let mut attributes = AttributeMap::new();
    attributes.insert(attribute.to_owned(), value);
    FactRecord {
        natural_key: NaturalKey::new(key),
        event_time: EventTime::from_unix_millis(event_ms),
        amount: BigDecimal::from_str(amount).expect("decimal amount"),
        attributes,
    }
}

/// Daily period containing the given millisecond instant.
fn daily_period(ms: i64) -> PeriodKey {
    PeriodKey::containing(PeriodGranularity::Daily, EventTime::from_unix_millis(ms))
        .expect("daily period")
}

/// Verifies a refresh recomputes every configured grain for one instant.
#[test]
fn refresh_builds_every_grain_for_one_fact() {
    let engine = RollupEngine::new(RollupConfig::default());
    let facts = common::VecFactSource::new(vec![common::fact("k", 1_000, "2.5", Some("books"))]);
    let store = MemoryLedgerStore::new();

    let periods = engine
        .refresh_touched(&facts, &store, &[EventTime::from_unix_millis(1_000)])
        .expect("refresh");
    let labels: Vec<&str> = periods.iter().map(|period| period.label.as_str()).collect();
    assert_eq!(labels, vec!["1970-01-01", "1970-W01", "1970-01"]);

    for period in &periods {
        let rows = store.load_period(period).expect("load period");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].group, "books");
        assert_eq!(rows[0].record_count, 1);
        assert_eq!(rows[0].total_amount, BigDecimal::from_str("2.5").expect("decimal"));
    }
}

/// Verifies decimal amounts sum exactly, without float drift.
#[test]
fn decimal_amounts_sum_exactly() {
    let engine = RollupEngine::new(RollupConfig::default());
    let facts = common::VecFactSource::new(vec![
        common::fact("a", 1_000, "0.1", Some("books")),
        common::fact("b", 2_000, "0.2", Some("books")),
    ]);
    let store = MemoryLedgerStore::new();

    engine
        .refresh_touched(&facts, &store, &[EventTime::from_unix_millis(1_000)])
        .expect("refresh");

    let rows = store.load_period(&daily_period(1_000)).expect("load period");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].record_count, 2);
    assert_eq!(rows[0].total_amount, BigDecimal::from_str("0.3").expect("decimal"));
}

/// Verifies facts without a usable group land in the fallback group.
#[test]
fn missing_or_null_group_falls_back() {
    let engine = RollupEngine::new(RollupConfig::default());
    let facts = common::VecFactSource::new(vec![
        common::fact("a", 1_000, "1", None),
        fact_with("b", 2_000, "2", "category", Value::Null),
    ]);
    let store = MemoryLedgerStore::new();

    engine
        .refresh_touched(&facts, &store, &[EventTime::from_unix_millis(1_000)])
        .expect("refresh");

    let rows = store.load_period(&daily_period(1_000)).expect("load period");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].group, "unclassified");
    assert_eq!(rows[0].record_count, 2);
    assert_eq!(rows[0].total_amount, BigDecimal::from(3));
}

/// Verifies numeric and boolean group values coerce to their text form.
#[test]
fn numeric_and_bool_groups_coerce_to_text() {
    let engine = RollupEngine::new(RollupConfig::default());
    let facts = common::VecFactSource::new(vec![
        fact_with("a", 1_000, "1", "category", json!(7)),
        fact_with("b", 2_000, "2", "category", json!(true)),
    ]);
    let store = MemoryLedgerStore::new();

    engine
        .refresh_touched(&facts, &store, &[EventTime::from_unix_millis(1_000)])
        .expect("refresh");

    let rows = store.load_period(&daily_period(1_000)).expect("load period");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].group, "7");
    assert_eq!(rows[1].group, "true");
}

/// Verifies a refresh replaces whatever rows the period held before.
#[test]
fn refresh_replaces_stale_rows() {
    let engine = RollupEngine::new(RollupConfig::default());
    let facts = common::VecFactSource::new(vec![common::fact("k", 1_000, "5", Some("books"))]);
    let store = MemoryLedgerStore::new();
    let daily = daily_period(1_000);
    store
        .replace_period(&daily, &[AggregateFact::empty("stale".to_owned(), daily.clone())])
        .expect("seed stale row");

    engine
        .refresh_touched(&facts, &store, &[EventTime::from_unix_millis(1_000)])
        .expect("refresh");

    let rows = store.load_period(&daily).expect("load period");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].group, "books", "stale rows must not survive a refresh");
}

/// Verifies a period whose facts disappeared is emptied, not kept.
#[test]
fn refresh_clears_periods_with_no_remaining_facts() {
    let engine = RollupEngine::new(RollupConfig::default());
    let facts = common::VecFactSource::new(vec![]);
    let store = MemoryLedgerStore::new();
    let daily = daily_period(1_000);
    store
        .replace_period(&daily, &[AggregateFact::empty("stale".to_owned(), daily.clone())])
        .expect("seed stale row");

    engine
        .refresh_touched(&facts, &store, &[EventTime::from_unix_millis(1_000)])
        .expect("refresh");

    assert!(store.load_period(&daily).expect("load period").is_empty());
    assert!(store.load_all().expect("load all").is_empty());
}

/// Verifies a rebuild clears stale periods and recomputes from all facts.
#[test]
fn rebuild_drops_stale_periods_and_recomputes() {
    let facts = common::VecFactSource::new(vec![
        common::fact("a", 1_000, "1.5", Some("books")),
        common::fact("b", 90_000_000, "2", Some("games")),
    ]);
    let store = MemoryLedgerStore::new();
    let far = daily_period(40 * 86_400_000);
    store
        .replace_period(&far, &[AggregateFact::empty("stale".to_owned(), far.clone())])
        .expect("seed stale row");
    let runner = RollupRunner::new(RollupConfig::default(), facts, store.clone());

    let periods = runner.rebuild().expect("rebuild");
    assert_eq!(periods.len(), 4, "two daily periods share one week and month");
    assert!(store.load_period(&far).expect("load far period").is_empty());

    let day_two = store.load_period(&daily_period(90_000_000)).expect("load day two");
    assert_eq!(day_two.len(), 1);
    assert_eq!(day_two[0].group, "games");

    let monthly = PeriodKey::containing(
        PeriodGranularity::Monthly,
        EventTime::from_unix_millis(1_000),
    )
    .expect("monthly period");
    let monthly_rows = store.load_period(&monthly).expect("load month");
    assert_eq!(monthly_rows.len(), 2, "both groups aggregate in the month");
}

/// Verifies the grouping attribute and fallback group are configurable.
#[test]
fn custom_group_attribute_and_fallback() {
    let config = RollupConfig {
        granularities: vec![PeriodGranularity::Daily],
        group_attribute: "region".to_owned(),
        fallback_group: "unknown".to_owned(),
    };
    let engine = RollupEngine::new(config);
    let facts = common::VecFactSource::new(vec![
        fact_with("a", 1_000, "1", "region", json!("emea")),
        common::fact("b", 2_000, "2", Some("books")),
    ]);
    let store = MemoryLedgerStore::new();

    let periods = engine
        .refresh_touched(&facts, &store, &[EventTime::from_unix_millis(1_000)])
        .expect("refresh");
    assert_eq!(periods.len(), 1, "only the configured grain is recomputed");

    let rows = store.load_period(&daily_period(1_000)).expect("load period");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].group, "emea");
    assert_eq!(rows[1].group, "unknown", "category is not the grouping attribute here");
}
