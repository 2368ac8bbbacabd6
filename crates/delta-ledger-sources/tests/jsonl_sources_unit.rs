// crates/delta-ledger-sources/tests/jsonl_sources_unit.rs
// ============================================================================
// Module: JSONL Source Tests
// Description: Parsing, ordering, and strict validation tests for JSONL sources.
// Purpose: Ensure file-backed sources honor the extraction contract and fail
//          closed on malformed input.
// ============================================================================

//! ## Overview
//! JSONL source behavior under test:
//! - Capture-position ordering, cursor filtering, and batch truncation
//! - Strict line validation: unknown fields, bad timestamps, empty keys,
//!   overlong lines, and non-string amounts all fail closed
//! - File-level errors: missing files surface as retryable unavailability

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

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use delta_ledger_core::ChangeOp;
use delta_ledger_core::ChangeSource;
use delta_ledger_core::EventTime;
use delta_ledger_core::ExtractError;
use delta_ledger_core::FactSource;
use delta_ledger_core::FactSourceError;
use delta_ledger_core::SourceTableId;
use delta_ledger_core::Watermark;
use delta_ledger_sources::JsonlChangeSource;
use delta_ledger_sources::JsonlFactSource;
use delta_ledger_sources::JsonlSourceConfig;
use delta_ledger_sources::SourceError;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Source table shared by every scenario.
fn table() -> SourceTableId {
    SourceTableId::new("customers")
}

/// Origin watermark for the shared table.
fn origin() -> Watermark {
    Watermark::origin(table())
}

/// Watermark whose extraction cursor sits at the given instant.
fn cursor(extracted_ms: i64) -> Watermark {
    Watermark {
        source_table: table(),
        last_event_time: EventTime::ORIGIN,
        last_extracted_at: EventTime::from_unix_millis(extracted_ms),
    }
}

/// Writes a JSONL file into the directory and returns its path.
fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write jsonl file");
    path
}

/// Builds a change source bound to the shared table.
fn change_source(path: PathBuf) -> JsonlChangeSource {
    JsonlChangeSource::new(table(), JsonlSourceConfig::new(path)).expect("change source")
}

/// Builds a fact source over the file.
fn fact_source(path: PathBuf) -> JsonlFactSource {
    JsonlFactSource::new(JsonlSourceConfig::new(path)).expect("fact source")
}

// ============================================================================
// SECTION: Change Source Parsing
// ============================================================================

/// Verifies records parse and come back ordered by capture position.
#[test]
fn change_source_orders_by_capture_position() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "changes.jsonl",
        concat!(
            r#"{"natural_key":"b","event_time":"1970-01-01T00:00:03Z","extracted_at":"1970-01-01T00:00:03Z","op":"update","attributes":{"tier":"gold"}}"#,
            "\n",
            r#"{"natural_key":"a","event_time":"1970-01-01T00:00:01Z","extracted_at":"1970-01-01T00:00:01Z","op":"insert","attributes":{"tier":"bronze"}}"#,
            "\n",
        ),
    );
    let source = change_source(path);

    let batch = source.extract(&table(), &origin(), 16).expect("extract");
    assert_eq!(batch.source_table, table());
    assert_eq!(batch.records.len(), 2);
    assert_eq!(batch.records[0].natural_key.as_str(), "a");
    assert_eq!(batch.records[0].op, ChangeOp::Insert);
    assert_eq!(batch.records[0].event_time, EventTime::from_unix_millis(1_000));
    assert_eq!(batch.records[0].attributes.get("tier"), Some(&serde_json::json!("bronze")));
    assert_eq!(batch.records[1].natural_key.as_str(), "b");
    assert_eq!(batch.records[1].extracted_at, EventTime::from_unix_millis(3_000));
}

/// Verifies the cursor filter and batch truncation.
#[test]
fn change_source_honors_cursor_and_batch_size() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "changes.jsonl",
        concat!(
            r#"{"natural_key":"a","event_time":"1970-01-01T00:00:01Z","extracted_at":"1970-01-01T00:00:01Z","op":"update","attributes":{}}"#,
            "\n",
            r#"{"natural_key":"b","event_time":"1970-01-01T00:00:02Z","extracted_at":"1970-01-01T00:00:02Z","op":"update","attributes":{}}"#,
            "\n",
            r#"{"natural_key":"c","event_time":"1970-01-01T00:00:03Z","extracted_at":"1970-01-01T00:00:03Z","op":"update","attributes":{}}"#,
            "\n",
        ),
    );
    let source = change_source(path);

    let batch = source.extract(&table(), &cursor(1_000), 16).expect("extract");
    let keys: Vec<&str> = batch.records.iter().map(|r| r.natural_key.as_str()).collect();
    assert_eq!(keys, vec!["b", "c"], "cursor excludes records at or before it");

    let limited = source.extract(&table(), &cursor(1_000), 1).expect("extract");
    assert_eq!(limited.records.len(), 1);
    assert_eq!(limited.records[0].natural_key.as_str(), "b", "truncation keeps the oldest");
}

/// Verifies deletes may omit attributes entirely.
#[test]
fn change_source_defaults_missing_attributes() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "changes.jsonl",
        concat!(
            r#"{"natural_key":"a","event_time":"1970-01-01T00:00:01Z","extracted_at":"1970-01-01T00:00:01Z","op":"delete"}"#,
            "\n",
        ),
    );
    let source = change_source(path);

    let batch = source.extract(&table(), &origin(), 16).expect("extract");
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].op, ChangeOp::Delete);
    assert!(batch.records[0].attributes.is_empty());
}

/// Verifies blank lines are skipped while numbering stays file-accurate.
#[test]
fn change_source_reports_file_line_numbers() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "changes.jsonl",
        concat!(
            r#"{"natural_key":"a","event_time":"1970-01-01T00:00:01Z","extracted_at":"1970-01-01T00:00:01Z","op":"update","attributes":{}}"#,
            "\n",
            "\n",
            "not json\n",
        ),
    );
    let source = change_source(path);

    let Err(err) = source.extract(&table(), &origin(), 16) else {
        panic!("expected malformed line to fail");
    };
    assert!(matches!(err, ExtractError::SchemaMismatch(_)));
    assert!(!err.is_transient());
    assert!(err.to_string().contains("line 3"), "blank lines keep their file position: {err}");
}

// ============================================================================
// SECTION: Change Source Validation
// ============================================================================

/// Verifies unknown fields are rejected.
#[test]
fn change_source_rejects_unknown_field() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "changes.jsonl",
        concat!(
            r#"{"natural_key":"a","event_time":"1970-01-01T00:00:01Z","extracted_at":"1970-01-01T00:00:01Z","op":"update","attributes":{},"surprise":1}"#,
            "\n",
        ),
    );
    let source = change_source(path);

    let Err(err) = source.extract(&table(), &origin(), 16) else {
        panic!("expected unknown field to fail");
    };
    assert!(matches!(err, ExtractError::SchemaMismatch(_)));
    assert!(err.to_string().contains("line 1"));
}

/// Verifies malformed timestamps name the offending field.
#[test]
fn change_source_rejects_malformed_timestamp() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "changes.jsonl",
        concat!(
            r#"{"natural_key":"a","event_time":"yesterday","extracted_at":"1970-01-01T00:00:01Z","op":"update","attributes":{}}"#,
            "\n",
        ),
    );
    let source = change_source(path);

    let Err(err) = source.extract(&table(), &origin(), 16) else {
        panic!("expected malformed timestamp to fail");
    };
    assert!(err.to_string().contains("event_time"), "names the field: {err}");
}

/// Verifies empty natural keys are rejected.
#[test]
fn change_source_rejects_empty_natural_key() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "changes.jsonl",
        concat!(
            r#"{"natural_key":"","event_time":"1970-01-01T00:00:01Z","extracted_at":"1970-01-01T00:00:01Z","op":"update","attributes":{}}"#,
            "\n",
        ),
    );
    let source = change_source(path);

    let Err(err) = source.extract(&table(), &origin(), 16) else {
        panic!("expected empty key to fail");
    };
    assert!(err.to_string().contains("natural key is empty"));
}

/// Verifies the per-line size limit.
#[test]
fn change_source_rejects_overlong_line() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "changes.jsonl",
        concat!(
            r#"{"natural_key":"a","event_time":"1970-01-01T00:00:01Z","extracted_at":"1970-01-01T00:00:01Z","op":"update","attributes":{}}"#,
            "\n",
        ),
    );
    let config = JsonlSourceConfig {
        path,
        max_line_bytes: 16,
    };
    let source = JsonlChangeSource::new(table(), config).expect("change source");

    let Err(err) = source.extract(&table(), &origin(), 16) else {
        panic!("expected overlong line to fail");
    };
    assert!(err.to_string().contains("exceeds size limit"));
}

/// Verifies a request for a different table fails closed.
#[test]
fn change_source_rejects_mismatched_table() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "changes.jsonl", "");
    let source = change_source(path);

    let other = SourceTableId::new("orders");
    let Err(err) = source.extract(&other, &Watermark::origin(other.clone()), 16) else {
        panic!("expected mismatched table to fail");
    };
    assert!(matches!(err, ExtractError::SchemaMismatch(_)));
    assert!(err.to_string().contains("serves table"));
}

/// Verifies a missing file surfaces as retryable unavailability.
#[test]
fn change_source_missing_file_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let source = change_source(dir.path().join("missing.jsonl"));

    let Err(err) = source.extract(&table(), &origin(), 16) else {
        panic!("expected missing file to fail");
    };
    assert!(matches!(err, ExtractError::Unavailable(_)));
    assert!(err.is_transient());
}

// ============================================================================
// SECTION: Fact Source
// ============================================================================

/// Verifies fact parsing and the half-open event-time window.
#[test]
fn fact_source_parses_amounts_within_window() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "facts.jsonl",
        concat!(
            r#"{"natural_key":"a","event_time":"1970-01-01T00:00:01Z","amount":"5.00","attributes":{"category":"books"}}"#,
            "\n",
            r#"{"natural_key":"b","event_time":"1970-01-01T00:00:02Z","amount":"7.50","attributes":{"category":"books"}}"#,
            "\n",
            r#"{"natural_key":"c","event_time":"1970-01-01T00:00:03Z","amount":"1.25","attributes":{"category":"games"}}"#,
            "\n",
        ),
    );
    let source = fact_source(path);

    let facts = source
        .facts_between(EventTime::from_unix_millis(1_000), EventTime::from_unix_millis(3_000))
        .expect("facts");
    assert_eq!(facts.len(), 2, "window end is exclusive");
    assert_eq!(facts[0].natural_key.as_str(), "a");
    assert_eq!(facts[0].amount, BigDecimal::from_str("5.00").unwrap());
    assert_eq!(facts[1].attributes.get("category"), Some(&serde_json::json!("books")));
}

/// Verifies JSON-number amounts are rejected.
#[test]
fn fact_source_rejects_numeric_amount() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "facts.jsonl",
        concat!(r#"{"natural_key":"a","event_time":"1970-01-01T00:00:01Z","amount":12.5}"#, "\n"),
    );
    let source = fact_source(path);

    let Err(err) = source
        .facts_between(EventTime::from_unix_millis(0), EventTime::from_unix_millis(10_000))
    else {
        panic!("expected numeric amount to fail");
    };
    assert!(matches!(err, FactSourceError::SchemaMismatch(_)));
    assert!(err.to_string().contains("line 1"));
}

/// Verifies undecodable amount text names the field.
#[test]
fn fact_source_rejects_undecodable_amount() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "facts.jsonl",
        concat!(
            r#"{"natural_key":"a","event_time":"1970-01-01T00:00:01Z","amount":"twelve"}"#,
            "\n",
        ),
    );
    let source = fact_source(path);

    let Err(err) = source
        .facts_between(EventTime::from_unix_millis(0), EventTime::from_unix_millis(10_000))
    else {
        panic!("expected undecodable amount to fail");
    };
    assert!(err.to_string().contains("amount"));
}

// ============================================================================
// SECTION: Configuration Validation
// ============================================================================

/// Verifies invalid configurations are rejected at construction.
#[test]
fn invalid_configs_are_rejected() {
    let empty = JsonlSourceConfig::new(PathBuf::new());
    let Err(err) = JsonlChangeSource::new(table(), empty.clone()) else {
        panic!("expected empty path to fail");
    };
    assert_eq!(err, SourceError::InvalidConfig("jsonl path is empty".to_string()));
    assert!(JsonlFactSource::new(empty).is_err());

    let zero_limit = JsonlSourceConfig {
        path: PathBuf::from("changes.jsonl"),
        max_line_bytes: 0,
    };
    let Err(err) = JsonlFactSource::new(zero_limit) else {
        panic!("expected zero line limit to fail");
    };
    assert!(matches!(err, SourceError::InvalidConfig(_)));
}
