// crates/delta-ledger-sources/src/jsonl.rs
// ============================================================================
// Module: JSONL File Sources
// Description: Change and fact sources reading JSON Lines files.
// Purpose: Feed pipelines and rollups from newline-delimited JSON files.
// Dependencies: bigdecimal, delta-ledger-core, serde, serde_json
// ============================================================================

//! ## Overview
//! One JSON object per line; timestamps are RFC 3339 text and fact amounts
//! are decimal strings. Files are re-read on every call, so lines appended
//! between runs become visible to the next extraction. Validation is strict:
//! an unknown field, a malformed timestamp, an empty key, or an overlong line
//! fails the whole read with a schema mismatch naming the offending line.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use delta_ledger_core::AttributeMap;
use delta_ledger_core::Batch;
use delta_ledger_core::ChangeOp;
use delta_ledger_core::ChangeRecord;
use delta_ledger_core::ChangeSource;
use delta_ledger_core::EventTime;
use delta_ledger_core::ExtractError;
use delta_ledger_core::FactRecord;
use delta_ledger_core::FactSource;
use delta_ledger_core::FactSourceError;
use delta_ledger_core::NaturalKey;
use delta_ledger_core::SourceTableId;
use delta_ledger_core::Watermark;
use serde::Deserialize;
use serde::Serialize;

use crate::registry::SourceError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum length of one JSONL line in bytes.
pub const DEFAULT_MAX_LINE_BYTES: usize = 256 * 1024;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration shared by JSONL-backed sources.
///
/// # Invariants
/// - `path` is non-empty; existence is checked on every read, not at
///   construction, so a file created later is picked up by the next run.
/// - `max_line_bytes` is enforced per line before parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonlSourceConfig {
    /// Path of the JSONL file.
    pub path: PathBuf,
    /// Maximum length of one line in bytes.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl JsonlSourceConfig {
    /// Creates a configuration for a path with the default line limit.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self {
            path,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

/// Serde default for [`JsonlSourceConfig::max_line_bytes`].
const fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

// ============================================================================
// SECTION: Change Source
// ============================================================================

/// Change source reading one JSONL file bound to one source table.
///
/// Line shape:
/// `{"natural_key":"c-1","event_time":"2026-01-02T03:04:05Z",`
/// `"extracted_at":"2026-01-02T03:05:00Z","op":"update","attributes":{...}}`
///
/// # Invariants
/// - Serves exactly the configured source table; other tables fail closed.
/// - Any malformed line fails the whole extraction.
#[derive(Debug, Clone)]
pub struct JsonlChangeSource {
    /// Source table every line belongs to.
    source_table: SourceTableId,
    /// File location and limits.
    config: JsonlSourceConfig,
}

impl JsonlChangeSource {
    /// Creates a change source for one table over one JSONL file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidConfig`] when the configuration fails
    /// validation.
    pub fn new(
        source_table: SourceTableId,
        config: JsonlSourceConfig,
    ) -> Result<Self, SourceError> {
        validate_config(&config)?;
        Ok(Self {
            source_table,
            config,
        })
    }

    /// Returns the source table this file is bound to.
    #[must_use]
    pub const fn source_table(&self) -> &SourceTableId {
        &self.source_table
    }
}

impl ChangeSource for JsonlChangeSource {
    fn extract(
        &self,
        source_table: &SourceTableId,
        since: &Watermark,
        max_batch_size: usize,
    ) -> Result<Batch, ExtractError> {
        if *source_table != self.source_table {
            return Err(ExtractError::SchemaMismatch(format!(
                "source serves table {}, not {source_table}",
                self.source_table
            )));
        }
        let text = fs::read_to_string(&self.config.path).map_err(|err| {
            ExtractError::Unavailable(format!(
                "cannot read {}: {err}",
                self.config.path.display()
            ))
        })?;

        let mut records = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let number = index + 1;
            check_line_length(number, line, self.config.max_line_bytes)
                .map_err(ExtractError::SchemaMismatch)?;
            let record = parse_change_line(number, line, &self.source_table)
                .map_err(ExtractError::SchemaMismatch)?;
            records.push(record);
        }

        records.retain(|record| record.extracted_at > since.last_extracted_at);
        records.sort_by(|left, right| {
            left.extracted_at
                .cmp(&right.extracted_at)
                .then_with(|| left.event_time.cmp(&right.event_time))
                .then_with(|| left.natural_key.cmp(&right.natural_key))
        });
        records.truncate(max_batch_size);
        Ok(Batch::new(self.source_table.clone(), records))
    }
}

// ============================================================================
// SECTION: Fact Source
// ============================================================================

/// Fact source reading one JSONL file.
///
/// Line shape:
/// `{"natural_key":"c-1","event_time":"2026-01-02T03:04:05Z",`
/// `"amount":"12.50","attributes":{"category":"books"}}`
///
/// # Invariants
/// - Amounts are decimal strings; JSON numbers are rejected to keep totals
///   exact.
/// - Any malformed line fails the whole read.
#[derive(Debug, Clone)]
pub struct JsonlFactSource {
    /// File location and limits.
    config: JsonlSourceConfig,
}

impl JsonlFactSource {
    /// Creates a fact source over one JSONL file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidConfig`] when the configuration fails
    /// validation.
    pub fn new(config: JsonlSourceConfig) -> Result<Self, SourceError> {
        validate_config(&config)?;
        Ok(Self {
            config,
        })
    }
}

impl FactSource for JsonlFactSource {
    fn facts_between(
        &self,
        start: EventTime,
        end: EventTime,
    ) -> Result<Vec<FactRecord>, FactSourceError> {
        let text = fs::read_to_string(&self.config.path).map_err(|err| {
            FactSourceError::Unavailable(format!(
                "cannot read {}: {err}",
                self.config.path.display()
            ))
        })?;

        let mut facts = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let number = index + 1;
            check_line_length(number, line, self.config.max_line_bytes)
                .map_err(FactSourceError::SchemaMismatch)?;
            let fact = parse_fact_line(number, line).map_err(FactSourceError::SchemaMismatch)?;
            facts.push(fact);
        }

        facts.retain(|fact| start <= fact.event_time && fact.event_time < end);
        facts.sort_by(|left, right| {
            left.event_time
                .cmp(&right.event_time)
                .then_with(|| left.natural_key.cmp(&right.natural_key))
        });
        Ok(facts)
    }
}

// ============================================================================
// SECTION: Line Formats
// ============================================================================

/// Wire shape of one change line.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChangeLine {
    /// Entity identifier assigned by the source system.
    natural_key: String,
    /// RFC 3339 instant the change happened in the source.
    event_time: String,
    /// RFC 3339 instant the change was captured by extraction.
    extracted_at: String,
    /// Operation kind.
    op: ChangeOp,
    /// Attribute state at `event_time`; empty for deletes.
    #[serde(default)]
    attributes: AttributeMap,
}

/// Wire shape of one fact line.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FactLine {
    /// Entity identifier the fact refers to.
    natural_key: String,
    /// RFC 3339 instant the fact happened.
    event_time: String,
    /// Decimal amount as text.
    amount: String,
    /// Grouping attributes carried by the fact.
    #[serde(default)]
    attributes: AttributeMap,
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates a JSONL source configuration.
fn validate_config(config: &JsonlSourceConfig) -> Result<(), SourceError> {
    if config.path.as_os_str().is_empty() {
        return Err(SourceError::InvalidConfig("jsonl path is empty".to_string()));
    }
    if config.max_line_bytes == 0 {
        return Err(SourceError::InvalidConfig(
            "max_line_bytes must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Enforces the per-line size limit.
fn check_line_length(number: usize, line: &str, max_line_bytes: usize) -> Result<(), String> {
    if line.len() > max_line_bytes {
        return Err(line_message(
            number,
            &format!("line exceeds size limit: {} bytes (max {max_line_bytes})", line.len()),
        ));
    }
    Ok(())
}

/// Parses one change line into a record stamped with the bound table.
fn parse_change_line(
    number: usize,
    line: &str,
    source_table: &SourceTableId,
) -> Result<ChangeRecord, String> {
    let parsed: ChangeLine =
        serde_json::from_str(line).map_err(|err| line_message(number, &err.to_string()))?;
    if parsed.natural_key.is_empty() {
        return Err(line_message(number, "natural key is empty"));
    }
    Ok(ChangeRecord {
        natural_key: NaturalKey::new(parsed.natural_key),
        source_table: source_table.clone(),
        attributes: parsed.attributes,
        event_time: parse_time(number, "event_time", &parsed.event_time)?,
        extracted_at: parse_time(number, "extracted_at", &parsed.extracted_at)?,
        op: parsed.op,
    })
}

/// Parses one fact line.
fn parse_fact_line(number: usize, line: &str) -> Result<FactRecord, String> {
    let parsed: FactLine =
        serde_json::from_str(line).map_err(|err| line_message(number, &err.to_string()))?;
    if parsed.natural_key.is_empty() {
        return Err(line_message(number, "natural key is empty"));
    }
    let amount = BigDecimal::from_str(&parsed.amount)
        .map_err(|err| line_message(number, &format!("amount: {err}")))?;
    Ok(FactRecord {
        natural_key: NaturalKey::new(parsed.natural_key),
        event_time: parse_time(number, "event_time", &parsed.event_time)?,
        amount,
        attributes: parsed.attributes,
    })
}

/// Parses one RFC 3339 field of one line.
fn parse_time(number: usize, field: &str, text: &str) -> Result<EventTime, String> {
    EventTime::from_rfc3339(text).map_err(|err| line_message(number, &format!("{field}: {err}")))
}

/// Formats a line-scoped schema violation.
fn line_message(number: usize, message: &str) -> String {
    format!("line {number}: {message}")
}
