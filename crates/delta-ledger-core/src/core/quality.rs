// crates/delta-ledger-core/src/core/quality.rs
// ============================================================================
// Module: Delta Ledger Quality Expectations
// Description: Declarative per-batch data quality checks and their report.
// Purpose: Gate extracted batches before any merge work begins.
// Dependencies: serde, serde_json, crate::core::{change, identifiers, time}
// ============================================================================

//! ## Overview
//! A [`QualitySuite`] is an ordered list of [`Expectation`]s evaluated against
//! every record of a batch. Evaluation never mutates the batch; it produces a
//! [`QualityReport`] that the pipeline inspects before merging. A report with
//! violations blocks the batch entirely so the watermark stays untouched and
//! the next run re-extracts the same window.
//!
//! Attribute expectations skip delete records, whose payloads are routinely
//! empty upstream. [`Expectation::ResolvableKey`] applies to every operation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::change::Batch;
use crate::core::change::ChangeRecord;
use crate::core::identifiers::SourceTableId;
use crate::core::time::EventTime;

// ============================================================================
// SECTION: Expectations
// ============================================================================

/// One declarative quality expectation.
///
/// Format and range expectations pass on absent attributes; combine them with
/// [`Expectation::NotNull`] when the attribute is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expectation {
    /// The attribute must be present and not JSON null.
    ///
    /// Zero tolerance: a single missing or null value fails the batch. There
    /// is no sampled null-rate threshold.
    NotNull {
        /// Attribute name to inspect.
        attribute: String,
    },
    /// The attribute, when present, must be a number strictly greater than zero.
    Positive {
        /// Attribute name to inspect.
        attribute: String,
    },
    /// The attribute, when present, must look like an email address.
    EmailFormat {
        /// Attribute name to inspect.
        attribute: String,
    },
    /// The record's natural key must be non-empty.
    ResolvableKey,
}

impl Expectation {
    /// Short label used in reports and alerts.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NotNull { .. } => "not_null",
            Self::Positive { .. } => "positive",
            Self::EmailFormat { .. } => "email_format",
            Self::ResolvableKey => "resolvable_key",
        }
    }

    /// Returns true when the expectation also applies to delete records.
    const fn applies_to_deletes(&self) -> bool {
        matches!(self, Self::ResolvableKey)
    }

    /// Evaluates the expectation against one record.
    fn check(&self, record: &ChangeRecord) -> Option<String> {
        match self {
            Self::NotNull { attribute } => match record.attributes.get(attribute) {
                None => Some(format!("attribute {attribute} is missing")),
                Some(Value::Null) => Some(format!("attribute {attribute} is null")),
                Some(_) => None,
            },
            Self::Positive { attribute } => match record.attributes.get(attribute) {
                None | Some(Value::Null) => None,
                Some(Value::Number(number)) => {
                    if number.as_f64().is_some_and(|value| value > 0.0) {
                        None
                    } else {
                        Some(format!("attribute {attribute} is not positive"))
                    }
                }
                Some(_) => Some(format!("attribute {attribute} is not numeric")),
            },
            Self::EmailFormat { attribute } => match record.attributes.get(attribute) {
                None | Some(Value::Null) => None,
                Some(Value::String(text)) => {
                    if looks_like_email(text) {
                        None
                    } else {
                        Some(format!("attribute {attribute} is not a valid email"))
                    }
                }
                Some(_) => Some(format!("attribute {attribute} is not a string")),
            },
            Self::ResolvableKey => {
                if record.natural_key.is_empty() {
                    Some("natural key is empty".to_owned())
                } else {
                    None
                }
            }
        }
    }
}

/// Ordered collection of expectations applied to every batch of a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitySuite {
    /// Expectations evaluated in order against each record.
    pub expectations: Vec<Expectation>,
}

impl QualitySuite {
    /// Creates a suite from a list of expectations.
    #[must_use]
    pub const fn new(expectations: Vec<Expectation>) -> Self {
        Self { expectations }
    }

    /// Returns true when the suite has no expectations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expectations.is_empty()
    }

    /// Evaluates every expectation against every record of the batch.
    #[must_use]
    pub fn evaluate(&self, batch: &Batch) -> QualityReport {
        let mut violations = Vec::new();
        for record in &batch.records {
            for expectation in &self.expectations {
                if record.op.is_delete() && !expectation.applies_to_deletes() {
                    continue;
                }
                if let Some(message) = expectation.check(record) {
                    violations.push(QualityViolationDetail {
                        natural_key: record.natural_key.to_string(),
                        event_time: record.event_time,
                        expectation: expectation.label().to_owned(),
                        message,
                    });
                }
            }
        }
        QualityReport {
            source_table: batch.source_table.clone(),
            records_checked: batch.records.len(),
            violations,
        }
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// One failed expectation on one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityViolationDetail {
    /// Natural key of the offending record.
    pub natural_key: String,
    /// Event time of the offending record.
    pub event_time: EventTime,
    /// Label of the failed expectation.
    pub expectation: String,
    /// Human-readable description of the failure.
    pub message: String,
}

/// Outcome of evaluating a quality suite against one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Source table the batch came from.
    pub source_table: SourceTableId,
    /// Number of records inspected.
    pub records_checked: usize,
    /// Every violation found, in record order.
    pub violations: Vec<QualityViolationDetail>,
}

impl QualityReport {
    /// Returns true when no expectation failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

/// Conservative structural email check: one `@`, non-empty local part, and a
/// dotted domain without leading or trailing dots or whitespace.
fn looks_like_email(text: &str) -> bool {
    let mut parts = text.splitn(2, '@');
    let Some(local) = parts.next() else {
        return false;
    };
    let Some(domain) = parts.next() else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    if text.chars().any(char::is_whitespace) || domain.contains('@') {
        return false;
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return false;
    }
    !domain.contains("..")
}
