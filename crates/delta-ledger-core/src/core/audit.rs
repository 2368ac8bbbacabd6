// crates/delta-ledger-core/src/core/audit.rs
// ============================================================================
// Module: Delta Ledger Run Audit
// Description: Run audit records, alert notifications, and run summaries.
// Purpose: Record what every pipeline run did and surface it to operators.
// Dependencies: serde, crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! Every pipeline run, successful or not, leaves one [`RunAuditRecord`] in
//! the checkpoint store. Alert sinks receive [`Notification`]s for failures
//! and warnings and a [`RunSummary`] after each successful run. All three are
//! plain serializable data so sinks can forward them verbatim.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RunId;
use crate::core::identifiers::SourceTableId;
use crate::core::time::EventTime;

// ============================================================================
// SECTION: Run Status
// ============================================================================

/// Terminal status of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run merged its batch and committed the checkpoint.
    Succeeded,
    /// The run failed; the watermark was left untouched.
    Failed,
}

impl RunStatus {
    /// Stable wire label for the status.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

// ============================================================================
// SECTION: Audit Records
// ============================================================================

/// Durable record of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAuditRecord {
    /// Identifier of the run.
    pub run_id: RunId,
    /// Source table the run processed.
    pub source_table: SourceTableId,
    /// Wall-clock start of the run.
    pub started_at: EventTime,
    /// Wall-clock end of the run.
    pub finished_at: EventTime,
    /// Terminal status.
    pub status: RunStatus,
    /// Change records returned by the source for this run.
    pub records_extracted: u64,
    /// Change records that altered dimension history.
    pub records_merged: u64,
    /// Late-arriving records spliced into existing history.
    pub late_corrections: u64,
    /// Failure description when the run failed.
    pub message: Option<String>,
}

impl RunAuditRecord {
    /// Run duration in milliseconds.
    #[must_use]
    pub const fn duration_ms(&self) -> u64 {
        self.finished_at
            .as_unix_millis()
            .saturating_sub(self.started_at.as_unix_millis())
            .unsigned_abs()
    }
}

// ============================================================================
// SECTION: Notifications
// ============================================================================

/// Severity attached to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational event, no action required.
    Info,
    /// Degraded condition worth operator attention.
    Warning,
    /// Failure that stopped a run.
    Error,
}

impl Severity {
    /// Stable wire label for the severity.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Operator-facing notification emitted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Severity of the event.
    pub severity: Severity,
    /// Source table the event concerns.
    pub source_table: SourceTableId,
    /// Run the event occurred in.
    pub run_id: RunId,
    /// Human-readable description.
    pub message: String,
}

/// Summary emitted after each successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Identifier of the run.
    pub run_id: RunId,
    /// Source table the run processed.
    pub source_table: SourceTableId,
    /// Change records returned by the source for this run.
    pub records_extracted: u64,
    /// Change records that altered dimension history.
    pub records_merged: u64,
    /// Late-arriving records spliced into existing history.
    pub late_corrections: u64,
    /// Run duration in milliseconds.
    pub duration_ms: u64,
}
