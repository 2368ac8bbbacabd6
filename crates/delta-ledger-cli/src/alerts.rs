// crates/delta-ledger-cli/src/alerts.rs
// ============================================================================
// Module: CLI Alert Sinks
// Description: Alert sink backends selectable from configuration.
// Purpose: Deliver run notifications to a JSONL file or drop them.
// Dependencies: delta-ledger-core, serde, serde_json
// ============================================================================

//! ## Overview
//! The JSONL sink appends one JSON object per delivery, tagged with a `kind`
//! field so alerts and run summaries share one file. Append failures surface
//! as sink errors; the pipeline already treats delivery as best-effort, so a
//! broken sink never fails a run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use delta_ledger_core::AlertError;
use delta_ledger_core::AlertSink;
use delta_ledger_core::Notification;
use delta_ledger_core::NullAlertSink;
use delta_ledger_core::RunSummary;
use serde::Serialize;

// ============================================================================
// SECTION: JSONL Sink
// ============================================================================

/// Alert sink appending JSON lines to a file.
///
/// The file is opened per delivery, so the sink holds no handle between runs
/// and the file may be rotated away at any time.
#[derive(Debug, Clone)]
pub(crate) struct JsonlAlertSink {
    /// Output file the sink appends to.
    path: PathBuf,
}

impl JsonlAlertSink {
    /// Creates a sink appending to the path.
    #[must_use]
    pub(crate) const fn new(path: PathBuf) -> Self {
        Self {
            path,
        }
    }

    /// Serializes a delivery and appends it as one line.
    fn append<T: Serialize>(&self, kind: &str, body: &T) -> Result<(), AlertError> {
        let line = serde_json::to_string(&DeliveryLine {
            kind,
            body,
        })
        .map_err(|err| AlertError::Sink(format!("cannot encode {kind}: {err}")))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| {
                AlertError::Sink(format!("cannot open {}: {err}", self.path.display()))
            })?;
        writeln!(file, "{line}")
            .map_err(|err| AlertError::Sink(format!("cannot append {}: {err}", self.path.display())))
    }
}

impl AlertSink for JsonlAlertSink {
    fn alert(&self, notification: &Notification) -> Result<(), AlertError> {
        self.append("alert", notification)
    }

    fn summary(&self, summary: &RunSummary) -> Result<(), AlertError> {
        self.append("summary", summary)
    }
}

/// One line of the JSONL alert file.
#[derive(Serialize)]
struct DeliveryLine<'a, T: Serialize> {
    /// Delivery kind: `alert` or `summary`.
    kind: &'a str,
    /// Delivery payload.
    #[serde(flatten)]
    body: &'a T,
}

// ============================================================================
// SECTION: Configured Sink
// ============================================================================

/// Alert sink backend selected by the `[alerts]` section.
#[derive(Debug, Clone)]
pub(crate) enum CliAlertSink {
    /// Discards every delivery.
    Null(NullAlertSink),
    /// Appends deliveries to a JSONL file.
    Jsonl(JsonlAlertSink),
}

impl AlertSink for CliAlertSink {
    fn alert(&self, notification: &Notification) -> Result<(), AlertError> {
        match self {
            Self::Null(sink) => sink.alert(notification),
            Self::Jsonl(sink) => sink.alert(notification),
        }
    }

    fn summary(&self, summary: &RunSummary) -> Result<(), AlertError> {
        match self {
            Self::Null(sink) => sink.summary(summary),
            Self::Jsonl(sink) => sink.summary(summary),
        }
    }
}
