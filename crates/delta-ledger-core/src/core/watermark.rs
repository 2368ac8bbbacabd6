// crates/delta-ledger-core/src/core/watermark.rs
// ============================================================================
// Module: Delta Ledger Watermarks
// Description: High-water marks for committed change streams.
// Purpose: Model the durable cursor advanced after each merged batch.
// Dependencies: serde, crate::core::{change, identifiers, time}
// ============================================================================

//! ## Overview
//! A [`Watermark`] marks the most recently durably merged point of one change
//! stream. `last_extracted_at` is the exact redelivery cutoff (records
//! captured after it are due); `last_event_time` tracks the newest merged
//! event and backs the on-time/late split. Watermarks are owned by the
//! checkpoint manager and advance monotonically, only after a merge commits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::change::Batch;
use crate::core::identifiers::SourceTableId;
use crate::core::time::EventTime;

// ============================================================================
// SECTION: Watermark
// ============================================================================

/// High-water mark of successfully merged changes for one source table.
///
/// # Invariants
/// - Both cursors advance monotonically; a commit never regresses either.
/// - Mutated only by the checkpoint manager, after the matching merge batch
///   is durably visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    /// Source table the watermark belongs to.
    pub source_table: SourceTableId,
    /// Newest event time among merged records.
    pub last_event_time: EventTime,
    /// Newest extraction time among merged records.
    pub last_extracted_at: EventTime,
}

impl Watermark {
    /// Returns the origin watermark (epoch) for a first run.
    #[must_use]
    pub const fn origin(source_table: SourceTableId) -> Self {
        Self {
            source_table,
            last_event_time: EventTime::ORIGIN,
            last_extracted_at: EventTime::ORIGIN,
        }
    }

    /// Returns this watermark advanced by a merged batch (monotone max).
    ///
    /// An empty batch returns the watermark unchanged.
    #[must_use]
    pub fn advanced_by(&self, batch: &Batch) -> Self {
        let last_event_time = batch
            .max_event_time()
            .map_or(self.last_event_time, |newest| self.last_event_time.max_with(newest));
        let last_extracted_at = batch
            .max_extracted_at()
            .map_or(self.last_extracted_at, |newest| self.last_extracted_at.max_with(newest));
        Self {
            source_table: self.source_table.clone(),
            last_event_time,
            last_extracted_at,
        }
    }

    /// Returns the componentwise maximum of both watermarks, keeping this
    /// watermark's source table.
    ///
    /// A seeded backfill cursor may trail the stored watermark; committing
    /// the maximum of the two keeps the stored cursor monotone.
    #[must_use]
    pub fn max_with(&self, other: &Self) -> Self {
        Self {
            source_table: self.source_table.clone(),
            last_event_time: self.last_event_time.max_with(other.last_event_time),
            last_extracted_at: self.last_extracted_at.max_with(other.last_extracted_at),
        }
    }

    /// Returns true when `other` does not move either cursor backward.
    #[must_use]
    pub fn permits_advance_to(&self, other: &Self) -> bool {
        other.last_event_time >= self.last_event_time
            && other.last_extracted_at >= self.last_extracted_at
    }

    /// Returns an extraction view with the redelivery cutoff moved back by
    /// `overlap_ms`, floored at the origin.
    ///
    /// The overlap widens the window a source re-reads so records whose
    /// capture order lagged their event order are still picked up. The
    /// durable watermark itself never regresses; only the view handed to the
    /// source does.
    #[must_use]
    pub fn with_extraction_overlap(&self, overlap_ms: i64) -> Self {
        let lowered = self
            .last_extracted_at
            .saturating_sub_millis(overlap_ms)
            .max_with(EventTime::ORIGIN);
        Self {
            source_table: self.source_table.clone(),
            last_event_time: self.last_event_time,
            last_extracted_at: lowered,
        }
    }
}
