// crates/delta-ledger-core/src/runtime/extractor.rs
// ============================================================================
// Module: Delta Ledger Extractor
// Description: Watermark-driven batch extraction from change sources.
// Purpose: Pull bounded, validated change batches for one pipeline run.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The extractor turns the durable watermark into the extraction view handed
//! to a [`ChangeSource`], applies the configured redelivery overlap, and
//! validates the returned batch before downstream stages see it. Sources are
//! at-least-once; everything the extractor returns may contain records that
//! were already merged in an earlier run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::change::Batch;
use crate::core::identifiers::SourceTableId;
use crate::core::watermark::Watermark;
use crate::interfaces::ChangeSource;
use crate::interfaces::ExtractError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum number of records per extracted batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;

// ============================================================================
// SECTION: Extractor
// ============================================================================

/// Watermark-driven batch extractor.
#[derive(Debug, Clone)]
pub struct Extractor {
    /// Maximum records per batch.
    max_batch_size: usize,
    /// Redelivery overlap applied to the extraction cursor, in milliseconds.
    late_window_ms: i64,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_SIZE, 0)
    }
}

impl Extractor {
    /// Creates an extractor with an explicit batch bound and overlap.
    #[must_use]
    pub const fn new(max_batch_size: usize, late_window_ms: i64) -> Self {
        Self {
            max_batch_size,
            late_window_ms,
        }
    }

    /// Maximum records per batch.
    #[must_use]
    pub const fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Pulls the next batch after the watermark and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Unavailable`] when the source cannot be
    /// reached and [`ExtractError::SchemaMismatch`] when the source returns
    /// a batch for the wrong table, oversized, or otherwise malformed.
    pub fn pull<S: ChangeSource>(
        &self,
        source: &S,
        source_table: &SourceTableId,
        watermark: &Watermark,
    ) -> Result<Batch, ExtractError> {
        let view = watermark.with_extraction_overlap(self.late_window_ms);
        let batch = source.extract(source_table, &view, self.max_batch_size)?;
        if batch.source_table != *source_table {
            return Err(ExtractError::SchemaMismatch(format!(
                "source returned batch for table {} while extracting {source_table}",
                batch.source_table
            )));
        }
        if batch.len() > self.max_batch_size {
            return Err(ExtractError::SchemaMismatch(format!(
                "source returned {} records, exceeding the batch bound of {}",
                batch.len(),
                self.max_batch_size
            )));
        }
        Ok(batch)
    }
}
