// crates/delta-ledger-core/src/runtime/checkpoint.rs
// ============================================================================
// Module: Delta Ledger Checkpoint Manager
// Description: Watermark resolution, monotone advancement, and run audit.
// Purpose: Own every watermark mutation so recovery stays exactly-once-like.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The checkpoint manager is the only writer of watermarks. It resolves the
//! starting watermark for a run (the origin when none is stored), refuses
//! any advancement that would move a cursor backward, and appends the run
//! audit trail. A watermark is committed only after the matching merge is
//! durably visible; a crash between the two leaves a stale watermark whose
//! redelivered records the merger plans as no-ops.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::audit::RunAuditRecord;
use crate::core::identifiers::SourceTableId;
use crate::core::watermark::Watermark;
use crate::interfaces::CheckpointError;
use crate::interfaces::CheckpointStore;

// ============================================================================
// SECTION: Checkpoint Manager
// ============================================================================

/// Sole owner of watermark state transitions.
#[derive(Debug, Clone)]
pub struct CheckpointManager<C: CheckpointStore> {
    /// Backing checkpoint store.
    store: C,
}

impl<C: CheckpointStore> CheckpointManager<C> {
    /// Creates a manager over a checkpoint store.
    #[must_use]
    pub const fn new(store: C) -> Self {
        Self {
            store,
        }
    }

    /// Resolves the starting watermark for a source table.
    ///
    /// Returns the stored watermark, or the origin watermark when the source
    /// table has never committed one.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] when loading fails.
    pub fn resolve(&self, source_table: &SourceTableId) -> Result<Watermark, CheckpointError> {
        match self.store.load_watermark(source_table)? {
            Some(watermark) => Ok(watermark),
            None => Ok(Watermark::origin(source_table.clone())),
        }
    }

    /// Durably advances the watermark after a merged batch.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Corrupt`] when `next` would move a cursor
    /// backward, and the store's error when the write fails. In both cases
    /// the previous watermark remains in effect.
    pub fn advance(&self, current: &Watermark, next: &Watermark) -> Result<(), CheckpointError> {
        if current.source_table != next.source_table {
            return Err(CheckpointError::Corrupt(format!(
                "watermark advance crosses source tables: {} to {}",
                current.source_table, next.source_table
            )));
        }
        if !current.permits_advance_to(next) {
            return Err(CheckpointError::Corrupt(format!(
                "watermark regression for source table {}",
                next.source_table
            )));
        }
        self.store.commit_watermark(next)
    }

    /// Appends one run audit record.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] when the write fails.
    pub fn record_run(&self, record: &RunAuditRecord) -> Result<(), CheckpointError> {
        self.store.record_run(record)
    }

    /// Loads the most recent audit records for a source table, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] when loading fails.
    pub fn recent_runs(
        &self,
        source_table: &SourceTableId,
        limit: usize,
    ) -> Result<Vec<RunAuditRecord>, CheckpointError> {
        self.store.recent_runs(source_table, limit)
    }

    /// Loads the stored watermark without falling back to the origin.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] when loading fails.
    pub fn stored_watermark(
        &self,
        source_table: &SourceTableId,
    ) -> Result<Option<Watermark>, CheckpointError> {
        self.store.load_watermark(source_table)
    }
}
