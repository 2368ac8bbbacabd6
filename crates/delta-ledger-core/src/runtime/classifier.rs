// crates/delta-ledger-core/src/runtime/classifier.rs
// ============================================================================
// Module: Delta Ledger Late-Arrival Classifier
// Description: On-time/late partitioning and history snapshot capture.
// Purpose: Prepare a normalized batch and its read view for merge planning.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The classifier normalizes a batch (in-batch duplicate collapse, stable
//! ordering), splits its records into on-time and late against the durable
//! watermark, and captures a [`HistorySnapshot`] of every touched key. The
//! snapshot is the merge planner's only read view; it must be captured under
//! the source table's lock so the planner sees a history no concurrent run
//! can invalidate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::core::change::Batch;
use crate::core::change::ChangeRecord;
use crate::core::dimension::DimensionVersion;
use crate::core::identifiers::NaturalKey;
use crate::core::identifiers::SourceTableId;
use crate::core::watermark::Watermark;
use crate::interfaces::DimensionStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: History Snapshot
// ============================================================================

/// Immutable per-key history view captured before merge planning.
#[derive(Debug, Clone, Default)]
pub struct HistorySnapshot {
    /// Stored histories keyed by natural key, each sorted by `valid_from`.
    entries: BTreeMap<NaturalKey, Vec<DimensionVersion>>,
}

impl HistorySnapshot {
    /// Captures the stored history of every key in the iterator.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when a history load fails.
    pub fn capture<D: DimensionStore>(
        store: &D,
        source_table: &SourceTableId,
        keys: impl IntoIterator<Item = NaturalKey>,
    ) -> Result<Self, StoreError> {
        let mut entries = BTreeMap::new();
        for key in keys {
            let history = store.history(source_table, &key)?;
            entries.insert(key, history);
        }
        Ok(Self {
            entries,
        })
    }

    /// Returns the captured history for a key, empty when the key is new.
    #[must_use]
    pub fn history(&self, key: &NaturalKey) -> &[DimensionVersion] {
        self.entries.get(key).map_or(&[], Vec::as_slice)
    }

    /// Returns the number of captured keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no key was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// SECTION: Classified Batches
// ============================================================================

/// A normalized batch split against the watermark, with its read view.
#[derive(Debug, Clone)]
pub struct ClassifiedBatch {
    /// Source table the batch came from.
    pub source_table: SourceTableId,
    /// Normalized records in merge order.
    pub records: Vec<ChangeRecord>,
    /// Records with an event time at or past the watermark.
    pub on_time_count: usize,
    /// Records with an event time before the watermark.
    pub late_count: usize,
    /// Stored history of every key the batch touches.
    pub snapshot: HistorySnapshot,
}

// ============================================================================
// SECTION: Classifier
// ============================================================================

/// Splits batches into on-time and late records and captures their read view.
#[derive(Debug, Clone, Copy, Default)]
pub struct LateArrivalClassifier;

impl LateArrivalClassifier {
    /// Normalizes the batch, splits it against the watermark, and captures
    /// the history snapshot for every touched key.
    ///
    /// A record is late when its event time is strictly before the
    /// watermark's last merged event time. On a first run the origin
    /// watermark classifies everything as on-time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when capturing the snapshot fails.
    pub fn classify<D: DimensionStore>(
        &self,
        store: &D,
        watermark: &Watermark,
        mut batch: Batch,
    ) -> Result<ClassifiedBatch, StoreError> {
        batch.normalize();
        let late_count = batch
            .records
            .iter()
            .filter(|record| record.event_time < watermark.last_event_time)
            .count();
        let on_time_count = batch.records.len() - late_count;
        let keys: BTreeSet<NaturalKey> = batch
            .records
            .iter()
            .map(|record| record.natural_key.clone())
            .collect();
        let snapshot = HistorySnapshot::capture(store, &batch.source_table, keys)?;
        Ok(ClassifiedBatch {
            source_table: batch.source_table,
            records: batch.records,
            on_time_count,
            late_count,
            snapshot,
        })
    }
}
