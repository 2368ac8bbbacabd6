// crates/delta-ledger-core/src/core/change.rs
// ============================================================================
// Module: Delta Ledger Change Records
// Description: Change records, operations, and extracted batches.
// Purpose: Model CDC output with deterministic batch ordering.
// Dependencies: serde, serde_json, crate::core::{hashing, identifiers, time}
// ============================================================================

//! ## Overview
//! A [`ChangeRecord`] is one captured operation from the operational source:
//! identified by `(natural_key, source_table, event_time)`, immutable once
//! extracted. A [`Batch`] is a bounded run of records with a deterministic
//! processing order (event time, then natural key, then extraction sequence),
//! so merge outcomes are reproducible across re-deliveries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::MAX_ATTRIBUTE_BYTES;
use crate::core::hashing::hash_canonical_json_with_limit;
use crate::core::identifiers::NaturalKey;
use crate::core::identifiers::SourceTableId;
use crate::core::time::EventTime;

// ============================================================================
// SECTION: Attributes
// ============================================================================

/// Attribute payload for one entity state (name to JSON value).
///
/// `BTreeMap` keeps attribute order canonical for hashing and display.
pub type AttributeMap = BTreeMap<String, Value>;

/// Computes the canonical digest of an attribute payload.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails or the payload exceeds
/// [`MAX_ATTRIBUTE_BYTES`].
pub fn attribute_hash(attributes: &AttributeMap) -> Result<HashDigest, HashError> {
    hash_canonical_json_with_limit(DEFAULT_HASH_ALGORITHM, attributes, MAX_ATTRIBUTE_BYTES)
}

// ============================================================================
// SECTION: Change Records
// ============================================================================

/// Operation carried by a change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    /// Entity first seen by the source.
    Insert,
    /// Entity attributes changed.
    Update,
    /// Entity removed from the source.
    Delete,
}

impl ChangeOp {
    /// Returns true for delete operations.
    #[must_use]
    pub const fn is_delete(self) -> bool {
        matches!(self, Self::Delete)
    }
}

/// One captured change from the operational source.
///
/// # Invariants
/// - Uniquely identified by `(natural_key, source_table, event_time)`.
/// - Immutable once extracted; re-delivery carries identical content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Entity identifier assigned by the source system.
    pub natural_key: NaturalKey,
    /// Source table the change belongs to.
    pub source_table: SourceTableId,
    /// Entity attribute state at `event_time` (empty for deletes).
    pub attributes: AttributeMap,
    /// Instant the change happened in the source.
    pub event_time: EventTime,
    /// Instant the change was captured by extraction.
    pub extracted_at: EventTime,
    /// Operation kind.
    pub op: ChangeOp,
}

impl ChangeRecord {
    /// Computes the canonical digest of this record's attributes.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails or the payload
    /// exceeds the attribute size limit.
    pub fn attribute_hash(&self) -> Result<HashDigest, HashError> {
        attribute_hash(&self.attributes)
    }
}

// ============================================================================
// SECTION: Batches
// ============================================================================

/// Bounded ordered sequence of change records from one extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Source table all records belong to.
    pub source_table: SourceTableId,
    /// Records in deterministic processing order after [`Batch::normalize`].
    pub records: Vec<ChangeRecord>,
}

impl Batch {
    /// Creates a batch for one source table.
    #[must_use]
    pub const fn new(source_table: SourceTableId, records: Vec<ChangeRecord>) -> Self {
        Self {
            source_table,
            records,
        }
    }

    /// Returns true when the batch carries no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the number of records in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Normalizes the batch into deterministic processing order.
    ///
    /// Exact duplicates of `(natural_key, event_time)` collapse to the record
    /// with the latest `extracted_at` (extraction order breaks ties), then
    /// records sort by event time ascending, natural key, and extraction
    /// sequence.
    pub fn normalize(&mut self) {
        let records = std::mem::take(&mut self.records);
        let mut survivors: BTreeMap<(NaturalKey, EventTime), (EventTime, usize, ChangeRecord)> =
            BTreeMap::new();
        for (sequence, record) in records.into_iter().enumerate() {
            let slot = (record.natural_key.clone(), record.event_time);
            let candidate = (record.extracted_at, sequence, record);
            match survivors.get(&slot) {
                Some((extracted_at, existing_sequence, _))
                    if (*extracted_at, *existing_sequence) > (candidate.0, candidate.1) => {}
                _ => {
                    survivors.insert(slot, candidate);
                }
            }
        }
        let mut ordered: Vec<(EventTime, NaturalKey, usize, ChangeRecord)> = survivors
            .into_values()
            .map(|(_, sequence, record)| {
                (record.event_time, record.natural_key.clone(), sequence, record)
            })
            .collect();
        ordered.sort_by(|left, right| {
            (left.0, &left.1, left.2).cmp(&(right.0, &right.1, right.2))
        });
        self.records = ordered.into_iter().map(|(_, _, _, record)| record).collect();
    }

    /// Returns the latest event time in the batch, if any.
    #[must_use]
    pub fn max_event_time(&self) -> Option<EventTime> {
        self.records.iter().map(|record| record.event_time).max()
    }

    /// Returns the latest extraction time in the batch, if any.
    #[must_use]
    pub fn max_extracted_at(&self) -> Option<EventTime> {
        self.records.iter().map(|record| record.extracted_at).max()
    }

    /// Returns every event time in the batch.
    #[must_use]
    pub fn event_times(&self) -> Vec<EventTime> {
        self.records.iter().map(|record| record.event_time).collect()
    }
}
