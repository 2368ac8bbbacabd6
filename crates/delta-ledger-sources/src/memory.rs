// crates/delta-ledger-sources/src/memory.rs
// ============================================================================
// Module: In-Memory Sources
// Description: Push-based change and fact sources backed by shared buffers.
// Purpose: Feed pipelines and rollups from memory in tests and embeddings.
// Dependencies: delta-ledger-core
// ============================================================================

//! ## Overview
//! Both sources buffer their records behind a shared mutex, so clones observe
//! one buffer: a test can hand a clone to a pipeline and keep pushing records
//! through its own handle between runs. Extraction filters by source table
//! and the watermark's extraction cursor, orders by capture position, and
//! truncates to the requested batch size.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use delta_ledger_core::Batch;
use delta_ledger_core::ChangeRecord;
use delta_ledger_core::ChangeSource;
use delta_ledger_core::EventTime;
use delta_ledger_core::ExtractError;
use delta_ledger_core::FactRecord;
use delta_ledger_core::FactSource;
use delta_ledger_core::FactSourceError;
use delta_ledger_core::SourceTableId;
use delta_ledger_core::Watermark;

// ============================================================================
// SECTION: Change Source
// ============================================================================

/// In-memory change source for tests and embedding.
///
/// # Invariants
/// - Records pushed through any clone are visible to every other clone.
/// - Extraction never mutates the buffer; redelivery is driven solely by the
///   caller's watermark.
#[derive(Debug, Clone, Default)]
pub struct StaticChangeSource {
    /// Shared record buffer.
    records: Arc<Mutex<Vec<ChangeRecord>>>,
}

impl StaticChangeSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source preloaded with records.
    #[must_use]
    pub fn with_records(records: Vec<ChangeRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    /// Appends one record to the shared buffer.
    ///
    /// A poisoned buffer drops the record; the next extraction reports the
    /// poisoning instead.
    pub fn push(&self, record: ChangeRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }

    /// Locks the shared buffer, reporting poison as unavailability.
    fn lock(&self) -> Result<MutexGuard<'_, Vec<ChangeRecord>>, ExtractError> {
        self.records
            .lock()
            .map_err(|_| ExtractError::Unavailable("change source mutex poisoned".to_string()))
    }
}

impl ChangeSource for StaticChangeSource {
    fn extract(
        &self,
        source_table: &SourceTableId,
        since: &Watermark,
        max_batch_size: usize,
    ) -> Result<Batch, ExtractError> {
        let records = self.lock()?;
        let mut due: Vec<ChangeRecord> = records
            .iter()
            .filter(|record| {
                record.source_table == *source_table
                    && record.extracted_at > since.last_extracted_at
            })
            .cloned()
            .collect();
        drop(records);
        due.sort_by(capture_position);
        due.truncate(max_batch_size);
        Ok(Batch::new(source_table.clone(), due))
    }
}

// ============================================================================
// SECTION: Fact Source
// ============================================================================

/// In-memory fact source for tests and embedding.
///
/// # Invariants
/// - Facts pushed through any clone are visible to every other clone.
#[derive(Debug, Clone, Default)]
pub struct StaticFactSource {
    /// Shared fact buffer.
    facts: Arc<Mutex<Vec<FactRecord>>>,
}

impl StaticFactSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source preloaded with facts.
    #[must_use]
    pub fn with_facts(facts: Vec<FactRecord>) -> Self {
        Self {
            facts: Arc::new(Mutex::new(facts)),
        }
    }

    /// Appends one fact to the shared buffer.
    ///
    /// A poisoned buffer drops the fact; the next read reports the poisoning
    /// instead.
    pub fn push(&self, fact: FactRecord) {
        if let Ok(mut facts) = self.facts.lock() {
            facts.push(fact);
        }
    }

    /// Locks the shared buffer, reporting poison as unavailability.
    fn lock(&self) -> Result<MutexGuard<'_, Vec<FactRecord>>, FactSourceError> {
        self.facts
            .lock()
            .map_err(|_| FactSourceError::Unavailable("fact source mutex poisoned".to_string()))
    }
}

impl FactSource for StaticFactSource {
    fn facts_between(
        &self,
        start: EventTime,
        end: EventTime,
    ) -> Result<Vec<FactRecord>, FactSourceError> {
        let facts = self.lock()?;
        let mut due: Vec<FactRecord> = facts
            .iter()
            .filter(|fact| start <= fact.event_time && fact.event_time < end)
            .cloned()
            .collect();
        drop(facts);
        due.sort_by(|left, right| {
            left.event_time
                .cmp(&right.event_time)
                .then_with(|| left.natural_key.cmp(&right.natural_key))
        });
        Ok(due)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Orders change records by capture position, with deterministic tie-breaks.
fn capture_position(left: &ChangeRecord, right: &ChangeRecord) -> Ordering {
    left.extracted_at
        .cmp(&right.extracted_at)
        .then_with(|| left.event_time.cmp(&right.event_time))
        .then_with(|| left.natural_key.cmp(&right.natural_key))
}
