// crates/delta-ledger-core/tests/common/mod.rs
// ============================================================================
// Module: Ledger Test Helpers
// Description: Shared record builders and in-memory backends for tests.
// Purpose: Reduce duplication across delta-ledger-core integration tests.
// ============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::str::FromStr;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use bigdecimal::BigDecimal;
use delta_ledger_core::AttributeMap;
use delta_ledger_core::Batch;
use delta_ledger_core::ChangeOp;
use delta_ledger_core::ChangeRecord;
use delta_ledger_core::ChangeSource;
use delta_ledger_core::DimensionStore;
use delta_ledger_core::DimensionVersion;
use delta_ledger_core::EventTime;
use delta_ledger_core::ExtractError;
use delta_ledger_core::FactRecord;
use delta_ledger_core::FactSource;
use delta_ledger_core::FactSourceError;
use delta_ledger_core::LateArrivalClassifier;
use delta_ledger_core::MemoryLedgerStore;
use delta_ledger_core::MergeOutcome;
use delta_ledger_core::NaturalKey;
use delta_ledger_core::RollupRunner;
use delta_ledger_core::Scd2Merger;
use delta_ledger_core::SourceTableId;
use delta_ledger_core::Watermark;
use serde_json::json;

/// Source table shared by every test scenario.
pub fn source_table() -> SourceTableId {
    SourceTableId::new("customers")
}

/// Origin watermark for the shared source table.
pub fn origin_watermark() -> Watermark {
    Watermark::origin(source_table())
}

/// Watermark with explicit cursors for the shared source table.
pub fn watermark(last_event_ms: i64, last_extracted_ms: i64) -> Watermark {
    Watermark {
        source_table: source_table(),
        last_event_time: EventTime::from_unix_millis(last_event_ms),
        last_extracted_at: EventTime::from_unix_millis(last_extracted_ms),
    }
}

/// Builds an upsert change record carrying a `tier` attribute.
pub fn upsert(key: &str, event_ms: i64, extracted_ms: i64, tier: &str) -> ChangeRecord {
    let mut attributes = AttributeMap::new();
    attributes.insert("tier".to_owned(), json!(tier));
    attributes.insert("email".to_owned(), json!(format!("{key}@example.com")));
    ChangeRecord {
        natural_key: NaturalKey::new(key),
        source_table: source_table(),
        attributes,
        event_time: EventTime::from_unix_millis(event_ms),
        extracted_at: EventTime::from_unix_millis(extracted_ms),
        op: ChangeOp::Update,
    }
}

/// Builds a delete change record with an empty payload.
pub fn delete(key: &str, event_ms: i64, extracted_ms: i64) -> ChangeRecord {
    ChangeRecord {
        natural_key: NaturalKey::new(key),
        source_table: source_table(),
        attributes: AttributeMap::new(),
        event_time: EventTime::from_unix_millis(event_ms),
        extracted_at: EventTime::from_unix_millis(extracted_ms),
        op: ChangeOp::Delete,
    }
}

/// Wraps records into a batch for the shared source table.
pub fn batch(records: Vec<ChangeRecord>) -> Batch {
    Batch::new(source_table(), records)
}

/// Classifies one batch against the store, plans it, and applies the plan.
pub fn merge(
    store: &MemoryLedgerStore,
    since: &Watermark,
    records: Vec<ChangeRecord>,
) -> MergeOutcome {
    let classified = LateArrivalClassifier
        .classify(store, since, batch(records))
        .expect("classify batch");
    let outcome = Scd2Merger.plan(&classified).expect("plan merge");
    if !outcome.plan.is_empty() {
        store.apply(&outcome.plan).expect("apply plan");
    }
    outcome
}

/// Loads the stored history of one key.
pub fn history_of(store: &MemoryLedgerStore, key: &str) -> Vec<DimensionVersion> {
    store.history(&source_table(), &NaturalKey::new(key)).expect("load history")
}

/// Loads the current version of one key.
pub fn current_of(store: &MemoryLedgerStore, key: &str) -> Option<DimensionVersion> {
    store.current(&source_table(), &NaturalKey::new(key)).expect("load current")
}

/// Builds a fact record with an optional `category` grouping attribute.
pub fn fact(key: &str, event_ms: i64, amount: &str, category: Option<&str>) -> FactRecord {
    let mut attributes = AttributeMap::new();
    if let Some(category) = category {
        attributes.insert("category".to_owned(), json!(category));
    }
    FactRecord {
        natural_key: NaturalKey::new(key),
        event_time: EventTime::from_unix_millis(event_ms),
        amount: BigDecimal::from_str(amount).expect("decimal amount"),
        attributes,
    }
}

/// Change source over a fixed record set, filtered by the extraction cursor.
pub struct TableSource {
    /// Every record the source can deliver.
    records: Vec<ChangeRecord>,
}

impl TableSource {
    /// Creates a source over a fixed record set.
    pub fn new(records: Vec<ChangeRecord>) -> Self {
        Self {
            records,
        }
    }
}

impl ChangeSource for TableSource {
    fn extract(
        &self,
        source_table: &SourceTableId,
        since: &Watermark,
        max_batch_size: usize,
    ) -> Result<Batch, ExtractError> {
        let mut due: Vec<ChangeRecord> = self
            .records
            .iter()
            .filter(|record| record.source_table == *source_table)
            .filter(|record| record.extracted_at > since.last_extracted_at)
            .cloned()
            .collect();
        due.sort_by(|left, right| {
            left.extracted_at
                .cmp(&right.extracted_at)
                .then(left.event_time.cmp(&right.event_time))
                .then_with(|| left.natural_key.cmp(&right.natural_key))
        });
        due.truncate(max_batch_size);
        Ok(Batch::new(source_table.clone(), due))
    }
}

/// Change source that reports a transient fault a fixed number of times.
pub struct FlakySource {
    /// Source used once the injected faults are exhausted.
    inner: TableSource,
    /// Remaining injected faults.
    failures: AtomicU32,
}

impl FlakySource {
    /// Creates a source that fails `failures` times before succeeding.
    pub fn new(records: Vec<ChangeRecord>, failures: u32) -> Self {
        Self {
            inner: TableSource::new(records),
            failures: AtomicU32::new(failures),
        }
    }
}

impl ChangeSource for FlakySource {
    fn extract(
        &self,
        source_table: &SourceTableId,
        since: &Watermark,
        max_batch_size: usize,
    ) -> Result<Batch, ExtractError> {
        if self.failures.load(Ordering::SeqCst) > 0 {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            return Err(ExtractError::Unavailable("injected fault".to_owned()));
        }
        self.inner.extract(source_table, since, max_batch_size)
    }
}

/// Fact source over a fixed fact set.
pub struct VecFactSource {
    /// Every fact the source can deliver.
    facts: Vec<FactRecord>,
}

impl VecFactSource {
    /// Creates a source over a fixed fact set.
    pub fn new(facts: Vec<FactRecord>) -> Self {
        Self {
            facts,
        }
    }
}

impl FactSource for VecFactSource {
    fn facts_between(
        &self,
        start: EventTime,
        end: EventTime,
    ) -> Result<Vec<FactRecord>, FactSourceError> {
        Ok(self
            .facts
            .iter()
            .filter(|fact| start <= fact.event_time && fact.event_time < end)
            .cloned()
            .collect())
    }
}

/// Rollup hook type used by pipeline tests.
pub type TestRollup = RollupRunner<VecFactSource, MemoryLedgerStore>;

/// Absent rollup hook for pipelines that do not roll up.
pub fn no_rollup() -> Option<TestRollup> {
    None
}
