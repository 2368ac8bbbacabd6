// crates/delta-ledger-core/src/runtime/store.rs
// ============================================================================
// Module: Delta Ledger In-Memory Store
// Description: Simple in-memory ledger store for tests and examples.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides a simple in-memory implementation of
//! [`DimensionStore`], [`CheckpointStore`], and [`AggregateStore`] for tests
//! and local demos. It honors the same atomicity contract as the durable
//! store: a merge plan that fails partway leaves nothing behind. It is not
//! intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::audit::RunAuditRecord;
use crate::core::dimension::DimensionVersion;
use crate::core::dimension::MergePlan;
use crate::core::dimension::VersionMutation;
use crate::core::fact::AggregateFact;
use crate::core::identifiers::NaturalKey;
use crate::core::identifiers::SourceTableId;
use crate::core::identifiers::SurrogateKey;
use crate::core::period::PeriodKey;
use crate::core::time::EventTime;
use crate::core::watermark::Watermark;
use crate::interfaces::AggregateError;
use crate::interfaces::AggregateStore;
use crate::interfaces::CheckpointError;
use crate::interfaces::CheckpointStore;
use crate::interfaces::DimensionStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Versions of one source table, keyed by natural key.
type VersionTable = BTreeMap<NaturalKey, Vec<DimensionVersion>>;

/// Mutable state behind the store's mutex.
#[derive(Debug, Default)]
struct MemoryState {
    /// Dimension versions per source table.
    versions: BTreeMap<String, VersionTable>,
    /// Last assigned surrogate key.
    last_surrogate: u64,
    /// Watermarks per source table.
    watermarks: BTreeMap<String, Watermark>,
    /// Run audit records in insertion order.
    runs: Vec<RunAuditRecord>,
    /// Aggregate rows per period label.
    aggregates: BTreeMap<String, Vec<AggregateFact>>,
}

/// In-memory ledger store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct MemoryLedgerStore {
    /// Shared state protected by a mutex.
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryLedgerStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the shared state, reporting poison as a message.
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, String> {
        self.inner.lock().map_err(|_| "ledger store mutex poisoned".to_string())
    }
}

impl DimensionStore for MemoryLedgerStore {
    fn history(
        &self,
        source_table: &SourceTableId,
        key: &NaturalKey,
    ) -> Result<Vec<DimensionVersion>, StoreError> {
        let state = self.lock().map_err(StoreError::Store)?;
        Ok(state
            .versions
            .get(source_table.as_str())
            .and_then(|table| table.get(key))
            .cloned()
            .unwrap_or_default())
    }

    fn current(
        &self,
        source_table: &SourceTableId,
        key: &NaturalKey,
    ) -> Result<Option<DimensionVersion>, StoreError> {
        let history = self.history(source_table, key)?;
        Ok(history.into_iter().find(|version| version.is_current))
    }

    fn version_at(
        &self,
        source_table: &SourceTableId,
        key: &NaturalKey,
        at: EventTime,
    ) -> Result<Option<DimensionVersion>, StoreError> {
        let history = self.history(source_table, key)?;
        Ok(history.into_iter().find(|version| version.contains(at)))
    }

    fn keys(&self, source_table: &SourceTableId) -> Result<Vec<NaturalKey>, StoreError> {
        let state = self.lock().map_err(StoreError::Store)?;
        Ok(state
            .versions
            .get(source_table.as_str())
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn apply(&self, plan: &MergePlan) -> Result<(), StoreError> {
        let mut state = self.lock().map_err(StoreError::Store)?;
        // Mutate a copy so a mid-plan conflict leaves the store untouched.
        let mut table = state
            .versions
            .get(plan.source_table.as_str())
            .cloned()
            .unwrap_or_default();
        let mut last_surrogate = state.last_surrogate;
        for mutation in &plan.mutations {
            match mutation {
                VersionMutation::Close {
                    surrogate_key,
                    valid_to,
                } => {
                    let version = find_version(&mut table, *surrogate_key).ok_or_else(|| {
                        StoreError::Conflict(format!(
                            "version {surrogate_key} not found while closing"
                        ))
                    })?;
                    version.valid_to = Some(*valid_to);
                    version.is_current = false;
                }
                VersionMutation::Rewrite {
                    surrogate_key,
                    attributes,
                    attribute_hash,
                } => {
                    let version = find_version(&mut table, *surrogate_key).ok_or_else(|| {
                        StoreError::Conflict(format!(
                            "version {surrogate_key} not found while rewriting"
                        ))
                    })?;
                    version.attributes = attributes.clone();
                    version.attribute_hash = attribute_hash.clone();
                }
                VersionMutation::Insert {
                    version,
                } => {
                    last_surrogate += 1;
                    let surrogate_key = SurrogateKey::from_raw(last_surrogate)
                        .ok_or_else(|| StoreError::Store("surrogate key overflow".to_string()))?;
                    let entry = table.entry(version.natural_key.clone()).or_default();
                    entry.push(DimensionVersion {
                        surrogate_key,
                        natural_key: version.natural_key.clone(),
                        attribute_hash: version.attribute_hash.clone(),
                        attributes: version.attributes.clone(),
                        valid_from: version.valid_from,
                        valid_to: version.valid_to,
                        is_current: version.is_current,
                    });
                    sort_versions(entry);
                }
            }
        }
        state.versions.insert(plan.source_table.to_string(), table);
        state.last_surrogate = last_surrogate;
        Ok(())
    }
}

impl CheckpointStore for MemoryLedgerStore {
    fn load_watermark(
        &self,
        source_table: &SourceTableId,
    ) -> Result<Option<Watermark>, CheckpointError> {
        let state = self.lock().map_err(CheckpointError::Io)?;
        Ok(state.watermarks.get(source_table.as_str()).cloned())
    }

    fn commit_watermark(&self, watermark: &Watermark) -> Result<(), CheckpointError> {
        let mut state = self.lock().map_err(CheckpointError::Io)?;
        state
            .watermarks
            .insert(watermark.source_table.to_string(), watermark.clone());
        Ok(())
    }

    fn record_run(&self, record: &RunAuditRecord) -> Result<(), CheckpointError> {
        let mut state = self.lock().map_err(CheckpointError::Io)?;
        state.runs.push(record.clone());
        Ok(())
    }

    fn recent_runs(
        &self,
        source_table: &SourceTableId,
        limit: usize,
    ) -> Result<Vec<RunAuditRecord>, CheckpointError> {
        let state = self.lock().map_err(CheckpointError::Io)?;
        Ok(state
            .runs
            .iter()
            .rev()
            .filter(|record| record.source_table == *source_table)
            .take(limit)
            .cloned()
            .collect())
    }
}

impl AggregateStore for MemoryLedgerStore {
    fn replace_period(
        &self,
        period: &PeriodKey,
        rows: &[AggregateFact],
    ) -> Result<(), AggregateError> {
        let mut state = self.lock().map_err(AggregateError::Io)?;
        if rows.is_empty() {
            state.aggregates.remove(&period.to_string());
        } else {
            state.aggregates.insert(period.to_string(), rows.to_vec());
        }
        Ok(())
    }

    fn load_period(&self, period: &PeriodKey) -> Result<Vec<AggregateFact>, AggregateError> {
        let state = self.lock().map_err(AggregateError::Io)?;
        Ok(state.aggregates.get(&period.to_string()).cloned().unwrap_or_default())
    }

    fn load_all(&self) -> Result<Vec<AggregateFact>, AggregateError> {
        let state = self.lock().map_err(AggregateError::Io)?;
        Ok(state.aggregates.values().flatten().cloned().collect())
    }

    fn clear(&self) -> Result<(), AggregateError> {
        let mut state = self.lock().map_err(AggregateError::Io)?;
        state.aggregates.clear();
        Ok(())
    }
}

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

/// Finds a version by surrogate key across every key of a table.
fn find_version(
    table: &mut VersionTable,
    surrogate_key: SurrogateKey,
) -> Option<&mut DimensionVersion> {
    table
        .values_mut()
        .flat_map(|versions| versions.iter_mut())
        .find(|version| version.surrogate_key == surrogate_key)
}

/// Restores the store order: `valid_from` ascending, open intervals last.
fn sort_versions(versions: &mut [DimensionVersion]) {
    versions.sort_by_key(|version| {
        (version.valid_from, version.valid_to.unwrap_or(EventTime::MAX), version.surrogate_key)
    });
}
