// crates/delta-ledger-core/src/runtime/merger.rs
// ============================================================================
// Module: Delta Ledger SCD2 Merger
// Description: Pure merge planning over a captured history snapshot.
// Purpose: Turn a classified batch into an idempotent, atomic merge plan.
// Dependencies: thiserror, crate::core, crate::runtime::classifier
// ============================================================================

//! ## Overview
//! The merger is a pure planner: it reads the classified batch and its
//! [`HistorySnapshot`](crate::runtime::classifier::HistorySnapshot) and
//! produces a [`MergePlan`] without touching any store. Placement is
//! positional against each key's history, so a record is handled the same
//! way whether it arrives on time, late, or as an at-least-once redelivery.
//! Records whose attribute hash matches the version already covering their
//! instant plan nothing, which is what makes redelivery harmless.
//!
//! Late arrivals splice: the version whose interval contains the late
//! instant is shortened and a closed version covering the remainder is
//! inserted, leaving every other interval untouched. A late delete only
//! shortens the interval containing its instant; history after the delete
//! stands, because a recorded later state was observed and a delete older
//! than it cannot retract it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::change::AttributeMap;
use crate::core::change::ChangeRecord;
use crate::core::dimension::HistoryViolation;
use crate::core::dimension::MergePlan;
use crate::core::dimension::NewVersion;
use crate::core::dimension::VersionMutation;
use crate::core::dimension::verify_history;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::identifiers::NaturalKey;
use crate::core::identifiers::SurrogateKey;
use crate::core::time::EventTime;
use crate::runtime::classifier::ClassifiedBatch;

// ============================================================================
// SECTION: Merge Errors
// ============================================================================

/// Merge planning errors.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Hashing a record's attributes failed.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// The stored history violates the interval invariants; not retryable.
    #[error("stored history invalid: {0}")]
    History(#[from] HistoryViolation),
    /// Planning reached a state the invariants rule out.
    #[error("merge planning error: {0}")]
    Internal(String),
}

// ============================================================================
// SECTION: Merge Outcome
// ============================================================================

/// A merge plan together with its record-level accounting.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Mutations to apply atomically.
    pub plan: MergePlan,
    /// Records that changed history.
    pub records_merged: u64,
    /// Records spliced before their key's frontier.
    pub late_corrections: u64,
    /// Records that planned nothing (duplicates and no-op deletes).
    pub noop_records: u64,
}

// ============================================================================
// SECTION: Working State
// ============================================================================

/// Provenance of a working version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkingSource {
    /// Version already stored under this surrogate key.
    Stored(SurrogateKey),
    /// Version planned by this batch.
    Planned,
}

/// One version of a key as the planner currently sees it.
#[derive(Debug, Clone)]
struct WorkingVersion {
    /// Where the version came from.
    source: WorkingSource,
    /// Digest of `attributes`.
    attribute_hash: HashDigest,
    /// Attribute state during the interval.
    attributes: AttributeMap,
    /// Inclusive start of validity.
    valid_from: EventTime,
    /// Exclusive end of validity; `None` means open-ended.
    valid_to: Option<EventTime>,
}

/// Per-record planning result, used for the outcome counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// The record changed history at its key's frontier.
    Applied,
    /// The record changed history before its key's frontier.
    Spliced,
    /// The record planned nothing.
    Noop,
}

// ============================================================================
// SECTION: Merger
// ============================================================================

/// Pure SCD2 merge planner.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scd2Merger;

impl Scd2Merger {
    /// Plans the mutations that merge a classified batch into history.
    ///
    /// The plan lists closes, then rewrites, then inserts, so applying it in
    /// order never holds two current versions for one key mid-apply.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Hash`] when a record's attributes cannot be
    /// hashed, [`MergeError::History`] when a stored history fails its
    /// invariant check, and [`MergeError::Internal`] when planning reaches a
    /// state the invariants rule out.
    pub fn plan(&self, classified: &ClassifiedBatch) -> Result<MergeOutcome, MergeError> {
        let mut working: BTreeMap<NaturalKey, Vec<WorkingVersion>> = BTreeMap::new();
        let mut records_merged = 0u64;
        let mut late_corrections = 0u64;
        let mut noop_records = 0u64;

        for record in &classified.records {
            if !working.contains_key(&record.natural_key) {
                let history = classified.snapshot.history(&record.natural_key);
                verify_history(&record.natural_key, history)?;
                let versions = history
                    .iter()
                    .map(|version| WorkingVersion {
                        source: WorkingSource::Stored(version.surrogate_key),
                        attribute_hash: version.attribute_hash.clone(),
                        attributes: version.attributes.clone(),
                        valid_from: version.valid_from,
                        valid_to: version.valid_to,
                    })
                    .collect();
                working.insert(record.natural_key.clone(), versions);
            }
            let versions = working.get_mut(&record.natural_key).ok_or_else(|| {
                MergeError::Internal(format!(
                    "working history missing for key {}",
                    record.natural_key
                ))
            })?;
            let placement = if record.op.is_delete() {
                place_delete(versions, record.event_time)
            } else {
                place_upsert(versions, record)?
            };
            match placement {
                Placement::Applied => records_merged += 1,
                Placement::Spliced => {
                    records_merged += 1;
                    late_corrections += 1;
                }
                Placement::Noop => noop_records += 1,
            }
        }

        let plan = emit_plan(classified, &working)?;
        Ok(MergeOutcome {
            plan,
            records_merged,
            late_corrections,
            noop_records,
        })
    }
}

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

/// Exclusive end of a working version, with open intervals at the maximum.
const fn end_of(version: &WorkingVersion) -> EventTime {
    match version.valid_to {
        Some(end) => end,
        None => EventTime::MAX,
    }
}

/// Restores the sort order after an insertion.
fn sort_working(versions: &mut [WorkingVersion]) {
    versions.sort_by_key(|version| (version.valid_from, end_of(version)));
}

/// Index of the open version, if one exists.
fn open_index(versions: &[WorkingVersion]) -> Option<usize> {
    versions.iter().position(|version| version.valid_to.is_none())
}

/// Index of the version whose interval contains the instant, if any.
fn containing_index(versions: &[WorkingVersion], at: EventTime) -> Option<usize> {
    versions
        .iter()
        .position(|version| version.valid_from <= at && end_of(version) > at)
}

/// Places an insert or update record into the working history.
fn place_upsert(
    versions: &mut Vec<WorkingVersion>,
    record: &ChangeRecord,
) -> Result<Placement, MergeError> {
    let at = record.event_time;
    let hash = record.attribute_hash()?;
    if versions.is_empty() {
        push_planned(versions, record, hash, at, None);
        return Ok(Placement::Applied);
    }

    if let Some(open) = open_index(versions) {
        if at >= versions[open].valid_from {
            if versions[open].attribute_hash == hash {
                return Ok(Placement::Noop);
            }
            if at == versions[open].valid_from {
                versions[open].attributes = record.attributes.clone();
                versions[open].attribute_hash = hash;
                return Ok(Placement::Applied);
            }
            versions[open].valid_to = Some(at);
            push_planned(versions, record, hash, at, None);
            return Ok(Placement::Applied);
        }
    } else {
        let last_end = versions.last().map_or(EventTime::ORIGIN, end_of);
        if at >= last_end {
            // Reappearance after an explicit delete: a fresh open version.
            push_planned(versions, record, hash, at, None);
            return Ok(Placement::Applied);
        }
    }

    if let Some(index) = containing_index(versions, at) {
        if versions[index].attribute_hash == hash {
            return Ok(Placement::Noop);
        }
        if at == versions[index].valid_from {
            versions[index].attributes = record.attributes.clone();
            versions[index].attribute_hash = hash;
            return Ok(Placement::Spliced);
        }
        let old_end = versions[index].valid_to;
        versions[index].valid_to = Some(at);
        push_planned(versions, record, hash, at, old_end);
        return Ok(Placement::Spliced);
    }

    // No interval contains the instant: before the first version or inside a
    // deletion gap. The inserted version runs up to the next known state.
    let next_start = versions
        .iter()
        .map(|version| version.valid_from)
        .filter(|start| *start > at)
        .min();
    let Some(next_start) = next_start else {
        return Err(MergeError::Internal(format!(
            "no placement for event at {at} for key {}",
            record.natural_key
        )));
    };
    push_planned(versions, record, hash, at, Some(next_start));
    Ok(Placement::Spliced)
}

/// Appends a planned version and restores the sort order.
fn push_planned(
    versions: &mut Vec<WorkingVersion>,
    record: &ChangeRecord,
    attribute_hash: HashDigest,
    valid_from: EventTime,
    valid_to: Option<EventTime>,
) {
    versions.push(WorkingVersion {
        source: WorkingSource::Planned,
        attribute_hash,
        attributes: record.attributes.clone(),
        valid_from,
        valid_to,
    });
    sort_working(versions);
}

/// Places a delete record into the working history.
fn place_delete(versions: &mut [WorkingVersion], at: EventTime) -> Placement {
    if versions.is_empty() {
        return Placement::Noop;
    }
    if let Some(open) = open_index(versions) {
        if at >= versions[open].valid_from {
            versions[open].valid_to = Some(at);
            return Placement::Applied;
        }
    } else {
        let last_end = versions.last().map_or(EventTime::ORIGIN, end_of);
        if at >= last_end {
            // Already deleted at or before this instant.
            return Placement::Noop;
        }
    }
    if let Some(index) = containing_index(versions, at) {
        versions[index].valid_to = Some(at);
        return Placement::Spliced;
    }
    // A delete aimed at a gap or before first appearance retracts nothing.
    Placement::Noop
}

/// Diffs the working state against the snapshot and emits the plan.
fn emit_plan(
    classified: &ClassifiedBatch,
    working: &BTreeMap<NaturalKey, Vec<WorkingVersion>>,
) -> Result<MergePlan, MergeError> {
    let mut closes = Vec::new();
    let mut rewrites = Vec::new();
    let mut inserts = Vec::new();
    for (key, versions) in working {
        let mut finals: BTreeMap<SurrogateKey, &WorkingVersion> = BTreeMap::new();
        for version in versions {
            if let WorkingSource::Stored(surrogate_key) = version.source {
                finals.insert(surrogate_key, version);
            }
        }
        for original in classified.snapshot.history(key) {
            let current = finals.get(&original.surrogate_key).ok_or_else(|| {
                MergeError::Internal(format!(
                    "stored version {} vanished while planning key {key}",
                    original.surrogate_key
                ))
            })?;
            if current.valid_to != original.valid_to {
                let Some(valid_to) = current.valid_to else {
                    return Err(MergeError::Internal(format!(
                        "planned reopening of version {} for key {key}",
                        original.surrogate_key
                    )));
                };
                closes.push(VersionMutation::Close {
                    surrogate_key: original.surrogate_key,
                    valid_to,
                });
            }
            if current.attribute_hash != original.attribute_hash {
                rewrites.push(VersionMutation::Rewrite {
                    surrogate_key: original.surrogate_key,
                    attributes: current.attributes.clone(),
                    attribute_hash: current.attribute_hash.clone(),
                });
            }
        }
        for version in versions {
            if version.source == WorkingSource::Planned {
                inserts.push(VersionMutation::Insert {
                    version: NewVersion {
                        natural_key: key.clone(),
                        attribute_hash: version.attribute_hash.clone(),
                        attributes: version.attributes.clone(),
                        valid_from: version.valid_from,
                        valid_to: version.valid_to,
                        is_current: version.valid_to.is_none(),
                    },
                });
            }
        }
    }
    let mut mutations = closes;
    mutations.append(&mut rewrites);
    mutations.append(&mut inserts);
    Ok(MergePlan {
        source_table: classified.source_table.clone(),
        mutations,
    })
}
