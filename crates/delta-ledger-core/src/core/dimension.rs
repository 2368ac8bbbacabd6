// crates/delta-ledger-core/src/core/dimension.rs
// ============================================================================
// Module: Delta Ledger Dimension History
// Description: SCD2 dimension versions, merge mutations, and invariant checks.
// Purpose: Model per-entity validity interval history and its write plan.
// Dependencies: serde, thiserror, crate::core::{change, hashing, identifiers, time}
// ============================================================================

//! ## Overview
//! Each entity's history is an ordered sequence of [`DimensionVersion`] rows
//! with half-open `[valid_from, valid_to)` intervals. Intervals never overlap;
//! at most one version per key is open (`valid_to = null`) and that version is
//! the current one. A deleted key has every version closed and none current.
//! Writes are expressed as a [`MergePlan`] of mutations that a store applies
//! as one atomic unit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::change::AttributeMap;
use crate::core::hashing::HashDigest;
use crate::core::identifiers::NaturalKey;
use crate::core::identifiers::SourceTableId;
use crate::core::identifiers::SurrogateKey;
use crate::core::time::EventTime;

// ============================================================================
// SECTION: Dimension Versions
// ============================================================================

/// One stored SCD2 version of an entity.
///
/// # Invariants
/// - `valid_to`, when set, is >= `valid_from` (empty intervals are legal
///   degenerate history from same-instant insert/delete pairs).
/// - `is_current` implies `valid_to = null`, and the reverse.
/// - Closed versions never change bounds again except by a late-arrival
///   correction that predates `valid_from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionVersion {
    /// Store-generated surrogate key, immutable for the version's life.
    pub surrogate_key: SurrogateKey,
    /// Entity natural key.
    pub natural_key: NaturalKey,
    /// Canonical digest of `attributes`.
    pub attribute_hash: HashDigest,
    /// Attribute state during the validity interval.
    pub attributes: AttributeMap,
    /// Inclusive start of validity.
    pub valid_from: EventTime,
    /// Exclusive end of validity; `None` means open-ended.
    pub valid_to: Option<EventTime>,
    /// True when this is the entity's current version.
    pub is_current: bool,
}

impl DimensionVersion {
    /// Returns true when the version is open-ended.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Returns true when the instant falls inside the validity interval.
    #[must_use]
    pub fn contains(&self, at: EventTime) -> bool {
        self.valid_from <= at && self.valid_to.is_none_or(|end| at < end)
    }
}

/// Insert shape for a version that has no surrogate key yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVersion {
    /// Entity natural key.
    pub natural_key: NaturalKey,
    /// Canonical digest of `attributes`.
    pub attribute_hash: HashDigest,
    /// Attribute state during the validity interval.
    pub attributes: AttributeMap,
    /// Inclusive start of validity.
    pub valid_from: EventTime,
    /// Exclusive end of validity; `None` means open-ended.
    pub valid_to: Option<EventTime>,
    /// True when this becomes the entity's current version.
    pub is_current: bool,
}

// ============================================================================
// SECTION: Merge Plans
// ============================================================================

/// One mutation inside a merge plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VersionMutation {
    /// Closes a stored version at `valid_to` and clears its current flag.
    Close {
        /// Version to close.
        surrogate_key: SurrogateKey,
        /// New exclusive end of validity.
        valid_to: EventTime,
    },
    /// Replaces a stored version's attributes without touching its bounds.
    Rewrite {
        /// Version to rewrite.
        surrogate_key: SurrogateKey,
        /// Replacement attribute state.
        attributes: AttributeMap,
        /// Digest of the replacement attributes.
        attribute_hash: HashDigest,
    },
    /// Inserts a new version.
    Insert {
        /// Version to insert; the store assigns the surrogate key.
        version: NewVersion,
    },
}

/// Atomic write unit for one merged batch.
///
/// # Invariants
/// - Applied fully or not at all; readers never observe a partial plan.
/// - Mutation order is deterministic for a given classified batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePlan {
    /// Source table the plan belongs to.
    pub source_table: SourceTableId,
    /// Ordered mutations to apply.
    pub mutations: Vec<VersionMutation>,
}

impl MergePlan {
    /// Creates an empty plan for a source table.
    #[must_use]
    pub const fn empty(source_table: SourceTableId) -> Self {
        Self {
            source_table,
            mutations: Vec::new(),
        }
    }

    /// Returns true when the plan carries no mutations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Returns the number of insert mutations in the plan.
    #[must_use]
    pub fn insert_count(&self) -> usize {
        self.mutations
            .iter()
            .filter(|mutation| matches!(mutation, VersionMutation::Insert { .. }))
            .count()
    }
}

// ============================================================================
// SECTION: Invariant Checks
// ============================================================================

/// History invariant violations detected by [`verify_history`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryViolation {
    /// Versions are not sorted by `valid_from`.
    #[error("versions out of order for key {key} at position {position}")]
    OutOfOrder {
        /// Natural key of the violating history.
        key: String,
        /// Index of the violating version.
        position: usize,
    },
    /// A version ends before it starts.
    #[error("inverted interval for key {key} at position {position}")]
    Inverted {
        /// Natural key of the violating history.
        key: String,
        /// Index of the violating version.
        position: usize,
    },
    /// Two intervals overlap.
    #[error("overlapping intervals for key {key} at position {position}")]
    Overlap {
        /// Natural key of the violating history.
        key: String,
        /// Index of the violating version.
        position: usize,
    },
    /// An open version is followed by later versions.
    #[error("open version is not last for key {key}")]
    OpenNotLast {
        /// Natural key of the violating history.
        key: String,
    },
    /// More than one version is flagged current.
    #[error("multiple current versions for key {key}")]
    MultipleCurrent {
        /// Natural key of the violating history.
        key: String,
    },
    /// A closed version is flagged current.
    #[error("closed version flagged current for key {key}")]
    CurrentClosed {
        /// Natural key of the violating history.
        key: String,
    },
    /// An open version is not flagged current.
    #[error("open version not flagged current for key {key}")]
    OpenNotCurrent {
        /// Natural key of the violating history.
        key: String,
    },
}

/// Verifies the SCD2 interval invariants for one key's stored history.
///
/// `versions` must be the store order (sorted by `valid_from`). Gaps between
/// closed versions are legal (explicit deletion); overlap, inversion, and
/// current-flag misplacement are not.
///
/// # Errors
///
/// Returns the first [`HistoryViolation`] found.
pub fn verify_history(
    key: &NaturalKey,
    versions: &[DimensionVersion],
) -> Result<(), HistoryViolation> {
    let mut current_count = 0usize;
    for (position, version) in versions.iter().enumerate() {
        if let Some(valid_to) = version.valid_to
            && valid_to < version.valid_from
        {
            return Err(HistoryViolation::Inverted {
                key: key.to_string(),
                position,
            });
        }
        if version.is_current {
            current_count += 1;
            if version.valid_to.is_some() {
                return Err(HistoryViolation::CurrentClosed {
                    key: key.to_string(),
                });
            }
        } else if version.valid_to.is_none() {
            return Err(HistoryViolation::OpenNotCurrent {
                key: key.to_string(),
            });
        }
        if position == 0 {
            continue;
        }
        let previous = &versions[position - 1];
        if version.valid_from < previous.valid_from {
            return Err(HistoryViolation::OutOfOrder {
                key: key.to_string(),
                position,
            });
        }
        match previous.valid_to {
            None => {
                return Err(HistoryViolation::OpenNotLast {
                    key: key.to_string(),
                });
            }
            Some(previous_end) if previous_end > version.valid_from => {
                return Err(HistoryViolation::Overlap {
                    key: key.to_string(),
                    position,
                });
            }
            Some(_) => {}
        }
    }
    if current_count > 1 {
        return Err(HistoryViolation::MultipleCurrent {
            key: key.to_string(),
        });
    }
    Ok(())
}
