// crates/delta-ledger-core/src/core/fact.rs
// ============================================================================
// Module: Delta Ledger Facts
// Description: Fact events and the aggregate rows derived from them.
// Purpose: Feed the rollup engine and model its recomputed outputs.
// Dependencies: bigdecimal, serde, crate::core::{change, identifiers, period, time}
// ============================================================================

//! ## Overview
//! Facts are immutable events with an exact decimal amount. Aggregates are
//! pure derivations: one [`AggregateFact`] per dimension group and period,
//! recomputed wholesale from facts whenever the underlying history changes.
//! Nothing here is incremental state; dropping every aggregate row and
//! rebuilding from facts must yield identical output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde::Serialize;

use crate::core::change::AttributeMap;
use crate::core::identifiers::NaturalKey;
use crate::core::period::PeriodKey;
use crate::core::time::EventTime;

// ============================================================================
// SECTION: Fact Records
// ============================================================================

/// One immutable fact event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRecord {
    /// Natural key of the dimension entity the fact refers to.
    pub natural_key: NaturalKey,
    /// Business instant the fact occurred at.
    pub event_time: EventTime,
    /// Exact decimal amount; never a binary float.
    pub amount: BigDecimal,
    /// Free-form attributes, including the grouping attribute when present.
    pub attributes: AttributeMap,
}

// ============================================================================
// SECTION: Aggregates
// ============================================================================

/// One aggregate row for a dimension group within a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateFact {
    /// Dimension group the row aggregates over.
    pub group: String,
    /// Period the row covers.
    pub period: PeriodKey,
    /// Number of facts in the group and period.
    pub record_count: u64,
    /// Exact decimal sum of the facts' amounts.
    pub total_amount: BigDecimal,
}

impl AggregateFact {
    /// Creates an empty aggregate for a group and period.
    #[must_use]
    pub fn empty(group: String, period: PeriodKey) -> Self {
        Self {
            group,
            period,
            record_count: 0,
            total_amount: BigDecimal::default(),
        }
    }

    /// Folds one fact amount into the aggregate.
    pub fn absorb(&mut self, amount: &BigDecimal) {
        self.record_count += 1;
        self.total_amount = &self.total_amount + amount;
    }
}
