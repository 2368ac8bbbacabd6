// crates/delta-ledger-core/src/runtime/rollup.rs
// ============================================================================
// Module: Delta Ledger Rollup Engine
// Description: Period-scoped aggregate recomputation from immutable facts.
// Purpose: Keep derived aggregates consistent with spliced dimension history.
// Dependencies: thiserror, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Aggregates are never adjusted in place. When a merge touches an event
//! time, every period containing it is recomputed wholesale from the fact
//! source and replaces its stored rows. The same recomputation, run over
//! every period facts exist for, rebuilds the aggregate store from nothing.
//! Facts are grouped by a configured attribute; facts without it fall into
//! a fallback group instead of being dropped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::core::fact::AggregateFact;
use crate::core::fact::FactRecord;
use crate::core::period::PeriodError;
use crate::core::period::PeriodGranularity;
use crate::core::period::PeriodKey;
use crate::core::period::periods_touched;
use crate::core::time::EventTime;
use crate::interfaces::AggregateError;
use crate::interfaces::AggregateStore;
use crate::interfaces::FactSource;
use crate::interfaces::FactSourceError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default attribute a fact is grouped by.
pub const DEFAULT_GROUP_ATTRIBUTE: &str = "category";

/// Default group for facts missing the grouping attribute.
pub const DEFAULT_FALLBACK_GROUP: &str = "unclassified";

// ============================================================================
// SECTION: Rollup Errors
// ============================================================================

/// Rollup errors.
#[derive(Debug, Error)]
pub enum RollupError {
    /// Reading facts failed.
    #[error(transparent)]
    Facts(#[from] FactSourceError),
    /// Writing aggregates failed.
    #[error(transparent)]
    Store(#[from] AggregateError),
    /// Deriving period bounds failed.
    #[error(transparent)]
    Period(#[from] PeriodError),
}

// ============================================================================
// SECTION: Rollup Configuration
// ============================================================================

/// Rollup engine configuration.
#[derive(Debug, Clone)]
pub struct RollupConfig {
    /// Grains recomputed for every touched event time.
    pub granularities: Vec<PeriodGranularity>,
    /// Fact attribute used as the dimension group.
    pub group_attribute: String,
    /// Group assigned to facts missing the grouping attribute.
    pub fallback_group: String,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            granularities: vec![
                PeriodGranularity::Daily,
                PeriodGranularity::Weekly,
                PeriodGranularity::Monthly,
            ],
            group_attribute: DEFAULT_GROUP_ATTRIBUTE.to_owned(),
            fallback_group: DEFAULT_FALLBACK_GROUP.to_owned(),
        }
    }
}

// ============================================================================
// SECTION: Rollup Engine
// ============================================================================

/// Recomputes aggregates for touched periods.
#[derive(Debug, Clone, Default)]
pub struct RollupEngine {
    /// Engine configuration.
    config: RollupConfig,
}

impl RollupEngine {
    /// Creates an engine with the given configuration.
    #[must_use]
    pub const fn new(config: RollupConfig) -> Self {
        Self {
            config,
        }
    }

    /// Recomputes every period of every configured grain containing one of
    /// the event times, and replaces the stored rows per period.
    ///
    /// Returns the recomputed periods in deterministic order.
    ///
    /// # Errors
    ///
    /// Returns [`RollupError`] when facts cannot be read, period bounds
    /// cannot be derived, or a replacement write fails.
    pub fn refresh_touched<F: FactSource, A: AggregateStore>(
        &self,
        facts: &F,
        aggregates: &A,
        event_times: &[EventTime],
    ) -> Result<Vec<PeriodKey>, RollupError> {
        let periods = periods_touched(&self.config.granularities, event_times)?;
        for period in &periods {
            let period_facts = facts.facts_between(period.start, period.end)?;
            let rows = self.rows_for_period(period, &period_facts);
            aggregates.replace_period(period, &rows)?;
        }
        Ok(periods)
    }

    /// Drops every stored aggregate and rebuilds all periods from facts.
    ///
    /// Returns the rebuilt periods in deterministic order.
    ///
    /// # Errors
    ///
    /// Returns [`RollupError`] when facts cannot be read, period bounds
    /// cannot be derived, or a write fails.
    pub fn rebuild_all<F: FactSource, A: AggregateStore>(
        &self,
        facts: &F,
        aggregates: &A,
    ) -> Result<Vec<PeriodKey>, RollupError> {
        let all_facts = facts.facts_between(EventTime::MIN, EventTime::MAX)?;
        aggregates.clear()?;
        let event_times: Vec<EventTime> =
            all_facts.iter().map(|fact| fact.event_time).collect();
        let periods = periods_touched(&self.config.granularities, &event_times)?;
        for period in &periods {
            let rows = self.rows_for_period(period, &all_facts);
            aggregates.replace_period(period, &rows)?;
        }
        Ok(periods)
    }

    /// Groups the facts falling inside the period into aggregate rows.
    fn rows_for_period(&self, period: &PeriodKey, facts: &[FactRecord]) -> Vec<AggregateFact> {
        let mut groups: BTreeMap<String, AggregateFact> = BTreeMap::new();
        for fact in facts {
            if !period.contains(fact.event_time) {
                continue;
            }
            let group = self.group_of(fact);
            groups
                .entry(group.clone())
                .or_insert_with(|| AggregateFact::empty(group, period.clone()))
                .absorb(&fact.amount);
        }
        groups.into_values().collect()
    }

    /// Resolves the dimension group of one fact.
    fn group_of(&self, fact: &FactRecord) -> String {
        match fact.attributes.get(&self.config.group_attribute) {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Number(number)) => number.to_string(),
            Some(Value::Bool(flag)) => flag.to_string(),
            Some(Value::Null | Value::Array(_) | Value::Object(_)) | None => {
                self.config.fallback_group.clone()
            }
        }
    }
}

// ============================================================================
// SECTION: Rollup Hook
// ============================================================================

/// Post-checkpoint rollup refresh hook.
///
/// The pipeline calls the hook after a checkpoint commits; a hook failure
/// degrades the run to a warning rather than failing it, because aggregates
/// are re-derivable at any time.
pub trait RollupHook {
    /// Recomputes every period containing one of the event times.
    ///
    /// # Errors
    ///
    /// Returns [`RollupError`] when recomputation fails.
    fn refresh(&self, event_times: &[EventTime]) -> Result<Vec<PeriodKey>, RollupError>;

    /// Rebuilds every period from facts.
    ///
    /// # Errors
    ///
    /// Returns [`RollupError`] when the rebuild fails.
    fn rebuild(&self) -> Result<Vec<PeriodKey>, RollupError>;
}

/// Rollup hook binding an engine to a fact source and aggregate store.
#[derive(Debug, Clone)]
pub struct RollupRunner<F: FactSource, A: AggregateStore> {
    /// Recomputation engine.
    engine: RollupEngine,
    /// Fact source the aggregates derive from.
    facts: F,
    /// Aggregate row store.
    aggregates: A,
}

impl<F: FactSource, A: AggregateStore> RollupRunner<F, A> {
    /// Creates a runner over a fact source and aggregate store.
    #[must_use]
    pub const fn new(config: RollupConfig, facts: F, aggregates: A) -> Self {
        Self {
            engine: RollupEngine::new(config),
            facts,
            aggregates,
        }
    }
}

impl<F: FactSource, A: AggregateStore> RollupHook for RollupRunner<F, A> {
    fn refresh(&self, event_times: &[EventTime]) -> Result<Vec<PeriodKey>, RollupError> {
        self.engine.refresh_touched(&self.facts, &self.aggregates, event_times)
    }

    fn rebuild(&self) -> Result<Vec<PeriodKey>, RollupError> {
        self.engine.rebuild_all(&self.facts, &self.aggregates)
    }
}
