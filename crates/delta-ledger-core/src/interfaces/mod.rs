// crates/delta-ledger-core/src/interfaces/mod.rs
// ============================================================================
// Module: Delta Ledger Interfaces
// Description: Backend-agnostic interfaces for sources, stores, and alerting.
// Purpose: Define the contract surfaces used by the pipeline runtime.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the pipeline integrates with change sources, its
//! stores, and operator alerting without embedding backend-specific details.
//! Implementations must be deterministic and fail closed on missing or
//! invalid data; transient faults are reported through the error variants
//! the runtime classifies as retryable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::audit::Notification;
use crate::core::audit::RunAuditRecord;
use crate::core::audit::RunStatus;
use crate::core::audit::RunSummary;
use crate::core::change::Batch;
use crate::core::dimension::DimensionVersion;
use crate::core::dimension::MergePlan;
use crate::core::fact::AggregateFact;
use crate::core::fact::FactRecord;
use crate::core::identifiers::NaturalKey;
use crate::core::identifiers::SourceTableId;
use crate::core::period::PeriodKey;
use crate::core::time::EventTime;
use crate::core::watermark::Watermark;

// ============================================================================
// SECTION: Change Source
// ============================================================================

/// Change source errors.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The source is temporarily unreachable; the run may be retried.
    #[error("source unavailable: {0}")]
    Unavailable(String),
    /// The source payload does not match the expected shape; not retryable.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
}

impl ExtractError {
    /// Returns true when retrying the extraction may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Backend-agnostic change source.
///
/// Implementations return records captured strictly after the watermark's
/// extraction cursor, ordered by capture position, up to `max_batch_size`.
/// Delivery is at least once; redelivering records already merged is legal
/// and must be harmless downstream.
pub trait ChangeSource {
    /// Extracts the next batch of changes after the watermark.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when the source is unreachable or its
    /// payload is malformed.
    fn extract(
        &self,
        source_table: &SourceTableId,
        since: &Watermark,
        max_batch_size: usize,
    ) -> Result<Batch, ExtractError>;
}

// ============================================================================
// SECTION: Dimension Store
// ============================================================================

/// Dimension store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("dimension store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("dimension store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("dimension store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("dimension store invalid data: {0}")]
    Invalid(String),
    /// A concurrent writer changed rows a merge plan expected; retryable.
    #[error("dimension store merge conflict: {0}")]
    Conflict(String),
    /// Store reported an error.
    #[error("dimension store error: {0}")]
    Store(String),
}

impl StoreError {
    /// Returns true when retrying the whole run may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Versioned dimension store.
///
/// Histories are returned sorted by `valid_from` ascending. [`Self::apply`]
/// is atomic: a reader sees every mutation of a plan or none of them.
pub trait DimensionStore {
    /// Loads the full version history for a key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn history(
        &self,
        source_table: &SourceTableId,
        key: &NaturalKey,
    ) -> Result<Vec<DimensionVersion>, StoreError>;

    /// Loads the current version for a key, if the key exists and is not deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn current(
        &self,
        source_table: &SourceTableId,
        key: &NaturalKey,
    ) -> Result<Option<DimensionVersion>, StoreError>;

    /// Loads the version whose validity interval contains the instant, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn version_at(
        &self,
        source_table: &SourceTableId,
        key: &NaturalKey,
        at: EventTime,
    ) -> Result<Option<DimensionVersion>, StoreError>;

    /// Lists every natural key the source table has versions for.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn keys(&self, source_table: &SourceTableId) -> Result<Vec<NaturalKey>, StoreError>;

    /// Applies a merge plan as one atomic unit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when a targeted row no longer matches
    /// the plan's expectations, and other variants for storage faults. On any
    /// error the store is left as if the plan was never applied.
    fn apply(&self, plan: &MergePlan) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Checkpoint Store
// ============================================================================

/// Checkpoint store errors.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Store I/O error.
    #[error("checkpoint store io error: {0}")]
    Io(String),
    /// Persisting a watermark or audit record failed; retryable.
    #[error("checkpoint write failure: {0}")]
    WriteFailed(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("checkpoint store corruption: {0}")]
    Corrupt(String),
}

impl CheckpointError {
    /// Returns true when retrying the write may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::WriteFailed(_) | Self::Io(_))
    }
}

/// Watermark and run audit persistence.
pub trait CheckpointStore {
    /// Loads the persisted watermark for a source table, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] when loading fails.
    fn load_watermark(
        &self,
        source_table: &SourceTableId,
    ) -> Result<Option<Watermark>, CheckpointError>;

    /// Durably replaces the watermark for its source table.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] when the write fails; the previous
    /// watermark must remain in effect.
    fn commit_watermark(&self, watermark: &Watermark) -> Result<(), CheckpointError>;

    /// Appends one run audit record.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] when the write fails.
    fn record_run(&self, record: &RunAuditRecord) -> Result<(), CheckpointError>;

    /// Loads the most recent audit records for a source table, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] when loading fails.
    fn recent_runs(
        &self,
        source_table: &SourceTableId,
        limit: usize,
    ) -> Result<Vec<RunAuditRecord>, CheckpointError>;
}

// ============================================================================
// SECTION: Aggregate Store
// ============================================================================

/// Aggregate store errors.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// Store I/O error.
    #[error("aggregate store io error: {0}")]
    Io(String),
    /// Store reported an error.
    #[error("aggregate store error: {0}")]
    Store(String),
}

/// Derived aggregate persistence.
///
/// Aggregates are pure derivations of facts; every write replaces a period
/// wholesale so a rebuild from facts always converges to the same rows.
pub trait AggregateStore {
    /// Atomically replaces every aggregate row of one period.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError`] when the write fails.
    fn replace_period(
        &self,
        period: &PeriodKey,
        rows: &[AggregateFact],
    ) -> Result<(), AggregateError>;

    /// Loads the aggregate rows of one period, sorted by group.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError`] when loading fails.
    fn load_period(&self, period: &PeriodKey) -> Result<Vec<AggregateFact>, AggregateError>;

    /// Loads every stored aggregate row, sorted by period then group.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError`] when loading fails.
    fn load_all(&self) -> Result<Vec<AggregateFact>, AggregateError>;

    /// Deletes every stored aggregate row.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError`] when the delete fails.
    fn clear(&self) -> Result<(), AggregateError>;
}

// ============================================================================
// SECTION: Fact Source
// ============================================================================

/// Fact source errors.
#[derive(Debug, Error)]
pub enum FactSourceError {
    /// The source is temporarily unreachable; the rollup may be retried.
    #[error("fact source unavailable: {0}")]
    Unavailable(String),
    /// The source payload does not match the expected shape; not retryable.
    #[error("fact source schema mismatch: {0}")]
    SchemaMismatch(String),
}

/// Immutable fact event source for rollups.
pub trait FactSource {
    /// Loads every fact with `start <= event_time < end`.
    ///
    /// # Errors
    ///
    /// Returns [`FactSourceError`] when the source is unreachable or its
    /// payload is malformed.
    fn facts_between(
        &self,
        start: EventTime,
        end: EventTime,
    ) -> Result<Vec<FactRecord>, FactSourceError>;
}

// ============================================================================
// SECTION: Alert Sink
// ============================================================================

/// Alert sink errors.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Sink reported an error.
    #[error("alert sink error: {0}")]
    Sink(String),
}

/// Operator alert sink.
///
/// Sink failures never fail a run; the runtime delivers on a best-effort
/// basis and drops undeliverable notifications.
pub trait AlertSink {
    /// Delivers one notification.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError`] when delivery fails.
    fn alert(&self, notification: &Notification) -> Result<(), AlertError>;

    /// Delivers a post-run summary.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError`] when delivery fails.
    fn summary(&self, summary: &RunSummary) -> Result<(), AlertError> {
        let _ = summary;
        Ok(())
    }
}

// ============================================================================
// SECTION: Metrics
// ============================================================================

/// Pipeline stages reported to metrics implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Extraction from the change source.
    Extract,
    /// Quality gate evaluation.
    Quality,
    /// Late-arrival classification.
    Classify,
    /// Merge planning and application.
    Merge,
    /// Watermark and audit commit.
    Checkpoint,
    /// Aggregate recomputation.
    Rollup,
}

impl PipelineStage {
    /// Stable metric label for the stage.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Quality => "quality",
            Self::Classify => "classify",
            Self::Merge => "merge",
            Self::Checkpoint => "checkpoint",
            Self::Rollup => "rollup",
        }
    }
}

/// Pipeline metrics recorder.
///
/// Implementations must be cheap and must never fail; the runtime calls
/// them inline on the run path.
pub trait PipelineMetrics {
    /// Records the wall-clock duration of one completed stage.
    fn stage_completed(&self, stage: PipelineStage, elapsed_ms: u64);

    /// Records how many records a stage handled.
    fn records_processed(&self, stage: PipelineStage, count: u64);

    /// Records the terminal status of a run.
    fn run_finished(&self, status: RunStatus);
}

/// Metrics recorder that discards every observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl PipelineMetrics for NoopMetrics {
    fn stage_completed(&self, stage: PipelineStage, elapsed_ms: u64) {
        let _ = stage;
        let _ = elapsed_ms;
    }

    fn records_processed(&self, stage: PipelineStage, count: u64) {
        let _ = stage;
        let _ = count;
    }

    fn run_finished(&self, status: RunStatus) {
        let _ = status;
    }
}
