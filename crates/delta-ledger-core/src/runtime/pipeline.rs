// crates/delta-ledger-core/src/runtime/pipeline.rs
// ============================================================================
// Module: Delta Ledger Pipeline
// Description: Extract, gate, classify, merge, checkpoint, and roll up.
// Purpose: Execute complete loader runs with recoverable failure semantics.
// Dependencies: thiserror, crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The pipeline is the single canonical execution path of the loader. A run
//! extracts one batch past the watermark, gates it on quality, classifies it
//! against the watermark, merges it into dimension history, commits the
//! checkpoint, and refreshes touched rollup periods. Every stage before the
//! checkpoint leaves the watermark untouched on failure; the next run simply
//! re-extracts the same window and the idempotent merge absorbs redelivery.
//!
//! Transient faults (unreachable source, merge conflicts, checkpoint write
//! failures) are retried with exponential backoff inside a run. Fatal faults
//! (schema mismatch, quality violations) fail the run immediately and leave
//! the watermark untouched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::EventTime;
use crate::core::Notification;
use crate::core::PeriodKey;
use crate::core::QualityReport;
use crate::core::QualitySuite;
use crate::core::RunAuditRecord;
use crate::core::RunId;
use crate::core::RunStatus;
use crate::core::RunSummary;
use crate::core::Severity;
use crate::core::SourceTableId;
use crate::core::Watermark;
use crate::core::attribute_hash;
use crate::core::verify_history;
use crate::interfaces::AlertSink;
use crate::interfaces::ChangeSource;
use crate::interfaces::CheckpointError;
use crate::interfaces::CheckpointStore;
use crate::interfaces::DimensionStore;
use crate::interfaces::ExtractError;
use crate::interfaces::FactSourceError;
use crate::interfaces::NoopMetrics;
use crate::interfaces::PipelineMetrics;
use crate::interfaces::PipelineStage;
use crate::interfaces::StoreError;
use crate::runtime::checkpoint::CheckpointManager;
use crate::runtime::classifier::LateArrivalClassifier;
use crate::runtime::extractor::DEFAULT_MAX_BATCH_SIZE;
use crate::runtime::extractor::Extractor;
use crate::runtime::lock::LockError;
use crate::runtime::lock::SourceLockRegistry;
use crate::runtime::merger::MergeError;
use crate::runtime::merger::Scd2Merger;
use crate::runtime::rollup::RollupError;
use crate::runtime::rollup::RollupHook;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of attempts per run before a transient fault becomes fatal.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base backoff between attempts.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

// ============================================================================
// SECTION: Pipeline Errors
// ============================================================================

/// Pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Pipeline configuration failed validation.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
    /// The source table's lock is held by another run.
    #[error(transparent)]
    Lock(#[from] LockError),
    /// Extraction failed.
    #[error(transparent)]
    Extract(#[from] ExtractError),
    /// The quality gate rejected the batch; the watermark is untouched.
    #[error("quality gate rejected batch: {} violation(s) across {} record(s)", .0.violations.len(), .0.records_checked)]
    Quality(QualityReport),
    /// Dimension store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Checkpoint store failure.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    /// Merge planning failure.
    #[error(transparent)]
    Merge(#[from] MergeError),
    /// Rollup recomputation failure.
    #[error(transparent)]
    Rollup(#[from] RollupError),
    /// A rollup operation was requested without a configured hook.
    #[error("no rollup hook configured")]
    RollupUnavailable,
}

impl PipelineError {
    /// Returns true when retrying the run may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Lock(LockError::AlreadyHeld(_)) => true,
            Self::Extract(error) => error.is_transient(),
            Self::Store(error) => error.is_transient(),
            Self::Checkpoint(error) => error.is_transient(),
            Self::Rollup(RollupError::Facts(FactSourceError::Unavailable(_))) => true,
            Self::InvalidConfig(_)
            | Self::Lock(LockError::Poisoned)
            | Self::Quality(_)
            | Self::Merge(_)
            | Self::Rollup(_)
            | Self::RollupUnavailable => false,
        }
    }
}

// ============================================================================
// SECTION: Pipeline Configuration
// ============================================================================

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum records per extracted batch.
    pub max_batch_size: usize,
    /// Redelivery overlap applied to the extraction cursor, in milliseconds.
    pub late_window_ms: i64,
    /// Attempts per run before a transient fault becomes fatal.
    pub max_attempts: u32,
    /// Base backoff between attempts; doubles per attempt.
    pub retry_backoff_ms: u64,
    /// Quality expectations gating every batch.
    pub quality: QualitySuite,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            late_window_ms: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            quality: QualitySuite::default(),
        }
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Outcome of a backfill loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    /// Runs executed.
    pub runs: u64,
    /// Records extracted across all runs.
    pub records_extracted: u64,
    /// Records that changed history across all runs.
    pub records_merged: u64,
    /// Late-arriving records spliced across all runs.
    pub late_corrections: u64,
    /// True when the loop stopped because the source was drained.
    pub exhausted: bool,
}

/// Outcome of a history verification sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Source table that was verified.
    pub source_table: SourceTableId,
    /// Natural keys inspected.
    pub keys_checked: u64,
    /// Versions inspected.
    pub versions_checked: u64,
    /// Human-readable violations, empty when the history is sound.
    pub violations: Vec<String>,
}

impl VerifyReport {
    /// Returns true when no violation was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Operational status of one source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Source table the status describes.
    pub source_table: SourceTableId,
    /// Stored watermark, absent before the first successful run.
    pub watermark: Option<Watermark>,
    /// Most recent audit records, newest first.
    pub recent_runs: Vec<RunAuditRecord>,
}

/// Accounting carried out of one successful attempt.
#[derive(Debug)]
struct AttemptOutcome {
    /// Records returned by the source.
    records_extracted: u64,
    /// Records that changed history.
    records_merged: u64,
    /// Records spliced before their key's frontier.
    late_corrections: u64,
    /// Extraction cursor after absorbing the batch.
    advanced: Watermark,
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Incremental loader pipeline over pluggable source and store backends.
pub struct Pipeline<S, D, C: CheckpointStore, A, R> {
    /// Change source implementation.
    source: S,
    /// Dimension store implementation.
    dimensions: D,
    /// Checkpoint manager over the checkpoint store.
    checkpoints: CheckpointManager<C>,
    /// Alert sink implementation.
    alerts: A,
    /// Optional post-checkpoint rollup hook.
    rollup: Option<R>,
    /// Pipeline configuration.
    config: PipelineConfig,
    /// Batch extractor derived from the configuration.
    extractor: Extractor,
    /// Late-arrival classifier.
    classifier: LateArrivalClassifier,
    /// Merge planner.
    merger: Scd2Merger,
    /// Per-source advisory locks.
    locks: SourceLockRegistry,
    /// Metrics recorder.
    metrics: Box<dyn PipelineMetrics + Send + Sync>,
    /// Process-local run sequence.
    run_seq: AtomicU64,
}

impl<S, D, C, A, R> Pipeline<S, D, C, A, R>
where
    S: ChangeSource,
    D: DimensionStore,
    C: CheckpointStore,
    A: AlertSink,
    R: RollupHook,
{
    /// Creates a new pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] when the configuration fails
    /// validation.
    pub fn new(
        source: S,
        dimensions: D,
        checkpoints: C,
        alerts: A,
        rollup: Option<R>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        if config.max_batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_batch_size must be greater than zero".to_string(),
            ));
        }
        if config.max_attempts == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_attempts must be greater than zero".to_string(),
            ));
        }
        if config.late_window_ms < 0 {
            return Err(PipelineError::InvalidConfig(
                "late_window_ms must not be negative".to_string(),
            ));
        }
        let extractor = Extractor::new(config.max_batch_size, config.late_window_ms);
        Ok(Self {
            source,
            dimensions,
            checkpoints: CheckpointManager::new(checkpoints),
            alerts,
            rollup,
            config,
            extractor,
            classifier: LateArrivalClassifier,
            merger: Scd2Merger,
            locks: SourceLockRegistry::new(),
            metrics: Box::new(NoopMetrics),
            run_seq: AtomicU64::new(0),
        })
    }

    /// Replaces the metrics recorder.
    #[must_use]
    pub fn with_metrics(
        mut self,
        metrics: impl PipelineMetrics + Send + Sync + 'static,
    ) -> Self {
        self.metrics = Box::new(metrics);
        self
    }

    /// Executes one complete run for a source table.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the run fails after exhausting
    /// transient retries; the watermark is left untouched.
    pub fn run_once(&self, source_table: &SourceTableId) -> Result<RunSummary, PipelineError> {
        self.run_with_prefix(source_table, "run", None).map(|(summary, _)| summary)
    }

    /// Repeats runs until the source is drained or `max_runs` is reached.
    ///
    /// Each iteration is a complete run with its own audit record; the loop
    /// stops after the first run that extracts nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] from the first failing run; earlier runs of
    /// the loop stay committed.
    pub fn backfill(
        &self,
        source_table: &SourceTableId,
        max_runs: u64,
    ) -> Result<BackfillReport, PipelineError> {
        let mut report = BackfillReport {
            runs: 0,
            records_extracted: 0,
            records_merged: 0,
            late_corrections: 0,
            exhausted: false,
        };
        while report.runs < max_runs {
            let (summary, _) = self.run_with_prefix(source_table, "backfill", None)?;
            report.runs += 1;
            report.records_extracted += summary.records_extracted;
            report.records_merged += summary.records_merged;
            report.late_corrections += summary.late_corrections;
            if summary.records_extracted == 0 {
                report.exhausted = true;
                break;
            }
        }
        Ok(report)
    }

    /// Repeats runs from a seeded watermark until the source is drained or
    /// `max_runs` is reached.
    ///
    /// The seeded cursor may trail the stored watermark; re-extracted records
    /// merge as no-ops, and each commit stores the componentwise maximum of
    /// the stored watermark and the loop cursor, so the stored watermark
    /// never regresses.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] when the watermark belongs to
    /// a different source table, and [`PipelineError`] from the first failing
    /// run; earlier runs of the loop stay committed.
    pub fn backfill_from(
        &self,
        source_table: &SourceTableId,
        from: &Watermark,
        max_runs: u64,
    ) -> Result<BackfillReport, PipelineError> {
        if from.source_table != *source_table {
            return Err(PipelineError::InvalidConfig(format!(
                "backfill watermark belongs to source table {}, not {source_table}",
                from.source_table
            )));
        }
        let mut cursor = from.clone();
        let mut report = BackfillReport {
            runs: 0,
            records_extracted: 0,
            records_merged: 0,
            late_corrections: 0,
            exhausted: false,
        };
        while report.runs < max_runs {
            let (summary, advanced) =
                self.run_with_prefix(source_table, "backfill", Some(&cursor))?;
            report.runs += 1;
            report.records_extracted += summary.records_extracted;
            report.records_merged += summary.records_merged;
            report.late_corrections += summary.late_corrections;
            if summary.records_extracted == 0 {
                report.exhausted = true;
                break;
            }
            cursor = advanced;
        }
        Ok(report)
    }

    /// Verifies interval invariants and attribute hashes for every key.
    ///
    /// Violations are collected into the report instead of failing fast, so
    /// one corrupt key does not hide the rest.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] when the key listing fails.
    pub fn verify(&self, source_table: &SourceTableId) -> Result<VerifyReport, PipelineError> {
        let keys = self.dimensions.keys(source_table)?;
        let mut report = VerifyReport {
            source_table: source_table.clone(),
            keys_checked: 0,
            versions_checked: 0,
            violations: Vec::new(),
        };
        for key in keys {
            report.keys_checked += 1;
            let history = match self.dimensions.history(source_table, &key) {
                Ok(history) => history,
                Err(error) => {
                    report.violations.push(format!("key {key}: {error}"));
                    continue;
                }
            };
            report.versions_checked += history.len() as u64;
            if let Err(violation) = verify_history(&key, &history) {
                report.violations.push(violation.to_string());
            }
            for version in &history {
                match attribute_hash(&version.attributes) {
                    Ok(digest) if digest == version.attribute_hash => {}
                    Ok(_) => report.violations.push(format!(
                        "key {key}: attribute hash mismatch for version {}",
                        version.surrogate_key
                    )),
                    Err(error) => report.violations.push(format!("key {key}: {error}")),
                }
            }
        }
        Ok(report)
    }

    /// Reports the stored watermark and recent runs for a source table.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Checkpoint`] when the checkpoint store fails.
    pub fn status(
        &self,
        source_table: &SourceTableId,
        limit: usize,
    ) -> Result<StatusReport, PipelineError> {
        Ok(StatusReport {
            source_table: source_table.clone(),
            watermark: self.checkpoints.stored_watermark(source_table)?,
            recent_runs: self.checkpoints.recent_runs(source_table, limit)?,
        })
    }

    /// Rebuilds every rollup period from facts.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::RollupUnavailable`] when no hook is
    /// configured and [`PipelineError::Rollup`] when the rebuild fails.
    pub fn rebuild_rollups(&self) -> Result<Vec<PeriodKey>, PipelineError> {
        let Some(rollup) = &self.rollup else {
            return Err(PipelineError::RollupUnavailable);
        };
        Ok(rollup.rebuild()?)
    }

    /// Runs the retry loop and books the audit record for one run.
    ///
    /// Returns the run summary together with the extraction cursor after the
    /// merged batch, which seeded backfill loops carry forward.
    fn run_with_prefix(
        &self,
        source_table: &SourceTableId,
        prefix: &str,
        cursor: Option<&Watermark>,
    ) -> Result<(RunSummary, Watermark), PipelineError> {
        let started = EventTime::now();
        let run_id = self.next_run_id(prefix, source_table, started);
        let guard = match self.locks.acquire(source_table) {
            Ok(guard) => guard,
            Err(error) => {
                self.notify(
                    Severity::Warning,
                    source_table,
                    &run_id,
                    format!("run skipped: {error}"),
                );
                return Err(error.into());
            }
        };
        let mut attempt = 0u32;
        let outcome = loop {
            attempt += 1;
            match self.attempt_run(source_table, &run_id, cursor) {
                Ok(outcome) => break outcome,
                Err(error) if error.is_transient() && attempt < self.config.max_attempts => {
                    self.notify(
                        Severity::Warning,
                        source_table,
                        &run_id,
                        format!("attempt {attempt} failed, retrying: {error}"),
                    );
                    thread::sleep(Duration::from_millis(backoff_ms(
                        self.config.retry_backoff_ms,
                        attempt,
                    )));
                }
                Err(error) => {
                    self.finish_failed(source_table, &run_id, started, &error);
                    drop(guard);
                    return Err(error);
                }
            }
        };
        drop(guard);
        let finished = EventTime::now();
        let summary = RunSummary {
            run_id: run_id.clone(),
            source_table: source_table.clone(),
            records_extracted: outcome.records_extracted,
            records_merged: outcome.records_merged,
            late_corrections: outcome.late_corrections,
            duration_ms: millis_between(started, finished),
        };
        let record = RunAuditRecord {
            run_id,
            source_table: source_table.clone(),
            started_at: started,
            finished_at: finished,
            status: RunStatus::Succeeded,
            records_extracted: outcome.records_extracted,
            records_merged: outcome.records_merged,
            late_corrections: outcome.late_corrections,
            message: None,
        };
        if let Err(error) = self.checkpoints.record_run(&record) {
            self.notify(
                Severity::Warning,
                source_table,
                &record.run_id,
                format!("run audit write failed: {error}"),
            );
        }
        self.metrics.run_finished(RunStatus::Succeeded);
        let _ = self.alerts.summary(&summary);
        Ok((summary, outcome.advanced))
    }

    /// Executes one attempt of the extract-to-rollup sequence.
    #[allow(
        clippy::too_many_lines,
        reason = "Maintain a single linear flow through the pipeline stages."
    )]
    fn attempt_run(
        &self,
        source_table: &SourceTableId,
        run_id: &RunId,
        cursor: Option<&Watermark>,
    ) -> Result<AttemptOutcome, PipelineError> {
        let stage_clock = Instant::now();
        let watermark = match cursor {
            Some(seeded) => seeded.clone(),
            None => self.checkpoints.resolve(source_table)?,
        };
        let batch = self.extractor.pull(&self.source, source_table, &watermark)?;
        self.stage_done(PipelineStage::Extract, stage_clock, batch.len() as u64);
        if batch.is_empty() {
            return Ok(AttemptOutcome {
                records_extracted: 0,
                records_merged: 0,
                late_corrections: 0,
                advanced: watermark,
            });
        }
        let records_extracted = batch.len() as u64;
        let advanced = watermark.advanced_by(&batch);
        let event_times = batch.event_times();

        let stage_clock = Instant::now();
        let report = self.config.quality.evaluate(&batch);
        self.stage_done(PipelineStage::Quality, stage_clock, records_extracted);
        if !report.is_clean() {
            return Err(PipelineError::Quality(report));
        }

        let stage_clock = Instant::now();
        let classified = self.classifier.classify(&self.dimensions, &watermark, batch)?;
        self.stage_done(PipelineStage::Classify, stage_clock, classified.late_count as u64);

        let stage_clock = Instant::now();
        let merge = self.merger.plan(&classified)?;
        if !merge.plan.is_empty() {
            self.dimensions.apply(&merge.plan)?;
        }
        self.stage_done(PipelineStage::Merge, stage_clock, merge.records_merged);

        let stage_clock = Instant::now();
        if cursor.is_some() {
            // A seeded cursor may trail the stored watermark; commit the
            // maximum of the two so the stored cursor stays monotone.
            let stored = self.checkpoints.resolve(source_table)?;
            let target = advanced.max_with(&stored);
            self.checkpoints.advance(&stored, &target)?;
        } else {
            self.checkpoints.advance(&watermark, &advanced)?;
        }
        self.stage_done(PipelineStage::Checkpoint, stage_clock, 1);

        if let Some(rollup) = &self.rollup {
            let stage_clock = Instant::now();
            match rollup.refresh(&event_times) {
                Ok(periods) => {
                    self.stage_done(PipelineStage::Rollup, stage_clock, periods.len() as u64);
                }
                Err(error) => {
                    // Aggregates are re-derivable; a refresh failure does not
                    // undo the committed merge.
                    self.notify(
                        Severity::Warning,
                        source_table,
                        run_id,
                        format!("rollup refresh failed: {error}"),
                    );
                }
            }
        }
        Ok(AttemptOutcome {
            records_extracted,
            records_merged: merge.records_merged,
            late_corrections: merge.late_corrections,
            advanced,
        })
    }

    /// Books the failure audit record and alerts the operator.
    fn finish_failed(
        &self,
        source_table: &SourceTableId,
        run_id: &RunId,
        started: EventTime,
        error: &PipelineError,
    ) {
        let finished = EventTime::now();
        let record = RunAuditRecord {
            run_id: run_id.clone(),
            source_table: source_table.clone(),
            started_at: started,
            finished_at: finished,
            status: RunStatus::Failed,
            records_extracted: 0,
            records_merged: 0,
            late_corrections: 0,
            message: Some(error.to_string()),
        };
        if let Err(audit_error) = self.checkpoints.record_run(&record) {
            self.notify(
                Severity::Warning,
                source_table,
                run_id,
                format!("run audit write failed: {audit_error}"),
            );
        }
        self.metrics.run_finished(RunStatus::Failed);
        self.notify(Severity::Error, source_table, run_id, error.to_string());
    }

    /// Delivers a notification on a best-effort basis.
    fn notify(
        &self,
        severity: Severity,
        source_table: &SourceTableId,
        run_id: &RunId,
        message: String,
    ) {
        let notification = Notification {
            severity,
            source_table: source_table.clone(),
            run_id: run_id.clone(),
            message,
        };
        let _ = self.alerts.alert(&notification);
    }

    /// Records one completed stage in the metrics.
    fn stage_done(&self, stage: PipelineStage, clock: Instant, count: u64) {
        let elapsed = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.metrics.stage_completed(stage, elapsed);
        self.metrics.records_processed(stage, count);
    }

    /// Builds the next run identifier.
    fn next_run_id(
        &self,
        prefix: &str,
        source_table: &SourceTableId,
        started: EventTime,
    ) -> RunId {
        let seq = self.run_seq.fetch_add(1, Ordering::Relaxed) + 1;
        RunId::new(format!(
            "{prefix}-{source_table}-{}-{seq}",
            started.as_unix_millis()
        ))
    }
}

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

/// Exponential backoff for the given attempt, saturating on overflow.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    let factor = 1_u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    base.saturating_mul(factor)
}

/// Non-negative wall-clock difference in milliseconds.
fn millis_between(started: EventTime, finished: EventTime) -> u64 {
    let delta = finished.as_unix_millis().saturating_sub(started.as_unix_millis());
    u64::try_from(delta).unwrap_or_default()
}
