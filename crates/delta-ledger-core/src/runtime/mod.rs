// crates/delta-ledger-core/src/runtime/mod.rs
// ============================================================================
// Module: Delta Ledger Runtime
// Description: Pipeline stages, in-memory stores, and run orchestration.
// Purpose: Execute incremental loads against pluggable source and store backends.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the loader pipeline: extraction, quality
//! gating, late-arrival classification, SCD2 merge planning, checkpointing,
//! and rollup recomputation. Every operational surface (CLI or embedding)
//! must call into the same [`pipeline::Pipeline`] methods to preserve the
//! recovery and idempotence guarantees.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod alerts;
pub mod checkpoint;
pub mod classifier;
pub mod extractor;
pub mod lock;
pub mod merger;
pub mod pipeline;
pub mod rollup;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use alerts::MemoryAlertSink;
pub use alerts::NullAlertSink;
pub use checkpoint::CheckpointManager;
pub use classifier::ClassifiedBatch;
pub use classifier::HistorySnapshot;
pub use classifier::LateArrivalClassifier;
pub use extractor::DEFAULT_MAX_BATCH_SIZE;
pub use extractor::Extractor;
pub use lock::LockError;
pub use lock::SourceLockGuard;
pub use lock::SourceLockRegistry;
pub use merger::MergeError;
pub use merger::MergeOutcome;
pub use merger::Scd2Merger;
pub use pipeline::BackfillReport;
pub use pipeline::DEFAULT_MAX_ATTEMPTS;
pub use pipeline::DEFAULT_RETRY_BACKOFF_MS;
pub use pipeline::Pipeline;
pub use pipeline::PipelineConfig;
pub use pipeline::PipelineError;
pub use pipeline::StatusReport;
pub use pipeline::VerifyReport;
pub use rollup::DEFAULT_FALLBACK_GROUP;
pub use rollup::DEFAULT_GROUP_ATTRIBUTE;
pub use rollup::RollupConfig;
pub use rollup::RollupEngine;
pub use rollup::RollupError;
pub use rollup::RollupHook;
pub use rollup::RollupRunner;
pub use store::MemoryLedgerStore;
