// crates/delta-ledger-core/src/lib.rs
// ============================================================================
// Module: Delta Ledger Core Library
// Description: Public API surface for the Delta Ledger core.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Delta Ledger core provides incremental change-data loading with full SCD2
//! dimension history, checkpointed recovery, and re-derivable rollups. It is
//! backend-agnostic and integrates through explicit interfaces rather than
//! embedding any particular database or transport.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::core::*;

pub use interfaces::AggregateError;
pub use interfaces::AggregateStore;
pub use interfaces::AlertError;
pub use interfaces::AlertSink;
pub use interfaces::ChangeSource;
pub use interfaces::CheckpointError;
pub use interfaces::CheckpointStore;
pub use interfaces::DimensionStore;
pub use interfaces::ExtractError;
pub use interfaces::FactSource;
pub use interfaces::FactSourceError;
pub use interfaces::NoopMetrics;
pub use interfaces::PipelineMetrics;
pub use interfaces::PipelineStage;
pub use interfaces::StoreError;
pub use runtime::BackfillReport;
pub use runtime::CheckpointManager;
pub use runtime::ClassifiedBatch;
pub use runtime::Extractor;
pub use runtime::HistorySnapshot;
pub use runtime::LateArrivalClassifier;
pub use runtime::LockError;
pub use runtime::MemoryAlertSink;
pub use runtime::MemoryLedgerStore;
pub use runtime::MergeError;
pub use runtime::MergeOutcome;
pub use runtime::NullAlertSink;
pub use runtime::Pipeline;
pub use runtime::PipelineConfig;
pub use runtime::PipelineError;
pub use runtime::RollupConfig;
pub use runtime::RollupEngine;
pub use runtime::RollupError;
pub use runtime::RollupHook;
pub use runtime::RollupRunner;
pub use runtime::Scd2Merger;
pub use runtime::SourceLockGuard;
pub use runtime::SourceLockRegistry;
pub use runtime::StatusReport;
pub use runtime::VerifyReport;
