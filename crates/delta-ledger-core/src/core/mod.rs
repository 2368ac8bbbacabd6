// crates/delta-ledger-core/src/core/mod.rs
// ============================================================================
// Module: Delta Ledger Core Types
// Description: Canonical change, history, and checkpoint data structures.
// Purpose: Provide stable, serializable types shared by every pipeline stage.
// Dependencies: bigdecimal, serde, serde_json
// ============================================================================

//! ## Overview
//! Core types define change records, SCD2 dimension history, watermarks,
//! quality expectations, facts, and run audit records. These types are the
//! canonical source of truth for every store schema and wire format derived
//! from them.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod change;
pub mod dimension;
pub mod fact;
pub mod hashing;
pub mod identifiers;
pub mod period;
pub mod quality;
pub mod time;
pub mod watermark;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::Notification;
pub use audit::RunAuditRecord;
pub use audit::RunStatus;
pub use audit::RunSummary;
pub use audit::Severity;
pub use change::AttributeMap;
pub use change::Batch;
pub use change::ChangeOp;
pub use change::ChangeRecord;
pub use change::attribute_hash;
pub use dimension::DimensionVersion;
pub use dimension::HistoryViolation;
pub use dimension::MergePlan;
pub use dimension::NewVersion;
pub use dimension::VersionMutation;
pub use dimension::verify_history;
pub use fact::AggregateFact;
pub use fact::FactRecord;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use hashing::MAX_ATTRIBUTE_BYTES;
pub use hashing::canonical_json_bytes;
pub use hashing::canonical_json_bytes_with_limit;
pub use hashing::hash_bytes;
pub use hashing::hash_canonical_json;
pub use hashing::hash_canonical_json_with_limit;
pub use identifiers::NaturalKey;
pub use identifiers::RunId;
pub use identifiers::SourceTableId;
pub use identifiers::SurrogateKey;
pub use period::PeriodError;
pub use period::PeriodGranularity;
pub use period::PeriodKey;
pub use period::periods_touched;
pub use quality::Expectation;
pub use quality::QualityReport;
pub use quality::QualitySuite;
pub use quality::QualityViolationDetail;
pub use self::time::EventTime;
pub use self::time::TimeError;
pub use watermark::Watermark;
