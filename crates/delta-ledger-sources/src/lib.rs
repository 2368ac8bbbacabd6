// crates/delta-ledger-sources/src/lib.rs
// ============================================================================
// Module: Delta Ledger Sources
// Description: Built-in change and fact source implementations plus routing.
// Purpose: Provide ready-made sources aligned with the Delta Ledger core.
// Dependencies: bigdecimal, delta-ledger-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This crate ships built-in sources: in-memory buffers for tests and
//! embedding, JSONL file sources for operational loads, and a registry that
//! routes extractions by source table identifier.
//! Invariants:
//! - Sources return records captured strictly after the extraction cursor,
//!   ordered by capture position, bounded by the requested batch size.
//! - File inputs are untrusted; malformed lines fail the extraction closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod jsonl;
pub mod memory;
pub mod registry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use jsonl::DEFAULT_MAX_LINE_BYTES;
pub use jsonl::JsonlChangeSource;
pub use jsonl::JsonlFactSource;
pub use jsonl::JsonlSourceConfig;
pub use memory::StaticChangeSource;
pub use memory::StaticFactSource;
pub use registry::SourceError;
pub use registry::SourceRegistry;
