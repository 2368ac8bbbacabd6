// crates/delta-ledger-store-sqlite/src/lib.rs
// ============================================================================
// Module: Delta Ledger SQLite Store Library
// Description: Durable SQLite-backed implementation of the ledger stores.
// Purpose: Expose the SQLite store, its configuration, and its error type.
// Dependencies: crate::store
// ============================================================================

//! ## Overview
//! One `SQLite` database file persists dimension history, watermarks, run
//! audit records, and aggregate rows, so a merged batch and its checkpoint
//! share a single durability domain. Merge plans apply as one transaction;
//! a conflicting mutation rolls the whole plan back and surfaces as a
//! retryable conflict.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::DEFAULT_BUSY_TIMEOUT_MS;
pub use store::SCHEMA_VERSION;
pub use store::SqliteJournalMode;
pub use store::SqliteLedgerStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteSyncMode;
