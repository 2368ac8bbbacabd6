// crates/delta-ledger-sources/src/registry.rs
// ============================================================================
// Module: Source Registry
// Description: Registry routing change extractions by source table.
// Purpose: Dispatch one pipeline over many per-table change sources.
// Dependencies: delta-ledger-core, thiserror
// ============================================================================

//! ## Overview
//! The registry holds one change source per source table and implements the
//! core [`delta_ledger_core::ChangeSource`] interface by routing each
//! extraction to the source registered for the requested table. Requests for
//! an unregistered table fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use delta_ledger_core::Batch;
use delta_ledger_core::ChangeSource;
use delta_ledger_core::ExtractError;
use delta_ledger_core::SourceTableId;
use delta_ledger_core::Watermark;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Source construction and registration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Source configuration failed validation.
    #[error("invalid source configuration: {0}")]
    InvalidConfig(String),
    /// A change source is already registered for the table.
    #[error("change source already registered for table: {0}")]
    AlreadyRegistered(String),
}

// ============================================================================
// SECTION: Source Registry
// ============================================================================

/// Change source registry keyed by source table identifier.
///
/// # Invariants
/// - At most one source is registered per source table.
/// - Extraction for an unregistered table fails closed.
/// - Registered sources are `Send + Sync` and stored behind trait objects.
pub struct SourceRegistry {
    /// Registered sources keyed by source table identifier.
    sources: BTreeMap<String, Box<dyn ChangeSource + Send + Sync>>,
}

impl SourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: BTreeMap::new(),
        }
    }

    /// Registers a source for one table.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::AlreadyRegistered`] when the table already has
    /// a source.
    pub fn register(
        &mut self,
        source_table: &SourceTableId,
        source: impl ChangeSource + Send + Sync + 'static,
    ) -> Result<(), SourceError> {
        if self.sources.contains_key(source_table.as_str()) {
            return Err(SourceError::AlreadyRegistered(source_table.as_str().to_owned()));
        }
        self.sources.insert(source_table.as_str().to_owned(), Box::new(source));
        Ok(())
    }

    /// Returns true when a source is registered for the table.
    #[must_use]
    pub fn is_registered(&self, source_table: &SourceTableId) -> bool {
        self.sources.contains_key(source_table.as_str())
    }

    /// Lists registered source tables in identifier order.
    #[must_use]
    pub fn tables(&self) -> Vec<SourceTableId> {
        self.sources.keys().cloned().map(SourceTableId::new).collect()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeSource for SourceRegistry {
    fn extract(
        &self,
        source_table: &SourceTableId,
        since: &Watermark,
        max_batch_size: usize,
    ) -> Result<Batch, ExtractError> {
        let Some(source) = self.sources.get(source_table.as_str()) else {
            return Err(ExtractError::SchemaMismatch(format!(
                "no change source registered for table: {source_table}"
            )));
        };
        source.extract(source_table, since, max_batch_size)
    }
}
