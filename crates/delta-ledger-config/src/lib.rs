// crates/delta-ledger-config/src/lib.rs
// ============================================================================
// Module: Delta Ledger Config Library
// Description: TOML configuration loading, substitution, and validation.
// Purpose: Expose the config model, loader entry points, and example file.
// Dependencies: crate::env, crate::example, crate::loader, crate::model
// ============================================================================

//! ## Overview
//! One `delta-ledger.toml` file configures the store, the pipeline, rollups,
//! alerts, and the change sources. Loading is fail-closed: unknown keys,
//! unresolved `${VAR}` references, over-long paths, oversized files, and
//! invalid values all reject the config before anything opens a database or
//! reads a source. Sections convert into the runtime's own configuration
//! types, so downstream crates never see TOML.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod env;
pub mod example;
pub mod loader;
pub mod model;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use example::config_toml_example;
pub use loader::CONFIG_ENV_VAR;
pub use loader::DEFAULT_CONFIG_NAME;
pub use loader::MAX_CONFIG_FILE_SIZE;
pub use model::AlertSinkKind;
pub use model::AlertsSection;
pub use model::ConfigError;
pub use model::LedgerConfig;
pub use model::PipelineSection;
pub use model::QualitySection;
pub use model::RollupSection;
pub use model::SourceEntry;
pub use model::StoreSection;
