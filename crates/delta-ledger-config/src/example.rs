// crates/delta-ledger-config/src/example.rs
// ============================================================================
// Module: Config Example
// Description: Canonical annotated configuration file.
// Purpose: Ship a copy-paste starting point that always parses.
// Dependencies: None
// ============================================================================

//! ## Overview
//! The example names every section and key with its default value where one
//! exists, so operators start from a file that loads as-is. A test keeps the
//! example in lockstep with the model.

// ============================================================================
// SECTION: Example
// ============================================================================

/// Returns the canonical example configuration file.
#[must_use]
pub const fn config_toml_example() -> &'static str {
    r#"# delta-ledger.toml
# Incremental dimension loader configuration. Keys show their defaults
# unless noted. ${VAR} inside string values expands from the environment.

[store]
# Required: the SQLite ledger database file.
path = "ledger.db"
busy_timeout_ms = 5000
journal_mode = "wal"
sync_mode = "full"

[pipeline]
max_batch_size = 500
# Redelivery overlap; this example re-reads one hour of already-seen events.
late_window_ms = 3600000
max_attempts = 3
retry_backoff_ms = 250

[[pipeline.quality.expectations]]
kind = "not_null"
attribute = "email"

[[pipeline.quality.expectations]]
kind = "email_format"
attribute = "email"

[[pipeline.quality.expectations]]
kind = "positive"
attribute = "lifetime_value"

[[pipeline.quality.expectations]]
kind = "resolvable_key"

[rollup]
enabled = true
granularities = ["daily", "weekly", "monthly"]
group_attribute = "category"
fallback_group = "unclassified"

[alerts]
kind = "jsonl"
path = "alerts.jsonl"

[[sources]]
table = "customers"
path = "changes/customers.jsonl"
# Optional: fact stream backing rollups for this table.
facts_path = "facts/orders.jsonl"
"#
}
