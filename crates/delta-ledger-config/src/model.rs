// crates/delta-ledger-config/src/model.rs
// ============================================================================
// Module: Ledger Config Model
// Description: TOML-facing configuration sections and their validation.
// Purpose: Define the config shape and convert sections into runtime types.
// Dependencies: delta-ledger-core, delta-ledger-store-sqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! The configuration model mirrors `delta-ledger.toml` section by section.
//! Every section carries serde defaults so a minimal file stays minimal, and
//! a `validate` method that fails closed on anything the runtime would choke
//! on later: missing store paths, zero batch sizes, blank tables, duplicate
//! tables, and over-long paths. Sections convert into the runtime's own
//! configuration types; the model never leaks TOML concerns downstream.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

use delta_ledger_core::Expectation;
use delta_ledger_core::PeriodGranularity;
use delta_ledger_core::PipelineConfig;
use delta_ledger_core::QualitySuite;
use delta_ledger_core::RollupConfig;
use delta_ledger_core::runtime::DEFAULT_FALLBACK_GROUP;
use delta_ledger_core::runtime::DEFAULT_GROUP_ATTRIBUTE;
use delta_ledger_core::runtime::DEFAULT_MAX_ATTEMPTS;
use delta_ledger_core::runtime::DEFAULT_MAX_BATCH_SIZE;
use delta_ledger_core::runtime::DEFAULT_RETRY_BACKOFF_MS;
use delta_ledger_store_sqlite::DEFAULT_BUSY_TIMEOUT_MS;
use delta_ledger_store_sqlite::SqliteJournalMode;
use delta_ledger_store_sqlite::SqliteStoreConfig;
use delta_ledger_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum total length of any configured path.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4_096;

/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// The config file is not valid TOML for the expected shape.
    #[error("config parse error: {0}")]
    Parse(String),
    /// The config parsed but fails validation.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Top-Level Config
// ============================================================================

/// Complete `delta-ledger.toml` configuration.
///
/// # Invariants
/// - Unknown keys anywhere in the file fail parsing.
/// - Every section validates before the config is handed to callers.
/// - Source tables are unique across the `[[sources]]` array.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Durable store settings.
    #[serde(default)]
    pub store: StoreSection,
    /// Pipeline execution settings.
    #[serde(default)]
    pub pipeline: PipelineSection,
    /// Rollup recomputation settings.
    #[serde(default)]
    pub rollup: RollupSection,
    /// Alert delivery settings.
    #[serde(default)]
    pub alerts: AlertsSection,
    /// Change sources, one entry per source table.
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

impl LedgerConfig {
    /// Validates every section and the cross-section invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.pipeline.validate()?;
        self.rollup.validate()?;
        self.alerts.validate()?;
        let mut seen = BTreeSet::new();
        for source in &self.sources {
            source.validate()?;
            if !seen.insert(source.table.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate source table: {}",
                    source.table
                )));
            }
        }
        Ok(())
    }

    /// Returns the source entry for a table, if one is configured.
    #[must_use]
    pub fn source_for(&self, table: &str) -> Option<&SourceEntry> {
        self.sources.iter().find(|source| source.table == table)
    }
}

// ============================================================================
// SECTION: Store Section
// ============================================================================

/// `[store]` section: the SQLite ledger database.
///
/// # Invariants
/// - `path` is required; the loader refuses a config without one.
/// - Path length and component limits are enforced before any open.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// Database file path.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Journal mode pragma.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// Synchronous mode pragma.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Maximum encoded attribute payload size in bytes.
    #[serde(default)]
    pub max_attribute_bytes: Option<usize>,
}

impl StoreSection {
    /// Validates the store settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the path is missing or exceeds
    /// the limits, or a size bound is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Err(ConfigError::Invalid("store path is required".to_string()));
        };
        validate_path_limits("store path", path)?;
        if self.max_attribute_bytes == Some(0) {
            return Err(ConfigError::Invalid(
                "store max_attribute_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts the section into the store's own configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the path is missing.
    pub fn to_store_config(&self) -> Result<SqliteStoreConfig, ConfigError> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| ConfigError::Invalid("store path is required".to_string()))?;
        Ok(SqliteStoreConfig {
            path,
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
            max_attribute_bytes: self.max_attribute_bytes,
        })
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            max_attribute_bytes: None,
        }
    }
}

// ============================================================================
// SECTION: Pipeline Section
// ============================================================================

/// `[pipeline]` section: batch, retry, and quality settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSection {
    /// Maximum records per extracted batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Redelivery overlap applied to the extraction cursor, in milliseconds.
    #[serde(default)]
    pub late_window_ms: i64,
    /// Attempts per run before a transient fault becomes fatal.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff between attempts; doubles per attempt.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Quality expectations gating every batch.
    #[serde(default)]
    pub quality: QualitySection,
}

impl PipelineSection {
    /// Validates the pipeline settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on zero bounds, a negative overlap
    /// window, or a blank expectation attribute.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "pipeline max_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "pipeline max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.late_window_ms < 0 {
            return Err(ConfigError::Invalid(
                "pipeline late_window_ms must not be negative".to_string(),
            ));
        }
        for expectation in &self.quality.expectations {
            if let Some(attribute) = expectation_attribute(expectation)
                && attribute.trim().is_empty()
            {
                return Err(ConfigError::Invalid(format!(
                    "quality expectation {} has a blank attribute",
                    expectation.label()
                )));
            }
        }
        Ok(())
    }

    /// Converts the section into the runtime pipeline configuration.
    #[must_use]
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_batch_size: self.max_batch_size,
            late_window_ms: self.late_window_ms,
            max_attempts: self.max_attempts,
            retry_backoff_ms: self.retry_backoff_ms,
            quality: QualitySuite::new(self.quality.expectations.clone()),
        }
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            late_window_ms: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            quality: QualitySection::default(),
        }
    }
}

/// `[pipeline.quality]` subsection: declarative expectations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualitySection {
    /// Expectations evaluated in order against each record.
    #[serde(default)]
    pub expectations: Vec<Expectation>,
}

// ============================================================================
// SECTION: Rollup Section
// ============================================================================

/// `[rollup]` section: aggregation grains and grouping.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RollupSection {
    /// Whether runs refresh aggregates at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Grains recomputed for every touched event time.
    #[serde(default = "default_granularities")]
    pub granularities: Vec<PeriodGranularity>,
    /// Fact attribute used as the dimension group.
    #[serde(default = "default_group_attribute")]
    pub group_attribute: String,
    /// Group assigned to facts missing the grouping attribute.
    #[serde(default = "default_fallback_group")]
    pub fallback_group: String,
}

impl RollupSection {
    /// Validates the rollup settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when enabled with no grains, a
    /// repeated grain, or a blank group name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.granularities.is_empty() {
            return Err(ConfigError::Invalid(
                "rollup granularities must not be empty".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for granularity in &self.granularities {
            if !seen.insert(granularity) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate rollup granularity: {granularity}"
                )));
            }
        }
        if self.group_attribute.trim().is_empty() {
            return Err(ConfigError::Invalid("rollup group_attribute is empty".to_string()));
        }
        if self.fallback_group.trim().is_empty() {
            return Err(ConfigError::Invalid("rollup fallback_group is empty".to_string()));
        }
        Ok(())
    }

    /// Converts the section into the runtime rollup configuration.
    #[must_use]
    pub fn to_rollup_config(&self) -> RollupConfig {
        RollupConfig {
            granularities: self.granularities.clone(),
            group_attribute: self.group_attribute.clone(),
            fallback_group: self.fallback_group.clone(),
        }
    }
}

impl Default for RollupSection {
    fn default() -> Self {
        Self {
            enabled: true,
            granularities: default_granularities(),
            group_attribute: DEFAULT_GROUP_ATTRIBUTE.to_owned(),
            fallback_group: DEFAULT_FALLBACK_GROUP.to_owned(),
        }
    }
}

// ============================================================================
// SECTION: Alerts Section
// ============================================================================

/// Alert delivery backends selectable from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSinkKind {
    /// Discard every notification.
    #[default]
    None,
    /// Append notifications to a JSONL file.
    Jsonl,
}

/// `[alerts]` section: where run notifications go.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertsSection {
    /// Selected sink backend.
    #[serde(default)]
    pub kind: AlertSinkKind,
    /// Output file for the JSONL sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AlertsSection {
    /// Validates the alert settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the JSONL sink lacks a path or
    /// the path exceeds the limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (self.kind, &self.path) {
            (AlertSinkKind::Jsonl, None) => {
                Err(ConfigError::Invalid("jsonl alert sink requires a path".to_string()))
            }
            (AlertSinkKind::Jsonl, Some(path)) => validate_path_limits("alert path", path),
            (AlertSinkKind::None, _) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Source Entries
// ============================================================================

/// One `[[sources]]` entry: a JSONL change stream for a source table.
///
/// # Invariants
/// - `table` and `path` are required and validated.
/// - `facts_path`, when present, names the fact stream rollups derive from.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceEntry {
    /// Source table served by this entry.
    pub table: String,
    /// JSONL change stream path.
    pub path: PathBuf,
    /// Optional JSONL fact stream path for rollups.
    #[serde(default)]
    pub facts_path: Option<PathBuf>,
    /// Maximum accepted line length in bytes.
    #[serde(default)]
    pub max_line_bytes: Option<usize>,
}

impl SourceEntry {
    /// Validates the source entry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on a blank table, over-long path, or
    /// zero line limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table.trim().is_empty() {
            return Err(ConfigError::Invalid("source table is empty".to_string()));
        }
        validate_path_limits("source path", &self.path)?;
        if let Some(facts_path) = &self.facts_path {
            validate_path_limits("facts path", facts_path)?;
        }
        if self.max_line_bytes == Some(0) {
            return Err(ConfigError::Invalid(
                "source max_line_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates total and per-component length limits for a configured path.
pub(crate) fn validate_path_limits(label: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{label} exceeds max length")));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{label} component too long")));
        }
    }
    Ok(())
}

/// Returns the attribute an expectation inspects, when it has one.
const fn expectation_attribute(expectation: &Expectation) -> Option<&String> {
    match expectation {
        Expectation::NotNull { attribute }
        | Expectation::Positive { attribute }
        | Expectation::EmailFormat { attribute } => Some(attribute),
        Expectation::ResolvableKey => None,
    }
}

/// Returns the default busy timeout in milliseconds.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default maximum batch size.
const fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

/// Returns the default attempt bound.
const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Returns the default retry backoff in milliseconds.
const fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

/// Returns the default enablement flag.
const fn default_enabled() -> bool {
    true
}

/// Returns the default rollup grains.
fn default_granularities() -> Vec<PeriodGranularity> {
    vec![PeriodGranularity::Daily, PeriodGranularity::Weekly, PeriodGranularity::Monthly]
}

/// Returns the default grouping attribute.
fn default_group_attribute() -> String {
    DEFAULT_GROUP_ATTRIBUTE.to_owned()
}

/// Returns the default fallback group.
fn default_fallback_group() -> String {
    DEFAULT_FALLBACK_GROUP.to_owned()
}
