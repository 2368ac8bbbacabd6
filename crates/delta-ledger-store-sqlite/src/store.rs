// crates/delta-ledger-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Ledger Store
// Description: SQLite-backed dimension, checkpoint, and aggregate stores.
// Purpose: Persist merged history and checkpoints in one durable database.
// Dependencies: bigdecimal, rusqlite, serde, serde_json, thiserror, delta-ledger-core
// ============================================================================

//! ## Overview
//! The store keeps dimension versions, watermarks, run audit records, and
//! aggregate rows in one `SQLite` database file. A merge plan applies inside
//! a single transaction: a mutation that targets a missing version rolls the
//! whole plan back and reports a retryable conflict. Busy and locked engine
//! conditions also surface as retryable errors so the pipeline's run-level
//! retry loop can absorb writer contention. Attribute payloads are re-hashed
//! on every dimension read; a digest mismatch fails the read as corruption.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use bigdecimal::BigDecimal;
use delta_ledger_core::AggregateError;
use delta_ledger_core::AggregateFact;
use delta_ledger_core::AggregateStore;
use delta_ledger_core::AttributeMap;
use delta_ledger_core::CheckpointError;
use delta_ledger_core::CheckpointStore;
use delta_ledger_core::DimensionStore;
use delta_ledger_core::DimensionVersion;
use delta_ledger_core::EventTime;
use delta_ledger_core::HashAlgorithm;
use delta_ledger_core::HashDigest;
use delta_ledger_core::MAX_ATTRIBUTE_BYTES;
use delta_ledger_core::MergePlan;
use delta_ledger_core::NaturalKey;
use delta_ledger_core::PeriodGranularity;
use delta_ledger_core::PeriodKey;
use delta_ledger_core::RunAuditRecord;
use delta_ledger_core::RunId;
use delta_ledger_core::RunStatus;
use delta_ledger_core::SourceTableId;
use delta_ledger_core::StoreError;
use delta_ledger_core::SurrogateKey;
use delta_ledger_core::VersionMutation;
use delta_ledger_core::Watermark;
use delta_ledger_core::hash_canonical_json;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current on-disk schema version.
pub const SCHEMA_VERSION: i64 = 1;

/// Default busy timeout applied to the connection, in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Maximum length of one store path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;

/// Maximum total store path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4_096;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// `SQLite` journal modes supported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// Write-ahead logging; readers do not block the writer.
    #[default]
    Wal,
    /// Rollback journal; single-writer with simpler file semantics.
    Delete,
}

impl SqliteJournalMode {
    /// Returns the pragma value for the mode.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
        }
    }
}

/// `SQLite` synchronous modes supported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full fsync on every commit.
    #[default]
    Full,
    /// Normal fsync cadence; durable under WAL checkpointing.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the pragma value for the mode.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Normal => "NORMAL",
        }
    }
}

/// `SQLite` store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteStoreConfig {
    /// Database file path.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Journal mode pragma.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// Synchronous mode pragma.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Maximum encoded attribute payload size in bytes (`None` = default).
    #[serde(default)]
    pub max_attribute_bytes: Option<usize>,
}

/// Returns the default busy timeout in milliseconds.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Engine is busy or locked; the operation may be retried.
    #[error("sqlite store busy: {0}")]
    Busy(String),
    /// A mutation targeted a version that no longer exists.
    #[error("sqlite store merge conflict: {0}")]
    Conflict(String),
    /// Stored data fails integrity checks.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store configuration or data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Attribute payload exceeded the configured size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Busy(message) | SqliteStoreError::Conflict(message) => {
                Self::Conflict(message)
            }
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "attribute payload exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

impl From<SqliteStoreError> for CheckpointError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) | SqliteStoreError::Db(message) => Self::Io(message),
            SqliteStoreError::Busy(message) | SqliteStoreError::Conflict(message) => {
                Self::WriteFailed(message)
            }
            SqliteStoreError::Corrupt(message)
            | SqliteStoreError::VersionMismatch(message)
            | SqliteStoreError::Invalid(message) => Self::Corrupt(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Corrupt(format!(
                "payload exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

impl From<SqliteStoreError> for AggregateError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            other => Self::Store(other.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed ledger store.
///
/// # Invariants
/// - Connection access is serialized through a mutex; clones share it.
/// - Merge plans apply fully or not at all.
#[derive(Clone)]
pub struct SqliteLedgerStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteLedgerStore {
    /// Opens an `SQLite`-backed ledger store, creating the schema if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid, the database
    /// cannot be opened, or the stored schema version is unsupported.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        validate_store_limits(&config)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the shared connection, reporting poison as an I/O error.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite store mutex poisoned".to_string()))
    }

    /// Returns the configured attribute payload size limit.
    #[must_use]
    const fn attribute_limit(&self) -> usize {
        match self.config.max_attribute_bytes {
            Some(limit) => limit,
            None => MAX_ATTRIBUTE_BYTES,
        }
    }
}

// ============================================================================
// SECTION: Dimension Store
// ============================================================================

impl DimensionStore for SqliteLedgerStore {
    fn history(
        &self,
        source_table: &SourceTableId,
        key: &NaturalKey,
    ) -> Result<Vec<DimensionVersion>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT surrogate_key, natural_key, attribute_hash, hash_algorithm, \
                 attributes_json, valid_from, valid_to, is_current
                 FROM dimension_versions
                 WHERE source_table = ?1 AND natural_key = ?2
                 ORDER BY valid_from ASC, COALESCE(valid_to, ?3) ASC, surrogate_key ASC",
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map(params![source_table.as_str(), key.as_str(), i64::MAX], version_row)
            .map_err(map_db_error)?;
        let mut versions = Vec::new();
        for row in rows {
            let row = row.map_err(map_db_error)?;
            versions.push(build_version(row)?);
        }
        Ok(versions)
    }

    fn current(
        &self,
        source_table: &SourceTableId,
        key: &NaturalKey,
    ) -> Result<Option<DimensionVersion>, StoreError> {
        let guard = self.lock()?;
        let row = guard
            .query_row(
                "SELECT surrogate_key, natural_key, attribute_hash, hash_algorithm, \
                 attributes_json, valid_from, valid_to, is_current
                 FROM dimension_versions
                 WHERE source_table = ?1 AND natural_key = ?2 AND is_current = 1",
                params![source_table.as_str(), key.as_str()],
                version_row,
            )
            .optional()
            .map_err(map_db_error)?;
        match row {
            Some(row) => {
                let version = build_version(row)?;
                Ok(Some(version))
            }
            None => Ok(None),
        }
    }

    fn version_at(
        &self,
        source_table: &SourceTableId,
        key: &NaturalKey,
        at: EventTime,
    ) -> Result<Option<DimensionVersion>, StoreError> {
        let guard = self.lock()?;
        let row = guard
            .query_row(
                "SELECT surrogate_key, natural_key, attribute_hash, hash_algorithm, \
                 attributes_json, valid_from, valid_to, is_current
                 FROM dimension_versions
                 WHERE source_table = ?1 AND natural_key = ?2
                   AND valid_from <= ?3 AND (valid_to IS NULL OR valid_to > ?3)
                 ORDER BY valid_from ASC
                 LIMIT 1",
                params![source_table.as_str(), key.as_str(), at.as_unix_millis()],
                version_row,
            )
            .optional()
            .map_err(map_db_error)?;
        match row {
            Some(row) => {
                let version = build_version(row)?;
                Ok(Some(version))
            }
            None => Ok(None),
        }
    }

    fn keys(&self, source_table: &SourceTableId) -> Result<Vec<NaturalKey>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT DISTINCT natural_key FROM dimension_versions
                 WHERE source_table = ?1
                 ORDER BY natural_key ASC",
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map(params![source_table.as_str()], |row| {
                let key: String = row.get(0)?;
                Ok(key)
            })
            .map_err(map_db_error)?;
        let mut keys = Vec::new();
        for row in rows {
            let key = row.map_err(map_db_error)?;
            keys.push(NaturalKey::new(key));
        }
        Ok(keys)
    }

    fn apply(&self, plan: &MergePlan) -> Result<(), StoreError> {
        let limit = self.attribute_limit();
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(map_db_error)?;
        for mutation in &plan.mutations {
            match mutation {
                VersionMutation::Close {
                    surrogate_key,
                    valid_to,
                } => {
                    let changed = tx
                        .execute(
                            "UPDATE dimension_versions SET valid_to = ?1, is_current = 0
                             WHERE surrogate_key = ?2 AND source_table = ?3",
                            params![
                                valid_to.as_unix_millis(),
                                surrogate_param(*surrogate_key)?,
                                plan.source_table.as_str(),
                            ],
                        )
                        .map_err(map_db_error)?;
                    if changed != 1 {
                        return Err(SqliteStoreError::Conflict(format!(
                            "version {surrogate_key} not found while closing"
                        ))
                        .into());
                    }
                }
                VersionMutation::Rewrite {
                    surrogate_key,
                    attributes,
                    attribute_hash,
                } => {
                    let attributes_json = encode_attributes(attributes, limit)?;
                    let changed = tx
                        .execute(
                            "UPDATE dimension_versions
                             SET attributes_json = ?1, attribute_hash = ?2, hash_algorithm = ?3
                             WHERE surrogate_key = ?4 AND source_table = ?5",
                            params![
                                attributes_json,
                                attribute_hash.value,
                                attribute_hash.algorithm.label(),
                                surrogate_param(*surrogate_key)?,
                                plan.source_table.as_str(),
                            ],
                        )
                        .map_err(map_db_error)?;
                    if changed != 1 {
                        return Err(SqliteStoreError::Conflict(format!(
                            "version {surrogate_key} not found while rewriting"
                        ))
                        .into());
                    }
                }
                VersionMutation::Insert {
                    version,
                } => {
                    let attributes_json = encode_attributes(&version.attributes, limit)?;
                    tx.execute(
                        "INSERT INTO dimension_versions (source_table, natural_key, \
                         attribute_hash, hash_algorithm, attributes_json, valid_from, valid_to, \
                         is_current)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        params![
                            plan.source_table.as_str(),
                            version.natural_key.as_str(),
                            version.attribute_hash.value,
                            version.attribute_hash.algorithm.label(),
                            attributes_json,
                            version.valid_from.as_unix_millis(),
                            version.valid_to.map(EventTime::as_unix_millis),
                            version.is_current,
                        ],
                    )
                    .map_err(map_db_error)?;
                }
            }
        }
        tx.commit().map_err(map_db_error)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Checkpoint Store
// ============================================================================

impl CheckpointStore for SqliteLedgerStore {
    fn load_watermark(
        &self,
        source_table: &SourceTableId,
    ) -> Result<Option<Watermark>, CheckpointError> {
        let guard = self.lock()?;
        let row = guard
            .query_row(
                "SELECT last_event_time, last_extracted_at FROM watermarks
                 WHERE source_table = ?1",
                params![source_table.as_str()],
                |row| {
                    let last_event_time: i64 = row.get(0)?;
                    let last_extracted_at: i64 = row.get(1)?;
                    Ok((last_event_time, last_extracted_at))
                },
            )
            .optional()
            .map_err(map_db_error)?;
        Ok(row.map(|(last_event_time, last_extracted_at)| Watermark {
            source_table: source_table.clone(),
            last_event_time: EventTime::from_unix_millis(last_event_time),
            last_extracted_at: EventTime::from_unix_millis(last_extracted_at),
        }))
    }

    fn commit_watermark(&self, watermark: &Watermark) -> Result<(), CheckpointError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT OR REPLACE INTO watermarks (source_table, last_event_time, \
                 last_extracted_at)
                 VALUES (?1, ?2, ?3)",
                params![
                    watermark.source_table.as_str(),
                    watermark.last_event_time.as_unix_millis(),
                    watermark.last_extracted_at.as_unix_millis(),
                ],
            )
            .map_err(map_db_error)?;
        Ok(())
    }

    fn record_run(&self, record: &RunAuditRecord) -> Result<(), CheckpointError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO run_audit (run_id, source_table, started_at, finished_at, status, \
                 records_extracted, records_merged, late_corrections, message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.run_id.as_str(),
                    record.source_table.as_str(),
                    record.started_at.as_unix_millis(),
                    record.finished_at.as_unix_millis(),
                    record.status.label(),
                    count_param(record.records_extracted),
                    count_param(record.records_merged),
                    count_param(record.late_corrections),
                    record.message,
                ],
            )
            .map_err(map_db_error)?;
        Ok(())
    }

    fn recent_runs(
        &self,
        source_table: &SourceTableId,
        limit: usize,
    ) -> Result<Vec<RunAuditRecord>, CheckpointError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT run_id, source_table, started_at, finished_at, status, \
                 records_extracted, records_merged, late_corrections, message
                 FROM run_audit
                 WHERE source_table = ?1
                 ORDER BY seq DESC
                 LIMIT ?2",
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map(params![source_table.as_str(), limit], audit_row)
            .map_err(map_db_error)?;
        let mut records = Vec::new();
        for row in rows {
            let row = row.map_err(map_db_error)?;
            records.push(build_audit(row)?);
        }
        Ok(records)
    }
}

// ============================================================================
// SECTION: Aggregate Store
// ============================================================================

impl AggregateStore for SqliteLedgerStore {
    fn replace_period(
        &self,
        period: &PeriodKey,
        rows: &[AggregateFact],
    ) -> Result<(), AggregateError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(map_db_error)?;
        tx.execute(
            "DELETE FROM aggregate_rows WHERE granularity = ?1 AND period_label = ?2",
            params![period.granularity.label(), period.label],
        )
        .map_err(map_db_error)?;
        for row in rows {
            tx.execute(
                "INSERT INTO aggregate_rows (granularity, period_label, period_start, \
                 period_end, dimension_group, record_count, total_amount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.period.granularity.label(),
                    row.period.label,
                    row.period.start.as_unix_millis(),
                    row.period.end.as_unix_millis(),
                    row.group,
                    count_param(row.record_count),
                    row.total_amount.to_string(),
                ],
            )
            .map_err(map_db_error)?;
        }
        tx.commit().map_err(map_db_error)?;
        Ok(())
    }

    fn load_period(&self, period: &PeriodKey) -> Result<Vec<AggregateFact>, AggregateError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT granularity, period_label, period_start, period_end, dimension_group, \
                 record_count, total_amount
                 FROM aggregate_rows
                 WHERE granularity = ?1 AND period_label = ?2
                 ORDER BY dimension_group ASC",
            )
            .map_err(map_db_error)?;
        let rows = stmt
            .query_map(params![period.granularity.label(), period.label], aggregate_row)
            .map_err(map_db_error)?;
        let mut facts = Vec::new();
        for row in rows {
            let row = row.map_err(map_db_error)?;
            facts.push(build_aggregate(row)?);
        }
        Ok(facts)
    }

    fn load_all(&self) -> Result<Vec<AggregateFact>, AggregateError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT granularity, period_label, period_start, period_end, dimension_group, \
                 record_count, total_amount
                 FROM aggregate_rows
                 ORDER BY granularity ASC, period_label ASC, dimension_group ASC",
            )
            .map_err(map_db_error)?;
        let rows = stmt.query_map([], aggregate_row).map_err(map_db_error)?;
        let mut facts = Vec::new();
        for row in rows {
            let row = row.map_err(map_db_error)?;
            facts.push(build_aggregate(row)?);
        }
        Ok(facts)
    }

    fn clear(&self) -> Result<(), AggregateError> {
        let guard = self.lock()?;
        guard.execute("DELETE FROM aggregate_rows", []).map_err(map_db_error)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Raw Rows
// ============================================================================

/// Raw `dimension_versions` row before decoding.
struct VersionRow {
    /// Stored surrogate key.
    surrogate_key: i64,
    /// Stored natural key.
    natural_key: String,
    /// Stored attribute digest hex value.
    attribute_hash: String,
    /// Stored hash algorithm label.
    hash_algorithm: String,
    /// Stored attribute payload bytes.
    attributes_json: Vec<u8>,
    /// Inclusive validity start in unix milliseconds.
    valid_from: i64,
    /// Exclusive validity end in unix milliseconds, if closed.
    valid_to: Option<i64>,
    /// Stored current flag.
    is_current: bool,
}

/// Raw `run_audit` row before decoding.
struct AuditRow {
    /// Stored run identifier.
    run_id: String,
    /// Stored source table identifier.
    source_table: String,
    /// Run start in unix milliseconds.
    started_at: i64,
    /// Run end in unix milliseconds.
    finished_at: i64,
    /// Stored status label.
    status: String,
    /// Stored extracted-record counter.
    records_extracted: i64,
    /// Stored merged-record counter.
    records_merged: i64,
    /// Stored late-correction counter.
    late_corrections: i64,
    /// Stored failure message, if any.
    message: Option<String>,
}

/// Raw `aggregate_rows` row before decoding.
struct AggregateRow {
    /// Stored granularity label.
    granularity: String,
    /// Stored period label.
    period_label: String,
    /// Period start in unix milliseconds.
    period_start: i64,
    /// Period end in unix milliseconds.
    period_end: i64,
    /// Stored dimension group.
    group: String,
    /// Stored record counter.
    record_count: i64,
    /// Stored decimal total as text.
    total_amount: String,
}

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

/// Validates the configured database path.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.to_string_lossy();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Validates configured size limits.
fn validate_store_limits(config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    if config.max_attribute_bytes == Some(0) {
        return Err(SqliteStoreError::Invalid(
            "max_attribute_bytes must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Creates the database file's parent directory when missing.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(map_db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(map_db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(map_db_error)?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(map_db_error)?;
    Ok(connection)
}

/// Initializes the schema or validates the stored version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(map_db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(map_db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(map_db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(map_db_error)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS dimension_versions (
                    surrogate_key INTEGER PRIMARY KEY AUTOINCREMENT,
                    source_table TEXT NOT NULL,
                    natural_key TEXT NOT NULL,
                    attribute_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL,
                    attributes_json BLOB NOT NULL,
                    valid_from INTEGER NOT NULL,
                    valid_to INTEGER,
                    is_current INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_dimension_versions_key
                    ON dimension_versions (source_table, natural_key, valid_from);
                CREATE INDEX IF NOT EXISTS idx_dimension_versions_current
                    ON dimension_versions (source_table, natural_key, is_current);
                CREATE TABLE IF NOT EXISTS watermarks (
                    source_table TEXT PRIMARY KEY,
                    last_event_time INTEGER NOT NULL,
                    last_extracted_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS run_audit (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    run_id TEXT NOT NULL,
                    source_table TEXT NOT NULL,
                    started_at INTEGER NOT NULL,
                    finished_at INTEGER NOT NULL,
                    status TEXT NOT NULL,
                    records_extracted INTEGER NOT NULL,
                    records_merged INTEGER NOT NULL,
                    late_corrections INTEGER NOT NULL,
                    message TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_run_audit_source
                    ON run_audit (source_table, seq);
                CREATE TABLE IF NOT EXISTS aggregate_rows (
                    granularity TEXT NOT NULL,
                    period_label TEXT NOT NULL,
                    period_start INTEGER NOT NULL,
                    period_end INTEGER NOT NULL,
                    dimension_group TEXT NOT NULL,
                    record_count INTEGER NOT NULL,
                    total_amount TEXT NOT NULL,
                    PRIMARY KEY (granularity, period_label, dimension_group)
                );",
            )
            .map_err(map_db_error)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(map_db_error)?;
    Ok(())
}

/// Maps an engine error, classifying busy and locked conditions as retryable.
fn map_db_error(error: rusqlite::Error) -> SqliteStoreError {
    match error.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            SqliteStoreError::Busy(error.to_string())
        }
        _ => SqliteStoreError::Db(error.to_string()),
    }
}

/// Encodes an attribute payload, enforcing the configured size limit.
fn encode_attributes(
    attributes: &AttributeMap,
    max_bytes: usize,
) -> Result<Vec<u8>, SqliteStoreError> {
    let bytes = serde_json::to_vec(attributes)
        .map_err(|err| SqliteStoreError::Invalid(format!("failed to encode attributes: {err}")))?;
    if bytes.len() > max_bytes {
        return Err(SqliteStoreError::TooLarge {
            max_bytes,
            actual_bytes: bytes.len(),
        });
    }
    Ok(bytes)
}

/// Converts a surrogate key into its signed column form.
fn surrogate_param(key: SurrogateKey) -> Result<i64, SqliteStoreError> {
    i64::try_from(key.get())
        .map_err(|_| SqliteStoreError::Invalid(format!("surrogate key {key} out of range")))
}

/// Clamps an unsigned counter into the signed column range.
fn count_param(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// Decodes a stored counter column.
fn count_from(value: i64, column: &str) -> Result<u64, SqliteStoreError> {
    u64::try_from(value)
        .map_err(|_| SqliteStoreError::Corrupt(format!("negative {column} counter")))
}

/// Parses a stored hash algorithm label.
fn parse_hash_algorithm(label: &str) -> Result<HashAlgorithm, SqliteStoreError> {
    match label {
        "sha256" => Ok(HashAlgorithm::Sha256),
        other => Err(SqliteStoreError::Invalid(format!("unsupported hash algorithm: {other}"))),
    }
}

/// Parses a stored run status label.
fn parse_run_status(label: &str) -> Result<RunStatus, SqliteStoreError> {
    match label {
        "succeeded" => Ok(RunStatus::Succeeded),
        "failed" => Ok(RunStatus::Failed),
        other => Err(SqliteStoreError::Corrupt(format!("unknown run status: {other}"))),
    }
}

/// Parses a stored granularity label.
fn parse_granularity(label: &str) -> Result<PeriodGranularity, SqliteStoreError> {
    match label {
        "daily" => Ok(PeriodGranularity::Daily),
        "weekly" => Ok(PeriodGranularity::Weekly),
        "monthly" => Ok(PeriodGranularity::Monthly),
        other => Err(SqliteStoreError::Corrupt(format!("unknown period granularity: {other}"))),
    }
}

/// Maps one `dimension_versions` row into its raw form.
fn version_row(row: &Row<'_>) -> rusqlite::Result<VersionRow> {
    Ok(VersionRow {
        surrogate_key: row.get(0)?,
        natural_key: row.get(1)?,
        attribute_hash: row.get(2)?,
        hash_algorithm: row.get(3)?,
        attributes_json: row.get(4)?,
        valid_from: row.get(5)?,
        valid_to: row.get(6)?,
        is_current: row.get(7)?,
    })
}

/// Maps one `run_audit` row into its raw form.
fn audit_row(row: &Row<'_>) -> rusqlite::Result<AuditRow> {
    Ok(AuditRow {
        run_id: row.get(0)?,
        source_table: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        status: row.get(4)?,
        records_extracted: row.get(5)?,
        records_merged: row.get(6)?,
        late_corrections: row.get(7)?,
        message: row.get(8)?,
    })
}

/// Maps one `aggregate_rows` row into its raw form.
fn aggregate_row(row: &Row<'_>) -> rusqlite::Result<AggregateRow> {
    Ok(AggregateRow {
        granularity: row.get(0)?,
        period_label: row.get(1)?,
        period_start: row.get(2)?,
        period_end: row.get(3)?,
        group: row.get(4)?,
        record_count: row.get(5)?,
        total_amount: row.get(6)?,
    })
}

/// Decodes a raw dimension version row.
fn build_version(row: VersionRow) -> Result<DimensionVersion, SqliteStoreError> {
    let raw_key = u64::try_from(row.surrogate_key).map_err(|_| {
        SqliteStoreError::Corrupt(format!("negative surrogate key {}", row.surrogate_key))
    })?;
    let surrogate_key = SurrogateKey::from_raw(raw_key).ok_or_else(|| {
        SqliteStoreError::Corrupt(format!("zero surrogate key for {}", row.natural_key))
    })?;
    let algorithm = parse_hash_algorithm(&row.hash_algorithm)?;
    let attributes: AttributeMap = serde_json::from_slice(&row.attributes_json).map_err(|err| {
        SqliteStoreError::Corrupt(format!("stored attributes are not valid JSON: {err}"))
    })?;
    let expected = hash_canonical_json(algorithm, &attributes).map_err(|err| {
        SqliteStoreError::Corrupt(format!("stored attributes cannot be hashed: {err}"))
    })?;
    if expected.value != row.attribute_hash {
        return Err(SqliteStoreError::Corrupt(format!(
            "attribute hash mismatch for key {}",
            row.natural_key
        )));
    }
    Ok(DimensionVersion {
        surrogate_key,
        natural_key: NaturalKey::new(row.natural_key),
        attribute_hash: HashDigest {
            algorithm,
            value: row.attribute_hash,
        },
        attributes,
        valid_from: EventTime::from_unix_millis(row.valid_from),
        valid_to: row.valid_to.map(EventTime::from_unix_millis),
        is_current: row.is_current,
    })
}

/// Decodes a raw run audit row.
fn build_audit(row: AuditRow) -> Result<RunAuditRecord, SqliteStoreError> {
    Ok(RunAuditRecord {
        run_id: RunId::new(row.run_id),
        source_table: SourceTableId::new(row.source_table),
        started_at: EventTime::from_unix_millis(row.started_at),
        finished_at: EventTime::from_unix_millis(row.finished_at),
        status: parse_run_status(&row.status)?,
        records_extracted: count_from(row.records_extracted, "records_extracted")?,
        records_merged: count_from(row.records_merged, "records_merged")?,
        late_corrections: count_from(row.late_corrections, "late_corrections")?,
        message: row.message,
    })
}

/// Decodes a raw aggregate row.
fn build_aggregate(row: AggregateRow) -> Result<AggregateFact, SqliteStoreError> {
    let granularity = parse_granularity(&row.granularity)?;
    let total_amount = row.total_amount.parse::<BigDecimal>().map_err(|err| {
        SqliteStoreError::Corrupt(format!("stored amount is not a decimal: {err}"))
    })?;
    Ok(AggregateFact {
        group: row.group,
        period: PeriodKey {
            granularity,
            label: row.period_label,
            start: EventTime::from_unix_millis(row.period_start),
            end: EventTime::from_unix_millis(row.period_end),
        },
        record_count: count_from(row.record_count, "record_count")?,
        total_amount,
    })
}
