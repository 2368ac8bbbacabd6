// crates/delta-ledger-core/src/core/time.rs
// ============================================================================
// Module: Delta Ledger Time Model
// Description: Event and extraction timestamps for change records.
// Purpose: Provide a total-ordered, serializable time representation.
// Dependencies: serde, time, thiserror
// ============================================================================

//! ## Overview
//! All ledger timestamps are unix epoch milliseconds (UTC). Event times order
//! dimension history; extraction times order change capture. RFC 3339 text is
//! accepted and produced only at file and CLI boundaries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Event Time
// ============================================================================

/// Timestamp in unix epoch milliseconds (UTC).
///
/// # Invariants
/// - Total order matches chronological order; negative values are pre-epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct EventTime(i64);

impl EventTime {
    /// The epoch origin, used as the initial watermark position.
    pub const ORIGIN: Self = Self(0);

    /// Earliest representable timestamp.
    pub const MIN: Self = Self(i64::MIN);

    /// Latest representable timestamp; stands in for an open interval end.
    pub const MAX: Self = Self(i64::MAX);

    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the timestamp lowered by `millis`, saturating at the minimum.
    #[must_use]
    pub const fn saturating_sub_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_sub(millis))
    }

    /// Returns the later of two timestamps.
    #[must_use]
    pub fn max_with(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }

    /// Returns the current wall-clock time.
    ///
    /// Clock failures degrade to the epoch origin rather than aborting a run.
    #[must_use]
    pub fn now() -> Self {
        let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Self(i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
    }

    /// Parses an RFC 3339 timestamp into epoch milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::Parse`] when the text is not valid RFC 3339 or the
    /// instant does not fit the millisecond range.
    pub fn from_rfc3339(text: &str) -> Result<Self, TimeError> {
        let parsed = OffsetDateTime::parse(text, &Rfc3339)
            .map_err(|err| TimeError::Parse(err.to_string()))?;
        let millis = parsed.unix_timestamp_nanos() / 1_000_000;
        let millis =
            i64::try_from(millis).map_err(|_| TimeError::Parse("instant out of range".into()))?;
        Ok(Self(millis))
    }

    /// Formats the timestamp as RFC 3339 (UTC).
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::Format`] when the instant cannot be represented.
    pub fn to_rfc3339(self) -> Result<String, TimeError> {
        let nanos = i128::from(self.0) * 1_000_000;
        let instant = OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|err| TimeError::Format(err.to_string()))?;
        instant.format(&Rfc3339).map_err(|err| TimeError::Format(err.to_string()))
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for EventTime {
    fn from(millis: i64) -> Self {
        Self(millis)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Timestamp conversion errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeError {
    /// Text could not be parsed as RFC 3339.
    #[error("timestamp parse error: {0}")]
    Parse(String),
    /// Instant could not be formatted as RFC 3339.
    #[error("timestamp format error: {0}")]
    Format(String),
}
