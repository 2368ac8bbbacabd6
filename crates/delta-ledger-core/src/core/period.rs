// crates/delta-ledger-core/src/core/period.rs
// ============================================================================
// Module: Delta Ledger Rollup Periods
// Description: Calendar period keys for aggregate facts.
// Purpose: Map event times onto daily, ISO-week, and monthly grains.
// Dependencies: serde, time, thiserror
// ============================================================================

//! ## Overview
//! Rollup periods are half-open UTC intervals `[start, end)` addressed by a
//! stable text label (`2026-08-25`, `2026-W35`, `2026-08`). Labels are the
//! relational key for aggregate rows; bounds drive the interval-intersection
//! join against dimension history.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::Date;
use time::Duration;
use time::Month;
use time::OffsetDateTime;

use crate::core::time::EventTime;

// ============================================================================
// SECTION: Granularity
// ============================================================================

/// Supported rollup grains.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum PeriodGranularity {
    /// One UTC calendar day.
    #[default]
    Daily,
    /// One ISO 8601 week (Monday through Sunday).
    Weekly,
    /// One UTC calendar month.
    Monthly,
}

impl PeriodGranularity {
    /// Returns the stable label for the grain.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for PeriodGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// SECTION: Period Key
// ============================================================================

/// One rollup period: grain, stable label, and half-open UTC bounds.
///
/// # Invariants
/// - `start < end`; the interval is `[start, end)`.
/// - `label` is unique per `(granularity, start)` and lexically sortable
///   within a grain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeriodKey {
    /// Grain of the period.
    pub granularity: PeriodGranularity,
    /// Stable text label for the period.
    pub label: String,
    /// Inclusive start of the period.
    pub start: EventTime,
    /// Exclusive end of the period.
    pub end: EventTime,
}

impl PeriodKey {
    /// Returns the period of the given grain containing the instant.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError`] when the instant falls outside the supported
    /// calendar range.
    pub fn containing(granularity: PeriodGranularity, at: EventTime) -> Result<Self, PeriodError> {
        let date = date_of(at)?;
        let start_date = grain_start(granularity, date)?;
        let end_date = grain_end(granularity, start_date)?;
        Ok(Self {
            granularity,
            label: grain_label(granularity, start_date),
            start: midnight_utc(start_date)?,
            end: midnight_utc(end_date)?,
        })
    }

    /// Returns true when the instant falls inside the period.
    #[must_use]
    pub fn contains(&self, at: EventTime) -> bool {
        self.start <= at && at < self.end
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.granularity, self.label)
    }
}

/// Collects the distinct periods touched by a set of instants.
///
/// # Errors
///
/// Returns [`PeriodError`] when any instant falls outside the supported
/// calendar range.
pub fn periods_touched(
    granularities: &[PeriodGranularity],
    instants: &[EventTime],
) -> Result<Vec<PeriodKey>, PeriodError> {
    let mut periods = BTreeSet::new();
    for granularity in granularities {
        for instant in instants {
            periods.insert(PeriodKey::containing(*granularity, *instant)?);
        }
    }
    Ok(periods.into_iter().collect())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Calendar mapping errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeriodError {
    /// Instant falls outside the supported calendar range.
    #[error("instant out of calendar range: {0}")]
    OutOfRange(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the UTC calendar date containing the instant.
fn date_of(at: EventTime) -> Result<Date, PeriodError> {
    let seconds = at.as_unix_millis().div_euclid(1000);
    let instant = OffsetDateTime::from_unix_timestamp(seconds)
        .map_err(|err| PeriodError::OutOfRange(err.to_string()))?;
    Ok(instant.date())
}

/// Returns the first date of the grain period containing `date`.
fn grain_start(granularity: PeriodGranularity, date: Date) -> Result<Date, PeriodError> {
    match granularity {
        PeriodGranularity::Daily => Ok(date),
        PeriodGranularity::Weekly => {
            let offset = i64::from(date.weekday().number_days_from_monday());
            date.checked_sub(Duration::days(offset))
                .ok_or_else(|| PeriodError::OutOfRange("week start underflow".into()))
        }
        PeriodGranularity::Monthly => {
            date.replace_day(1).map_err(|err| PeriodError::OutOfRange(err.to_string()))
        }
    }
}

/// Returns the exclusive end date for a grain period starting at `start`.
fn grain_end(granularity: PeriodGranularity, start: Date) -> Result<Date, PeriodError> {
    match granularity {
        PeriodGranularity::Daily => start
            .next_day()
            .ok_or_else(|| PeriodError::OutOfRange("day end overflow".into())),
        PeriodGranularity::Weekly => start
            .checked_add(Duration::days(7))
            .ok_or_else(|| PeriodError::OutOfRange("week end overflow".into())),
        PeriodGranularity::Monthly => {
            let (year, month) = if start.month() == Month::December {
                (
                    start
                        .year()
                        .checked_add(1)
                        .ok_or_else(|| PeriodError::OutOfRange("year overflow".into()))?,
                    Month::January,
                )
            } else {
                (start.year(), start.month().next())
            };
            Date::from_calendar_date(year, month, 1)
                .map_err(|err| PeriodError::OutOfRange(err.to_string()))
        }
    }
}

/// Returns the stable label for a grain period starting at `start`.
fn grain_label(granularity: PeriodGranularity, start: Date) -> String {
    match granularity {
        PeriodGranularity::Daily => {
            format!("{:04}-{:02}-{:02}", start.year(), u8::from(start.month()), start.day())
        }
        PeriodGranularity::Weekly => {
            let (iso_year, iso_week, _) = start.to_iso_week_date();
            format!("{iso_year:04}-W{iso_week:02}")
        }
        PeriodGranularity::Monthly => {
            format!("{:04}-{:02}", start.year(), u8::from(start.month()))
        }
    }
}

/// Returns the instant at UTC midnight of `date`.
fn midnight_utc(date: Date) -> Result<EventTime, PeriodError> {
    let seconds = date.midnight().assume_utc().unix_timestamp();
    let millis = seconds
        .checked_mul(1000)
        .ok_or_else(|| PeriodError::OutOfRange("instant overflow".into()))?;
    Ok(EventTime::from_unix_millis(millis))
}
