//! Check-in records.
//!
//! A record's `id` doubles as its creation timestamp (epoch milliseconds as
//! a string). Legacy records may carry something else there, in which case
//! the locale-formatted `date` string is the only time information left.
//! [`RecordTimestamp`] makes that distinction explicit at ingestion.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::ValidationError;

/// Identifiers above this value are read as epoch milliseconds.
///
/// 10^12 ms is September 2001; anything smaller is a sequential id or junk.
pub const EPOCH_MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Offset between the Buddhist-era calendar year and the Gregorian year.
pub const BUDDHIST_ERA_OFFSET: i32 = 543;

/// GPS position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Validated constructor for positions entering the system.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        let in_range = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if !in_range {
            return Err(ValidationError::CoordinatesOutOfRange {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// A single "I am okay" signal.
///
/// Serialized with the same field names the history log has always used,
/// so existing exports load unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInRecord {
    pub id: String,
    /// Display-only local timestamp.
    pub date: String,
    pub status: String,
    pub coords: Coordinates,
}

/// Where a record's time information comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RecordTimestamp {
    /// The identifier is a millisecond epoch value.
    EpochMillis(i64),
    /// Only the human-readable date string is available.
    DisplayString(String),
}

impl CheckInRecord {
    /// Create a record stamped with the clock's current instant.
    ///
    /// # Errors
    /// Returns an error if the status is blank or the coordinates are out
    /// of range.
    pub fn new(
        clock: &dyn Clock,
        status: impl Into<String>,
        coords: Coordinates,
    ) -> Result<Self, ValidationError> {
        let status = status.into();
        if status.trim().is_empty() {
            return Err(ValidationError::EmptyStatus);
        }
        let coords = Coordinates::new(coords.latitude, coords.longitude)?;

        let now = clock.now();
        Ok(Self {
            id: now.timestamp_millis().to_string(),
            date: format_display(clock.to_local(now)),
            status,
            coords,
        })
    }

    /// Classify the record's time encoding.
    pub fn timestamp(&self) -> RecordTimestamp {
        match self.id.trim().parse::<i64>() {
            Ok(ms) if ms > EPOCH_MILLIS_THRESHOLD => RecordTimestamp::EpochMillis(ms),
            _ => RecordTimestamp::DisplayString(self.date.clone()),
        }
    }
}

/// Format a local wall-clock reading the way the th-TH locale does:
/// `D/M/YYYY HH:MM:SS` with a Buddhist-era year.
pub fn format_display(local: NaiveDateTime) -> String {
    format!(
        "{}/{}/{} {:02}:{:02}:{:02}",
        local.day(),
        local.month(),
        local.year() + BUDDHIST_ERA_OFFSET,
        local.hour(),
        local.minute(),
        local.second()
    )
}
