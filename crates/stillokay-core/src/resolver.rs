//! Resolves every check-in record to exactly one instant.
//!
//! Precedence: a plausible epoch-millisecond identifier wins, then the
//! locale-formatted date string, then the configured fallback. Resolution
//! is total; it never fails and never panics on malformed data.

use std::borrow::Cow;
use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::record::{CheckInRecord, RecordTimestamp, BUDDHIST_ERA_OFFSET};

/// What to return when a record carries no usable time information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// The clock's current instant. Keeps the record visible as "today".
    #[default]
    Now,
    /// 1970-01-01T00:00:00Z. Pushes the record out of every recent window.
    UnixEpoch,
}

/// Which step of the precedence chain produced the instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    EpochMillis,
    DisplayString,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub instant: DateTime<Utc>,
    pub source: ResolutionSource,
}

/// Naive date-time layouts tried against display strings, 24h day-first.
const DAY_FIRST_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y, %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y, %H:%M",
];

/// en-US layouts, only tried when the string carries an AM/PM marker.
const MONTH_FIRST_FORMATS: &[&str] = &[
    "%m/%d/%Y, %I:%M:%S %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y, %I:%M %p",
    "%m/%d/%Y %I:%M %p",
];

const ISO_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

const DATE_ONLY_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Record-to-instant resolver bound to a clock.
#[derive(Clone, Copy)]
pub struct TimestampResolver<'a> {
    clock: &'a dyn Clock,
    fallback: FallbackPolicy,
}

impl<'a> TimestampResolver<'a> {
    pub fn new(clock: &'a dyn Clock) -> Self {
        Self {
            clock,
            fallback: FallbackPolicy::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn clock(&self) -> &'a dyn Clock {
        self.clock
    }

    /// Resolve a record to a single instant.
    pub fn resolve(&self, record: &CheckInRecord) -> DateTime<Utc> {
        self.resolve_detailed(record).instant
    }

    /// Resolve a record and report which source was used.
    ///
    /// An epoch id outside the representable range falls through to the
    /// record's date string before the fallback applies.
    pub fn resolve_detailed(&self, record: &CheckInRecord) -> Resolution {
        let parsed = match record.timestamp() {
            RecordTimestamp::EpochMillis(ms) => epoch_millis(ms).or_else(|| {
                parse_display_string(&record.date, self.clock)
                    .map(|instant| (instant, ResolutionSource::DisplayString))
            }),
            timestamp => self.parse(&timestamp),
        };
        let resolution = self.finish(parsed);
        if resolution.source == ResolutionSource::Fallback {
            tracing::warn!(
                id = %record.id,
                date = %record.date,
                fallback = ?self.fallback,
                "check-in timestamp is unresolvable, using fallback"
            );
        }
        resolution
    }

    pub fn resolve_timestamp(&self, timestamp: &RecordTimestamp) -> Resolution {
        self.finish(self.parse(timestamp))
    }

    fn parse(&self, timestamp: &RecordTimestamp) -> Option<(DateTime<Utc>, ResolutionSource)> {
        match timestamp {
            RecordTimestamp::EpochMillis(ms) => epoch_millis(*ms),
            RecordTimestamp::DisplayString(text) => parse_display_string(text, self.clock)
                .map(|instant| (instant, ResolutionSource::DisplayString)),
        }
    }

    fn finish(&self, parsed: Option<(DateTime<Utc>, ResolutionSource)>) -> Resolution {
        match parsed {
            Some((instant, source)) => Resolution { instant, source },
            None => Resolution {
                instant: self.fallback_instant(),
                source: ResolutionSource::Fallback,
            },
        }
    }

    /// Local calendar day of a record.
    pub fn local_date(&self, record: &CheckInRecord) -> NaiveDate {
        self.clock.local_date(self.resolve(record))
    }

    /// Distinct local calendar days that have at least one check-in.
    pub fn check_in_days(&self, history: &[CheckInRecord]) -> BTreeSet<NaiveDate> {
        history.iter().map(|record| self.local_date(record)).collect()
    }

    fn fallback_instant(&self) -> DateTime<Utc> {
        match self.fallback {
            FallbackPolicy::Now => self.clock.now(),
            FallbackPolicy::UnixEpoch => DateTime::UNIX_EPOCH,
        }
    }
}

fn epoch_millis(ms: i64) -> Option<(DateTime<Utc>, ResolutionSource)> {
    DateTime::from_timestamp_millis(ms).map(|instant| (instant, ResolutionSource::EpochMillis))
}

/// Parse a locale-formatted date string.
///
/// Understands RFC 3339, ISO-like `YYYY-MM-DD HH:MM:SS`, th-TH
/// `D/M/YYYY H:MM:SS` (Buddhist-era years are converted), en-US
/// `M/D/YYYY, h:MM:SS AM`, and bare dates (local midnight). Readings
/// without an offset are interpreted in the clock's local timezone.
pub fn parse_display_string(text: &str, clock: &dyn Clock) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    let normalized = normalize_buddhist_year(text);
    let has_meridiem = {
        let upper = normalized.to_ascii_uppercase();
        upper.ends_with("AM") || upper.ends_with("PM")
    };

    let layouts: &[&str] = if has_meridiem {
        MONTH_FIRST_FORMATS
    } else {
        DAY_FIRST_FORMATS
    };

    let naive = ISO_FORMATS
        .iter()
        .chain(layouts)
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
        .or_else(|| {
            DATE_ONLY_FORMATS.iter().find_map(|fmt| {
                NaiveDate::parse_from_str(&normalized, fmt)
                    .ok()
                    .map(|date| date.and_time(NaiveTime::MIN))
            })
        })?;

    clock.from_local(naive)
}

/// Replace a four-digit Buddhist-era year (> 2400) with its Gregorian value.
fn normalize_buddhist_year(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        if !bytes[start].is_ascii_digit() {
            start += 1;
            continue;
        }
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end - start == 4 {
            if let Ok(year) = text[start..end].parse::<i32>() {
                if year > 2400 {
                    let mut out = String::with_capacity(text.len());
                    out.push_str(&text[..start]);
                    out.push_str(&(year - BUDDHIST_ERA_OFFSET).to_string());
                    out.push_str(&text[end..]);
                    return Cow::Owned(out);
                }
            }
        }
        start = end;
    }
    Cow::Borrowed(text)
}
