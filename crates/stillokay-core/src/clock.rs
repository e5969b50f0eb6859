//! Injectable time source.
//!
//! Every calendar computation in this crate is anchored on "today" in the
//! user's local timezone. Callers hand in a [`Clock`] instead of the engine
//! reading the wall clock, so week rollovers, midnight and DST edges can be
//! pinned down in tests.

use chrono::{
    DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};

/// Source of "now" plus the local timezone used for day truncation.
pub trait Clock {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Wall-clock reading of `instant` in the local timezone.
    fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime;

    /// Interpret a local wall-clock reading as an instant.
    ///
    /// Returns `None` for readings that do not exist locally (DST gaps).
    /// Ambiguous readings resolve to the earlier instant.
    fn from_local(&self, local: NaiveDateTime) -> Option<DateTime<Utc>>;

    /// Local calendar day of `instant`.
    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.to_local(instant).date()
    }

    /// Local calendar day of "now".
    fn today(&self) -> NaiveDate {
        self.local_date(self.now())
    }
}

/// Wall clock in the operating system's timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&Local).naive_local()
    }

    fn from_local(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        Local
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Wall clock pinned to a fixed UTC offset, ignoring the OS timezone.
#[derive(Debug, Clone, Copy)]
pub struct OffsetClock {
    offset: FixedOffset,
}

impl OffsetClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Build from an offset in minutes east of UTC.
    ///
    /// Returns `None` when the offset is outside +-24h.
    pub fn from_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::new)
    }
}

impl Clock for OffsetClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    fn from_local(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        fixed_from_local(self.offset, local)
    }
}

/// Frozen clock for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now, offset }
    }

    /// Frozen at `now`, with UTC as the local timezone.
    pub fn utc(now: DateTime<Utc>) -> Self {
        Self::new(now, Utc.fix())
    }

    /// Frozen at a local wall-clock reading in the given offset (hours east).
    ///
    /// # Panics
    /// Panics on an invalid date or offset; intended for test fixtures.
    pub fn at_local(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        offset_hours: i32,
    ) -> Self {
        let offset = FixedOffset::east_opt(offset_hours * 3600).expect("valid offset");
        let now = offset
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .expect("valid local time")
            .with_timezone(&Utc);
        Self::new(now, offset)
    }

    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    fn from_local(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        fixed_from_local(self.offset, local)
    }
}

fn fixed_from_local(offset: FixedOffset, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
