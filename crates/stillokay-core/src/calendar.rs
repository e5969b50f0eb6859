//! Calendar presence, heatmap grid and the seven-day chart.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::record::CheckInRecord;
use crate::resolver::TimestampResolver;
use crate::weekly::WeekStart;

/// Default number of weeks shown in the heatmap.
pub const DEFAULT_HEATMAP_WEEKS: u32 = 4;

/// Largest heatmap the grid builder produces (about ten years).
pub const MAX_HEATMAP_WEEKS: u32 = 520;

/// Local calendar day, rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(pub NaiveDate);

impl DateKey {
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map(DateKey)
            .map_err(serde::de::Error::custom)
    }
}

/// Set of local days with at least one check-in.
pub fn extract_calendar_presence(
    history: &[CheckInRecord],
    resolver: &TimestampResolver<'_>,
) -> BTreeSet<DateKey> {
    resolver
        .check_in_days(history)
        .into_iter()
        .map(DateKey)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    Future,
    CheckedIn,
    TodayMissed,
    Missed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarCell {
    pub date: DateKey,
    pub status: CellStatus,
    pub is_today: bool,
}

/// Heatmap of `weeks` full weeks ending with the current one, oldest first.
///
/// `weeks` is capped at [`MAX_HEATMAP_WEEKS`]. Days outside chrono's date
/// range are left out.
pub fn heatmap(
    history: &[CheckInRecord],
    resolver: &TimestampResolver<'_>,
    weeks: u32,
    week_start: WeekStart,
) -> Vec<Vec<CalendarCell>> {
    let today = resolver.clock().today();
    let presence = resolver.check_in_days(history);
    let current = week_start.week_of(today);
    let weeks = weeks.min(MAX_HEATMAP_WEEKS);
    let back = Duration::weeks(i64::from(weeks.saturating_sub(1)));
    let Some(first) = current.start.checked_sub_signed(back) else {
        return Vec::new();
    };

    (0..i64::from(weeks))
        .map(|week| {
            (0..7)
                .filter_map(|day| first.checked_add_signed(Duration::days(week * 7 + day)))
                .map(|date| CalendarCell {
                    date: DateKey(date),
                    status: cell_status(date, today, presence.contains(&date)),
                    is_today: date == today,
                })
                .collect()
        })
        .collect()
}

fn cell_status(date: NaiveDate, today: NaiveDate, checked_in: bool) -> CellStatus {
    if date > today {
        CellStatus::Future
    } else if checked_in {
        CellStatus::CheckedIn
    } else if date == today {
        CellStatus::TodayMissed
    } else {
        CellStatus::Missed
    }
}

/// One day of the seven-day check-in time chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: DateKey,
    pub weekday: Weekday,
    /// Local hour of that day's latest check-in, with minutes as a fraction.
    pub hour: Option<f64>,
}

/// Check-in time of day for the last seven days, oldest first.
pub fn daily_check_in_hours(
    history: &[CheckInRecord],
    resolver: &TimestampResolver<'_>,
) -> Vec<ChartPoint> {
    let clock = resolver.clock();
    let today = clock.today();

    let mut latest: BTreeMap<NaiveDate, DateTime<Utc>> = BTreeMap::new();
    for record in history {
        let instant = resolver.resolve(record);
        let day = clock.local_date(instant);
        latest
            .entry(day)
            .and_modify(|seen| *seen = (*seen).max(instant))
            .or_insert(instant);
    }

    (0..7)
        .rev()
        .map(|back| {
            let date = today - Duration::days(back);
            let hour = latest.get(&date).map(|instant| {
                let local = clock.to_local(*instant);
                f64::from(local.hour()) + f64::from(local.minute()) / 60.0
            });
            ChartPoint {
                date: DateKey(date),
                weekday: date.weekday(),
                hour,
            }
        })
        .collect()
}
