//! Weekly completion and pace trend.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::record::CheckInRecord;
use crate::resolver::TimestampResolver;

/// Trend threshold, in check-in days, above which the pace counts as changed.
const TREND_DEADBAND: f64 = 0.5;

/// First day of the calendar week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

impl WeekStart {
    /// Zero-based position of `date` inside its week.
    pub fn days_into_week(self, date: NaiveDate) -> u32 {
        match self {
            WeekStart::Sunday => date.weekday().num_days_from_sunday(),
            WeekStart::Monday => date.weekday().num_days_from_monday(),
        }
    }

    /// First day of the week containing `date`.
    pub fn week_of(self, date: NaiveDate) -> WeekWindow {
        let start = date - Duration::days(i64::from(self.days_into_week(date)));
        WeekWindow {
            start,
            end: start + Duration::days(6),
        }
    }
}

/// Inclusive range of seven local calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// The seven days immediately before this window.
    pub fn previous(&self) -> WeekWindow {
        WeekWindow {
            start: self.start - Duration::days(7),
            end: self.start - Duration::days(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn label(self) -> &'static str {
        match self {
            Trend::Up => "improving",
            Trend::Down => "declining",
            Trend::Flat => "flat",
        }
    }

    fn from_score(score: f64) -> Self {
        if score > TREND_DEADBAND {
            Trend::Up
        } else if score < -TREND_DEADBAND {
            Trend::Down
        } else {
            Trend::Flat
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub week: WeekWindow,
    /// Distinct days with a check-in this week, 0..=7.
    pub this_week_count: u32,
    pub prev_week_count: u32,
    /// `this_week_count / 7`, rounded, 0..=100.
    pub completion_percent: u32,
    pub trend: Trend,
    /// This week's count minus last week's count scaled to the same elapsed
    /// fraction of the week.
    pub trend_score: f64,
    pub days_left_in_week: u32,
}

/// Summarize the current week against the one before.
pub fn compute_weekly_summary(
    history: &[CheckInRecord],
    resolver: &TimestampResolver<'_>,
    week_start: WeekStart,
) -> WeeklySummary {
    let today = resolver.clock().today();
    let week = week_start.week_of(today);
    let previous = week.previous();
    let days = resolver.check_in_days(history);

    let this_week_count = count_in(&days, &week);
    let prev_week_count = count_in(&days, &previous);

    let elapsed_days = week_start.days_into_week(today) + 1;
    let trend_score =
        f64::from(this_week_count) - f64::from(prev_week_count) / 7.0 * f64::from(elapsed_days);
    let completion_percent = (f64::from(this_week_count) / 7.0 * 100.0).round() as u32;

    let summary = WeeklySummary {
        week,
        this_week_count,
        prev_week_count,
        completion_percent,
        trend: Trend::from_score(trend_score),
        trend_score,
        days_left_in_week: 7 - elapsed_days,
    };
    tracing::debug!(
        this_week = summary.this_week_count,
        prev_week = summary.prev_week_count,
        trend = summary.trend.label(),
        "computed weekly summary"
    );
    summary
}

fn count_in(days: &std::collections::BTreeSet<NaiveDate>, window: &WeekWindow) -> u32 {
    // a window holds at most seven days
    days.range(window.start..=window.end).count() as u32
}
