//! Consecutive-day streak tracking.
//!
//! The streak is always recomputed from the full history. Nothing about it
//! is persisted, so clock changes and deleted records can never leave a
//! stale counter behind.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::record::CheckInRecord;
use crate::resolver::TimestampResolver;

/// Default age after which the last check-in is considered overdue.
pub const DEFAULT_OVERDUE_AFTER_HOURS: i64 = 24;

/// Derived streak view of a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakState {
    /// Consecutive days ending today (or yesterday, if today is still open).
    pub current_streak: u32,
    /// Longest consecutive run anywhere in the history.
    pub longest_streak: u32,
    pub last_check_in: Option<DateTime<Utc>>,
    pub checked_in_today: bool,
    /// No check-in at all, or the last one is older than the overdue window.
    pub overdue: bool,
}

impl StreakState {
    /// Compute with the default 24h overdue window.
    pub fn from_history(history: &[CheckInRecord], resolver: &TimestampResolver<'_>) -> Self {
        Self::compute(
            history,
            resolver,
            Duration::hours(DEFAULT_OVERDUE_AFTER_HOURS),
        )
    }

    pub fn compute(
        history: &[CheckInRecord],
        resolver: &TimestampResolver<'_>,
        overdue_after: Duration,
    ) -> Self {
        let clock = resolver.clock();
        let now = clock.now();
        let today = clock.today();
        let days = clamped_days(history, resolver, today);

        let last_check_in = history.iter().map(|r| resolver.resolve(r)).max();
        let overdue = match last_check_in {
            Some(last) => now - last > overdue_after,
            None => true,
        };

        let state = Self {
            current_streak: streak_ending_at(&days, today),
            longest_streak: longest_run(&days),
            last_check_in,
            checked_in_today: days.contains(&today),
            overdue,
        };
        tracing::debug!(
            current = state.current_streak,
            longest = state.longest_streak,
            checked_in_today = state.checked_in_today,
            "computed streak"
        );
        state
    }
}

/// Number of consecutive calendar days with a check-in, ending today.
///
/// If today has no check-in yet, a run ending yesterday still counts. Any
/// missed day ends the streak, even if a longer run exists further back.
/// Multiple check-ins on one day count once. Returns 0 for an empty history.
pub fn compute_streak(history: &[CheckInRecord], resolver: &TimestampResolver<'_>) -> u32 {
    let today = resolver.clock().today();
    streak_ending_at(&clamped_days(history, resolver, today), today)
}

/// Distinct local days, with future-dated records (clock skew) folded into today.
fn clamped_days(
    history: &[CheckInRecord],
    resolver: &TimestampResolver<'_>,
    today: NaiveDate,
) -> BTreeSet<NaiveDate> {
    resolver
        .check_in_days(history)
        .into_iter()
        .map(|day| day.min(today))
        .collect()
}

fn streak_ending_at(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut cursor = today;

    for &day in days.iter().rev() {
        let gap = (cursor - day).num_days();
        let counts = gap == 0 || (gap == 1 && streak == 0);
        if !counts {
            break;
        }
        streak += 1;
        match day.pred_opt() {
            Some(prev) => cursor = prev,
            None => break,
        }
    }

    streak
}

fn longest_run(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for &day in days {
        run = match previous {
            Some(prev) if prev.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }

    longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FixedClock};
    use crate::record::Coordinates;

    const DAY_MS: i64 = 86_400_000;

    fn at(ms: i64) -> CheckInRecord {
        CheckInRecord {
            id: ms.to_string(),
            date: String::new(),
            status: "สบายดี".to_string(),
            coords: Coordinates {
                latitude: 13.75,
                longitude: 100.5,
            },
        }
    }

    fn clock() -> FixedClock {
        FixedClock::at_local(2026, 2, 11, 18, 0, 7)
    }

    #[test]
    fn empty_history_has_no_streak() {
        let clock = clock();
        let resolver = TimestampResolver::new(&clock);
        assert_eq!(compute_streak(&[], &resolver), 0);

        let state = StreakState::from_history(&[], &resolver);
        assert!(state.overdue);
        assert!(!state.checked_in_today);
        assert_eq!(state.last_check_in, None);
    }

    #[test]
    fn gap_two_days_ago_stops_the_walk() {
        let clock = clock();
        let resolver = TimestampResolver::new(&clock);
        let now = clock.now().timestamp_millis();
        let history = vec![at(now), at(now - DAY_MS), at(now - 3 * DAY_MS)];
        assert_eq!(compute_streak(&history, &resolver), 2);
    }

    #[test]
    fn today_and_two_days_ago_is_one() {
        let clock = clock();
        let resolver = TimestampResolver::new(&clock);
        let now = clock.now().timestamp_millis();
        let history = vec![at(now), at(now - 2 * DAY_MS)];
        assert_eq!(compute_streak(&history, &resolver), 1);
    }

    #[test]
    fn run_ending_yesterday_still_counts() {
        let clock = clock();
        let resolver = TimestampResolver::new(&clock);
        let now = clock.now().timestamp_millis();
        let history = vec![at(now - DAY_MS), at(now - 2 * DAY_MS), at(now - 4 * DAY_MS)];
        assert_eq!(compute_streak(&history, &resolver), 2);

        let state = StreakState::from_history(&history, &resolver);
        assert!(!state.checked_in_today);
        assert_eq!(state.current_streak, 2);
    }

    #[test]
    fn run_ending_before_yesterday_is_broken() {
        let clock = clock();
        let resolver = TimestampResolver::new(&clock);
        let now = clock.now().timestamp_millis();
        let history = vec![at(now - 2 * DAY_MS), at(now - 3 * DAY_MS)];
        assert_eq!(compute_streak(&history, &resolver), 0);
    }

    #[test]
    fn same_day_entries_count_once() {
        let clock = clock();
        let resolver = TimestampResolver::new(&clock);
        let now = clock.now().timestamp_millis();
        let history = vec![at(now), at(now - 3_600_000), at(now - DAY_MS)];
        assert_eq!(compute_streak(&history, &resolver), 2);
    }

    #[test]
    fn future_dated_record_counts_as_today() {
        let clock = clock();
        let resolver = TimestampResolver::new(&clock);
        let now = clock.now().timestamp_millis();
        let history = vec![at(now + 2 * DAY_MS), at(now - DAY_MS)];
        assert_eq!(compute_streak(&history, &resolver), 2);
    }

    #[test]
    fn longest_run_is_reported_separately() {
        let clock = clock();
        let resolver = TimestampResolver::new(&clock);
        let now = clock.now().timestamp_millis();
        let mut history = vec![at(now)];
        history.extend((10..15).map(|d| at(now - d * DAY_MS)));

        let state = StreakState::from_history(&history, &resolver);
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.longest_streak, 5);
        assert!(state.checked_in_today);
        assert!(!state.overdue);
        assert_eq!(state.last_check_in, Some(clock.now()));
    }

    #[test]
    fn midnight_boundary_uses_local_days() {
        // 00:30 local on the 11th; a check-in at 23:50 local on the 10th is yesterday
        let clock = FixedClock::at_local(2026, 2, 11, 0, 30, 7);
        let resolver = TimestampResolver::new(&clock);
        let now = clock.now().timestamp_millis();
        let history = vec![at(now), at(now - 40 * 60_000)];
        assert_eq!(compute_streak(&history, &resolver), 2);
    }

    #[test]
    fn overdue_window_is_configurable() {
        let clock = clock();
        let resolver = TimestampResolver::new(&clock);
        let now = clock.now().timestamp_millis();
        let history = vec![at(now - 30 * 3_600_000)];

        let strict = StreakState::compute(&history, &resolver, Duration::hours(24));
        let lenient = StreakState::compute(&history, &resolver, Duration::hours(48));
        assert!(strict.overdue);
        assert!(!lenient.overdue);
    }
}
