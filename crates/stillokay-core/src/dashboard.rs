//! One-shot bundle of every history-derived metric.

use std::collections::BTreeSet;

use chrono::Duration;
use serde::Serialize;

use crate::badges::{evaluate_badges, goal_progress, BadgeEvaluation, GoalProgress};
use crate::calendar::{extract_calendar_presence, DateKey};
use crate::record::CheckInRecord;
use crate::resolver::TimestampResolver;
use crate::streak::{StreakState, DEFAULT_OVERDUE_AFTER_HOURS};
use crate::weekly::{compute_weekly_summary, WeekStart, WeeklySummary};

/// Knobs that shape the derived metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardSettings {
    pub week_start: WeekStart,
    pub overdue_after: Duration,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            week_start: WeekStart::default(),
            overdue_after: Duration::hours(DEFAULT_OVERDUE_AFTER_HOURS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub total_check_ins: u32,
    pub streak: StreakState,
    pub weekly: WeeklySummary,
    pub badges: BadgeEvaluation,
    pub next_goal: Option<GoalProgress>,
    pub calendar: BTreeSet<DateKey>,
}

impl Dashboard {
    pub fn compute(
        history: &[CheckInRecord],
        resolver: &TimestampResolver<'_>,
        settings: &DashboardSettings,
    ) -> Self {
        let total_check_ins = u32::try_from(history.len()).unwrap_or(u32::MAX);
        let streak = StreakState::compute(history, resolver, settings.overdue_after);
        let weekly = compute_weekly_summary(history, resolver, settings.week_start);

        Self {
            total_check_ins,
            badges: evaluate_badges(streak.current_streak, total_check_ins),
            next_goal: goal_progress(streak.current_streak),
            calendar: extract_calendar_presence(history, resolver),
            streak,
            weekly,
        }
    }
}
