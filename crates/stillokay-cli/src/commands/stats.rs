use clap::Subcommand;
use serde_json::json;
use stillokay_core::calendar::{daily_check_in_hours, heatmap};
use stillokay_core::storage::{HistoryDb, HistoryStore};
use stillokay_core::{
    compute_weekly_summary, evaluate_badges, goal_progress, Config, Dashboard, StreakState,
    TimestampResolver,
};

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Everything at once
    Dashboard,
    /// Current and longest streak
    Streak,
    /// This week against last week
    Weekly,
    /// Unlocked badges and the next goal
    Badges,
    /// Calendar heatmap grid
    Calendar {
        /// Number of weeks, ending with the current one
        #[arg(long)]
        weeks: Option<u32>,
    },
    /// Check-in hour for each of the last seven days
    Chart,
}

pub fn run(action: StatsAction) -> CliResult {
    let config = Config::load()?;
    let clock = config.clock()?;
    let resolver = TimestampResolver::new(clock.as_ref()).with_fallback(config.resolver.fallback);
    let settings = config.dashboard_settings();
    let history = HistoryDb::open()?.load()?;

    match action {
        StatsAction::Dashboard => {
            print_json(&Dashboard::compute(&history, &resolver, &settings))?;
        }
        StatsAction::Streak => {
            print_json(&StreakState::compute(&history, &resolver, settings.overdue_after))?;
        }
        StatsAction::Weekly => {
            print_json(&compute_weekly_summary(&history, &resolver, settings.week_start))?;
        }
        StatsAction::Badges => {
            let streak = StreakState::compute(&history, &resolver, settings.overdue_after);
            let total = u32::try_from(history.len()).unwrap_or(u32::MAX);
            print_json(&json!({
                "badges": evaluate_badges(streak.current_streak, total),
                "next_goal": goal_progress(streak.current_streak),
            }))?;
        }
        StatsAction::Calendar { weeks } => {
            let weeks = weeks.unwrap_or(config.calendar.heatmap_weeks);
            print_json(&heatmap(&history, &resolver, weeks, settings.week_start))?;
        }
        StatsAction::Chart => {
            print_json(&daily_check_in_hours(&history, &resolver))?;
        }
    }
    Ok(())
}
