//! # Stillokay Core Library
//!
//! This library provides the core logic for Stillokay, a daily "I'm okay"
//! check-in tracker with a live family roster. All operations are available
//! through the standalone `stillokay` CLI, which is a thin layer over this
//! crate.
//!
//! ## Architecture
//!
//! - **Metrics**: Pure functions over an immutable check-in history. Streaks,
//!   weekly summaries, calendar presence and badges are all derived from the
//!   history plus an injected [`Clock`]; nothing here reads the wall clock.
//! - **Roster**: An insertion-ordered family roster updated by partial
//!   status events, with an in-process broadcast feed to drive it.
//! - **Storage**: SQLite-based history storage and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`TimestampResolver`]: Maps a record to an instant (id, then date string, then fallback)
//! - [`StreakState`]: Current streak, overdue flag and longest run
//! - [`RosterState`]: Family roster with field-level merge
//! - [`HistoryDb`]: Check-in persistence
//! - [`Config`]: Application configuration management

pub mod badges;
pub mod calendar;
pub mod clock;
pub mod dashboard;
pub mod error;
pub mod feed;
pub mod record;
pub mod resolver;
pub mod roster;
pub mod storage;
pub mod streak;
pub mod weekly;

pub use badges::{evaluate_badges, goal_progress, Badge, BadgeEvaluation, GoalProgress, BADGES};
pub use calendar::{daily_check_in_hours, extract_calendar_presence, heatmap, DateKey};
pub use clock::{Clock, FixedClock, OffsetClock, SystemClock};
pub use dashboard::{Dashboard, DashboardSettings};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use feed::{RosterSession, RosterSource, StatusBroker, Subscription};
pub use record::{CheckInRecord, Coordinates, RecordTimestamp};
pub use resolver::{FallbackPolicy, Resolution, ResolutionSource, TimestampResolver};
pub use roster::{
    apply_update, init_roster, FamilyMember, MergePolicy, PartialStatusEvent, RosterState,
};
pub use storage::{Config, HistoryDb, HistoryStore, MemoryHistory};
pub use streak::{compute_streak, StreakState};
pub use weekly::{compute_weekly_summary, Trend, WeekStart, WeeklySummary};
