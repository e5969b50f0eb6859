//! Achievement badges and streak goals.
//!
//! The catalog order is significant: `next_badge` is the first locked entry
//! in declared order, not the numerically closest requirement.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    /// Compared against the current streak.
    Streak,
    /// Compared against the total number of check-ins.
    Total,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub id: &'static str,
    pub name: &'static str,
    pub emoji: &'static str,
    pub description: &'static str,
    pub requirement_type: RequirementType,
    pub requirement_value: u32,
}

impl Badge {
    pub fn is_unlocked(&self, streak: u32, total_check_ins: u32) -> bool {
        let counter = match self.requirement_type {
            RequirementType::Streak => streak,
            RequirementType::Total => total_check_ins,
        };
        counter >= self.requirement_value
    }
}

pub const BADGES: &[Badge] = &[
    Badge {
        id: "first",
        name: "Fresh Start",
        emoji: "🌱",
        description: "First check-in",
        requirement_type: RequirementType::Total,
        requirement_value: 1,
    },
    Badge {
        id: "week",
        name: "First 7 Days",
        emoji: "⭐",
        description: "7-day streak",
        requirement_type: RequirementType::Streak,
        requirement_value: 7,
    },
    Badge {
        id: "twoweek",
        name: "Two Weeks",
        emoji: "🌟",
        description: "14-day streak",
        requirement_type: RequirementType::Streak,
        requirement_value: 14,
    },
    Badge {
        id: "month",
        name: "One Month",
        emoji: "🏆",
        description: "30-day streak",
        requirement_type: RequirementType::Streak,
        requirement_value: 30,
    },
    Badge {
        id: "fifty",
        name: "50 Check-ins",
        emoji: "💎",
        description: "50 check-ins in total",
        requirement_type: RequirementType::Total,
        requirement_value: 50,
    },
    Badge {
        id: "hundred",
        name: "100 Check-ins",
        emoji: "👑",
        description: "100 check-ins in total",
        requirement_type: RequirementType::Total,
        requirement_value: 100,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeEvaluation {
    /// Unlocked badges in catalog order.
    pub unlocked: Vec<Badge>,
    pub next_badge: Option<Badge>,
}

/// Evaluate the built-in catalog.
pub fn evaluate_badges(streak: u32, total_check_ins: u32) -> BadgeEvaluation {
    evaluate_catalog(BADGES, streak, total_check_ins)
}

/// Evaluate an arbitrary catalog, preserving its declared order.
pub fn evaluate_catalog(catalog: &[Badge], streak: u32, total_check_ins: u32) -> BadgeEvaluation {
    let (unlocked, locked): (Vec<Badge>, Vec<Badge>) = catalog
        .iter()
        .copied()
        .partition(|badge| badge.is_unlocked(streak, total_check_ins));

    BadgeEvaluation {
        unlocked,
        next_badge: locked.first().copied(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GoalMilestone {
    pub target: u32,
    pub label: &'static str,
}

pub const STREAK_GOALS: &[GoalMilestone] = &[
    GoalMilestone { target: 7, label: "7 days" },
    GoalMilestone { target: 14, label: "14 days" },
    GoalMilestone { target: 30, label: "30 days" },
    GoalMilestone { target: 60, label: "60 days" },
    GoalMilestone { target: 100, label: "100 days" },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GoalProgress {
    pub target: u32,
    pub label: &'static str,
    /// `streak / target`, rounded. Not clamped.
    pub progress_percent: u32,
}

/// First milestone strictly above the current streak.
pub fn next_goal_milestone(streak: u32) -> Option<GoalMilestone> {
    STREAK_GOALS.iter().copied().find(|goal| streak < goal.target)
}

pub fn goal_progress(streak: u32) -> Option<GoalProgress> {
    next_goal_milestone(streak).map(|goal| GoalProgress {
        target: goal.target,
        label: goal.label,
        progress_percent: (f64::from(streak) / f64::from(goal.target) * 100.0).round() as u32,
    })
}
