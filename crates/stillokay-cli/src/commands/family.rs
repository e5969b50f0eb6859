use std::path::{Path, PathBuf};

use chrono::{Duration, FixedOffset, Local, Offset};
use clap::{Args, Subcommand, ValueEnum};
use serde::Deserialize;
use serde_json::json;
use stillokay_core::feed::{RealtimePayload, RosterSession, StaticRoster, StatusBroker};
use stillokay_core::{Config, FamilyMember, MergePolicy, PartialStatusEvent};

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum FamilyAction {
    /// Replay status events over a roster and print the resulting view
    Replay(ReplayArgs),
    /// Replay, then list members with no recent update
    Attention {
        #[command(flatten)]
        replay: ReplayArgs,
        /// Staleness threshold in hours (defaults to roster.stale_after_hours)
        #[arg(long)]
        hours: Option<i64>,
    },
}

#[derive(Args)]
pub struct ReplayArgs {
    /// JSON array of family members
    #[arg(long)]
    roster: PathBuf,
    /// JSON Lines of realtime payloads or status events
    #[arg(long)]
    events: Option<PathBuf>,
    /// Viewer id, hidden from the output (defaults to roster.self_id)
    #[arg(long)]
    self_id: Option<String>,
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    ArrivalOrder,
    TimestampGuarded,
}

impl From<PolicyArg> for MergePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::ArrivalOrder => MergePolicy::ArrivalOrder,
            PolicyArg::TimestampGuarded => MergePolicy::TimestampGuarded,
        }
    }
}

/// One line of an events file.
#[derive(Deserialize)]
#[serde(untagged)]
enum EventLine {
    Realtime(RealtimePayload),
    Status(PartialStatusEvent),
}

pub fn run(action: FamilyAction) -> CliResult {
    let config = Config::load()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match action {
        FamilyAction::Replay(args) => {
            let session = runtime.block_on(replay(&args, &config))?;
            print_json(&json!({
                "members": session.others(),
                "stats": session.stats(),
            }))
        }
        FamilyAction::Attention { replay: args, hours } => {
            let threshold = match hours {
                Some(hours) => Duration::try_hours(hours)
                    .ok_or_else(|| format!("--hours {hours} is out of range"))?,
                None => config.stale_after(),
            };
            let now = config.clock()?.now();
            let session = runtime.block_on(replay(&args, &config))?;
            let stale = session.state().needing_attention(now, threshold);
            let viewer = args.self_id.as_ref().or(config.roster.self_id.as_ref());
            let stale: Vec<_> = stale
                .into_iter()
                .filter(|m| Some(&m.id) != viewer)
                .collect();
            print_json(&stale)
        }
    }
}

async fn replay(
    args: &ReplayArgs,
    config: &Config,
) -> Result<RosterSession, Box<dyn std::error::Error>> {
    let members: Vec<FamilyMember> = serde_json::from_str(&std::fs::read_to_string(&args.roster)?)?;
    let events = match &args.events {
        Some(path) => read_events(path)?,
        None => Vec::new(),
    };

    let policy = args
        .policy
        .map(MergePolicy::from)
        .unwrap_or(config.roster.merge_policy);
    let mut session = RosterSession::start(&StaticRoster(members), policy)?
        .with_display_offset(display_offset(config));
    if let Some(self_id) = args.self_id.clone().or_else(|| config.roster.self_id.clone()) {
        session = session.with_self_id(self_id);
    }

    let broker = StatusBroker::new(events.len());
    let subscription = broker.subscribe();
    for event in events {
        broker.publish(event);
    }
    drop(broker);

    session.run(subscription).await;
    Ok(session)
}

fn read_events(path: &Path) -> Result<Vec<PartialStatusEvent>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let mut events = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed: EventLine = serde_json::from_str(line)
            .map_err(|e| format!("{}:{}: {e}", path.display(), index + 1))?;
        match parsed {
            EventLine::Realtime(payload) => events.extend(payload.into_event()),
            EventLine::Status(event) => events.push(event),
        }
    }
    Ok(events)
}

fn display_offset(config: &Config) -> FixedOffset {
    config
        .calendar
        .utc_offset_minutes
        .and_then(|minutes| FixedOffset::east_opt(minutes.checked_mul(60)?))
        .unwrap_or_else(|| Local::now().offset().fix())
}
