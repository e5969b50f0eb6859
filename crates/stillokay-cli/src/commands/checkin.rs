use clap::Args;
use serde_json::json;
use stillokay_core::storage::{HistoryDb, HistoryStore};
use stillokay_core::{CheckInRecord, Config, Coordinates, StreakState, TimestampResolver};

use super::{print_json, CliResult};

#[derive(Args)]
pub struct CheckinArgs {
    /// Status text (defaults to profile.default_status)
    #[arg(long)]
    status: Option<String>,
    /// Latitude; falls back to the last known location
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    lat: Option<f64>,
    /// Longitude
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lng: Option<f64>,
}

pub fn run(args: CheckinArgs) -> CliResult {
    let config = Config::load()?;
    let clock = config.clock()?;
    let mut db = HistoryDb::open()?;

    let coords = match (args.lat, args.lng) {
        (Some(lat), Some(lng)) => Coordinates::new(lat, lng)?,
        _ => db
            .last_location()?
            .ok_or("no known location yet: pass --lat and --lng")?,
    };
    let status = args
        .status
        .unwrap_or_else(|| config.profile.default_status.clone());

    let record = CheckInRecord::new(clock.as_ref(), status, coords)?;
    db.append(record.clone())?;
    db.set_last_location(coords)?;

    let history = db.load()?;
    let resolver =
        TimestampResolver::new(clock.as_ref()).with_fallback(config.resolver.fallback);
    let streak = StreakState::compute(
        &history,
        &resolver,
        config.dashboard_settings().overdue_after,
    );

    print_json(&json!({ "record": record, "streak": streak }))
}
