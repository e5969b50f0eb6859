use std::path::PathBuf;

use clap::Subcommand;
use serde_json::json;
use stillokay_core::storage::{HistoryDb, HistoryStore};
use stillokay_core::{CheckInRecord, Config, TimestampResolver};

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List check-ins, newest first
    List {
        /// Show at most this many records
        #[arg(long)]
        limit: Option<usize>,
        /// Include the resolved instant and how it was resolved
        #[arg(long)]
        resolved: bool,
    },
    /// Delete a check-in by id
    Delete {
        id: String,
    },
    /// Delete every check-in
    Clear,
    /// Import a JSON array of check-ins (newest first)
    Import {
        file: PathBuf,
    },
}

pub fn run(action: HistoryAction) -> CliResult {
    let mut db = HistoryDb::open()?;

    match action {
        HistoryAction::List { limit, resolved } => {
            let mut history = db.load()?;
            if let Some(limit) = limit {
                history.truncate(limit);
            }
            if resolved {
                let config = Config::load()?;
                let clock = config.clock()?;
                let resolver =
                    TimestampResolver::new(clock.as_ref()).with_fallback(config.resolver.fallback);
                let rows: Vec<_> = history
                    .iter()
                    .map(|record| {
                        json!({
                            "record": record,
                            "resolved": resolver.resolve_detailed(record),
                        })
                    })
                    .collect();
                print_json(&rows)?;
            } else {
                print_json(&history)?;
            }
        }
        HistoryAction::Delete { id } => {
            if !db.delete_by_id(&id)? {
                return Err(format!("no check-in with id {id}").into());
            }
            println!("deleted {id}");
        }
        HistoryAction::Clear => {
            let removed = db.clear()?;
            println!("removed {removed} check-ins");
        }
        HistoryAction::Import { file } => {
            let content = std::fs::read_to_string(&file)?;
            let records: Vec<CheckInRecord> = serde_json::from_str(&content)?;
            let inserted = db.import(&records)?;
            print_json(&json!({ "read": records.len(), "inserted": inserted }))?;
        }
    }
    Ok(())
}
