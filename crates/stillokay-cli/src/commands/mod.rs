pub mod checkin;
pub mod config;
pub mod family;
pub mod history;
pub mod stats;

use serde::Serialize;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
