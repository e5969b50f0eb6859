//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary HOME so the
//! config file and database start empty.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_stillokay"))
        .args(args)
        .env("HOME", home)
        .env_remove("STILLOKAY_ENV")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(home: &Path, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("stdout is not JSON")
}

#[test]
fn test_checkin_then_stats() {
    let home = tempfile::tempdir().unwrap();

    let out = run_json(
        home.path(),
        &["checkin", "--status", "สบายดี", "--lat", "14.06", "--lng", "100.61"],
    );
    assert_eq!(out["record"]["status"], "สบายดี");
    assert_eq!(out["streak"]["current_streak"], 1);
    assert_eq!(out["streak"]["checked_in_today"], true);

    // second check-in reuses the last known location
    let out = run_json(home.path(), &["checkin"]);
    assert_eq!(out["record"]["coords"]["latitude"], 14.06);

    let history = run_json(home.path(), &["history", "list"]);
    assert_eq!(history.as_array().unwrap().len(), 2);

    let dashboard = run_json(home.path(), &["stats", "dashboard"]);
    assert_eq!(dashboard["total_check_ins"], 2);
    assert_eq!(dashboard["streak"]["current_streak"], 1);
    assert_eq!(dashboard["badges"]["unlocked"][0]["id"], "first");

    let calendar = run_json(home.path(), &["stats", "calendar", "--weeks", "2"]);
    assert_eq!(calendar.as_array().unwrap().len(), 2);

    let chart = run_json(home.path(), &["stats", "chart"]);
    assert_eq!(chart.as_array().unwrap().len(), 7);
}

#[test]
fn test_checkin_without_location_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["checkin"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("--lat"));
}

#[test]
fn test_checkin_rejects_out_of_range_coordinates() {
    let home = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(home.path(), &["checkin", "--lat", "123", "--lng", "0"]);
    assert_eq!(code, 1);
}

#[test]
fn test_history_import_and_delete() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("export.json");
    std::fs::write(
        &file,
        r#"[
            {"id":"1770775800000","date":"11/2/2569 09:10:00","status":"a","coords":{"latitude":1.0,"longitude":2.0}},
            {"id":"1770689400000","date":"10/2/2569 09:10:00","status":"b","coords":{"latitude":1.0,"longitude":2.0}}
        ]"#,
    )
    .unwrap();

    let out = run_json(home.path(), &["history", "import", file.to_str().unwrap()]);
    assert_eq!(out["inserted"], 2);

    let (stdout, _, code) = run_cli(home.path(), &["history", "delete", "1770775800000"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("deleted"));

    let (_, _, code) = run_cli(home.path(), &["history", "delete", "1770775800000"]);
    assert_eq!(code, 1);

    let history = run_json(home.path(), &["history", "list", "--resolved"]);
    assert_eq!(history[0]["resolved"]["source"], "epoch_millis");
}

#[test]
fn test_config_get_set() {
    let home = tempfile::tempdir().unwrap();

    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "calendar.week_start"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "sunday");

    let (_, _, code) = run_cli(home.path(), &["config", "set", "calendar.week_start", "monday"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(home.path(), &["config", "get", "calendar.week_start"]);
    assert_eq!(stdout.trim(), "monday");

    let (_, _, code) = run_cli(home.path(), &["config", "set", "calendar.nope", "1"]);
    assert_eq!(code, 1);
}

#[test]
fn test_family_replay() {
    let home = tempfile::tempdir().unwrap();
    let roster = home.path().join("roster.json");
    let events = home.path().join("events.jsonl");
    std::fs::write(
        &roster,
        r#"[{"id":"mom","display_name":"แม่"},{"id":"me","display_name":"ฉัน"}]"#,
    )
    .unwrap();
    std::fs::write(
        &events,
        concat!(
            r#"{"eventType":"UPDATE","new":{"user_id":"mom","status_text":"ทำงาน","battery_level":80}}"#,
            "\n",
            r#"{"member_id":"ghost","status_text":"boo"}"#,
            "\n",
        ),
    )
    .unwrap();

    let out = run_json(
        home.path(),
        &[
            "family",
            "replay",
            "--roster",
            roster.to_str().unwrap(),
            "--events",
            events.to_str().unwrap(),
            "--self-id",
            "me",
        ],
    );
    let members = out["members"].as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["status_text"], "ทำงาน");
    assert_eq!(members[0]["battery_level"], 80);
    assert_eq!(out["stats"]["applied"], 1);
    assert_eq!(out["stats"]["ignored"], 1);
}

#[test]
fn test_oversized_numbers_are_errors_not_panics() {
    let home = tempfile::tempdir().unwrap();

    let (_, _, code) = run_cli(
        home.path(),
        &["config", "set", "calendar.overdue_after_hours", "9223372036854775807"],
    );
    assert_eq!(code, 1);
    let (_, _, code) = run_cli(home.path(), &["stats", "streak"]);
    assert_eq!(code, 0);

    let calendar = run_json(home.path(), &["stats", "calendar", "--weeks", "4294967295"]);
    assert_eq!(calendar.as_array().unwrap().len(), 520);

    let roster = home.path().join("roster.json");
    std::fs::write(&roster, r#"[{"id":"mom","display_name":"แม่"}]"#).unwrap();
    let (_, stderr, code) = run_cli(
        home.path(),
        &[
            "family",
            "attention",
            "--roster",
            roster.to_str().unwrap(),
            "--hours",
            "9223372036854775807",
        ],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("out of range"));
}

#[test]
fn test_family_attention_lists_members_without_updates() {
    let home = tempfile::tempdir().unwrap();
    let roster = home.path().join("roster.json");
    std::fs::write(
        &roster,
        r#"[{"id":"mom","display_name":"แม่"},{"id":"me","display_name":"ฉัน"}]"#,
    )
    .unwrap();

    let out = run_json(
        home.path(),
        &["family", "attention", "--roster", roster.to_str().unwrap(), "--self-id", "me"],
    );
    let ids: Vec<_> = out.as_array().unwrap().iter().map(|m| m["id"].clone()).collect();
    assert_eq!(ids, vec!["mom"]);
}

#[test]
fn test_completions() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("stillokay"));
}
