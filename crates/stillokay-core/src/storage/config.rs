//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Local-day boundaries (UTC offset override, week start)
//! - Timestamp fallback policy for unresolvable records
//! - Family roster merge policy and staleness threshold
//! - Default check-in status
//!
//! Configuration is stored at `~/.config/stillokay/config.toml`.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::calendar::{DEFAULT_HEATMAP_WEEKS, MAX_HEATMAP_WEEKS};
use crate::clock::{Clock, OffsetClock, SystemClock};
use crate::dashboard::DashboardSettings;
use crate::error::ConfigError;
use crate::resolver::FallbackPolicy;
use crate::roster::MergePolicy;
use crate::streak::DEFAULT_OVERDUE_AFTER_HOURS;
use crate::weekly::WeekStart;

/// Calendar and day-boundary settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Overrides the system timezone when set.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
    #[serde(default)]
    pub week_start: WeekStart,
    #[serde(default = "default_heatmap_weeks")]
    pub heatmap_weeks: u32,
    #[serde(default = "default_overdue_after_hours")]
    pub overdue_after_hours: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub fallback: FallbackPolicy,
}

/// Family roster settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterConfig {
    #[serde(default)]
    pub merge_policy: MergePolicy,
    /// The signed-in member, hidden from the "others" view.
    #[serde(default)]
    pub self_id: Option<String>,
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default = "default_status")]
    pub default_status: String,
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub roster: RosterConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
}

/// Upper bound for the hour-based thresholds (one year).
pub const MAX_THRESHOLD_HOURS: i64 = 24 * 366;

fn default_heatmap_weeks() -> u32 {
    DEFAULT_HEATMAP_WEEKS
}
fn default_overdue_after_hours() -> i64 {
    DEFAULT_OVERDUE_AFTER_HOURS
}
fn default_stale_after_hours() -> i64 {
    24
}
fn default_status() -> String {
    "สบายดี".to_string()
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: None,
            week_start: WeekStart::default(),
            heatmap_weeks: default_heatmap_weeks(),
            overdue_after_hours: default_overdue_after_hours(),
        }
    }
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            merge_policy: MergePolicy::default(),
            self_id: None,
            stale_after_hours: default_stale_after_hours(),
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            default_status: default_status(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        if key.is_empty() {
            return Err(unknown());
        }

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = if value == "null" {
                serde_json::Value::Null
            } else {
                match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| {
                                    invalid(format!("cannot parse '{value}' as number"))
                                })?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    // Unset optional: take JSON when it parses, a string otherwise.
                    serde_json::Value::Null => serde_json::from_str(value)
                        .unwrap_or_else(|_| serde_json::Value::String(value.into())),
                    serde_json::Value::String(_) => serde_json::Value::String(value.into()),
                }
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing defaults when no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content)?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit the field.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Check the numeric ranges serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` naming the first out-of-range key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_hours("calendar.overdue_after_hours", self.calendar.overdue_after_hours)?;
        check_hours("roster.stale_after_hours", self.roster.stale_after_hours)?;
        if !(1..=MAX_HEATMAP_WEEKS).contains(&self.calendar.heatmap_weeks) {
            return Err(ConfigError::InvalidValue {
                key: "calendar.heatmap_weeks".to_string(),
                message: format!("must be between 1 and {MAX_HEATMAP_WEEKS}"),
            });
        }
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Clock honoring `calendar.utc_offset_minutes`, or the system timezone.
    pub fn clock(&self) -> Result<Box<dyn Clock>, ConfigError> {
        match self.calendar.utc_offset_minutes {
            None => Ok(Box::new(SystemClock)),
            Some(minutes) => OffsetClock::from_minutes(minutes)
                .map(|clock| Box::new(clock) as Box<dyn Clock>)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: "calendar.utc_offset_minutes".to_string(),
                    message: format!("{minutes} is not a valid UTC offset"),
                }),
        }
    }

    pub fn dashboard_settings(&self) -> DashboardSettings {
        DashboardSettings {
            week_start: self.calendar.week_start,
            overdue_after: hours_or(
                self.calendar.overdue_after_hours,
                DEFAULT_OVERDUE_AFTER_HOURS,
            ),
        }
    }

    pub fn stale_after(&self) -> Duration {
        hours_or(self.roster.stale_after_hours, default_stale_after_hours())
    }
}

fn check_hours(key: &str, hours: i64) -> Result<(), ConfigError> {
    if (1..=MAX_THRESHOLD_HOURS).contains(&hours) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be between 1 and {MAX_THRESHOLD_HOURS} hours"),
        })
    }
}

// Fields are public, so unvalidated values can still reach here.
fn hours_or(hours: i64, default: i64) -> Duration {
    Duration::try_hours(hours)
        .or_else(|| Duration::try_hours(default))
        .unwrap_or(Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.calendar.heatmap_weeks, 4);
        assert_eq!(parsed.roster.merge_policy, MergePolicy::ArrivalOrder);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[calendar]\nweek_start = \"monday\"\n").unwrap();
        assert_eq!(parsed.calendar.week_start, WeekStart::Monday);
        assert_eq!(parsed.calendar.overdue_after_hours, 24);
        assert_eq!(parsed.resolver.fallback, FallbackPolicy::Now);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("calendar.week_start").as_deref(), Some("sunday"));
        assert_eq!(cfg.get("calendar.heatmap_weeks").as_deref(), Some("4"));
        assert_eq!(cfg.get("calendar.missing"), None);
        assert_eq!(cfg.get(""), None);
    }

    #[test]
    fn set_updates_enum_and_number() {
        let mut cfg = Config::default();
        cfg.set("roster.merge_policy", "timestamp_guarded").unwrap();
        cfg.set("calendar.overdue_after_hours", "36").unwrap();
        assert_eq!(cfg.roster.merge_policy, MergePolicy::TimestampGuarded);
        assert_eq!(cfg.calendar.overdue_after_hours, 36);
    }

    #[test]
    fn set_fills_unset_optionals() {
        let mut cfg = Config::default();
        cfg.set("calendar.utc_offset_minutes", "420").unwrap();
        cfg.set("roster.self_id", "u-42").unwrap();
        assert_eq!(cfg.calendar.utc_offset_minutes, Some(420));
        assert_eq!(cfg.roster.self_id.as_deref(), Some("u-42"));

        cfg.set("roster.self_id", "null").unwrap();
        assert_eq!(cfg.roster.self_id, None);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        let err = cfg.set("calendar.nope", "1").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(_)));
    }

    #[test]
    fn set_rejects_invalid_values() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("calendar.heatmap_weeks", "many"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("calendar.week_start", "friday"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn set_rejects_out_of_range_thresholds() {
        let mut cfg = Config::default();
        for key in ["calendar.overdue_after_hours", "roster.stale_after_hours"] {
            assert!(matches!(
                cfg.set(key, "9223372036854775807"),
                Err(ConfigError::InvalidValue { .. })
            ));
            assert!(matches!(
                cfg.set(key, "0"),
                Err(ConfigError::InvalidValue { .. })
            ));
        }
        assert!(matches!(
            cfg.set("calendar.heatmap_weeks", "4294967295"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn durations_never_panic_on_extreme_fields() {
        let mut cfg = Config::default();
        cfg.calendar.overdue_after_hours = i64::MAX;
        cfg.roster.stale_after_hours = i64::MIN;
        assert_eq!(cfg.dashboard_settings().overdue_after, Duration::hours(24));
        assert_eq!(cfg.stale_after(), Duration::hours(24));
    }

    #[test]
    fn load_from_rejects_out_of_range_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[calendar]\noverdue_after_hours = 9223372036854775807\n",
        )
        .unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn clock_uses_configured_offset() {
        let mut cfg = Config::default();
        cfg.calendar.utc_offset_minutes = Some(420);
        let clock = cfg.clock().unwrap();
        let instant = chrono::DateTime::parse_from_rfc3339("2026-02-10T20:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        assert_eq!(
            clock.local_date(instant),
            chrono::NaiveDate::from_ymd_opt(2026, 2, 11).unwrap()
        );

        cfg.calendar.utc_offset_minutes = Some(100_000);
        assert!(cfg.clock().is_err());
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg, Config::default());

        let mut changed = cfg.clone();
        changed.profile.default_status = "ok".to_string();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), changed);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "calendar = 5").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseFailed(_))
        ));
    }
}
