//! Application configuration (`relaylab.toml`).
//!
//! ```toml
//! data_dir = "data/processed"
//! overrides_file = "data/processed/runners_overrides.json"  # optional
//!
//! [planning]
//! default_pace_sec = 360.0
//! start_time = "07:30"
//! race_month = 5
//! race_day = 1
//! ```
//!
//! Every key is optional. A missing file yields the defaults.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "relaylab.toml";
pub const OVERRIDES_FILE_NAME: &str = "runners_overrides.json";
/// Paces a user may enter for planning (seconds per km).
pub const PACE_RANGE_SEC: RangeInclusive<f64> = 150.0..=900.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Defaults for the schedule planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningDefaults {
    /// Pace assumed for legs without an explicit one (seconds per km).
    pub default_pace_sec: f64,
    /// Race start, `HH:MM` or `HH:MM:SS`.
    pub start_time: String,
    pub race_month: u32,
    pub race_day: u32,
}

impl Default for PlanningDefaults {
    fn default() -> Self {
        Self {
            default_pace_sec: 360.0,
            start_time: "07:30".into(),
            race_month: 5,
            race_day: 1,
        }
    }
}

impl PlanningDefaults {
    pub fn start_time(&self) -> Result<NaiveTime, ConfigError> {
        parse_clock_time(&self.start_time)
            .ok_or_else(|| ConfigError::Invalid(format!("start_time '{}' is not HH:MM", self.start_time)))
    }

    /// Race day in `year`.
    pub fn race_date(&self, year: i32) -> Result<NaiveDate, ConfigError> {
        NaiveDate::from_ymd_opt(year, self.race_month, self.race_day).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "race date {year}-{:02}-{:02} does not exist",
                self.race_month, self.race_day
            ))
        })
    }
}

/// Parse `HH:MM` or `HH:MM:SS`.
pub fn parse_clock_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    /// Defaults to `<data_dir>/runners_overrides.json`.
    pub overrides_file: Option<PathBuf>,
    pub planning: PlanningDefaults,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/processed"),
            overrides_file: None,
            planning: PlanningDefaults::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or return defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !PACE_RANGE_SEC.contains(&self.planning.default_pace_sec) {
            return Err(ConfigError::Invalid(format!(
                "default_pace_sec must be between {} and {}, got {}",
                PACE_RANGE_SEC.start(),
                PACE_RANGE_SEC.end(),
                self.planning.default_pace_sec
            )));
        }
        self.planning.start_time()?;
        // Any leap year accepts every valid month/day.
        self.planning.race_date(2000)?;
        Ok(())
    }

    pub fn overrides_path(&self) -> PathBuf {
        self.overrides_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join(OVERRIDES_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(
            config.overrides_path(),
            PathBuf::from("data/processed/runners_overrides.json")
        );
        assert_eq!(
            config.planning.start_time().unwrap(),
            NaiveTime::from_hms_opt(7, 30, 0).unwrap()
        );
    }

    #[test]
    fn partial_planning_section() {
        let config = AppConfig::from_toml(
            r#"
            data_dir = "/srv/relay"

            [planning]
            start_time = "08:15:30"
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/relay"));
        assert_eq!(config.planning.default_pace_sec, 360.0);
        assert_eq!(
            config.planning.start_time().unwrap(),
            NaiveTime::from_hms_opt(8, 15, 30).unwrap()
        );
        assert_eq!(
            config.planning.race_date(2025).unwrap(),
            NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(AppConfig::from_toml("[planning]\nstart_time = \"noon\"").is_err());
        assert!(AppConfig::from_toml("[planning]\ndefault_pace_sec = 0.0").is_err());
        assert!(AppConfig::from_toml("[planning]\ndefault_pace_sec = 1e12").is_err());
        assert!(AppConfig::from_toml("[planning]\ndefault_pace_sec = 900.0").is_ok());
        assert!(AppConfig::from_toml("[planning]\nrace_month = 13").is_err());
        assert!(AppConfig::from_toml("data_dir = [").is_err());
    }

    #[test]
    fn missing_file_is_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("relaylab.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn explicit_overrides_file_wins() {
        let config = AppConfig::from_toml("overrides_file = \"/tmp/ov.json\"").unwrap();
        assert_eq!(config.overrides_path(), PathBuf::from("/tmp/ov.json"));
    }
}
