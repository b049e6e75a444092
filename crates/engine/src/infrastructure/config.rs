//! Engine configuration

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chronicle_domain::ClockSettingsPatch;

/// Engine configuration loaded from environment
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite database path
    pub db_path: String,

    /// Overrides applied to the persisted clock settings at startup
    pub clock_overrides: ClockSettingsPatch,

    /// Background task cadences
    pub tasks: TaskIntervals,
}

/// Cadences of the background loops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskIntervals {
    pub advance: Duration,
    pub events: Duration,
    pub calendar: Duration,
    pub cleanup: Duration,
    /// How often a disabled persistence loop wakes to re-read its setting
    pub persistence_recheck: Duration,
}

impl Default for TaskIntervals {
    fn default() -> Self {
        Self {
            advance: Duration::from_secs(60),
            events: Duration::from_secs(300),
            calendar: Duration::from_secs(600),
            cleanup: Duration::from_secs(3600),
            persistence_recheck: Duration::from_secs(300),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = TaskIntervals::default();

        Ok(Self {
            db_path: env::var("CHRONICLE_DB_PATH")
                .unwrap_or_else(|_| "./data/chronicle.db".to_string()),

            clock_overrides: ClockSettingsPatch {
                multiplier: optional("CLOCK_MULTIPLIER")?,
                hours_per_day: optional("CLOCK_HOURS_PER_DAY")?,
                days_per_year: optional("CLOCK_DAYS_PER_YEAR")?,
                day_start_hour: optional("CLOCK_DAY_START_HOUR")?,
                night_start_hour: optional("CLOCK_NIGHT_START_HOUR")?,
                persistence_interval_minutes: optional("CLOCK_PERSISTENCE_INTERVAL_MINUTES")?,
                auto_cleanup_enabled: optional("CLOCK_AUTO_CLEANUP")?,
            },

            tasks: TaskIntervals {
                advance: seconds("TASK_ADVANCE_INTERVAL_SECONDS", defaults.advance)?,
                events: seconds("TASK_EVENT_INTERVAL_SECONDS", defaults.events)?,
                calendar: seconds("TASK_CALENDAR_INTERVAL_SECONDS", defaults.calendar)?,
                cleanup: seconds("TASK_CLEANUP_INTERVAL_SECONDS", defaults.cleanup)?,
                persistence_recheck: seconds(
                    "TASK_PERSISTENCE_RECHECK_SECONDS",
                    defaults.persistence_recheck,
                )?,
            },
        })
    }
}

fn optional<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        _ => Ok(None),
    }
}

fn seconds(key: &str, default: Duration) -> Result<Duration> {
    let secs: Option<u64> = optional(key)?;
    match secs {
        Some(0) => anyhow::bail!("{} must be greater than zero", key),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(default),
    }
}
