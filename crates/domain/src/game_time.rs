use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar_math;
use crate::error::DomainError;
use crate::value_objects::{CalendarConfig, DayNightHours, DayOfWeek, Season};

// =============================================================================
// Time of Day
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Midnight,
    Dawn,
    Morning,
    Noon,
    Afternoon,
    Dusk,
    Night,
}

impl TimeOfDay {
    /// Label for an hour of the day. Afternoon lasts until the season's
    /// night boundary, so it stretches in summer and shrinks in winter.
    pub fn from_hour(hour: u32, night_start: u32) -> Self {
        match hour {
            h if h < 3 => TimeOfDay::Midnight,
            h if h < 6 => TimeOfDay::Dawn,
            h if h < 10 => TimeOfDay::Morning,
            h if h < 14 => TimeOfDay::Noon,
            h if h < night_start => TimeOfDay::Afternoon,
            h if h < 22 => TimeOfDay::Dusk,
            _ => TimeOfDay::Night,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TimeOfDay::Midnight => "midnight",
            TimeOfDay::Dawn => "dawn",
            TimeOfDay::Morning => "morning",
            TimeOfDay::Noon => "noon",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Dusk => "dusk",
            TimeOfDay::Night => "night",
        }
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// =============================================================================
// Clock Settings
// =============================================================================

/// Operator-tunable parameters of the world clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockSettings {
    /// Game-hours that pass per real minute
    pub multiplier: f64,
    pub hours_per_day: u32,
    pub days_per_year: u32,
    /// Fallback day/night boundaries for seasons without their own entry
    pub day_start_hour: u32,
    pub night_start_hour: u32,
    /// Real instant corresponding to year 1, day 1, 00:00
    #[serde(default, with = "lenient_utc")]
    pub epoch_anchor: Option<DateTime<Utc>>,
    /// Cadence of incremental persistence; 0 disables it
    #[serde(default = "default_persistence_interval")]
    pub persistence_interval_minutes: u32,
    #[serde(default = "default_auto_cleanup")]
    pub auto_cleanup_enabled: bool,
}

fn default_persistence_interval() -> u32 {
    5
}

fn default_auto_cleanup() -> bool {
    true
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            multiplier: 60.0,
            hours_per_day: 30,
            days_per_year: 400,
            day_start_hour: 0,
            night_start_hour: 15,
            epoch_anchor: None,
            persistence_interval_minutes: default_persistence_interval(),
            auto_cleanup_enabled: default_auto_cleanup(),
        }
    }
}

impl ClockSettings {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            return Err(DomainError::validation(format!(
                "clock multiplier must be a positive number, got {}",
                self.multiplier
            )));
        }
        if self.hours_per_day == 0 || self.days_per_year == 0 {
            return Err(DomainError::validation(
                "hours_per_day and days_per_year must be positive",
            ));
        }
        if self.day_start_hour > self.night_start_hour
            || self.night_start_hour > self.hours_per_day
        {
            return Err(DomainError::validation(format!(
                "day/night hours {}..{} do not fit a {}-hour day",
                self.day_start_hour, self.night_start_hour, self.hours_per_day
            )));
        }
        Ok(())
    }

    pub fn default_day_night(&self) -> DayNightHours {
        DayNightHours::new(self.day_start_hour, self.night_start_hour)
    }

    pub fn minutes_per_day(&self) -> u64 {
        u64::from(self.hours_per_day) * 60
    }

    pub fn minutes_per_year(&self) -> u64 {
        self.minutes_per_day() * u64::from(self.days_per_year)
    }
}

/// Operator overrides applied on top of persisted settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClockSettingsPatch {
    pub multiplier: Option<f64>,
    pub hours_per_day: Option<u32>,
    pub days_per_year: Option<u32>,
    pub day_start_hour: Option<u32>,
    pub night_start_hour: Option<u32>,
    pub persistence_interval_minutes: Option<u32>,
    pub auto_cleanup_enabled: Option<bool>,
}

impl ClockSettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns `settings` with every present override applied, validated.
    pub fn apply(&self, settings: &ClockSettings) -> Result<ClockSettings, DomainError> {
        let patched = ClockSettings {
            multiplier: self.multiplier.unwrap_or(settings.multiplier),
            hours_per_day: self.hours_per_day.unwrap_or(settings.hours_per_day),
            days_per_year: self.days_per_year.unwrap_or(settings.days_per_year),
            day_start_hour: self.day_start_hour.unwrap_or(settings.day_start_hour),
            night_start_hour: self.night_start_hour.unwrap_or(settings.night_start_hour),
            epoch_anchor: settings.epoch_anchor,
            persistence_interval_minutes: self
                .persistence_interval_minutes
                .unwrap_or(settings.persistence_interval_minutes),
            auto_cleanup_enabled: self
                .auto_cleanup_enabled
                .unwrap_or(settings.auto_cleanup_enabled),
        };
        patched.validate()?;
        Ok(patched)
    }
}

// =============================================================================
// Calendar coordinates
// =============================================================================

/// The independent coordinates of the clock. Everything else is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarPosition {
    pub year: u32,
    pub day_of_year: u32,
    pub hour: u32,
    pub minute: u32,
}

impl CalendarPosition {
    /// Year 1, day 1, 00:00.
    pub const EPOCH: CalendarPosition = CalendarPosition {
        year: 1,
        day_of_year: 1,
        hour: 0,
        minute: 0,
    };
}

/// A fully-derived calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDate {
    pub year: u32,
    pub day_of_year: u32,
    pub month: u32,
    pub day_of_month: u32,
    pub hour: u32,
    pub minute: u32,
    pub season: Season,
    pub day_of_week: DayOfWeek,
    pub is_daytime: bool,
    /// Position in the 12-year cycle, 1..=12
    pub cycle_year: u32,
}

impl CalendarDate {
    pub fn position(&self) -> CalendarPosition {
        CalendarPosition {
            year: self.year,
            day_of_year: self.day_of_year,
            hour: self.hour,
            minute: self.minute,
        }
    }
}

// =============================================================================
// World Clock
// =============================================================================

/// The singleton world clock.
///
/// Derived calendar fields can only change through [`calendar_math`], so they
/// always agree with the clock's position and configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldClock {
    as_of: DateTime<Utc>,
    date: CalendarDate,
    last_shutdown: Option<DateTime<Utc>>,
    config: CalendarConfig,
    /// Millionths of a game-minute earned but not yet applied to the position
    partial_minute: u32,
}

/// Resolution of [`WorldClock::partial_minute`].
pub const PARTIAL_MINUTE_UNITS: u32 = 1_000_000;

impl WorldClock {
    /// A fresh clock at year 1, day 1, 00:00.
    pub fn genesis(now: DateTime<Utc>, settings: &ClockSettings, config: CalendarConfig) -> Self {
        Self::at(CalendarPosition::EPOCH, now, settings, config)
    }

    pub fn at(
        position: CalendarPosition,
        as_of: DateTime<Utc>,
        settings: &ClockSettings,
        config: CalendarConfig,
    ) -> Self {
        let date = calendar_math::derive(settings, &config, position);
        Self {
            as_of,
            date,
            last_shutdown: None,
            config,
            partial_minute: 0,
        }
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    pub fn date(&self) -> &CalendarDate {
        &self.date
    }

    pub fn position(&self) -> CalendarPosition {
        self.date.position()
    }

    pub fn year(&self) -> u32 {
        self.date.year
    }

    pub fn day_of_year(&self) -> u32 {
        self.date.day_of_year
    }

    pub fn month(&self) -> u32 {
        self.date.month
    }

    pub fn day_of_month(&self) -> u32 {
        self.date.day_of_month
    }

    pub fn hour(&self) -> u32 {
        self.date.hour
    }

    pub fn minute(&self) -> u32 {
        self.date.minute
    }

    pub fn season(&self) -> Season {
        self.date.season
    }

    pub fn day_of_week(&self) -> DayOfWeek {
        self.date.day_of_week
    }

    pub fn is_daytime(&self) -> bool {
        self.date.is_daytime
    }

    pub fn cycle_year(&self) -> u32 {
        self.date.cycle_year
    }

    pub fn last_shutdown(&self) -> Option<DateTime<Utc>> {
        self.last_shutdown
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    /// Game time accumulated below the minute, in millionths of a game-minute.
    pub fn partial_minute(&self) -> u32 {
        self.partial_minute
    }

    /// Day/night boundaries of the current season.
    pub fn day_night_hours(&self, settings: &ClockSettings) -> DayNightHours {
        self.config
            .day_night_for(self.date.season, settings.default_day_night())
    }

    pub fn time_of_day(&self, settings: &ClockSettings) -> TimeOfDay {
        TimeOfDay::from_hour(self.date.hour, self.day_night_hours(settings).night_start)
    }

    /// Name of the current month from the month table, if one is configured.
    pub fn month_name(&self) -> Option<&str> {
        let index = self.date.month.checked_sub(1)? as usize;
        self.config.months.get(index).map(|m| m.name.as_str())
    }

    pub fn cycle_name(&self) -> Option<&str> {
        self.config.cycle_name(self.date.cycle_year)
    }

    /// Records that the clock state is current as of `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.as_of = now;
    }

    pub fn mark_shutdown(&mut self, now: DateTime<Utc>) {
        self.as_of = now;
        self.last_shutdown = Some(now);
    }

    pub fn clear_shutdown(&mut self) {
        self.last_shutdown = None;
    }

    /// Replaces the calendar configuration and re-derives every field.
    pub fn reconfigure(&mut self, settings: &ClockSettings, config: CalendarConfig) {
        self.date = calendar_math::derive(settings, &config, self.date.position());
        self.config = config;
    }

    pub(crate) fn moved_to(
        &self,
        position: CalendarPosition,
        partial_minute: u32,
        settings: &ClockSettings,
    ) -> Self {
        Self {
            as_of: self.as_of,
            date: calendar_math::derive(settings, &self.config, position),
            last_shutdown: self.last_shutdown,
            config: self.config.clone(),
            partial_minute: partial_minute % PARTIAL_MINUTE_UNITS,
        }
    }
}

// =============================================================================
// Stored representation
// =============================================================================

/// Persisted form of the world clock.
///
/// Tolerates rows written by older schema versions: naive timestamps, a
/// missing day-of-year, missing derived fields, or no calendar configuration.
/// Unreadable timestamps are replaced rather than rejected.
/// [`StoredWorldClock::into_clock`] turns such a row into a consistent clock and
/// reports what it had to repair so the caller can write the result back once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredWorldClock {
    pub as_of: String,
    #[serde(default)]
    pub last_shutdown: Option<String>,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub day_of_year: Option<u32>,
    /// Legacy day field; older rows used it as the day-of-year
    #[serde(default)]
    pub day: Option<u32>,
    #[serde(default)]
    pub hour: Option<u32>,
    #[serde(default)]
    pub minute: Option<u32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub season: Option<Season>,
    #[serde(default)]
    pub day_of_week: Option<DayOfWeek>,
    #[serde(default)]
    pub is_daytime: Option<bool>,
    #[serde(default)]
    pub cycle_year: Option<u32>,
    #[serde(default)]
    pub config: Option<CalendarConfig>,
    #[serde(default)]
    pub partial_minute: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockRepair {
    NaiveAsOf,
    NaiveLastShutdown,
    /// `as_of` could not be read and was reset to the load time
    UnreadableAsOf,
    /// `last_shutdown` could not be read and was dropped
    UnreadableLastShutdown,
    DayOfYearFromLegacyDay,
    MissingPosition,
    MissingConfig,
    DerivedFieldsRecomputed,
}

impl From<&WorldClock> for StoredWorldClock {
    fn from(clock: &WorldClock) -> Self {
        let date = clock.date;
        Self {
            as_of: format_instant(clock.as_of),
            last_shutdown: clock.last_shutdown.map(format_instant),
            year: Some(date.year),
            day_of_year: Some(date.day_of_year),
            day: Some(date.day_of_month),
            hour: Some(date.hour),
            minute: Some(date.minute),
            month: Some(date.month),
            season: Some(date.season),
            day_of_week: Some(date.day_of_week),
            is_daytime: Some(date.is_daytime),
            cycle_year: Some(date.cycle_year),
            config: Some(clock.config.clone()),
            partial_minute: Some(clock.partial_minute),
        }
    }
}

impl StoredWorldClock {
    /// Builds a consistent clock from the row. `now` stands in for an
    /// unreadable `as_of`.
    pub fn into_clock(
        self,
        settings: &ClockSettings,
        now: DateTime<Utc>,
    ) -> (WorldClock, Vec<ClockRepair>) {
        let mut repairs = Vec::new();

        let as_of = match parse_instant(&self.as_of) {
            Ok((instant, naive)) => {
                if naive {
                    repairs.push(ClockRepair::NaiveAsOf);
                }
                instant
            }
            Err(_) => {
                repairs.push(ClockRepair::UnreadableAsOf);
                now
            }
        };
        let last_shutdown = match self.last_shutdown.as_deref().map(parse_instant) {
            Some(Ok((instant, naive))) => {
                if naive {
                    repairs.push(ClockRepair::NaiveLastShutdown);
                }
                Some(instant)
            }
            Some(Err(_)) => {
                repairs.push(ClockRepair::UnreadableLastShutdown);
                None
            }
            None => None,
        };

        let day_of_year = match (self.day_of_year, self.day) {
            (Some(d), _) if d > 0 => d,
            (_, Some(legacy)) if legacy > 0 => {
                repairs.push(ClockRepair::DayOfYearFromLegacyDay);
                legacy
            }
            _ => {
                repairs.push(ClockRepair::MissingPosition);
                1
            }
        };
        let (year, hour, minute) = match (self.year, self.hour, self.minute) {
            (Some(y), Some(h), Some(m)) if y > 0 => (y, h, m),
            (y, h, m) => {
                repairs.push(ClockRepair::MissingPosition);
                (y.filter(|y| *y > 0).unwrap_or(1), h.unwrap_or(0), m.unwrap_or(0))
            }
        };
        // Out-of-range values from older configurations are folded back in
        let position = calendar_math::normalize(
            settings,
            CalendarPosition {
                year,
                day_of_year,
                hour,
                minute,
            },
        );

        let config = match self.config {
            Some(config) => config,
            None => {
                repairs.push(ClockRepair::MissingConfig);
                CalendarConfig::default()
            }
        };

        let date = calendar_math::derive(settings, &config, position);
        let stored_derived = (
            self.month,
            self.day,
            self.season,
            self.day_of_week,
            self.is_daytime,
            self.cycle_year,
        );
        let fresh_derived = (
            Some(date.month),
            Some(date.day_of_month),
            Some(date.season),
            Some(date.day_of_week),
            Some(date.is_daytime),
            Some(date.cycle_year),
        );
        if stored_derived != fresh_derived || position.day_of_year != day_of_year {
            repairs.push(ClockRepair::DerivedFieldsRecomputed);
        }
        let partial_minute = self.partial_minute.unwrap_or(0);
        if partial_minute >= PARTIAL_MINUTE_UNITS {
            repairs.push(ClockRepair::DerivedFieldsRecomputed);
        }
        repairs.dedup();

        (
            WorldClock {
                as_of,
                date,
                last_shutdown,
                config,
                partial_minute: partial_minute % PARTIAL_MINUTE_UNITS,
            },
            repairs,
        )
    }
}

/// RFC 3339 with fixed microsecond precision, so stored values sort lexically.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parses a stored instant. Values without an offset are read as UTC and
/// flagged so the caller can rewrite them.
pub fn parse_instant(raw: &str) -> Result<(DateTime<Utc>, bool), DomainError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok((instant.with_timezone(&Utc), false));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok((naive.and_utc(), true));
        }
    }
    Err(DomainError::parse(format!("unreadable timestamp: {}", raw)))
}

/// Serde adapter for optional instants that may have been stored without an offset.
pub mod lenient_utc {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(instant) => serializer.serialize_some(&super::format_instant(*instant)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| {
            super::parse_instant(&s)
                .map(|(instant, _)| instant)
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn time_of_day_follows_night_boundary() {
        assert_eq!(TimeOfDay::from_hour(0, 15), TimeOfDay::Midnight);
        assert_eq!(TimeOfDay::from_hour(4, 15), TimeOfDay::Dawn);
        assert_eq!(TimeOfDay::from_hour(7, 15), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12, 15), TimeOfDay::Noon);
        assert_eq!(TimeOfDay::from_hour(14, 15), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(16, 15), TimeOfDay::Dusk);
        assert_eq!(TimeOfDay::from_hour(16, 18), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(25, 15), TimeOfDay::Night);
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = ClockSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.minutes_per_year(), 30 * 60 * 400);
    }

    #[test]
    fn settings_reject_non_positive_multiplier() {
        let settings = ClockSettings {
            multiplier: 0.0,
            ..ClockSettings::default()
        };
        assert!(settings.validate().is_err());
        let settings = ClockSettings {
            multiplier: f64::NAN,
            ..ClockSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn patch_overrides_only_present_fields() {
        let base = ClockSettings {
            epoch_anchor: Some(t0()),
            ..ClockSettings::default()
        };
        let patch = ClockSettingsPatch {
            multiplier: Some(120.0),
            auto_cleanup_enabled: Some(false),
            ..ClockSettingsPatch::default()
        };

        let patched = patch.apply(&base).unwrap();
        assert_eq!(patched.multiplier, 120.0);
        assert!(!patched.auto_cleanup_enabled);
        assert_eq!(patched.hours_per_day, base.hours_per_day);
        assert_eq!(patched.epoch_anchor, Some(t0()));
        assert!(ClockSettingsPatch::default().is_empty());
    }

    #[test]
    fn patch_is_validated() {
        let patch = ClockSettingsPatch {
            night_start_hour: Some(40),
            ..ClockSettingsPatch::default()
        };
        assert!(patch.apply(&ClockSettings::default()).is_err());
    }

    #[test]
    fn settings_accept_naive_epoch_anchor() {
        let json = r#"{"multiplier":60.0,"hours_per_day":30,"days_per_year":400,
            "day_start_hour":0,"night_start_hour":15,"epoch_anchor":"2025-03-01T12:00:00"}"#;
        let settings: ClockSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.epoch_anchor, Some(t0()));
        assert_eq!(settings.persistence_interval_minutes, 5);
        assert!(settings.auto_cleanup_enabled);
    }

    #[test]
    fn genesis_clock_starts_on_first_spring_morning() {
        let clock = WorldClock::genesis(t0(), &ClockSettings::default(), CalendarConfig::default());
        assert_eq!(clock.year(), 1);
        assert_eq!(clock.day_of_year(), 1);
        assert_eq!(clock.month(), 1);
        assert_eq!(clock.month_name(), Some("Thaw"));
        assert_eq!(clock.season(), Season::Spring);
        assert_eq!(clock.day_of_week(), DayOfWeek::Monday);
        assert_eq!(clock.cycle_year(), 1);
        assert!(clock.is_daytime());
        assert!(clock.last_shutdown().is_none());
    }

    #[test]
    fn stored_clock_roundtrip_needs_no_repair() {
        let settings = ClockSettings::default();
        let clock = WorldClock::genesis(t0(), &settings, CalendarConfig::default());
        let stored = StoredWorldClock::from(&clock);
        let (restored, repairs) = stored.into_clock(&settings, t0());
        assert_eq!(restored, clock);
        assert!(repairs.is_empty(), "{repairs:?}");
    }

    #[test]
    fn legacy_row_is_repaired() {
        let settings = ClockSettings::default();
        let stored = StoredWorldClock {
            as_of: "2025-03-01 12:00:00".into(),
            last_shutdown: Some("2025-03-01T11:00:00".into()),
            year: Some(3),
            day: Some(150),
            hour: Some(20),
            minute: Some(5),
            ..StoredWorldClock::default()
        };
        let (clock, repairs) = stored.into_clock(&settings, t0());

        assert_eq!(clock.as_of(), t0());
        assert_eq!(
            clock.last_shutdown(),
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap())
        );
        assert_eq!(clock.day_of_year(), 150);
        assert_eq!(clock.season(), Season::Summer);
        assert!(!clock.is_daytime());
        assert_eq!(clock.cycle_year(), 3);
        assert!(repairs.contains(&ClockRepair::NaiveAsOf));
        assert!(repairs.contains(&ClockRepair::NaiveLastShutdown));
        assert!(repairs.contains(&ClockRepair::DayOfYearFromLegacyDay));
        assert!(repairs.contains(&ClockRepair::MissingConfig));
        assert!(repairs.contains(&ClockRepair::DerivedFieldsRecomputed));
    }

    #[test]
    fn stale_derived_fields_are_recomputed() {
        let settings = ClockSettings::default();
        let clock = WorldClock::genesis(t0(), &settings, CalendarConfig::default());
        let mut stored = StoredWorldClock::from(&clock);
        stored.season = Some(Season::Winter);
        stored.cycle_year = None;

        let (restored, repairs) = stored.into_clock(&settings, t0());
        assert_eq!(restored.season(), Season::Spring);
        assert_eq!(restored.cycle_year(), 1);
        assert_eq!(repairs, vec![ClockRepair::DerivedFieldsRecomputed]);
    }

    #[test]
    fn unreadable_timestamps_are_replaced() {
        let stored = StoredWorldClock {
            as_of: "yesterday".into(),
            last_shutdown: Some("before lunch".into()),
            year: Some(2),
            day_of_year: Some(40),
            hour: Some(5),
            minute: Some(0),
            ..StoredWorldClock::default()
        };
        let (clock, repairs) = stored.into_clock(&ClockSettings::default(), t0());

        assert_eq!(clock.as_of(), t0());
        assert_eq!(clock.last_shutdown(), None);
        assert_eq!(clock.year(), 2);
        assert_eq!(clock.day_of_year(), 40);
        assert!(repairs.contains(&ClockRepair::UnreadableAsOf));
        assert!(repairs.contains(&ClockRepair::UnreadableLastShutdown));
    }

    #[test]
    fn partial_minute_survives_storage() {
        let settings = ClockSettings {
            multiplier: 0.025,
            ..ClockSettings::default()
        };
        let clock = WorldClock::genesis(t0(), &settings, CalendarConfig::default());
        let clock = calendar_math::advance(&clock, &settings, 1.0, t0()).unwrap();
        assert_eq!(clock.minute(), 1);
        assert_eq!(clock.partial_minute(), PARTIAL_MINUTE_UNITS / 2);

        let (restored, repairs) = StoredWorldClock::from(&clock).into_clock(&settings, t0());
        assert_eq!(restored, clock);
        assert!(repairs.is_empty(), "{repairs:?}");
    }

    #[test]
    fn rows_without_partial_minute_start_at_zero() {
        let json = r#"{"as_of":"2025-03-01T12:00:00Z","year":1,"day_of_year":1,"hour":0,"minute":0}"#;
        let stored: StoredWorldClock = serde_json::from_str(json).unwrap();
        let (clock, _) = stored.into_clock(&ClockSettings::default(), t0());
        assert_eq!(clock.partial_minute(), 0);
    }

    #[test]
    fn formatted_instants_sort_lexically() {
        let a = format_instant(t0());
        let b = format_instant(t0() + chrono::Duration::microseconds(1));
        assert!(a < b);
        assert!(a.ends_with('Z'));
    }
}
