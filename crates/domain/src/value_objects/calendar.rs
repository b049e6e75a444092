//! Calendar system value objects
//!
//! The world runs on its own calendar: a fixed number of hours per day and days
//! per year, four seasons of configurable length, and an ordered month table.
//!
//! Key types:
//! - `Season` / `DayOfWeek` - Labels derived from the day-of-year and elapsed days
//! - `MonthDefinition` - One entry of the ordered month table
//! - `SeasonDays` - Season lengths, looked up through cumulative thresholds
//! - `DayNightHours` - Day/night boundary hours, configured per season
//! - `CalendarConfig` - Everything above, stored alongside the world clock

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

// ============================================================================
// Season
// ============================================================================

/// The four seasons of the year, in calendar order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    /// Returns all seasons in calendar order.
    pub fn all() -> [Season; 4] {
        [Season::Spring, Season::Summer, Season::Fall, Season::Winter]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
            Season::Winter => "Winter",
        }
    }

    /// Storage key, e.g. `"SPRING"`.
    pub fn as_key(&self) -> &'static str {
        match self {
            Season::Spring => "SPRING",
            Season::Summer => "SUMMER",
            Season::Fall => "FALL",
            Season::Winter => "WINTER",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Season {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SPRING" => Ok(Season::Spring),
            "SUMMER" => Ok(Season::Summer),
            "FALL" | "AUTUMN" => Ok(Season::Fall),
            "WINTER" => Ok(Season::Winter),
            _ => Err(DomainError::parse(format!("Unknown season: {}", s))),
        }
    }
}

// ============================================================================
// Day of Week
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    const CYCLE: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    /// Day of the week for a count of whole days since the epoch.
    /// Day 0 is a Monday; negative counts wrap backwards.
    pub fn from_elapsed_days(days: i64) -> Self {
        // rem_euclid keeps the index in 0..7 for negative inputs
        Self::CYCLE[days.rem_euclid(7) as usize]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Month Definition
// ============================================================================

/// A single month in the ordered month table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthDefinition {
    pub name: String,
    pub days: u32,
    /// Season the month mostly falls in (display only; seasons come from `SeasonDays`)
    pub season: Season,
}

impl MonthDefinition {
    pub fn new(name: impl Into<String>, days: u32, season: Season) -> Self {
        Self {
            name: name.into(),
            days,
            season,
        }
    }
}

/// The world's seeded month table: five months per season whose lengths sum
/// to one hundred days.
pub fn default_month_table() -> Vec<MonthDefinition> {
    const LENGTHS: [u32; 5] = [18, 18, 27, 19, 18];
    const NAMES: [(Season, [&str; 5]); 4] = [
        (
            Season::Spring,
            ["Thaw", "Bloom", "Verdant Peak", "Radiance", "Growth"],
        ),
        (
            Season::Summer,
            ["Solstice", "Heat", "Inferno Peak", "Ember", "Flame"],
        ),
        (
            Season::Fall,
            ["Harvest", "Crimson", "Fulcrum Peak", "Dusk", "Frost"],
        ),
        (
            Season::Winter,
            ["Ice", "Deep", "Gloom Peak", "Stir", "Awakening"],
        ),
    ];

    NAMES
        .iter()
        .flat_map(|(season, names)| {
            names
                .iter()
                .zip(LENGTHS)
                .map(move |(name, days)| MonthDefinition::new(*name, days, *season))
        })
        .collect()
}

// ============================================================================
// Season lengths
// ============================================================================

/// Length in days of each season
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonDays {
    pub spring: u32,
    pub summer: u32,
    pub fall: u32,
    pub winter: u32,
}

impl Default for SeasonDays {
    fn default() -> Self {
        Self {
            spring: 100,
            summer: 100,
            fall: 100,
            winter: 100,
        }
    }
}

impl SeasonDays {
    pub fn length(&self, season: Season) -> u32 {
        match season {
            Season::Spring => self.spring,
            Season::Summer => self.summer,
            Season::Fall => self.fall,
            Season::Winter => self.winter,
        }
    }

    pub fn total(&self) -> u32 {
        self.spring + self.summer + self.fall + self.winter
    }

    /// Season containing a 1-based day-of-year.
    ///
    /// Days past the last cumulative threshold belong to winter.
    pub fn season_for_day(&self, day_of_year: u32) -> Season {
        let mut threshold = 0;
        for season in Season::all() {
            threshold += self.length(season);
            if day_of_year <= threshold {
                return season;
            }
        }
        Season::Winter
    }

    /// First day-of-year (1-based) of a season.
    pub fn start_day(&self, season: Season) -> u32 {
        Season::all()
            .into_iter()
            .take_while(|s| *s != season)
            .map(|s| self.length(s))
            .sum::<u32>()
            + 1
    }
}

// ============================================================================
// Day / night boundaries
// ============================================================================

/// Hours bounding daylight: `day_start <= hour < night_start` is day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayNightHours {
    pub day_start: u32,
    pub night_start: u32,
}

impl DayNightHours {
    pub const fn new(day_start: u32, night_start: u32) -> Self {
        Self {
            day_start,
            night_start,
        }
    }

    pub fn is_daytime(&self, hour: u32) -> bool {
        self.day_start <= hour && hour < self.night_start
    }
}

/// Default per-season daylight hours. Seasons missing from a configured map
/// fall back to the clock settings' default boundaries.
pub fn default_seasonal_day_night() -> BTreeMap<Season, DayNightHours> {
    BTreeMap::from([
        (Season::Spring, DayNightHours::new(0, 15)),
        (Season::Summer, DayNightHours::new(0, 18)),
        (Season::Fall, DayNightHours::new(0, 15)),
        (Season::Winter, DayNightHours::new(0, 12)),
    ])
}

// ============================================================================
// Calendar configuration
// ============================================================================

/// Calendar layout stored with the world clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub months_per_year: u32,
    /// Month length used when no month table is configured
    pub days_per_month: u32,
    pub season_days: SeasonDays,
    #[serde(default)]
    pub seasonal_day_night: BTreeMap<Season, DayNightHours>,
    /// Ordered month table; empty means uniform `days_per_month` months
    #[serde(default)]
    pub months: Vec<MonthDefinition>,
    /// Labels for cycle-years 1..=12, e.g. animal names
    #[serde(default)]
    pub cycle_names: Vec<String>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            months_per_year: 20,
            days_per_month: 20,
            season_days: SeasonDays::default(),
            seasonal_day_night: default_seasonal_day_night(),
            months: default_month_table(),
            cycle_names: Vec::new(),
        }
    }
}

impl CalendarConfig {
    /// Day/night boundaries for a season, or `fallback` when the season has no entry.
    pub fn day_night_for(&self, season: Season, fallback: DayNightHours) -> DayNightHours {
        self.seasonal_day_night
            .get(&season)
            .copied()
            .unwrap_or(fallback)
    }

    /// Checks the configuration against the clock's hours/day and days/year.
    pub fn validate(&self, hours_per_day: u32, days_per_year: u32) -> Result<(), DomainError> {
        if self.months_per_year == 0 || self.days_per_month == 0 {
            return Err(DomainError::validation(
                "months_per_year and days_per_month must be positive",
            ));
        }
        if self.season_days.total() == 0 {
            return Err(DomainError::validation("season lengths cannot all be zero"));
        }
        if self.months.iter().any(|m| m.days == 0) {
            return Err(DomainError::validation("month table entries need at least one day"));
        }
        for (season, hours) in &self.seasonal_day_night {
            if hours.day_start > hours.night_start || hours.night_start > hours_per_day {
                return Err(DomainError::validation(format!(
                    "{} day/night hours {}..{} do not fit a {}-hour day",
                    season, hours.day_start, hours.night_start, hours_per_day
                )));
            }
        }
        if days_per_year == 0 {
            return Err(DomainError::validation("days_per_year must be positive"));
        }
        Ok(())
    }

    /// Label for a cycle-year, if cycle names are configured.
    pub fn cycle_name(&self, cycle_year: u32) -> Option<&str> {
        let index = cycle_year.checked_sub(1)? as usize;
        self.cycle_names.get(index).map(String::as_str)
    }
}
