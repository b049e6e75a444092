//! Conversions between real elapsed time and world calendar coordinates.
//!
//! Everything here is pure: the caller supplies the clock settings, the
//! calendar configuration and, where needed, the current instant.
//!
//! Positions are carried as a count of game-minutes since year 1, day 1, 00:00
//! and split back out by fixed radix (60 minutes, `hours_per_day` hours,
//! `days_per_year` days).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::game_time::{
    CalendarDate, CalendarPosition, ClockSettings, WorldClock, PARTIAL_MINUTE_UNITS,
};
use crate::value_objects::{CalendarConfig, DayOfWeek, Season};

const MICROS_PER_MINUTE: f64 = 60_000_000.0;

/// Length of the named-year cycle.
pub const CYCLE_LENGTH: u32 = 12;

/// Position of a year within the 12-year cycle, 1..=12.
pub fn cycle_year(year: u32) -> u32 {
    (year.saturating_sub(1) % CYCLE_LENGTH) + 1
}

/// Game-minutes elapsed between the epoch and `position`.
pub fn elapsed_game_minutes(settings: &ClockSettings, position: CalendarPosition) -> u64 {
    let years = u64::from(position.year.saturating_sub(1));
    let days = u64::from(position.day_of_year.saturating_sub(1));
    years * settings.minutes_per_year()
        + days * settings.minutes_per_day()
        + u64::from(position.hour) * 60
        + u64::from(position.minute)
}

/// Inverse of [`elapsed_game_minutes`].
pub fn position_at(settings: &ClockSettings, game_minutes: u64) -> CalendarPosition {
    let minute = (game_minutes % 60) as u32;
    let total_hours = game_minutes / 60;
    let hour = (total_hours % u64::from(settings.hours_per_day)) as u32;
    let total_days = total_hours / u64::from(settings.hours_per_day);
    let day_of_year = (total_days % u64::from(settings.days_per_year)) as u32 + 1;
    let year = u32::try_from(total_days / u64::from(settings.days_per_year) + 1).unwrap_or(u32::MAX);
    CalendarPosition {
        year,
        day_of_year,
        hour,
        minute,
    }
}

/// Folds out-of-range components (e.g. an hour past the end of the day)
/// into the next larger unit.
pub fn normalize(settings: &ClockSettings, position: CalendarPosition) -> CalendarPosition {
    position_at(settings, elapsed_game_minutes(settings, position))
}

/// Month number (1-based) and day within that month for a day-of-year.
///
/// With a month table, months are looked up by cumulative length and the last
/// month absorbs any days the table does not cover. Without one, months are
/// `days_per_month` long and the last of `months_per_year` months absorbs the
/// remainder.
pub fn month_and_day(config: &CalendarConfig, day_of_year: u32) -> (u32, u32) {
    if !config.months.is_empty() {
        let mut start = 0;
        for (index, month) in config.months.iter().enumerate() {
            if day_of_year <= start + month.days {
                return (index as u32 + 1, day_of_year - start);
            }
            start += month.days;
        }
        let last = config.months.len() as u32;
        let before_last: u32 = config.months[..config.months.len() - 1]
            .iter()
            .map(|m| m.days)
            .sum();
        return (last, day_of_year - before_last);
    }

    let per_month = config.days_per_month.max(1);
    let months = config.months_per_year.max(1);
    let month = (day_of_year.saturating_sub(1) / per_month) + 1;
    if month > months {
        (months, day_of_year - (months - 1) * per_month)
    } else {
        (month, (day_of_year.saturating_sub(1) % per_month) + 1)
    }
}

/// Computes every derived field for a position.
pub fn derive(
    settings: &ClockSettings,
    config: &CalendarConfig,
    position: CalendarPosition,
) -> CalendarDate {
    let season = config.season_days.season_for_day(position.day_of_year);
    let day_night = config.day_night_for(season, settings.default_day_night());
    let (month, day_of_month) = month_and_day(config, position.day_of_year);
    let elapsed_days = i64::from(position.year.saturating_sub(1)) * i64::from(settings.days_per_year)
        + i64::from(position.day_of_year.saturating_sub(1));

    CalendarDate {
        year: position.year,
        day_of_year: position.day_of_year,
        month,
        day_of_month,
        hour: position.hour,
        minute: position.minute,
        season,
        day_of_week: DayOfWeek::from_elapsed_days(elapsed_days),
        is_daytime: day_night.is_daytime(position.hour),
        cycle_year: cycle_year(position.year),
    }
}

// Absorbs float error so an instant produced by `real_offset` maps back onto
// the position it came from.
const GAME_MINUTE_TOLERANCE: f64 = 1e-6;

fn game_minutes_for(settings: &ClockSettings, real_minutes: f64) -> u64 {
    // float-to-int `as` saturates
    (real_minutes * settings.multiplier * 60.0 + GAME_MINUTE_TOLERANCE).floor() as u64
}

/// Game time for `real_minutes`, in millionths of a game-minute.
fn partial_minutes_for(settings: &ClockSettings, real_minutes: f64) -> u64 {
    (real_minutes * settings.multiplier * 60.0 * f64::from(PARTIAL_MINUTE_UNITS)).round() as u64
}

/// Moves the clock forward by `real_minutes` of real time and stamps it as of `now`.
///
/// Game time below a whole minute is kept on the clock and counted towards
/// the next advance, so many short advances add up to one long one.
pub fn advance(
    clock: &WorldClock,
    settings: &ClockSettings,
    real_minutes: f64,
    now: DateTime<Utc>,
) -> Result<WorldClock, DomainError> {
    if !real_minutes.is_finite() || real_minutes < 0.0 {
        return Err(DomainError::validation(format!(
            "cannot advance the clock by {} real minutes",
            real_minutes
        )));
    }
    let earned = partial_minutes_for(settings, real_minutes)
        .saturating_add(u64::from(clock.partial_minute()));
    let units = u64::from(PARTIAL_MINUTE_UNITS);
    let start = elapsed_game_minutes(settings, clock.position());
    let target = start.saturating_add(earned / units);
    let mut advanced = clock.moved_to(
        position_at(settings, target),
        (earned % units) as u32,
        settings,
    );
    advanced.touch(now);
    Ok(advanced)
}

/// Re-expresses a clock under new settings, keeping the game time elapsed
/// since the epoch.
pub fn carry_over(clock: &WorldClock, from: &ClockSettings, to: &ClockSettings) -> WorldClock {
    let elapsed = elapsed_game_minutes(from, clock.position());
    clock.moved_to(position_at(to, elapsed), clock.partial_minute(), to)
}

/// Calendar coordinates of a real instant, measured from the epoch anchor.
///
/// Instants before the anchor map to the epoch itself.
pub fn real_to_calendar(
    settings: &ClockSettings,
    config: &CalendarConfig,
    epoch_anchor: DateTime<Utc>,
    instant: DateTime<Utc>,
) -> CalendarDate {
    let micros = (instant - epoch_anchor)
        .num_microseconds()
        .unwrap_or(i64::MAX)
        .max(0);
    let real_minutes = micros as f64 / MICROS_PER_MINUTE;
    derive(
        settings,
        config,
        position_at(settings, game_minutes_for(settings, real_minutes)),
    )
}

/// Real instant at which the world reaches the given coordinates.
pub fn calendar_to_real(
    settings: &ClockSettings,
    epoch_anchor: DateTime<Utc>,
    position: CalendarPosition,
) -> Result<DateTime<Utc>, DomainError> {
    if position.year == 0
        || position.day_of_year == 0
        || position.day_of_year > settings.days_per_year
        || position.hour >= settings.hours_per_day
        || position.minute >= 60
    {
        return Err(DomainError::validation(format!(
            "year {} day {} {:02}:{:02} is not a valid calendar position",
            position.year, position.day_of_year, position.hour, position.minute
        )));
    }
    epoch_anchor
        .checked_add_signed(real_offset(settings, position)?)
        .ok_or_else(|| DomainError::validation("calendar position is too far past the epoch"))
}

/// Real time the world needs to get from the epoch to `position`.
pub fn real_offset(
    settings: &ClockSettings,
    position: CalendarPosition,
) -> Result<Duration, DomainError> {
    let game_minutes = elapsed_game_minutes(settings, position) as f64;
    // rounding up keeps the instant inside the position's minute
    let real_micros = (game_minutes / (settings.multiplier * 60.0) * MICROS_PER_MINUTE).ceil();
    if real_micros > i64::MAX as f64 {
        return Err(DomainError::validation(
            "calendar position is too far past the epoch",
        ));
    }
    Ok(Duration::microseconds(real_micros as i64))
}

/// The epoch anchor implied by a clock: the instant from which the clock's
/// position would have been reached at the current multiplier.
pub fn implied_epoch(clock: &WorldClock, settings: &ClockSettings) -> Result<DateTime<Utc>, DomainError> {
    clock
        .as_of()
        .checked_sub_signed(real_offset(settings, clock.position())?)
        .ok_or_else(|| DomainError::validation("clock position is too far past the epoch"))
}

/// When a season most recently began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonStart {
    /// Year 0 means the season has not started since the epoch.
    pub year: u32,
    pub day_of_year: u32,
    pub hour: u32,
}

/// The most recent start of `season` relative to `current`: this year if its
/// first day has been reached, otherwise last year.
pub fn season_start(config: &CalendarConfig, current: &CalendarDate, season: Season) -> SeasonStart {
    let start_day = config.season_days.start_day(season);
    let year = if current.day_of_year >= start_day {
        current.year
    } else {
        current.year.saturating_sub(1)
    };
    SeasonStart {
        year,
        day_of_year: start_day,
        hour: 0,
    }
}
