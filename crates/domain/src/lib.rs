//! Chronicle domain: the world calendar, the world clock, world and calendar
//! events, and character cooldowns.
//!
//! Nothing in this crate reads the wall clock; callers pass `now` in.

pub mod calendar_math;
pub mod entities;
pub mod error;
pub mod game_time;
pub mod ids;
pub mod value_objects;

pub use entities::{
    evaluate_all, CalendarEvent, CalendarEventType, CalendarMark, CharacterCooldown,
    ConditionError, ConditionRole, CooldownKey, CooldownKind, EventCondition, EventStatus,
    ImpactLevel, RegionalScope, RegionalVariation, StatusChange, WorldEvent, WorldEventType,
};

pub use error::DomainError;

// Re-export game time types
pub use game_time::{
    format_instant, parse_instant, CalendarDate, CalendarPosition, ClockRepair, ClockSettings,
    ClockSettingsPatch, StoredWorldClock, TimeOfDay, WorldClock,
};

// Re-export ID types
pub use ids::{CalendarEventId, CharacterId, CooldownId, WorldEventId};

pub use value_objects::{
    default_month_table, default_seasonal_day_night, CalendarConfig, DayNightHours, DayOfWeek,
    MonthDefinition, Season, SeasonDays,
};

pub use calendar_math::SeasonStart;
