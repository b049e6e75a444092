mod calendar;

pub use calendar::{
    default_month_table, default_seasonal_day_night, CalendarConfig, DayNightHours, DayOfWeek,
    MonthDefinition, Season, SeasonDays,
};
