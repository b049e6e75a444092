//! Use cases - world time orchestration.
//!
//! Each module owns one service. All of them read the world's time through
//! the shared [`WorldClockService`].

pub mod calendar;
pub mod cooldowns;
pub mod events;
pub mod world_clock;

#[cfg(test)]
pub(crate) mod test_support;

pub use calendar::{CalendarError, CalendarService};
pub use cooldowns::{CooldownError, CooldownTracker};
pub use events::{EventScheduler, ProcessReport, SchedulerError};
pub use world_clock::{ClockError, ClockSnapshot, WorldClockService};
