//! Port traits for infrastructure boundaries.
//!
//! Ports exist for:
//! - Database access (SQLite today)
//! - World history, inventory and metrics collaborators
//! - Clock (for testing)

mod error;
mod external;
mod repos;
mod testing;

pub use error::{RepoError, SinkError};
pub use external::{
    CalendarContext, HeldItem, HistoryPort, HistoryRecord, InventoryLookup, MetricsPort,
    TaskStatus,
};
pub use repos::{
    CalendarEventRepo, ClockSettingsRepo, CooldownRepo, WorldClockRepo, WorldEventRepo,
};
pub use testing::ClockPort;

#[cfg(test)]
pub use external::{MockHistoryPort, MockInventoryLookup, MockMetricsPort};
#[cfg(test)]
pub use repos::{
    MockCalendarEventRepo, MockClockSettingsRepo, MockCooldownRepo, MockWorldClockRepo,
    MockWorldEventRepo,
};
