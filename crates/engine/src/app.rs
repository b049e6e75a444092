//! Application composition - wires the SQLite adapters into the services.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::infrastructure::config::TaskIntervals;
use crate::infrastructure::metrics::TracingMetrics;
use crate::infrastructure::ports::{ClockPort, HistoryPort, MetricsPort};
use crate::infrastructure::sqlite::{
    SqliteCalendarEventRepo, SqliteClockSettingsRepo, SqliteCooldownRepo, SqliteInventoryLookup,
    SqliteWorldClockRepo, SqliteWorldEventRepo, SqliteWorldHistory,
};
use crate::use_cases::{CalendarService, CooldownTracker, EventScheduler, WorldClockService};
use crate::workers::BackgroundTasks;

/// Every service the engine runs, sharing one world clock.
pub struct App {
    pub clock_service: Arc<WorldClockService>,
    pub scheduler: Arc<EventScheduler>,
    pub calendar: Arc<CalendarService>,
    pub cooldowns: Arc<CooldownTracker>,
    pub tasks: Arc<BackgroundTasks>,
}

impl App {
    pub fn new(pool: SqlitePool, clock: Arc<dyn ClockPort>, intervals: TaskIntervals) -> Self {
        let clock_service = Arc::new(WorldClockService::new(
            Arc::new(SqliteWorldClockRepo::new(pool.clone(), Arc::clone(&clock))),
            Arc::new(SqliteClockSettingsRepo::new(pool.clone(), Arc::clone(&clock))),
            Arc::clone(&clock),
        ));

        let history: Arc<dyn HistoryPort> =
            Arc::new(SqliteWorldHistory::new(pool.clone(), Arc::clone(&clock)));

        let scheduler = Arc::new(EventScheduler::new(
            Arc::new(SqliteWorldEventRepo::new(pool.clone())),
            Arc::clone(&clock_service),
            Arc::clone(&history),
            Arc::clone(&clock),
        ));

        let calendar = Arc::new(CalendarService::new(
            Arc::new(SqliteCalendarEventRepo::new(pool.clone())),
            Arc::clone(&clock_service),
            history,
        ));

        let cooldowns = Arc::new(CooldownTracker::new(
            Arc::new(SqliteCooldownRepo::new(pool.clone())),
            Arc::clone(&clock_service),
            Arc::new(SqliteInventoryLookup::new(pool)),
            clock,
        ));

        let metrics: Arc<dyn MetricsPort> = Arc::new(TracingMetrics::new());
        let tasks = Arc::new(BackgroundTasks::new(
            Arc::clone(&clock_service),
            Arc::clone(&scheduler),
            Arc::clone(&calendar),
            Arc::clone(&cooldowns),
            metrics,
            intervals,
        ));

        Self {
            clock_service,
            scheduler,
            calendar,
            cooldowns,
            tasks,
        }
    }
}
