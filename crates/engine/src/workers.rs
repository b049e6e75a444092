//! Background task runner.
//!
//! Five independently-cadenced loops keep the world moving: clock
//! advancement, world event processing, calendar activation, cooldown cleanup
//! and incremental clock persistence. Each loop runs until its cancellation
//! token fires. A failing or panicking iteration is logged, reported to the
//! metrics sink and retried on the next cadence.

use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chronicle_domain::CalendarEventId;
use futures_util::FutureExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::config::TaskIntervals;
use crate::infrastructure::ports::{MetricsPort, TaskStatus};
use crate::use_cases::calendar::CalendarService;
use crate::use_cases::cooldowns::CooldownTracker;
use crate::use_cases::events::EventScheduler;
use crate::use_cases::world_clock::WorldClockService;

pub const TIME_ADVANCEMENT: &str = "time_advancement";
pub const EVENT_PROCESSING: &str = "event_processing";
pub const CALENDAR_ACTIVATION: &str = "calendar_activation";
pub const CLEANUP: &str = "cleanup";
pub const CLOCK_PERSISTENCE: &str = "game_time_persistence";

#[derive(Default)]
struct RunnerState {
    cancel: Option<CancellationToken>,
    handles: Vec<JoinHandle<()>>,
}

pub struct BackgroundTasks {
    clock_service: Arc<WorldClockService>,
    scheduler: Arc<EventScheduler>,
    calendar: Arc<CalendarService>,
    cooldowns: Arc<CooldownTracker>,
    metrics: Arc<dyn MetricsPort>,
    intervals: TaskIntervals,
    state: Mutex<RunnerState>,
}

impl BackgroundTasks {
    pub fn new(
        clock_service: Arc<WorldClockService>,
        scheduler: Arc<EventScheduler>,
        calendar: Arc<CalendarService>,
        cooldowns: Arc<CooldownTracker>,
        metrics: Arc<dyn MetricsPort>,
        intervals: TaskIntervals,
    ) -> Self {
        Self {
            clock_service,
            scheduler,
            calendar,
            cooldowns,
            metrics,
            intervals,
            state: Mutex::new(RunnerState::default()),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.cancel.is_some()
    }

    /// Spawns every loop. Calling it while the loops run is a no-op.
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if state.cancel.is_some() {
            tracing::warn!("Background tasks already running");
            return;
        }

        tracing::info!("Starting background tasks");
        let cancel = CancellationToken::new();
        let intervals = self.intervals.clone();

        // Advancement waits one cadence first: no real time has passed yet.
        let clock_service = Arc::clone(&self.clock_service);
        let last_tick = Arc::new(Mutex::new(Instant::now()));
        state.handles.push(tokio::spawn(run_every(
            TIME_ADVANCEMENT,
            intervals.advance,
            intervals.advance,
            cancel.clone(),
            Arc::clone(&self.metrics),
            move || {
                let clock_service = Arc::clone(&clock_service);
                let last_tick = Arc::clone(&last_tick);
                async move { advance_since(&clock_service, &last_tick).await }
            },
        )));

        let scheduler = Arc::clone(&self.scheduler);
        state.handles.push(tokio::spawn(run_every(
            EVENT_PROCESSING,
            Duration::ZERO,
            intervals.events,
            cancel.clone(),
            Arc::clone(&self.metrics),
            move || {
                let scheduler = Arc::clone(&scheduler);
                async move {
                    let report = scheduler.process_all().await?;
                    let changed = report.changed().len();
                    if changed > 0 {
                        tracing::info!(changed, "Processed world events");
                    }
                    if !report.failed.is_empty() {
                        return Err(anyhow!(
                            "{} world event transitions could not be saved",
                            report.failed.len()
                        ));
                    }
                    Ok::<_, anyhow::Error>(())
                }
            },
        )));

        let calendar = Arc::clone(&self.calendar);
        let seen: Arc<Mutex<HashSet<CalendarEventId>>> = Arc::default();
        state.handles.push(tokio::spawn(run_every(
            CALENDAR_ACTIVATION,
            Duration::ZERO,
            intervals.calendar,
            cancel.clone(),
            Arc::clone(&self.metrics),
            move || {
                let calendar = Arc::clone(&calendar);
                let seen = Arc::clone(&seen);
                async move {
                    let mut seen = seen.lock().await;
                    let active = calendar.activation_sweep(&seen).await?;
                    *seen = active;
                    Ok::<_, anyhow::Error>(())
                }
            },
        )));

        let clock_service = Arc::clone(&self.clock_service);
        let cooldowns = Arc::clone(&self.cooldowns);
        state.handles.push(tokio::spawn(run_every(
            CLEANUP,
            Duration::ZERO,
            intervals.cleanup,
            cancel.clone(),
            Arc::clone(&self.metrics),
            move || {
                let clock_service = Arc::clone(&clock_service);
                let cooldowns = Arc::clone(&cooldowns);
                async move {
                    if !clock_service.settings().await?.auto_cleanup_enabled {
                        tracing::debug!("Automatic cleanup disabled");
                        return Ok(());
                    }
                    cooldowns.cleanup_all_expired().await?;
                    Ok::<_, anyhow::Error>(())
                }
            },
        )));

        state.handles.push(tokio::spawn(persistence_loop(
            Arc::clone(&self.clock_service),
            intervals.persistence_recheck,
            cancel.clone(),
            Arc::clone(&self.metrics),
        )));

        state.cancel = Some(cancel);
        tracing::info!(tasks = state.handles.len(), "Background tasks started");
    }

    /// Cancels every loop and waits for each to exit.
    pub async fn stop(&self) {
        let (cancel, handles) = {
            let mut state = self.state.lock().await;
            (state.cancel.take(), std::mem::take(&mut state.handles))
        };
        let Some(cancel) = cancel else {
            return;
        };

        tracing::info!("Stopping background tasks");
        cancel.cancel();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Background task ended abnormally");
            }
        }
        tracing::info!("Background tasks stopped");
    }
}

/// Advances the clock by the real time measured since the last successful
/// advance. A failed advance leaves `last_tick` alone, so the next one
/// covers the gap.
async fn advance_since(
    clock_service: &WorldClockService,
    last_tick: &Mutex<Instant>,
) -> anyhow::Result<()> {
    let mut last = last_tick.lock().await;
    let now = Instant::now();
    let real_minutes = now.duration_since(*last).as_secs_f64() / 60.0;
    clock_service.advance(real_minutes).await?;
    *last = now;
    Ok(())
}

/// Runs `iteration` every `interval` until `cancel` fires.
async fn run_every<F, Fut>(
    name: &'static str,
    initial_delay: Duration,
    interval: Duration,
    cancel: CancellationToken,
    metrics: Arc<dyn MetricsPort>,
    mut iteration: F,
) where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    tracing::debug!(task = name, interval_secs = interval.as_secs(), "Background task started");
    let mut wait = initial_delay;
    loop {
        if !wait.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }
        if cancel.is_cancelled() {
            break;
        }

        run_iteration(name, metrics.as_ref(), iteration()).await;
        wait = interval;
    }
    tracing::debug!(task = name, "Background task shutting down");
}

/// Persists the clock at the interval stored in the clock settings.
///
/// The interval is re-read every cycle; 0 disables persistence and the loop
/// re-checks after `recheck`.
async fn persistence_loop(
    clock_service: Arc<WorldClockService>,
    recheck: Duration,
    cancel: CancellationToken,
    metrics: Arc<dyn MetricsPort>,
) {
    tracing::debug!(task = CLOCK_PERSISTENCE, "Background task started");
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let mut wait = recheck;
        let service = Arc::clone(&clock_service);
        run_iteration(CLOCK_PERSISTENCE, metrics.as_ref(), async {
            let minutes = service.settings().await?.persistence_interval_minutes;
            if minutes == 0 {
                tracing::debug!("Incremental clock persistence disabled");
                return Ok(());
            }
            if !service.persist_incremental().await {
                return Err(anyhow!("incremental clock persistence failed"));
            }
            wait = Duration::from_secs(u64::from(minutes) * 60);
            Ok::<_, anyhow::Error>(())
        })
        .await;

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }
    tracing::debug!(task = CLOCK_PERSISTENCE, "Background task shutting down");
}

/// Runs one iteration, catching errors and panics, and reports it to the
/// metrics sink. Returns whether the iteration succeeded.
async fn run_iteration<Fut>(name: &str, metrics: &dyn MetricsPort, iteration: Fut) -> bool
where
    Fut: Future<Output = anyhow::Result<()>>,
{
    let started = Instant::now();
    let status = match AssertUnwindSafe(iteration).catch_unwind().await {
        Ok(Ok(())) => TaskStatus::Success,
        Ok(Err(e)) => {
            tracing::error!(task = name, error = %format!("{e:#}"), "Background task iteration failed");
            TaskStatus::Failure
        }
        Err(panic) => {
            tracing::error!(
                task = name,
                panic = %panic_message(panic.as_ref()),
                "Background task iteration panicked"
            );
            TaskStatus::Failure
        }
    };

    if let Err(e) = metrics
        .record_periodic_task(name, started.elapsed(), status)
        .await
    {
        tracing::warn!(task = name, error = %e, "Failed to record task metrics");
    }
    status == TaskStatus::Success
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chronicle_domain::ClockSettings;

    use super::*;
    use crate::infrastructure::ports::{
        MockCalendarEventRepo, MockCooldownRepo, MockHistoryPort, MockInventoryLookup,
        MockMetricsPort, MockWorldEventRepo, SinkError,
    };
    use crate::use_cases::test_support::{
        clock_service_at, fixed_clock, flaky_clock_service, position, stored_at, t0, ClockRows,
    };

    fn rows_at_day_ten(persistence_interval_minutes: u32) -> ClockRows {
        let settings = ClockSettings {
            epoch_anchor: Some(t0()),
            persistence_interval_minutes,
            ..ClockSettings::default()
        };
        ClockRows::new(
            Some(stored_at(position(1, 10, 0, 0), t0(), &settings)),
            Some(settings),
        )
    }

    #[derive(Default)]
    struct RecordingMetrics {
        runs: std::sync::Mutex<Vec<(String, TaskStatus)>>,
    }

    impl RecordingMetrics {
        fn count(&self, name: &str, status: TaskStatus) -> usize {
            self.runs
                .lock()
                .unwrap()
                .iter()
                .filter(|(n, s)| n == name && *s == status)
                .count()
        }
    }

    #[async_trait::async_trait]
    impl MetricsPort for RecordingMetrics {
        async fn record_periodic_task(
            &self,
            name: &str,
            _duration: Duration,
            status: TaskStatus,
        ) -> Result<(), SinkError> {
            self.runs.lock().unwrap().push((name.to_string(), status));
            Ok(())
        }
    }

    fn tasks(metrics: Arc<RecordingMetrics>) -> (BackgroundTasks, ClockRows) {
        let (clock_service, rows) = clock_service_at(position(1, 10, 0, 0), t0());

        let mut events = MockWorldEventRepo::new();
        events.expect_list_by_status().returning(|_| Ok(vec![]));
        let scheduler = EventScheduler::new(
            Arc::new(events),
            Arc::clone(&clock_service),
            Arc::new(MockHistoryPort::new()),
            fixed_clock(t0()),
        );

        let mut calendar_events = MockCalendarEventRepo::new();
        calendar_events.expect_list_all().returning(|| Ok(vec![]));
        let calendar = CalendarService::new(
            Arc::new(calendar_events),
            Arc::clone(&clock_service),
            Arc::new(MockHistoryPort::new()),
        );

        let mut cooldown_repo = MockCooldownRepo::new();
        cooldown_repo.expect_delete_expired().returning(|_, _| Ok(0));
        let cooldowns = CooldownTracker::new(
            Arc::new(cooldown_repo),
            Arc::clone(&clock_service),
            Arc::new(MockInventoryLookup::new()),
            fixed_clock(t0()),
        );

        let runner = BackgroundTasks::new(
            clock_service,
            Arc::new(scheduler),
            Arc::new(calendar),
            Arc::new(cooldowns),
            metrics,
            TaskIntervals::default(),
        );
        (runner, rows)
    }

    #[tokio::test(start_paused = true)]
    async fn loops_run_on_their_cadence_until_stopped() {
        let metrics = Arc::new(RecordingMetrics::default());
        let (runner, rows) = tasks(Arc::clone(&metrics));
        let before = rows.stored_clock().expect("clock row");

        runner.start().await;
        assert!(runner.is_running().await);
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(metrics.count(TIME_ADVANCEMENT, TaskStatus::Success), 1);
        assert_eq!(metrics.count(EVENT_PROCESSING, TaskStatus::Success), 1);
        assert_eq!(metrics.count(CALENDAR_ACTIVATION, TaskStatus::Success), 1);
        assert_eq!(metrics.count(CLEANUP, TaskStatus::Success), 1);
        assert_eq!(metrics.count(CLOCK_PERSISTENCE, TaskStatus::Success), 1);
        assert_ne!(rows.stored_clock().expect("clock row"), before);

        runner.stop().await;
        assert!(!runner.is_running().await);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(metrics.count(TIME_ADVANCEMENT, TaskStatus::Success), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let metrics = Arc::new(RecordingMetrics::default());
        let (runner, _rows) = tasks(metrics);

        runner.start().await;
        runner.start().await;
        assert_eq!(runner.state.lock().await.handles.len(), 5);

        runner.stop().await;
        runner.stop().await;
        assert!(!runner.is_running().await);
    }

    fn explode() -> anyhow::Result<()> {
        panic!("iteration exploded")
    }

    #[tokio::test]
    async fn panicking_iteration_is_reported_as_failure() {
        let mut metrics = MockMetricsPort::new();
        metrics
            .expect_record_periodic_task()
            .withf(|name, _, status| name == "boom" && *status == TaskStatus::Failure)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let ok = run_iteration("boom", &metrics, async { explode() }).await;

        assert!(!ok);
    }

    #[tokio::test]
    async fn metrics_failure_does_not_fail_iteration() {
        let mut metrics = MockMetricsPort::new();
        metrics
            .expect_record_periodic_task()
            .returning(|_, _, _| Err(SinkError::Unavailable("metrics down".to_string())));

        assert!(run_iteration("quiet", &metrics, async { Ok::<(), anyhow::Error>(()) }).await);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_iteration_keeps_loop_alive() {
        let metrics = Arc::new(RecordingMetrics::default());
        let attempts = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let counter = Arc::clone(&attempts);
        let handle = tokio::spawn(run_every(
            "flaky",
            Duration::ZERO,
            Duration::from_secs(10),
            cancel.clone(),
            Arc::clone(&metrics) as Arc<dyn MetricsPort>,
            move || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(anyhow!("first attempt fails"))
                    } else {
                        Ok(())
                    }
                }
            },
        ));

        tokio::time::sleep(Duration::from_secs(25)).await;
        cancel.cancel();
        handle.await.expect("loop exits cleanly");

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.count("flaky", TaskStatus::Failure), 1);
        assert_eq!(metrics.count("flaky", TaskStatus::Success), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_persistence_rechecks_without_saving() {
        let metrics = Arc::new(RecordingMetrics::default());
        let (clock_service, rows) = clock_service_at(position(1, 10, 0, 0), t0());
        let mut settings = rows.stored_settings().expect("settings row");
        settings.persistence_interval_minutes = 0;
        *rows.settings.lock().unwrap() = Some(settings);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(persistence_loop(
            clock_service,
            Duration::from_secs(300),
            cancel.clone(),
            Arc::clone(&metrics) as Arc<dyn MetricsPort>,
        ));

        tokio::time::sleep(Duration::from_secs(301)).await;
        cancel.cancel();
        handle.await.expect("loop exits cleanly");

        assert_eq!(metrics.count(CLOCK_PERSISTENCE, TaskStatus::Success), 2);
        assert_eq!(rows.clock_save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn advancement_uses_measured_elapsed_time() {
        let rows = rows_at_day_ten(5);
        let service = flaky_clock_service(&rows, fixed_clock(t0()), 1);
        let last_tick = Mutex::new(Instant::now());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(advance_since(&service, &last_tick).await.is_err());
        assert_eq!(rows.stored_clock().and_then(|c| c.day_of_year), Some(10));

        // the retry covers the failed tick as well: 60 real seconds, two game days
        tokio::time::sleep(Duration::from_secs(30)).await;
        advance_since(&service, &last_tick).await.expect("advance");
        assert_eq!(rows.stored_clock().and_then(|c| c.day_of_year), Some(12));

        tokio::time::sleep(Duration::from_secs(15)).await;
        advance_since(&service, &last_tick).await.expect("advance");
        let stored = rows.stored_clock().expect("clock row");
        assert_eq!((stored.day_of_year, stored.hour), (Some(12), Some(15)));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_persist_rechecks_before_full_interval() {
        let metrics = Arc::new(RecordingMetrics::default());
        let rows = rows_at_day_ten(5);
        let service = flaky_clock_service(&rows, fixed_clock(t0()), 1);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(persistence_loop(
            service,
            Duration::from_secs(30),
            cancel.clone(),
            Arc::clone(&metrics) as Arc<dyn MetricsPort>,
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(metrics.count(CLOCK_PERSISTENCE, TaskStatus::Failure), 1);
        assert_eq!(rows.clock_save_count(), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(metrics.count(CLOCK_PERSISTENCE, TaskStatus::Success), 1);
        assert_eq!(rows.clock_save_count(), 1);

        // after a success the configured five minutes apply again
        tokio::time::sleep(Duration::from_secs(240)).await;
        assert_eq!(metrics.count(CLOCK_PERSISTENCE, TaskStatus::Success), 1);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(metrics.count(CLOCK_PERSISTENCE, TaskStatus::Success), 2);

        cancel.cancel();
        handle.await.expect("loop exits cleanly");
    }
}
