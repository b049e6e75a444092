//! World clock use cases.
//!
//! Owns the singleton world clock: startup repair, advancement, restart
//! fast-forward, persistence and read-only calendar queries.
//!
//! Every operation loads the clock from storage, so there is no cached copy
//! to drift from the stored row. Read-modify-write sequences are serialized
//! by an async mutex; this service is the only writer of the clock row.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use chronicle_domain::calendar_math;
use chronicle_domain::{
    CalendarConfig, CalendarDate, CalendarPosition, ClockRepair, ClockSettings,
    ClockSettingsPatch, DomainError, Season, SeasonStart, StoredWorldClock, TimeOfDay, WorldClock,
};

use crate::infrastructure::ports::{ClockPort, ClockSettingsRepo, RepoError, WorldClockRepo};

#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Settings and clock read together.
#[derive(Debug, Clone)]
pub struct ClockSnapshot {
    pub settings: ClockSettings,
    pub clock: WorldClock,
}

impl ClockSnapshot {
    /// Epoch anchor, falling back to the one implied by the clock itself.
    pub fn epoch_anchor(&self) -> Result<DateTime<Utc>, DomainError> {
        match self.settings.epoch_anchor {
            Some(anchor) => Ok(anchor),
            None => calendar_math::implied_epoch(&self.clock, &self.settings),
        }
    }
}

pub struct WorldClockService {
    clock_repo: Arc<dyn WorldClockRepo>,
    settings_repo: Arc<dyn ClockSettingsRepo>,
    clock: Arc<dyn ClockPort>,
    lock: Mutex<()>,
}

impl WorldClockService {
    pub fn new(
        clock_repo: Arc<dyn WorldClockRepo>,
        settings_repo: Arc<dyn ClockSettingsRepo>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            clock_repo,
            settings_repo,
            clock,
            lock: Mutex::new(()),
        }
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Startup normalization pass.
    ///
    /// Creates settings and clock when absent, applies operator overrides,
    /// fills a missing epoch anchor, repairs rows left by older versions and
    /// writes the result back.
    pub async fn initialize(&self, overrides: &ClockSettingsPatch) -> Result<WorldClock, ClockError> {
        let _guard = self.lock.lock().await;

        let mut settings = overrides.apply(&self.load_settings().await?)?;
        if !overrides.is_empty() {
            tracing::info!(?overrides, "Applied clock setting overrides");
        }

        let clock = self.load_clock(&settings).await?;

        if settings.epoch_anchor.is_none() {
            let anchor = calendar_math::implied_epoch(&clock, &settings)?;
            tracing::info!(epoch_anchor = %anchor, "Filled missing epoch anchor");
            settings.epoch_anchor = Some(anchor);
        }
        // Written unconditionally so naive anchors are rewritten with an offset
        self.settings_repo.save(&settings).await?;

        tracing::info!(
            year = clock.year(),
            day_of_year = clock.day_of_year(),
            hour = clock.hour(),
            minute = clock.minute(),
            season = %clock.season(),
            "World clock initialized"
        );
        Ok(clock)
    }

    /// Advances by the real time elapsed since the recorded shutdown, once.
    ///
    /// Returns the real minutes applied, or `None` when no shutdown was
    /// recorded. The shutdown marker is always cleared, so calling this again
    /// does nothing.
    pub async fn fast_forward_on_restart(&self) -> Result<Option<f64>, ClockError> {
        let _guard = self.lock.lock().await;
        let settings = self.load_settings().await?;
        let mut clock = self.load_clock(&settings).await?;

        let Some(shutdown) = clock.last_shutdown() else {
            return Ok(None);
        };

        let now = self.clock.now();
        let elapsed_minutes = real_minutes_between(shutdown, now);
        if elapsed_minutes > 0.0 {
            clock = calendar_math::advance(&clock, &settings, elapsed_minutes, now)?;
            tracing::info!(
                real_minutes = elapsed_minutes,
                year = clock.year(),
                day_of_year = clock.day_of_year(),
                hour = clock.hour(),
                "Fast-forwarded world clock over downtime"
            );
        } else {
            tracing::warn!(%shutdown, %now, "Recorded shutdown is not in the past, skipping fast-forward");
        }

        clock.clear_shutdown();
        self.clock_repo.save(&StoredWorldClock::from(&clock)).await?;
        Ok(Some(elapsed_minutes.max(0.0)))
    }

    // =========================================================================
    // Advancement
    // =========================================================================

    /// Moves the world forward by `real_minutes` of real time and persists it.
    ///
    /// Not idempotent: every call advances.
    pub async fn advance(&self, real_minutes: f64) -> Result<WorldClock, ClockError> {
        let _guard = self.lock.lock().await;
        let settings = self.load_settings().await?;
        let clock = self.load_clock(&settings).await?;

        let advanced = calendar_math::advance(&clock, &settings, real_minutes, self.clock.now())?;
        self.clock_repo.save(&StoredWorldClock::from(&advanced)).await?;

        if advanced.season() != clock.season() {
            tracing::info!(from = %clock.season(), to = %advanced.season(), "Season changed");
        }
        if advanced.year() != clock.year() {
            tracing::info!(year = advanced.year(), "New year began");
        }
        tracing::debug!(
            real_minutes,
            year = advanced.year(),
            day_of_year = advanced.day_of_year(),
            hour = advanced.hour(),
            minute = advanced.minute(),
            "World clock advanced"
        );
        Ok(advanced)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Stamps the clock as current without touching the shutdown marker.
    ///
    /// Failures are logged and reported as `false`; the next successful write
    /// supersedes a missed one.
    pub async fn persist_incremental(&self) -> bool {
        let result = async {
            let _guard = self.lock.lock().await;
            let settings = self.load_settings().await?;
            let mut clock = self.load_clock(&settings).await?;
            clock.touch(self.clock.now());
            self.clock_repo.save(&StoredWorldClock::from(&clock)).await?;
            Ok::<_, ClockError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tracing::debug!("World clock persisted");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Incremental world clock persistence failed");
                false
            }
        }
    }

    /// Records the shutdown instant so the next start can fast-forward.
    pub async fn persist_on_shutdown(&self) -> bool {
        let result = async {
            let _guard = self.lock.lock().await;
            let settings = self.load_settings().await?;
            let mut clock = self.load_clock(&settings).await?;
            clock.mark_shutdown(self.clock.now());
            self.clock_repo.save(&StoredWorldClock::from(&clock)).await?;
            Ok::<_, ClockError>(clock)
        }
        .await;

        match result {
            Ok(clock) => {
                tracing::info!(
                    year = clock.year(),
                    day_of_year = clock.day_of_year(),
                    hour = clock.hour(),
                    "World clock saved for shutdown"
                );
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist world clock on shutdown");
                false
            }
        }
    }

    // =========================================================================
    // Settings and configuration
    // =========================================================================

    pub async fn settings(&self) -> Result<ClockSettings, ClockError> {
        Ok(self.load_settings().await?)
    }

    /// Replaces the settings and carries the clock over to them.
    ///
    /// The game time elapsed since the epoch is kept and re-expressed in the
    /// new day and year lengths. The epoch anchor is re-derived from the
    /// carried clock, so real/calendar conversions agree with it under the
    /// new multiplier; any anchor in `settings` is ignored.
    pub async fn update_settings(
        &self,
        mut settings: ClockSettings,
    ) -> Result<WorldClock, ClockError> {
        settings.validate()?;
        let _guard = self.lock.lock().await;
        let current = self.load_settings().await?;
        let clock = self.load_clock(&current).await?;

        let mut clock = calendar_math::carry_over(&clock, &current, &settings);
        clock.touch(self.clock.now());
        settings.epoch_anchor = Some(calendar_math::implied_epoch(&clock, &settings)?);
        self.settings_repo.save(&settings).await?;
        self.clock_repo.save(&StoredWorldClock::from(&clock)).await?;

        tracing::info!(
            multiplier = settings.multiplier,
            hours_per_day = settings.hours_per_day,
            days_per_year = settings.days_per_year,
            epoch_anchor = ?settings.epoch_anchor,
            "Clock settings updated"
        );
        Ok(clock)
    }

    /// Replaces the calendar configuration (seasons, months, names).
    pub async fn update_calendar(&self, config: CalendarConfig) -> Result<WorldClock, ClockError> {
        let _guard = self.lock.lock().await;
        let settings = self.load_settings().await?;
        config.validate(settings.hours_per_day, settings.days_per_year)?;

        let mut clock = self.load_clock(&settings).await?;
        clock.reconfigure(&settings, config);
        self.clock_repo.save(&StoredWorldClock::from(&clock)).await?;
        Ok(clock)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn current(&self) -> Result<WorldClock, ClockError> {
        Ok(self.snapshot().await?.clock)
    }

    pub async fn snapshot(&self) -> Result<ClockSnapshot, ClockError> {
        let _guard = self.lock.lock().await;
        let settings = self.load_settings().await?;
        let clock = self.load_clock(&settings).await?;
        Ok(ClockSnapshot { settings, clock })
    }

    pub async fn current_date(&self) -> Result<CalendarDate, ClockError> {
        Ok(*self.current().await?.date())
    }

    pub async fn season(&self) -> Result<Season, ClockError> {
        Ok(self.current().await?.season())
    }

    pub async fn is_daytime(&self) -> Result<bool, ClockError> {
        Ok(self.current().await?.is_daytime())
    }

    pub async fn time_of_day(&self) -> Result<TimeOfDay, ClockError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.clock.time_of_day(&snapshot.settings))
    }

    pub async fn current_month_name(&self) -> Result<Option<String>, ClockError> {
        Ok(self.current().await?.month_name().map(str::to_string))
    }

    pub async fn current_cycle_name(&self) -> Result<Option<String>, ClockError> {
        Ok(self.current().await?.cycle_name().map(str::to_string))
    }

    /// Calendar date the world shows at a real instant.
    pub async fn real_to_calendar(&self, instant: DateTime<Utc>) -> Result<CalendarDate, ClockError> {
        let snapshot = self.snapshot().await?;
        let epoch = snapshot.epoch_anchor()?;
        Ok(calendar_math::real_to_calendar(
            &snapshot.settings,
            snapshot.clock.config(),
            epoch,
            instant,
        ))
    }

    /// Real instant at which the world reaches `position`.
    pub async fn calendar_to_real(
        &self,
        position: CalendarPosition,
    ) -> Result<DateTime<Utc>, ClockError> {
        let snapshot = self.snapshot().await?;
        let epoch = snapshot.epoch_anchor()?;
        Ok(calendar_math::calendar_to_real(
            &snapshot.settings,
            epoch,
            position,
        )?)
    }

    pub async fn season_start(&self, season: Season) -> Result<SeasonStart, ClockError> {
        let clock = self.current().await?;
        Ok(calendar_math::season_start(clock.config(), clock.date(), season))
    }

    // =========================================================================
    // Loading
    // =========================================================================

    async fn load_settings(&self) -> Result<ClockSettings, RepoError> {
        Ok(self.settings_repo.load().await?.unwrap_or_default())
    }

    /// Loads the clock, creating or repairing it as needed. A new or repaired
    /// clock is written back before it is returned.
    async fn load_clock(&self, settings: &ClockSettings) -> Result<WorldClock, ClockError> {
        match self.clock_repo.load().await? {
            Some(stored) => {
                let (clock, repairs) = stored.into_clock(settings, self.clock.now());
                if !repairs.is_empty() {
                    let unreadable = repairs.iter().any(|r| {
                        matches!(r, ClockRepair::UnreadableAsOf | ClockRepair::UnreadableLastShutdown)
                    });
                    if unreadable {
                        tracing::warn!(?repairs, "Repaired stored world clock with unreadable timestamps");
                    } else {
                        tracing::info!(?repairs, "Repaired stored world clock");
                    }
                    self.clock_repo.save(&StoredWorldClock::from(&clock)).await?;
                }
                Ok(clock)
            }
            None => {
                let clock =
                    WorldClock::genesis(self.clock.now(), settings, CalendarConfig::default());
                tracing::info!("Created world clock at year 1, day 1");
                self.clock_repo.save(&StoredWorldClock::from(&clock)).await?;
                Ok(clock)
            }
        }
    }
}

/// Longest span a single fast-forward will apply: one hundred years.
const MAX_CATCH_UP_MINUTES: f64 = 100.0 * 365.25 * 24.0 * 60.0;

fn real_minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let span = to - from;
    let minutes = match span.num_microseconds() {
        Some(micros) => micros as f64 / 60_000_000.0,
        None => span.num_milliseconds() as f64 / 60_000.0,
    };
    if minutes.abs() > MAX_CATCH_UP_MINUTES {
        tracing::warn!(
            %from,
            %to,
            cap_minutes = MAX_CATCH_UP_MINUTES,
            "Real time span is implausibly long, clamping"
        );
        return minutes.clamp(-MAX_CATCH_UP_MINUTES, MAX_CATCH_UP_MINUTES);
    }
    minutes
}
