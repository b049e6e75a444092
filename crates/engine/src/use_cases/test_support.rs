//! Shared fixtures for use case tests.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use chronicle_domain::{
    CalendarConfig, CalendarPosition, ClockSettings, StoredWorldClock, WorldClock,
};

use crate::infrastructure::clock::FixedClock;
use crate::infrastructure::ports::{
    ClockPort, MockClockSettingsRepo, MockWorldClockRepo, RepoError,
};
use crate::use_cases::world_clock::WorldClockService;

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

pub(crate) fn fixed_clock(now: DateTime<Utc>) -> Arc<dyn ClockPort> {
    Arc::new(FixedClock(now))
}

pub(crate) fn stored_at(
    position: CalendarPosition,
    as_of: DateTime<Utc>,
    settings: &ClockSettings,
) -> StoredWorldClock {
    StoredWorldClock::from(&WorldClock::at(
        position,
        as_of,
        settings,
        CalendarConfig::default(),
    ))
}

pub(crate) fn position(year: u32, day_of_year: u32, hour: u32, minute: u32) -> CalendarPosition {
    CalendarPosition {
        year,
        day_of_year,
        hour,
        minute,
    }
}

/// Rows behind a mocked clock service. Saves are visible to later loads.
#[derive(Clone, Default)]
pub(crate) struct ClockRows {
    pub clock: Arc<Mutex<Option<StoredWorldClock>>>,
    pub settings: Arc<Mutex<Option<ClockSettings>>>,
    pub clock_saves: Arc<Mutex<usize>>,
}

impl ClockRows {
    pub fn new(clock: Option<StoredWorldClock>, settings: Option<ClockSettings>) -> Self {
        Self {
            clock: Arc::new(Mutex::new(clock)),
            settings: Arc::new(Mutex::new(settings)),
            clock_saves: Arc::new(Mutex::new(0)),
        }
    }

    pub fn stored_clock(&self) -> Option<StoredWorldClock> {
        self.clock.lock().unwrap().clone()
    }

    pub fn stored_settings(&self) -> Option<ClockSettings> {
        self.settings.lock().unwrap().clone()
    }

    pub fn clock_save_count(&self) -> usize {
        *self.clock_saves.lock().unwrap()
    }
}

/// A clock service over mocked repositories backed by `rows`.
pub(crate) fn clock_service(rows: &ClockRows, clock: Arc<dyn ClockPort>) -> Arc<WorldClockService> {
    flaky_clock_service(rows, clock, 0)
}

/// Like [`clock_service`], but the first `failures` clock saves fail.
pub(crate) fn flaky_clock_service(
    rows: &ClockRows,
    clock: Arc<dyn ClockPort>,
    failures: usize,
) -> Arc<WorldClockService> {
    let mut clock_repo = MockWorldClockRepo::new();
    let load_rows = rows.clone();
    clock_repo
        .expect_load()
        .returning(move || Ok(load_rows.stored_clock()));
    let save_rows = rows.clone();
    let mut remaining_failures = failures;
    clock_repo.expect_save().returning(move |stored| {
        if remaining_failures > 0 {
            remaining_failures -= 1;
            return Err(RepoError::database("world_clock", "database is locked"));
        }
        *save_rows.clock.lock().unwrap() = Some(stored.clone());
        *save_rows.clock_saves.lock().unwrap() += 1;
        Ok(())
    });

    let mut settings_repo = MockClockSettingsRepo::new();
    let load_rows = rows.clone();
    settings_repo
        .expect_load()
        .returning(move || Ok(load_rows.stored_settings()));
    let save_rows = rows.clone();
    settings_repo.expect_save().returning(move |settings| {
        *save_rows.settings.lock().unwrap() = Some(settings.clone());
        Ok(())
    });

    Arc::new(WorldClockService::new(
        Arc::new(clock_repo),
        Arc::new(settings_repo),
        clock,
    ))
}

/// A clock service whose world sits at `position` under default settings.
pub(crate) fn clock_service_at(
    position: CalendarPosition,
    now: DateTime<Utc>,
) -> (Arc<WorldClockService>, ClockRows) {
    let settings = ClockSettings {
        epoch_anchor: Some(now),
        ..ClockSettings::default()
    };
    let rows = ClockRows::new(Some(stored_at(position, now, &settings)), Some(settings));
    (clock_service(&rows, fixed_clock(now)), rows)
}
