//! Singleton rows: the world clock and its settings.

use std::sync::Arc;

use async_trait::async_trait;
use chronicle_domain::{format_instant, ClockSettings, StoredWorldClock};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use super::{from_json, to_json};
use crate::infrastructure::ports::{ClockPort, ClockSettingsRepo, RepoError, WorldClockRepo};

pub struct SqliteWorldClockRepo {
    pool: SqlitePool,
    clock: Arc<dyn ClockPort>,
}

impl SqliteWorldClockRepo {
    pub fn new(pool: SqlitePool, clock: Arc<dyn ClockPort>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl WorldClockRepo for SqliteWorldClockRepo {
    async fn load(&self) -> Result<Option<StoredWorldClock>, RepoError> {
        let row = sqlx::query("SELECT clock_json FROM world_clock WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("world_clock", e))?;

        match row {
            Some(row) => {
                let json: String = row
                    .try_get("clock_json")
                    .map_err(|e| RepoError::database("world_clock", e))?;
                Ok(Some(decode_clock(&json)))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, clock: &StoredWorldClock) -> Result<(), RepoError> {
        let json = to_json(clock)?;
        let now = format_instant(self.clock.now());

        sqlx::query(
            r#"
            INSERT INTO world_clock (id, clock_json, updated_at)
            VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                clock_json = excluded.clock_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(json)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("world_clock", e))?;

        Ok(())
    }
}

/// Reads a clock row field by field. Fields that do not decode are left
/// empty for the clock service to repair and write back.
fn decode_clock(json: &str) -> StoredWorldClock {
    let row: Value = match serde_json::from_str(json) {
        Ok(row) => row,
        Err(e) => {
            tracing::warn!(error = %e, "World clock row is not valid JSON, rebuilding it");
            return StoredWorldClock::default();
        }
    };

    let mut dropped = Vec::new();
    let stored = StoredWorldClock {
        as_of: field(&row, "as_of", &mut dropped).unwrap_or_default(),
        last_shutdown: field(&row, "last_shutdown", &mut dropped),
        year: field(&row, "year", &mut dropped),
        day_of_year: field(&row, "day_of_year", &mut dropped),
        day: field(&row, "day", &mut dropped),
        hour: field(&row, "hour", &mut dropped),
        minute: field(&row, "minute", &mut dropped),
        month: field(&row, "month", &mut dropped),
        season: field(&row, "season", &mut dropped),
        day_of_week: field(&row, "day_of_week", &mut dropped),
        is_daytime: field(&row, "is_daytime", &mut dropped),
        cycle_year: field(&row, "cycle_year", &mut dropped),
        config: field(&row, "config", &mut dropped),
        partial_minute: field(&row, "partial_minute", &mut dropped),
    };
    if !dropped.is_empty() {
        tracing::warn!(?dropped, "Ignored unreadable world clock fields");
    }
    stored
}

fn field<T: DeserializeOwned>(
    row: &Value,
    name: &'static str,
    dropped: &mut Vec<&'static str>,
) -> Option<T> {
    let raw = row.get(name).filter(|v| !v.is_null())?;
    match serde_json::from_value(raw.clone()) {
        Ok(value) => Some(value),
        Err(_) => {
            dropped.push(name);
            None
        }
    }
}

pub struct SqliteClockSettingsRepo {
    pool: SqlitePool,
    clock: Arc<dyn ClockPort>,
}

impl SqliteClockSettingsRepo {
    pub fn new(pool: SqlitePool, clock: Arc<dyn ClockPort>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl ClockSettingsRepo for SqliteClockSettingsRepo {
    async fn load(&self) -> Result<Option<ClockSettings>, RepoError> {
        let row = sqlx::query("SELECT settings_json FROM clock_settings WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("clock_settings", e))?;

        match row {
            Some(row) => {
                let json: String = row
                    .try_get("settings_json")
                    .map_err(|e| RepoError::database("clock_settings", e))?;
                Ok(Some(from_json(&json)?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, settings: &ClockSettings) -> Result<(), RepoError> {
        let json = to_json(settings)?;
        let now = format_instant(self.clock.now());

        sqlx::query(
            r#"
            INSERT INTO clock_settings (id, settings_json, updated_at)
            VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                settings_json = excluded.settings_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(json)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("clock_settings", e))?;

        Ok(())
    }
}
