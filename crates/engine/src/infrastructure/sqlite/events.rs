//! World and calendar event storage.

use async_trait::async_trait;
use chronicle_domain::{
    format_instant, CalendarEvent, CalendarEventId, EventStatus, WorldEvent, WorldEventId,
};
use sqlx::{Row, SqlitePool};

use super::{from_json, to_json};
use crate::infrastructure::ports::{CalendarEventRepo, RepoError, WorldEventRepo};

pub struct SqliteWorldEventRepo {
    pool: SqlitePool,
}

impl SqliteWorldEventRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorldEventRepo for SqliteWorldEventRepo {
    async fn get(&self, id: WorldEventId) -> Result<Option<WorldEvent>, RepoError> {
        let row = sqlx::query("SELECT event_json FROM world_events WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("world_events", e))?;

        match row {
            Some(row) => {
                let json: String = row
                    .try_get("event_json")
                    .map_err(|e| RepoError::database("world_events", e))?;
                Ok(Some(from_json(&json)?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, event: &WorldEvent) -> Result<(), RepoError> {
        let json = to_json(event)?;

        sqlx::query(
            r#"
            INSERT INTO world_events (id, status, event_json, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                event_json = excluded.event_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.status().as_str())
        .bind(json)
        .bind(format_instant(event.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("world_events", e))?;

        Ok(())
    }

    async fn list_by_status(&self, status: EventStatus) -> Result<Vec<WorldEvent>, RepoError> {
        let rows = sqlx::query(
            "SELECT event_json FROM world_events WHERE status = ? ORDER BY updated_at, id",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("world_events", e))?;

        rows.iter()
            .map(|row| {
                let json: String = row
                    .try_get("event_json")
                    .map_err(|e| RepoError::database("world_events", e))?;
                from_json(&json)
            })
            .collect()
    }
}

pub struct SqliteCalendarEventRepo {
    pool: SqlitePool,
}

impl SqliteCalendarEventRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CalendarEventRepo for SqliteCalendarEventRepo {
    async fn get(&self, id: CalendarEventId) -> Result<Option<CalendarEvent>, RepoError> {
        let row = sqlx::query("SELECT event_json FROM calendar_events WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("calendar_events", e))?;

        match row {
            Some(row) => {
                let json: String = row
                    .try_get("event_json")
                    .map_err(|e| RepoError::database("calendar_events", e))?;
                Ok(Some(from_json(&json)?))
            }
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<CalendarEvent>, RepoError> {
        let rows = sqlx::query("SELECT event_json FROM calendar_events ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("calendar_events", e))?;

        rows.iter()
            .map(|row| {
                let json: String = row
                    .try_get("event_json")
                    .map_err(|e| RepoError::database("calendar_events", e))?;
                from_json(&json)
            })
            .collect()
    }
}
