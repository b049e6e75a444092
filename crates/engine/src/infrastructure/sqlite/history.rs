//! Local world-history log and inventory view.
//!
//! These stand in for the narrative-history and inventory subsystems, which
//! live outside this engine. Both are plain tables in the same database.

use std::sync::Arc;

use async_trait::async_trait;
use chronicle_domain::{format_instant, CharacterId};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::to_json;
use crate::infrastructure::ports::{
    ClockPort, HeldItem, HistoryPort, HistoryRecord, InventoryLookup, RepoError, SinkError,
};

pub struct SqliteWorldHistory {
    pool: SqlitePool,
    clock: Arc<dyn ClockPort>,
}

impl SqliteWorldHistory {
    pub fn new(pool: SqlitePool, clock: Arc<dyn ClockPort>) -> Self {
        Self { pool, clock }
    }

    /// Titles of the most recent records, newest first.
    pub async fn recent_titles(&self, limit: u32) -> Result<Vec<String>, RepoError> {
        let rows = sqlx::query(
            "SELECT title FROM world_history ORDER BY recorded_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("world_history", e))?;

        rows.iter()
            .map(|row| {
                row.try_get("title")
                    .map_err(|e| RepoError::database("world_history", e))
            })
            .collect()
    }
}

#[async_trait]
impl HistoryPort for SqliteWorldHistory {
    async fn record(&self, record: HistoryRecord) -> Result<(), SinkError> {
        let calendar_json = to_json(&record.calendar_context)?;
        let regional_json = record
            .regional_context
            .as_ref()
            .map(to_json)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO world_history (
                id, category, title, description, narrative, impact,
                calendar_context_json, regional_context_json,
                world_event_id, calendar_event_id, recorded_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&record.category)
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.narrative)
        .bind(record.impact.as_str())
        .bind(calendar_json)
        .bind(regional_json)
        .bind(record.world_event_id.map(|id| id.to_string()))
        .bind(record.calendar_event_id.map(|id| id.to_string()))
        .bind(format_instant(self.clock.now()))
        .execute(&self.pool)
        .await
        .map_err(|e| SinkError::Unavailable(e.to_string()))?;

        Ok(())
    }
}

pub struct SqliteInventoryLookup {
    pool: SqlitePool,
}

impl SqliteInventoryLookup {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add_item(
        &self,
        character_id: CharacterId,
        instance_id: &str,
        item_name: &str,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO character_inventory (character_id, instance_id, item_name)
            VALUES (?, ?, ?)
            ON CONFLICT(character_id, instance_id) DO UPDATE SET item_name = excluded.item_name
            "#,
        )
        .bind(character_id.to_string())
        .bind(instance_id)
        .bind(item_name)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("character_inventory", e))?;
        Ok(())
    }

    pub async fn remove_item(
        &self,
        character_id: CharacterId,
        instance_id: &str,
    ) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM character_inventory WHERE character_id = ? AND instance_id = ?")
            .bind(character_id.to_string())
            .bind(instance_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("character_inventory", e))?;
        Ok(())
    }
}

#[async_trait]
impl InventoryLookup for SqliteInventoryLookup {
    async fn held_items(&self, character_id: CharacterId) -> Result<Vec<HeldItem>, RepoError> {
        let rows = sqlx::query(
            "SELECT instance_id, item_name FROM character_inventory WHERE character_id = ? ORDER BY instance_id",
        )
        .bind(character_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("character_inventory", e))?;

        rows.iter()
            .map(|row| {
                Ok(HeldItem {
                    instance_id: row
                        .try_get("instance_id")
                        .map_err(|e| RepoError::database("character_inventory", e))?,
                    name: row
                        .try_get("item_name")
                        .map_err(|e| RepoError::database("character_inventory", e))?,
                })
            })
            .collect()
    }
}
