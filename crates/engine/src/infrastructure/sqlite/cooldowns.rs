//! Character cooldown storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronicle_domain::{
    format_instant, parse_instant, CharacterCooldown, CharacterId, CooldownId, CooldownKey,
    CooldownKind,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::infrastructure::ports::{CooldownRepo, RepoError};

const COLUMNS: &str = "id, character_id, kind, name, expires_at, game_hours, updated_at";

pub struct SqliteCooldownRepo {
    pool: SqlitePool,
}

impl SqliteCooldownRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_cooldown(row: &SqliteRow) -> Result<CharacterCooldown, RepoError> {
    let column = |name: &'static str| -> Result<String, RepoError> {
        row.try_get::<String, _>(name)
            .map_err(|e| RepoError::database("character_cooldowns", e))
    };

    let id: CooldownId = column("id")?.parse().map_err(RepoError::serialization)?;
    let character_id: CharacterId = column("character_id")?
        .parse()
        .map_err(RepoError::serialization)?;
    let kind: CooldownKind = column("kind")?.parse().map_err(RepoError::serialization)?;
    let (expires_at, _) = parse_instant(&column("expires_at")?).map_err(RepoError::serialization)?;
    let (updated_at, _) = parse_instant(&column("updated_at")?).map_err(RepoError::serialization)?;
    let game_hours: f64 = row
        .try_get("game_hours")
        .map_err(|e| RepoError::database("character_cooldowns", e))?;

    Ok(CharacterCooldown {
        id,
        key: CooldownKey::new(character_id, kind, column("name")?),
        expires_at,
        game_hours,
        updated_at,
    })
}

#[async_trait]
impl CooldownRepo for SqliteCooldownRepo {
    async fn get(&self, key: &CooldownKey) -> Result<Option<CharacterCooldown>, RepoError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM character_cooldowns WHERE character_id = ? AND kind = ? AND name = ?",
            COLUMNS
        ))
        .bind(key.character_id.to_string())
        .bind(key.kind.as_str())
        .bind(&key.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::database("character_cooldowns", e))?;

        row.as_ref().map(row_to_cooldown).transpose()
    }

    async fn upsert(&self, cooldown: &CharacterCooldown) -> Result<CharacterCooldown, RepoError> {
        let row = sqlx::query(
            r#"
            INSERT INTO character_cooldowns
                (id, character_id, kind, name, expires_at, game_hours, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(character_id, kind, name) DO UPDATE SET
                expires_at = excluded.expires_at,
                game_hours = excluded.game_hours,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(cooldown.id.to_string())
        .bind(cooldown.key.character_id.to_string())
        .bind(cooldown.key.kind.as_str())
        .bind(&cooldown.key.name)
        .bind(format_instant(cooldown.expires_at))
        .bind(cooldown.game_hours)
        .bind(format_instant(cooldown.updated_at))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepoError::database("character_cooldowns", e))?;

        let stored_id: String = row
            .try_get("id")
            .map_err(|e| RepoError::database("character_cooldowns", e))?;
        let id: CooldownId = stored_id.parse().map_err(RepoError::serialization)?;

        Ok(CharacterCooldown {
            id,
            ..cooldown.clone()
        })
    }

    async fn list_for_character(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<CharacterCooldown>, RepoError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM character_cooldowns WHERE character_id = ? ORDER BY expires_at, name",
            COLUMNS
        ))
        .bind(character_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("character_cooldowns", e))?;

        rows.iter().map(row_to_cooldown).collect()
    }

    async fn delete(&self, id: CooldownId) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM character_cooldowns WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("character_cooldowns", e))?;
        Ok(())
    }

    async fn delete_by_key(&self, key: &CooldownKey) -> Result<u64, RepoError> {
        let result = sqlx::query(
            "DELETE FROM character_cooldowns WHERE character_id = ? AND kind = ? AND name = ?",
        )
        .bind(key.character_id.to_string())
        .bind(key.kind.as_str())
        .bind(&key.name)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("character_cooldowns", e))?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(
        &self,
        character_id: Option<CharacterId>,
        now: DateTime<Utc>,
    ) -> Result<u64, RepoError> {
        let result = match character_id {
            Some(character_id) => {
                sqlx::query(
                    "DELETE FROM character_cooldowns WHERE character_id = ? AND expires_at <= ?",
                )
                .bind(character_id.to_string())
                .bind(format_instant(now))
                .execute(&self.pool)
                .await
            }
            None => {
                sqlx::query("DELETE FROM character_cooldowns WHERE expires_at <= ?")
                    .bind(format_instant(now))
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| RepoError::database("character_cooldowns", e))?;

        Ok(result.rows_affected())
    }
}
