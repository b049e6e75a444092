//! SQLite-backed persistence.
//!
//! Aggregates are stored as JSON text next to a few indexed columns.
//! Timestamps are RFC 3339 UTC strings with fixed microsecond precision, so
//! string comparison in SQL orders them correctly.

mod cooldowns;
mod events;
mod history;
mod world_clock;

pub use cooldowns::SqliteCooldownRepo;
pub use events::{SqliteCalendarEventRepo, SqliteWorldEventRepo};
pub use history::{SqliteInventoryLookup, SqliteWorldHistory};
pub use world_clock::{SqliteClockSettingsRepo, SqliteWorldClockRepo};

use sqlx::SqlitePool;

use crate::infrastructure::ports::RepoError;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS world_clock (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        clock_json TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS clock_settings (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        settings_json TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS world_events (
        id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        event_json TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_world_events_status ON world_events (status)",
    r#"
    CREATE TABLE IF NOT EXISTS calendar_events (
        id TEXT PRIMARY KEY,
        event_json TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS character_cooldowns (
        id TEXT PRIMARY KEY,
        character_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        name TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        game_hours REAL NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (character_id, kind, name)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_character_cooldowns_expiry ON character_cooldowns (expires_at)",
    r#"
    CREATE TABLE IF NOT EXISTS world_history (
        id TEXT PRIMARY KEY,
        category TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        narrative TEXT NOT NULL,
        impact TEXT NOT NULL,
        calendar_context_json TEXT NOT NULL,
        regional_context_json TEXT,
        world_event_id TEXT,
        calendar_event_id TEXT,
        recorded_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS character_inventory (
        character_id TEXT NOT NULL,
        instance_id TEXT NOT NULL,
        item_name TEXT NOT NULL,
        PRIMARY KEY (character_id, instance_id)
    )
    "#,
];

/// Opens (creating if needed) the database at `db_path` and applies the schema.
pub async fn connect(db_path: &str) -> Result<SqlitePool, RepoError> {
    let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await
        .map_err(|e| RepoError::database("connect", e))?;

    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .map_err(|e| RepoError::database("migrate", e))?;
    }

    Ok(pool)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RepoError> {
    serde_json::to_string(value).map_err(RepoError::serialization)
}

fn from_json<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, RepoError> {
    serde_json::from_str(json).map_err(RepoError::serialization)
}
