//! Repository port traits for database access.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronicle_domain::{
    CalendarEvent, CalendarEventId, CharacterCooldown, CharacterId, ClockSettings, CooldownId,
    CooldownKey, EventStatus, StoredWorldClock, WorldEvent, WorldEventId,
};

use super::error::RepoError;

// =============================================================================
// Singletons
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorldClockRepo: Send + Sync {
    async fn load(&self) -> Result<Option<StoredWorldClock>, RepoError>;
    /// Overwrites the singleton row.
    async fn save(&self, clock: &StoredWorldClock) -> Result<(), RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClockSettingsRepo: Send + Sync {
    async fn load(&self) -> Result<Option<ClockSettings>, RepoError>;
    async fn save(&self, settings: &ClockSettings) -> Result<(), RepoError>;
}

// =============================================================================
// Events
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorldEventRepo: Send + Sync {
    async fn get(&self, id: WorldEventId) -> Result<Option<WorldEvent>, RepoError>;
    async fn save(&self, event: &WorldEvent) -> Result<(), RepoError>;
    async fn list_by_status(&self, status: EventStatus) -> Result<Vec<WorldEvent>, RepoError>;
}

/// Calendar events are authored outside the engine; it only reads them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CalendarEventRepo: Send + Sync {
    async fn get(&self, id: CalendarEventId) -> Result<Option<CalendarEvent>, RepoError>;
    async fn list_all(&self) -> Result<Vec<CalendarEvent>, RepoError>;
}

// =============================================================================
// Cooldowns
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CooldownRepo: Send + Sync {
    async fn get(&self, key: &CooldownKey) -> Result<Option<CharacterCooldown>, RepoError>;
    /// Inserts the cooldown or replaces the expiry of the one with the same key.
    /// Returns the stored row, which keeps the existing id on replace.
    async fn upsert(&self, cooldown: &CharacterCooldown) -> Result<CharacterCooldown, RepoError>;
    async fn list_for_character(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<CharacterCooldown>, RepoError>;
    async fn delete(&self, id: CooldownId) -> Result<(), RepoError>;
    async fn delete_by_key(&self, key: &CooldownKey) -> Result<u64, RepoError>;
    /// Deletes cooldowns expired at `now`, for one character or for everyone.
    async fn delete_expired(
        &self,
        character_id: Option<CharacterId>,
        now: DateTime<Utc>,
    ) -> Result<u64, RepoError>;
}
