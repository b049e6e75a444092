//! Character cooldowns.
//!
//! Lengths are given in game-hours and stored as real expiry instants, so a
//! cooldown keeps running while the server is down. Changing the clock
//! multiplier does not stretch cooldowns that are already running.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use chronicle_domain::{
    CharacterCooldown, CharacterId, CooldownKey, CooldownKind, DomainError,
};

use crate::infrastructure::ports::{ClockPort, CooldownRepo, InventoryLookup, RepoError};
use crate::use_cases::world_clock::{ClockError, WorldClockService};

#[derive(Debug, thiserror::Error)]
pub enum CooldownError {
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

pub struct CooldownTracker {
    repo: Arc<dyn CooldownRepo>,
    clock_service: Arc<WorldClockService>,
    inventory: Arc<dyn InventoryLookup>,
    clock: Arc<dyn ClockPort>,
}

impl CooldownTracker {
    pub fn new(
        repo: Arc<dyn CooldownRepo>,
        clock_service: Arc<WorldClockService>,
        inventory: Arc<dyn InventoryLookup>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            repo,
            clock_service,
            inventory,
            clock,
        }
    }

    /// Starts a cooldown of `game_hours`, replacing any running one for the
    /// same key. Cooldowns never stack.
    pub async fn start(
        &self,
        character_id: CharacterId,
        kind: CooldownKind,
        name: &str,
        game_hours: f64,
    ) -> Result<CharacterCooldown, CooldownError> {
        if !game_hours.is_finite() || game_hours <= 0.0 {
            return Err(DomainError::validation(format!(
                "cooldown length must be a positive number of game-hours, got {}",
                game_hours
            ))
            .into());
        }

        let settings = self.clock_service.settings().await?;
        let real_minutes = game_hours / settings.multiplier;
        let real_micros = (real_minutes * 60_000_000.0).round();
        if real_micros > i64::MAX as f64 {
            return Err(DomainError::validation("cooldown is too long").into());
        }

        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(Duration::microseconds(real_micros as i64))
            .ok_or_else(|| DomainError::validation("cooldown is too long"))?;

        let key = CooldownKey::new(character_id, kind, name);
        let stored = self
            .repo
            .upsert(&CharacterCooldown::new(key, game_hours, expires_at, now))
            .await?;

        tracing::debug!(
            character_id = %character_id,
            kind = %kind,
            name,
            game_hours,
            real_minutes,
            "Cooldown started"
        );
        Ok(stored)
    }

    pub async fn is_active(&self, key: &CooldownKey) -> Result<bool, CooldownError> {
        let now = self.clock.now();
        Ok(self
            .repo
            .get(key)
            .await?
            .map_or(false, |cooldown| cooldown.is_active(now)))
    }

    /// Game-hours left at the current multiplier, or `None` when there is no
    /// running cooldown for the key.
    pub async fn remaining_game_hours(&self, key: &CooldownKey) -> Result<Option<f64>, CooldownError> {
        let now = self.clock.now();
        let Some(cooldown) = self.repo.get(key).await? else {
            return Ok(None);
        };
        if !cooldown.is_active(now) {
            return Ok(None);
        }

        let settings = self.clock_service.settings().await?;
        let remaining = cooldown.remaining(now);
        let real_minutes =
            remaining.num_microseconds().unwrap_or(i64::MAX) as f64 / 60_000_000.0;
        Ok(Some(real_minutes * settings.multiplier))
    }

    /// Running cooldowns of a character, soonest expiry first.
    pub async fn active_cooldowns(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<CharacterCooldown>, CooldownError> {
        let now = self.clock.now();
        let mut cooldowns: Vec<CharacterCooldown> = self
            .repo
            .list_for_character(character_id)
            .await?
            .into_iter()
            .filter(|cooldown| cooldown.is_active(now))
            .collect();
        cooldowns.sort_by_key(|cooldown| cooldown.expires_at);
        Ok(cooldowns)
    }

    pub async fn cleanup_expired(&self, character_id: CharacterId) -> Result<u64, CooldownError> {
        let removed = self
            .repo
            .delete_expired(Some(character_id), self.clock.now())
            .await?;
        if removed > 0 {
            tracing::debug!(character_id = %character_id, removed, "Removed expired cooldowns");
        }
        Ok(removed)
    }

    pub async fn cleanup_all_expired(&self) -> Result<u64, CooldownError> {
        let removed = self.repo.delete_expired(None, self.clock.now()).await?;
        if removed > 0 {
            tracing::info!(removed, "Removed expired cooldowns");
        }
        Ok(removed)
    }

    /// Drops the cooldown of one item instance, e.g. when it is consumed.
    pub async fn remove_item_cooldowns(
        &self,
        character_id: CharacterId,
        instance_id: &str,
    ) -> Result<u64, CooldownError> {
        let key = CooldownKey::new(character_id, CooldownKind::Item, instance_id);
        Ok(self.repo.delete_by_key(&key).await?)
    }

    /// Drops an item cooldown that was keyed by item name.
    pub async fn remove_item_cooldowns_by_name(
        &self,
        character_id: CharacterId,
        item_name: &str,
    ) -> Result<u64, CooldownError> {
        let key = CooldownKey::new(character_id, CooldownKind::Item, item_name);
        Ok(self.repo.delete_by_key(&key).await?)
    }

    /// Removes running item cooldowns for items the character no longer holds.
    ///
    /// An item cooldown is kept if its name matches a held instance id or a
    /// held item name. Expired cooldowns are left to [`Self::cleanup_expired`].
    pub async fn cleanup_orphaned(&self, character_id: CharacterId) -> Result<u64, CooldownError> {
        let held = self.inventory.held_items(character_id).await?;
        let held_keys: HashSet<&str> = held
            .iter()
            .flat_map(|item| [item.instance_id.as_str(), item.name.as_str()])
            .collect();

        let mut removed = 0;
        for cooldown in self.active_cooldowns(character_id).await? {
            if cooldown.key.kind != CooldownKind::Item
                || held_keys.contains(cooldown.key.name.as_str())
            {
                continue;
            }
            self.repo.delete(cooldown.id).await?;
            removed += 1;
        }

        if removed > 0 {
            tracing::info!(character_id = %character_id, removed, "Removed orphaned item cooldowns");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use chronicle_domain::CooldownId;

    use super::*;
    use crate::infrastructure::ports::{HeldItem, MockCooldownRepo, MockInventoryLookup};
    use crate::use_cases::test_support::{clock_service_at, fixed_clock, position, t0};

    fn tracker(repo: MockCooldownRepo, inventory: MockInventoryLookup) -> CooldownTracker {
        let (clock_service, _rows) = clock_service_at(position(1, 1, 0, 0), t0());
        CooldownTracker::new(
            Arc::new(repo),
            clock_service,
            Arc::new(inventory),
            fixed_clock(t0()),
        )
    }

    fn cooldown(key: CooldownKey, expires_at: DateTime<Utc>) -> CharacterCooldown {
        CharacterCooldown::new(key, 60.0, expires_at, t0())
    }

    #[tokio::test]
    async fn sixty_game_hours_lasts_one_real_minute() {
        let character = CharacterId::new();
        let mut repo = MockCooldownRepo::new();
        repo.expect_upsert()
            .withf(|c| c.expires_at == t0() + Duration::minutes(1) && c.game_hours == 60.0)
            .times(1)
            .returning(|c| Ok(c.clone()));

        let started = tracker(repo, MockInventoryLookup::new())
            .start(character, CooldownKind::Skill, "Lockpicking", 60.0)
            .await
            .expect("start");

        assert_eq!(started.key.name, "Lockpicking");
        assert_eq!(started.expires_at, t0() + Duration::minutes(1));
    }

    #[tokio::test]
    async fn restart_keeps_stored_id() {
        let character = CharacterId::new();
        let existing_id = CooldownId::new();
        let mut repo = MockCooldownRepo::new();
        repo.expect_upsert().returning(move |c| {
            Ok(CharacterCooldown {
                id: existing_id,
                ..c.clone()
            })
        });

        let restarted = tracker(repo, MockInventoryLookup::new())
            .start(character, CooldownKind::Ability, "Fireball", 3.0)
            .await
            .expect("start");

        assert_eq!(restarted.id, existing_id);
    }

    #[tokio::test]
    async fn non_positive_length_is_rejected() {
        let mut repo = MockCooldownRepo::new();
        repo.expect_upsert().times(0);
        let tracker = tracker(repo, MockInventoryLookup::new());

        for hours in [0.0, -2.0, f64::NAN] {
            let result = tracker
                .start(CharacterId::new(), CooldownKind::Skill, "Sprint", hours)
                .await;
            assert!(matches!(result, Err(CooldownError::Domain(_))));
        }
    }

    #[tokio::test]
    async fn remaining_converts_back_to_game_hours() {
        let key = CooldownKey::new(CharacterId::new(), CooldownKind::Skill, "Lockpicking");
        let stored = cooldown(key.clone(), t0() + Duration::minutes(1));
        let mut repo = MockCooldownRepo::new();
        repo.expect_get().returning(move |_| Ok(Some(stored.clone())));

        let tracker = tracker(repo, MockInventoryLookup::new());

        assert!(tracker.is_active(&key).await.expect("active"));
        let remaining = tracker
            .remaining_game_hours(&key)
            .await
            .expect("remaining")
            .expect("running");
        assert!((remaining - 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn expired_or_missing_cooldown_has_no_remaining_time() {
        let expired_key = CooldownKey::new(CharacterId::new(), CooldownKind::Item, "potion-1");
        let missing_key = CooldownKey::new(CharacterId::new(), CooldownKind::Item, "potion-2");
        // expiry is exclusive: expiring exactly now is already over
        let expired = cooldown(expired_key.clone(), t0());
        let mut repo = MockCooldownRepo::new();
        let lookup_key = expired_key.clone();
        repo.expect_get().returning(move |key| {
            if *key == lookup_key {
                Ok(Some(expired.clone()))
            } else {
                Ok(None)
            }
        });

        let tracker = tracker(repo, MockInventoryLookup::new());

        assert!(!tracker.is_active(&expired_key).await.expect("active"));
        assert_eq!(tracker.remaining_game_hours(&expired_key).await.expect("remaining"), None);
        assert!(!tracker.is_active(&missing_key).await.expect("active"));
        assert_eq!(tracker.remaining_game_hours(&missing_key).await.expect("remaining"), None);
    }

    #[tokio::test]
    async fn active_cooldowns_skip_expired_and_sort_by_expiry() {
        let character = CharacterId::new();
        let later = cooldown(
            CooldownKey::new(character, CooldownKind::Skill, "Track"),
            t0() + Duration::minutes(10),
        );
        let sooner = cooldown(
            CooldownKey::new(character, CooldownKind::Skill, "Hide"),
            t0() + Duration::minutes(2),
        );
        let expired = cooldown(
            CooldownKey::new(character, CooldownKind::Skill, "Climb"),
            t0() - Duration::minutes(2),
        );
        let mut repo = MockCooldownRepo::new();
        repo.expect_list_for_character()
            .returning(move |_| Ok(vec![later.clone(), expired.clone(), sooner.clone()]));

        let active = tracker(repo, MockInventoryLookup::new())
            .active_cooldowns(character)
            .await
            .expect("active");

        let names: Vec<&str> = active.iter().map(|c| c.key.name.as_str()).collect();
        assert_eq!(names, vec!["Hide", "Track"]);
    }

    #[tokio::test]
    async fn cleanup_expired_scopes_to_character() {
        let character = CharacterId::new();
        let mut repo = MockCooldownRepo::new();
        repo.expect_delete_expired()
            .withf(move |scope, now| *scope == Some(character) && *now == t0())
            .times(1)
            .returning(|_, _| Ok(2));
        repo.expect_delete_expired()
            .withf(|scope, _| scope.is_none())
            .times(1)
            .returning(|_, _| Ok(5));

        let tracker = tracker(repo, MockInventoryLookup::new());

        assert_eq!(tracker.cleanup_expired(character).await.expect("cleanup"), 2);
        assert_eq!(tracker.cleanup_all_expired().await.expect("cleanup all"), 5);
    }

    #[tokio::test]
    async fn item_cooldowns_are_removed_by_instance_or_name() {
        let character = CharacterId::new();
        let mut repo = MockCooldownRepo::new();
        repo.expect_delete_by_key()
            .withf(|key| key.kind == CooldownKind::Item && key.name == "sword-7")
            .times(1)
            .returning(|_| Ok(1));
        repo.expect_delete_by_key()
            .withf(|key| key.kind == CooldownKind::Item && key.name == "Healing Potion")
            .times(1)
            .returning(|_| Ok(0));

        let tracker = tracker(repo, MockInventoryLookup::new());

        assert_eq!(tracker.remove_item_cooldowns(character, "sword-7").await.unwrap(), 1);
        assert_eq!(
            tracker
                .remove_item_cooldowns_by_name(character, "Healing Potion")
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn orphaned_item_cooldowns_are_removed() {
        let character = CharacterId::new();
        let by_instance = cooldown(
            CooldownKey::new(character, CooldownKind::Item, "ring-1"),
            t0() + Duration::minutes(5),
        );
        let by_name = cooldown(
            CooldownKey::new(character, CooldownKind::Item, "Healing Potion"),
            t0() + Duration::minutes(5),
        );
        let orphan = cooldown(
            CooldownKey::new(character, CooldownKind::Item, "wand-9"),
            t0() + Duration::minutes(5),
        );
        let skill = cooldown(
            CooldownKey::new(character, CooldownKind::Skill, "wand-9"),
            t0() + Duration::minutes(5),
        );
        let orphan_id = orphan.id;

        let mut repo = MockCooldownRepo::new();
        repo.expect_list_for_character().returning(move |_| {
            Ok(vec![
                by_instance.clone(),
                by_name.clone(),
                orphan.clone(),
                skill.clone(),
            ])
        });
        repo.expect_delete()
            .withf(move |id| *id == orphan_id)
            .times(1)
            .returning(|_| Ok(()));

        let mut inventory = MockInventoryLookup::new();
        inventory.expect_held_items().returning(|_| {
            Ok(vec![
                HeldItem {
                    instance_id: "ring-1".to_string(),
                    name: "Silver Ring".to_string(),
                },
                HeldItem {
                    instance_id: "potion-3".to_string(),
                    name: "Healing Potion".to_string(),
                },
            ])
        });

        let removed = tracker(repo, inventory)
            .cleanup_orphaned(character)
            .await
            .expect("cleanup");

        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn orphan_sweep_ignores_expired_cooldowns() {
        let character = CharacterId::new();
        let expired = cooldown(
            CooldownKey::new(character, CooldownKind::Item, "wand-9"),
            t0() - Duration::minutes(1),
        );
        let running = cooldown(
            CooldownKey::new(character, CooldownKind::Item, "staff-2"),
            t0() + Duration::minutes(1),
        );
        let running_id = running.id;

        let mut repo = MockCooldownRepo::new();
        repo.expect_list_for_character()
            .returning(move |_| Ok(vec![expired.clone(), running.clone()]));
        repo.expect_delete()
            .withf(move |id| *id == running_id)
            .times(1)
            .returning(|_| Ok(()));
        let mut inventory = MockInventoryLookup::new();
        inventory.expect_held_items().returning(|_| Ok(vec![]));

        let removed = tracker(repo, inventory)
            .cleanup_orphaned(character)
            .await
            .expect("cleanup");

        assert_eq!(removed, 1);
    }
}
