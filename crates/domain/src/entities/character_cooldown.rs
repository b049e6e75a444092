//! CharacterCooldown entity - A timed lockout on a skill, ability or item

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::{CharacterId, CooldownId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CooldownKind {
    Skill,
    Ability,
    Item,
}

impl CooldownKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CooldownKind::Skill => "SKILL",
            CooldownKind::Ability => "ABILITY",
            CooldownKind::Item => "ITEM",
        }
    }
}

impl fmt::Display for CooldownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CooldownKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SKILL" => Ok(CooldownKind::Skill),
            "ABILITY" => Ok(CooldownKind::Ability),
            "ITEM" => Ok(CooldownKind::Item),
            _ => Err(DomainError::parse(format!("Unknown cooldown kind: {}", s))),
        }
    }
}

/// Identity of a cooldown. At most one cooldown exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CooldownKey {
    pub character_id: CharacterId,
    pub kind: CooldownKind,
    /// Skill or ability name, or an item's instance id or name
    pub name: String,
}

impl CooldownKey {
    pub fn new(character_id: CharacterId, kind: CooldownKind, name: impl Into<String>) -> Self {
        Self {
            character_id,
            kind,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterCooldown {
    pub id: CooldownId,
    pub key: CooldownKey,
    pub expires_at: DateTime<Utc>,
    /// Length of the cooldown in game-hours when it was started
    pub game_hours: f64,
    pub updated_at: DateTime<Utc>,
}

impl CharacterCooldown {
    pub fn new(
        key: CooldownKey,
        game_hours: f64,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CooldownId::new(),
            key,
            expires_at,
            game_hours,
            updated_at: now,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Real time left, zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}
