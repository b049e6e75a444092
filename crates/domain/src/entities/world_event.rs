//! WorldEvent entity - Long-running, triggered and recurring happenings in the world

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event_condition::EventCondition;
use crate::error::DomainError;
use crate::WorldEventId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorldEventType {
    LongRunning,
    Calendar,
    Triggered,
    Recurring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Planned,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Planned => "PLANNED",
            EventStatus::Active => "ACTIVE",
            EventStatus::Paused => "PAUSED",
            EventStatus::Completed => "COMPLETED",
            EventStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Completed | EventStatus::Cancelled)
    }

    /// PLANNED -> ACTIVE -> COMPLETED, with PAUSED and CANCELLED as side exits.
    pub fn can_transition_to(&self, next: EventStatus) -> bool {
        use EventStatus::*;
        matches!(
            (self, next),
            (Planned, Active)
                | (Planned, Paused)
                | (Planned, Cancelled)
                | (Active, Completed)
                | (Active, Paused)
                | (Active, Cancelled)
                | (Paused, Active)
                | (Paused, Cancelled)
        )
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PLANNED" => Ok(EventStatus::Planned),
            "ACTIVE" => Ok(EventStatus::Active),
            "PAUSED" => Ok(EventStatus::Paused),
            "COMPLETED" => Ok(EventStatus::Completed),
            "CANCELLED" => Ok(EventStatus::Cancelled),
            _ => Err(DomainError::parse(format!("Unknown event status: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    Minor,
    Moderate,
    Major,
    WorldChanging,
}

impl ImpactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::Minor => "minor",
            ImpactLevel::Moderate => "moderate",
            ImpactLevel::Major => "major",
            ImpactLevel::WorldChanging => "world_changing",
        }
    }
}

/// Where an event applies. Empty lists mean everywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionalScope {
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub factions: Vec<String>,
    #[serde(default)]
    pub districts: Vec<String>,
}

impl RegionalScope {
    pub fn is_global(&self) -> bool {
        self.locations.is_empty() && self.factions.is_empty() && self.districts.is_empty()
    }
}

/// A status change that was applied to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: EventStatus,
    pub to: EventStatus,
}

impl StatusChange {
    /// The verb recorded in world history, if this change is worth recording.
    pub fn history_action(&self) -> Option<&'static str> {
        match self.to {
            EventStatus::Active if self.from != EventStatus::Active => Some("started"),
            EventStatus::Completed => Some("completed"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldEvent {
    pub id: WorldEventId,
    pub event_type: WorldEventType,
    pub title: String,
    pub description: Option<String>,
    status: EventStatus,
    #[serde(default)]
    pub start_conditions: Vec<EventCondition>,
    #[serde(default)]
    pub end_conditions: Vec<EventCondition>,
    #[serde(default)]
    pub regional_scope: RegionalScope,
    pub impact: Option<ImpactLevel>,
    #[serde(default)]
    pub affected_factions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorldEvent {
    /// Create a new PLANNED event
    pub fn new(event_type: WorldEventType, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: WorldEventId::new(),
            event_type,
            title: title.into(),
            description: None,
            status: EventStatus::Planned,
            start_conditions: Vec::new(),
            end_conditions: Vec::new(),
            regional_scope: RegionalScope::default(),
            impact: None,
            affected_factions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_start_conditions(mut self, conditions: Vec<EventCondition>) -> Self {
        self.start_conditions = conditions;
        self
    }

    pub fn with_end_conditions(mut self, conditions: Vec<EventCondition>) -> Self {
        self.end_conditions = conditions;
        self
    }

    pub fn with_regional_scope(mut self, scope: RegionalScope) -> Self {
        self.regional_scope = scope;
        self
    }

    pub fn with_impact(mut self, impact: ImpactLevel) -> Self {
        self.impact = Some(impact);
        self
    }

    pub fn with_affected_factions(mut self, factions: Vec<String>) -> Self {
        self.affected_factions = factions;
        self
    }

    pub fn status(&self) -> EventStatus {
        self.status
    }

    /// Moves the event to `next`, enforcing the status state machine.
    pub fn transition_to(
        &mut self,
        next: EventStatus,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invalid_state_transition(format!(
                "world event {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        let change = StatusChange {
            from: self.status,
            to: next,
        };
        self.status = next;
        self.updated_at = now;
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn new_events_are_planned() {
        let event = WorldEvent::new(WorldEventType::Triggered, "Dock strike", now());
        assert_eq!(event.status(), EventStatus::Planned);
    }

    #[test]
    fn lifecycle_records_start_and_completion() {
        let mut event = WorldEvent::new(WorldEventType::LongRunning, "Blackout", now());

        let started = event.transition_to(EventStatus::Active, now()).unwrap();
        assert_eq!(started.history_action(), Some("started"));

        let paused = event.transition_to(EventStatus::Paused, now()).unwrap();
        assert_eq!(paused.history_action(), None);

        let resumed = event.transition_to(EventStatus::Active, now()).unwrap();
        assert_eq!(resumed.history_action(), Some("started"));

        let completed = event.transition_to(EventStatus::Completed, now()).unwrap();
        assert_eq!(completed.history_action(), Some("completed"));
        assert!(event.status().is_terminal());
    }

    #[test]
    fn completed_is_terminal() {
        let mut event = WorldEvent::new(WorldEventType::Calendar, "Festival", now());
        event.transition_to(EventStatus::Active, now()).unwrap();
        event.transition_to(EventStatus::Completed, now()).unwrap();

        for next in [
            EventStatus::Planned,
            EventStatus::Active,
            EventStatus::Paused,
            EventStatus::Cancelled,
        ] {
            let err = event.transition_to(next, now()).unwrap_err();
            assert!(matches!(err, DomainError::InvalidStateTransition(_)));
        }
    }

    #[test]
    fn planned_cannot_skip_to_completed() {
        let mut event = WorldEvent::new(WorldEventType::Triggered, "Raid", now());
        assert!(event.transition_to(EventStatus::Completed, now()).is_err());
        assert_eq!(event.status(), EventStatus::Planned);
    }

    #[test]
    fn status_serializes_as_upper_case() {
        let json = serde_json::to_string(&EventStatus::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
        assert_eq!("active".parse::<EventStatus>().unwrap(), EventStatus::Active);
    }
}
