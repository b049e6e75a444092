//! Trigger and end conditions for world events
//!
//! A condition list is a conjunction: every entry must hold. An empty list is
//! trivially satisfied.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game_time::CalendarDate;
use crate::value_objects::Season;

/// A single condition on a world event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventCondition {
    /// Every present field must equal the live clock's value.
    CalendarMatch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        year: Option<u32>,
        /// Day of the month (1-based)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        day: Option<u32>,
        /// Day of the year (1-based)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        day_of_year: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hour: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        season: Option<Season>,
    },
    /// Bounds on real wall-clock time.
    RealTimeBound {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        after: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before: Option<DateTime<Utc>>,
    },
    /// Requires a faction standing system that does not exist yet.
    /// Evaluating a list containing this variant always fails.
    FactionStanding { faction: String, minimum: i64 },
    /// Extension point; always holds.
    Custom {
        name: String,
        #[serde(default)]
        parameters: BTreeMap<String, String>,
    },
}

/// Which side of an event's lifetime a condition list guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionRole {
    /// Real-time bounds describe a window that must contain now.
    Start,
    /// Real-time bounds are deadlines: the event ends once now is past them.
    End,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("{kind} conditions cannot be evaluated yet")]
    Unimplemented { kind: &'static str },
}

impl EventCondition {
    pub fn kind(&self) -> &'static str {
        match self {
            EventCondition::CalendarMatch { .. } => "calendar_match",
            EventCondition::RealTimeBound { .. } => "real_time_bound",
            EventCondition::FactionStanding { .. } => "faction_standing",
            EventCondition::Custom { .. } => "custom",
        }
    }

    fn holds(&self, role: ConditionRole, date: &CalendarDate, now: DateTime<Utc>) -> bool {
        match self {
            EventCondition::CalendarMatch {
                year,
                day,
                day_of_year,
                hour,
                season,
            } => {
                year.map_or(true, |y| y == date.year)
                    && day.map_or(true, |d| d == date.day_of_month)
                    && day_of_year.map_or(true, |d| d == date.day_of_year)
                    && hour.map_or(true, |h| h == date.hour)
                    && season.map_or(true, |s| s == date.season)
            }
            EventCondition::RealTimeBound { after, before } => match role {
                ConditionRole::Start => {
                    after.map_or(true, |a| now >= a) && before.map_or(true, |b| now <= b)
                }
                ConditionRole::End => {
                    after.map_or(true, |a| now >= a) && before.map_or(true, |b| now > b)
                }
            },
            // rejected before evaluation starts
            EventCondition::FactionStanding { .. } => false,
            EventCondition::Custom { .. } => true,
        }
    }
}

/// Evaluates a condition list against the live calendar date and wall clock.
///
/// Returns `Err(ConditionError::Unimplemented)` if any condition cannot be
/// evaluated, regardless of whether the others hold.
pub fn evaluate_all(
    conditions: &[EventCondition],
    role: ConditionRole,
    date: &CalendarDate,
    now: DateTime<Utc>,
) -> Result<bool, ConditionError> {
    if let Some(condition) = conditions
        .iter()
        .find(|c| matches!(c, EventCondition::FactionStanding { .. }))
    {
        return Err(ConditionError::Unimplemented {
            kind: condition.kind(),
        });
    }
    Ok(conditions.iter().all(|c| c.holds(role, date, now)))
}
