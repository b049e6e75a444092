//! Outbound collaborator ports: world history, inventory lookups, metrics.

use std::time::Duration;

use async_trait::async_trait;
use chronicle_domain::{
    CalendarDate, CalendarEventId, CharacterId, ImpactLevel, RegionalScope, Season, WorldEventId,
};
use serde::{Deserialize, Serialize};

use super::error::{RepoError, SinkError};

// =============================================================================
// World history
// =============================================================================

/// Calendar coordinates attached to a history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarContext {
    pub year: u32,
    pub day_of_year: u32,
    pub day_of_month: u32,
    pub hour: u32,
    pub season: Season,
}

impl From<&CalendarDate> for CalendarContext {
    fn from(date: &CalendarDate) -> Self {
        Self {
            year: date.year,
            day_of_year: date.day_of_year,
            day_of_month: date.day_of_month,
            hour: date.hour,
            season: date.season,
        }
    }
}

/// A notable moment in world history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub category: String,
    pub title: String,
    pub description: String,
    pub narrative: String,
    pub impact: ImpactLevel,
    pub calendar_context: CalendarContext,
    pub regional_context: Option<RegionalScope>,
    pub world_event_id: Option<WorldEventId>,
    pub calendar_event_id: Option<CalendarEventId>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryPort: Send + Sync {
    async fn record(&self, record: HistoryRecord) -> Result<(), SinkError>;
}

// =============================================================================
// Inventory
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldItem {
    pub instance_id: String,
    pub name: String,
}

/// Read-only view of what a character currently carries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryLookup: Send + Sync {
    async fn held_items(&self, character_id: CharacterId) -> Result<Vec<HeldItem>, RepoError>;
}

// =============================================================================
// Metrics
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Success,
    Failure,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Success => "success",
            TaskStatus::Failure => "failure",
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricsPort: Send + Sync {
    async fn record_periodic_task(
        &self,
        name: &str,
        duration: Duration,
        status: TaskStatus,
    ) -> Result<(), SinkError>;
}
