//! Calendar event use cases: which holidays and festivals are on, which are
//! coming up, and how regions name them.

use std::collections::HashSet;
use std::sync::Arc;

use chronicle_domain::{CalendarDate, CalendarEvent, CalendarEventId, ImpactLevel};

use crate::infrastructure::ports::{
    CalendarContext, CalendarEventRepo, HistoryPort, HistoryRecord, RepoError,
};
use crate::use_cases::world_clock::{ClockError, WorldClockService};

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("Calendar event not found: {0}")]
    NotFound(CalendarEventId),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),
}

pub struct CalendarService {
    events: Arc<dyn CalendarEventRepo>,
    clock_service: Arc<WorldClockService>,
    history: Arc<dyn HistoryPort>,
}

impl CalendarService {
    pub fn new(
        events: Arc<dyn CalendarEventRepo>,
        clock_service: Arc<WorldClockService>,
        history: Arc<dyn HistoryPort>,
    ) -> Self {
        Self {
            events,
            clock_service,
            history,
        }
    }

    pub async fn current_date(&self) -> Result<CalendarDate, CalendarError> {
        Ok(self.clock_service.current_date().await?)
    }

    pub async fn is_event_active(&self, event: &CalendarEvent) -> Result<bool, CalendarError> {
        Ok(event.is_active(&self.current_date().await?))
    }

    /// Events active right now.
    ///
    /// The faction filter only narrows faction-specific events. The region
    /// filter keeps events without regional variations plus those with a
    /// variation for the region.
    pub async fn active_events(
        &self,
        region: Option<&str>,
        faction: Option<&str>,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let date = self.current_date().await?;
        let events = self.events.list_all().await?;

        Ok(events
            .into_iter()
            .filter(|event| event.is_active(&date))
            .filter(|event| faction.map_or(true, |f| event.applies_to_faction(f)))
            .filter(|event| region.map_or(true, |r| event.applies_to_region(r)))
            .collect())
    }

    /// Events starting within the next `days_ahead` days, soonest year first.
    ///
    /// Recurring events match on day-of-year, wrapping past the end of the
    /// year. One-off events match when they fall in a later year, or in the
    /// window this year.
    pub async fn upcoming_events(&self, days_ahead: u32) -> Result<Vec<CalendarEvent>, CalendarError> {
        let snapshot = self.clock_service.snapshot().await?;
        let today = snapshot.clock.day_of_year();
        let year = snapshot.clock.year();
        let days_per_year = snapshot.settings.days_per_year;
        let horizon = today.saturating_add(days_ahead);

        let mut upcoming: Vec<CalendarEvent> = self
            .events
            .list_all()
            .await?
            .into_iter()
            .filter(|event| {
                let day = event.start.day;
                if event.is_recurring {
                    (today..=horizon).contains(&day)
                        || (horizon > days_per_year && day <= horizon - days_per_year)
                } else {
                    match event.start.year {
                        Some(y) if y > year => true,
                        Some(y) if y == year => (today..=horizon).contains(&day),
                        _ => false,
                    }
                }
            })
            .collect();

        upcoming.sort_by_key(|event| (event.start.year.unwrap_or(0), event.start.day));
        Ok(upcoming)
    }

    /// Name and description of an event as observed in `region`.
    pub async fn regional_variation(
        &self,
        id: CalendarEventId,
        region: &str,
    ) -> Result<(String, Option<String>), CalendarError> {
        let event = self
            .events
            .get(id)
            .await?
            .ok_or(CalendarError::NotFound(id))?;
        Ok(event.localized(region))
    }

    /// Returns the ids of events active now and records each one that was not
    /// in `previously_active`.
    pub async fn activation_sweep(
        &self,
        previously_active: &HashSet<CalendarEventId>,
    ) -> Result<HashSet<CalendarEventId>, CalendarError> {
        let date = self.current_date().await?;
        let active: Vec<CalendarEvent> = self
            .events
            .list_all()
            .await?
            .into_iter()
            .filter(|event| event.is_active(&date))
            .collect();

        for event in active.iter().filter(|e| !previously_active.contains(&e.id)) {
            tracing::info!(event_id = %event.id, name = %event.name, "Calendar event became active");
            if let Err(e) = self.history.record(activation_record(event, &date)).await {
                tracing::warn!(
                    event_id = %event.id,
                    error = %e,
                    "Failed to record calendar event in history"
                );
            }
        }

        Ok(active.into_iter().map(|event| event.id).collect())
    }
}

fn activation_record(event: &CalendarEvent, date: &CalendarDate) -> HistoryRecord {
    HistoryRecord {
        category: "event".to_string(),
        title: format!("{} - Active", event.name),
        description: format!("The calendar event '{}' is currently active.", event.name),
        narrative: format!(
            "Calendar Event: {}\nType: {:?}\nDescription: {}",
            event.name,
            event.event_type,
            event.description.as_deref().unwrap_or("N/A")
        ),
        impact: ImpactLevel::Minor,
        calendar_context: CalendarContext::from(date),
        regional_context: None,
        world_event_id: None,
        calendar_event_id: Some(event.id),
    }
}
