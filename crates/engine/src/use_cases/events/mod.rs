//! World event scheduling.
//!
//! Drives world events through PLANNED → ACTIVE → COMPLETED by evaluating
//! their condition lists against the live calendar and the wall clock. Pause,
//! resume and cancel are manual transitions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chronicle_domain::{
    evaluate_all, CalendarDate, ConditionError, ConditionRole, DomainError, EventCondition,
    EventStatus, ImpactLevel, StatusChange, WorldEvent, WorldEventId,
};

use crate::infrastructure::ports::{
    CalendarContext, ClockPort, HistoryPort, HistoryRecord, RepoError, WorldEventRepo,
};
use crate::use_cases::world_clock::{ClockError, WorldClockService};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("World event not found: {0}")]
    NotFound(WorldEventId),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Condition(#[from] ConditionError),
}

/// Outcome of one scheduling pass.
#[derive(Debug, Default)]
pub struct ProcessReport {
    pub started: Vec<WorldEventId>,
    pub completed: Vec<WorldEventId>,
    /// Events whose conditions could not be evaluated, left untouched
    pub unevaluable: Vec<(WorldEventId, ConditionError)>,
    /// Events whose transition could not be saved
    pub failed: Vec<WorldEventId>,
}

impl ProcessReport {
    /// Every event that changed status in this pass.
    pub fn changed(&self) -> Vec<WorldEventId> {
        self.started
            .iter()
            .chain(self.completed.iter())
            .copied()
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.unevaluable.is_empty() && self.failed.is_empty()
    }
}

pub struct EventScheduler {
    events: Arc<dyn WorldEventRepo>,
    clock_service: Arc<WorldClockService>,
    history: Arc<dyn HistoryPort>,
    clock: Arc<dyn ClockPort>,
}

impl EventScheduler {
    pub fn new(
        events: Arc<dyn WorldEventRepo>,
        clock_service: Arc<WorldClockService>,
        history: Arc<dyn HistoryPort>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            events,
            clock_service,
            history,
            clock,
        }
    }

    /// Whether every condition holds right now.
    pub async fn evaluate(
        &self,
        conditions: &[EventCondition],
        role: ConditionRole,
    ) -> Result<bool, SchedulerError> {
        let date = self.clock_service.current_date().await?;
        Ok(evaluate_all(conditions, role, &date, self.clock.now())?)
    }

    /// Whether the event's start and end conditions currently hold.
    pub async fn check_event_conditions(
        &self,
        event: &WorldEvent,
    ) -> Result<(bool, bool), SchedulerError> {
        let date = self.clock_service.current_date().await?;
        let now = self.clock.now();
        let start_met = evaluate_all(&event.start_conditions, ConditionRole::Start, &date, now)?;
        let end_met = evaluate_all(&event.end_conditions, ConditionRole::End, &date, now)?;
        Ok((start_met, end_met))
    }

    /// Manual status change (pause, resume, cancel, or forcing a start/end).
    pub async fn transition(
        &self,
        id: WorldEventId,
        status: EventStatus,
    ) -> Result<WorldEvent, SchedulerError> {
        let mut event = self
            .events
            .get(id)
            .await?
            .ok_or(SchedulerError::NotFound(id))?;

        let change = event.transition_to(status, self.clock.now())?;
        self.events.save(&event).await?;
        tracing::info!(
            event_id = %id,
            from = %change.from,
            to = %change.to,
            "World event status changed"
        );

        if change.history_action().is_some() {
            match self.clock_service.current_date().await {
                Ok(date) => self.record_history(&event, change, &date).await,
                Err(e) => tracing::warn!(
                    event_id = %id,
                    error = %e,
                    "Could not read the calendar for the history record"
                ),
            }
        }
        Ok(event)
    }

    /// One scheduling pass.
    ///
    /// Both status lists are read before anything changes, so an event
    /// started in this pass is not also completed in it. An event that cannot
    /// be evaluated or saved is reported and the pass moves on.
    pub async fn process_all(&self) -> Result<ProcessReport, SchedulerError> {
        let date = self.clock_service.current_date().await?;
        let now = self.clock.now();
        let planned = self.events.list_by_status(EventStatus::Planned).await?;
        let active = self.events.list_by_status(EventStatus::Active).await?;

        let mut report = ProcessReport::default();

        for event in planned {
            let id = event.id;
            match evaluate_all(&event.start_conditions, ConditionRole::Start, &date, now) {
                Ok(true) => {
                    if self.apply(event, EventStatus::Active, &date, now).await {
                        report.started.push(id);
                    } else {
                        report.failed.push(id);
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(event_id = %id, error = %e, "Skipping world event start check");
                    report.unevaluable.push((id, e));
                }
            }
        }

        for event in active {
            let id = event.id;
            match evaluate_all(&event.end_conditions, ConditionRole::End, &date, now) {
                Ok(true) => {
                    if self.apply(event, EventStatus::Completed, &date, now).await {
                        report.completed.push(id);
                    } else {
                        report.failed.push(id);
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(event_id = %id, error = %e, "Skipping world event end check");
                    report.unevaluable.push((id, e));
                }
            }
        }

        if !report.started.is_empty() || !report.completed.is_empty() {
            tracing::info!(
                started = report.started.len(),
                completed = report.completed.len(),
                "World events processed"
            );
        }
        Ok(report)
    }

    /// Transitions and saves one event. Returns whether the change was stored.
    async fn apply(
        &self,
        mut event: WorldEvent,
        next: EventStatus,
        date: &CalendarDate,
        now: DateTime<Utc>,
    ) -> bool {
        let change = match event.transition_to(next, now) {
            Ok(change) => change,
            Err(e) => {
                tracing::warn!(event_id = %event.id, error = %e, "Rejected world event transition");
                return false;
            }
        };

        if let Err(e) = self.events.save(&event).await {
            tracing::error!(event_id = %event.id, error = %e, "Failed to save world event");
            return false;
        }
        tracing::info!(
            event_id = %event.id,
            title = %event.title,
            status = %next,
            "World event status changed"
        );

        self.record_history(&event, change, date).await;
        true
    }

    /// Writes the history record for a start or completion. Failures are
    /// logged; the transition stands.
    async fn record_history(&self, event: &WorldEvent, change: StatusChange, date: &CalendarDate) {
        let Some(action) = change.history_action() else {
            return;
        };
        if let Err(e) = self.history.record(history_record(event, action, date)).await {
            tracing::warn!(
                event_id = %event.id,
                error = %e,
                "Failed to record world event in history"
            );
        }
    }
}

fn history_record(event: &WorldEvent, action: &str, date: &CalendarDate) -> HistoryRecord {
    let description = event.description.as_deref().unwrap_or_default();
    HistoryRecord {
        category: "event".to_string(),
        title: format!("{} - {}", event.title, capitalized(action)),
        description: format!("The event '{}' has {}.", event.title, action),
        narrative: format!(
            "Event: {}\nDescription: {}\nStatus: {}",
            event.title,
            description,
            event.status()
        ),
        impact: event.impact.unwrap_or(ImpactLevel::Moderate),
        calendar_context: CalendarContext::from(date),
        regional_context: (!event.regional_scope.is_global())
            .then(|| event.regional_scope.clone()),
        world_event_id: Some(event.id),
        calendar_event_id: None,
    }
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
