mod calendar_event;
mod character_cooldown;
mod event_condition;
mod world_event;

pub use calendar_event::{CalendarEvent, CalendarEventType, CalendarMark, RegionalVariation};
pub use character_cooldown::{CharacterCooldown, CooldownKey, CooldownKind};
pub use event_condition::{evaluate_all, ConditionError, ConditionRole, EventCondition};
pub use world_event::{
    EventStatus, ImpactLevel, RegionalScope, StatusChange, WorldEvent, WorldEventType,
};
