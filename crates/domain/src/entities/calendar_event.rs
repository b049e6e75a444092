//! CalendarEvent entity - Holidays, festivals and other dated observances

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game_time::CalendarDate;
use crate::CalendarEventId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalendarEventType {
    Holiday,
    Festival,
    Observance,
    FactionCelebration,
    Custom,
}

/// One end of a calendar event window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarMark {
    /// `None` on a recurring event means every year
    #[serde(default)]
    pub year: Option<u32>,
    /// Day of the year (1-based)
    pub day: u32,
    /// On the start mark, defaults to the first hour; on the end mark, to the
    /// last hour. Both bounds are inclusive.
    #[serde(default)]
    pub hour: Option<u32>,
}

impl CalendarMark {
    pub fn day(day: u32) -> Self {
        Self {
            year: None,
            day,
            hour: None,
        }
    }

    pub fn at_hour(mut self, hour: u32) -> Self {
        self.hour = Some(hour);
        self
    }

    pub fn in_year(mut self, year: u32) -> Self {
        self.year = Some(year);
        self
    }
}

/// Regional override of an event's name and description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionalVariation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: CalendarEventId,
    pub name: String,
    pub event_type: CalendarEventType,
    pub description: Option<String>,
    pub start: CalendarMark,
    pub end: CalendarMark,
    #[serde(default = "default_recurring")]
    pub is_recurring: bool,
    /// Keyed by region name
    #[serde(default)]
    pub regional_variations: BTreeMap<String, RegionalVariation>,
    #[serde(default)]
    pub faction_specific: bool,
    #[serde(default)]
    pub affected_factions: Vec<String>,
    #[serde(default)]
    pub seasonal: bool,
}

fn default_recurring() -> bool {
    true
}

impl CalendarEvent {
    /// Create a new yearly recurring event spanning `start..=end`
    pub fn new(
        name: impl Into<String>,
        event_type: CalendarEventType,
        start: CalendarMark,
        end: CalendarMark,
    ) -> Self {
        Self {
            id: CalendarEventId::new(),
            name: name.into(),
            event_type,
            description: None,
            start,
            end,
            is_recurring: true,
            regional_variations: BTreeMap::new(),
            faction_specific: false,
            affected_factions: Vec::new(),
            seasonal: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn one_off(mut self) -> Self {
        self.is_recurring = false;
        self
    }

    pub fn with_variation(mut self, region: impl Into<String>, variation: RegionalVariation) -> Self {
        self.regional_variations.insert(region.into(), variation);
        self
    }

    pub fn for_factions(mut self, factions: Vec<String>) -> Self {
        self.faction_specific = true;
        self.affected_factions = factions;
        self
    }

    /// Whether the event's window contains `date`.
    ///
    /// Recurring events may pin a year; non-recurring events must. Hour bounds
    /// only apply on the first and last day of the window.
    pub fn is_active(&self, date: &CalendarDate) -> bool {
        match (self.is_recurring, self.start.year) {
            (_, Some(year)) if year != date.year => return false,
            (false, None) => return false,
            _ => {}
        }

        let day = date.day_of_year;
        if day < self.start.day || day > self.end.day {
            return false;
        }
        if day == self.start.day && date.hour < self.start.hour.unwrap_or(0) {
            return false;
        }
        if day == self.end.day {
            if let Some(end_hour) = self.end.hour {
                if date.hour > end_hour {
                    return false;
                }
            }
        }
        true
    }

    /// Whether the event is relevant to a faction. Events that are not
    /// faction-specific apply to everyone.
    pub fn applies_to_faction(&self, faction: &str) -> bool {
        !self.faction_specific
            || self
                .affected_factions
                .iter()
                .any(|f| f.eq_ignore_ascii_case(faction))
    }

    /// Whether the event is relevant to a region. Events without regional
    /// variations are observed everywhere.
    pub fn applies_to_region(&self, region: &str) -> bool {
        self.regional_variations.is_empty() || self.variation_for(region).is_some()
    }

    pub fn variation_for(&self, region: &str) -> Option<&RegionalVariation> {
        self.regional_variations
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(region))
            .map(|(_, variation)| variation)
    }

    /// Name and description as observed in `region`, falling back to the
    /// event's own.
    pub fn localized(&self, region: &str) -> (String, Option<String>) {
        let variation = self.variation_for(region);
        let name = variation
            .and_then(|v| v.name.clone())
            .unwrap_or_else(|| self.name.clone());
        let description = variation
            .and_then(|v| v.description.clone())
            .or_else(|| self.description.clone());
        (name, description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar_math;
    use crate::game_time::{CalendarPosition, ClockSettings};
    use crate::value_objects::CalendarConfig;

    fn date(year: u32, day_of_year: u32, hour: u32) -> CalendarDate {
        calendar_math::derive(
            &ClockSettings::default(),
            &CalendarConfig::default(),
            CalendarPosition {
                year,
                day_of_year,
                hour,
                minute: 0,
            },
        )
    }

    fn market_day() -> CalendarEvent {
        CalendarEvent::new(
            "Market Day",
            CalendarEventType::Observance,
            CalendarMark::day(10).at_hour(5),
            CalendarMark::day(10).at_hour(20),
        )
    }

    #[test]
    fn single_day_window_respects_hours() {
        let event = market_day();
        assert!(event.is_active(&date(1, 10, 12)));
        assert!(event.is_active(&date(7, 10, 5)));
        assert!(event.is_active(&date(7, 10, 20)));
        assert!(!event.is_active(&date(1, 10, 4)));
        assert!(!event.is_active(&date(1, 10, 21)));
        assert!(!event.is_active(&date(1, 11, 12)));
    }

    #[test]
    fn multi_day_window_only_bounds_hours_at_the_edges() {
        let event = CalendarEvent::new(
            "Harvest Fair",
            CalendarEventType::Festival,
            CalendarMark::day(200).at_hour(12),
            CalendarMark::day(203).at_hour(6),
        );
        assert!(!event.is_active(&date(1, 200, 11)));
        assert!(event.is_active(&date(1, 200, 12)));
        assert!(event.is_active(&date(1, 201, 0)));
        assert!(event.is_active(&date(1, 202, 29)));
        assert!(event.is_active(&date(1, 203, 6)));
        assert!(!event.is_active(&date(1, 203, 7)));
    }

    #[test]
    fn end_hour_defaults_to_end_of_day() {
        let event = CalendarEvent::new(
            "Vigil",
            CalendarEventType::Observance,
            CalendarMark::day(50),
            CalendarMark::day(50),
        );
        assert!(event.is_active(&date(1, 50, 0)));
        assert!(event.is_active(&date(1, 50, 29)));
    }

    #[test]
    fn recurring_event_can_pin_a_year() {
        let event = CalendarEvent::new(
            "Jubilee",
            CalendarEventType::Holiday,
            CalendarMark::day(10).in_year(3),
            CalendarMark::day(12),
        );
        assert!(event.is_active(&date(3, 11, 0)));
        assert!(!event.is_active(&date(4, 11, 0)));
    }

    #[test]
    fn one_off_event_needs_matching_year() {
        let unpinned = market_day().one_off();
        assert!(!unpinned.is_active(&date(1, 10, 12)));

        let mut pinned = market_day().one_off();
        pinned.start = pinned.start.in_year(2);
        assert!(pinned.is_active(&date(2, 10, 12)));
        assert!(!pinned.is_active(&date(3, 10, 12)));
    }

    #[test]
    fn regional_variation_falls_back_to_event_text() {
        let event = market_day()
            .with_description("Stalls line the main street")
            .with_variation(
                "Harbor",
                RegionalVariation {
                    name: Some("Fish Market".into()),
                    description: None,
                },
            );

        assert!(event.applies_to_region("harbor"));
        assert!(!event.applies_to_region("Uplands"));
        assert_eq!(
            event.localized("HARBOR"),
            (
                "Fish Market".to_string(),
                Some("Stalls line the main street".to_string())
            )
        );
        assert_eq!(event.localized("Uplands").0, "Market Day");
    }

    #[test]
    fn faction_filter_only_applies_to_faction_events() {
        let open = market_day();
        assert!(open.applies_to_faction("Anyone"));

        let guild = market_day().for_factions(vec!["Weavers".into()]);
        assert!(guild.applies_to_faction("weavers"));
        assert!(!guild.applies_to_faction("Smiths"));
    }
}
