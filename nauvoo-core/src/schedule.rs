//! Daily routines and the resolver that places characters in time.
//!
//! Resolution order for a character is: installed event override, then the
//! seasonal override for the current season, then the daily routine. Within the
//! chosen list the first activity whose `[start, end)` contains the minute wins,
//! and the last entry doubles as the sleep/idle fallback.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::character::Character;
use crate::clock::{Season, SimTime, format_minute_of_day};
use crate::constants::MINUTES_PER_DAY;
use crate::error::ContentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Work,
    Rest,
    Socialize,
    Pray,
    Eat,
    Travel,
    GuardDuty,
    Training,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub start_minute: u32,
    pub end_minute: u32,
    pub location_id: String,
    pub kind: ActivityKind,
    #[serde(default = "default_interruptible")]
    pub interruptible: bool,
    /// Characters expected to share this activity.
    #[serde(default)]
    pub companions: Vec<String>,
}

const fn default_interruptible() -> bool {
    true
}

impl Activity {
    #[must_use]
    pub fn new(start_minute: u32, end_minute: u32, location_id: &str, kind: ActivityKind) -> Self {
        Self {
            start_minute,
            end_minute,
            location_id: location_id.to_string(),
            kind,
            interruptible: true,
            companions: Vec::new(),
        }
    }

    #[must_use]
    pub fn uninterruptible(mut self) -> Self {
        self.interruptible = false;
        self
    }

    #[must_use]
    pub fn with_companions(mut self, companions: &[&str]) -> Self {
        self.companions = companions.iter().map(|id| (*id).to_string()).collect();
        self
    }

    #[must_use]
    pub const fn contains(&self, minute: u32) -> bool {
        minute >= self.start_minute && minute < self.end_minute
    }
}

/// Temporary routine installed by an external event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOverride {
    pub event_id: String,
    pub activities: Vec<Activity>,
}

/// Which list an activity was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleSource {
    Event,
    Seasonal,
    Routine,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schedule {
    pub character_id: String,
    #[serde(default)]
    pub daily_routine: Vec<Activity>,
    #[serde(default)]
    pub seasonal_overrides: BTreeMap<Season, Vec<Activity>>,
    #[serde(default)]
    pub event_override: Option<EventOverride>,
}

impl Schedule {
    #[must_use]
    pub fn new(character_id: impl Into<String>, daily_routine: Vec<Activity>) -> Self {
        Self {
            character_id: character_id.into(),
            daily_routine,
            seasonal_overrides: BTreeMap::new(),
            event_override: None,
        }
    }

    #[must_use]
    pub fn with_season(mut self, season: Season, activities: Vec<Activity>) -> Self {
        self.seasonal_overrides.insert(season, activities);
        self
    }

    /// The list that governs `season`, with where it came from.
    #[must_use]
    pub fn active_list(&self, season: Season) -> (&[Activity], ScheduleSource) {
        if let Some(event) = &self.event_override {
            return (&event.activities, ScheduleSource::Event);
        }
        if let Some(seasonal) = self.seasonal_overrides.get(&season) {
            return (seasonal, ScheduleSource::Seasonal);
        }
        (&self.daily_routine, ScheduleSource::Routine)
    }

    /// Activity for `time`, or `None` when the governing list is empty.
    #[must_use]
    pub fn resolve(&self, time: &SimTime) -> Option<&Activity> {
        let (activities, _) = self.active_list(time.season());
        find_activity(activities, time.minute)
    }

    /// Check ordering and bounds of every list in the schedule.
    ///
    /// # Errors
    ///
    /// Returns the first structural violation found.
    pub fn validate(&self) -> Result<(), ContentError> {
        validate_activities(&self.character_id, &self.daily_routine)?;
        for activities in self.seasonal_overrides.values() {
            validate_activities(&self.character_id, activities)?;
        }
        if let Some(event) = &self.event_override {
            validate_activities(&self.character_id, &event.activities)?;
        }
        Ok(())
    }

    /// Debug table of the daily routine, one `HH:MM - HH:MM: location` line per activity.
    #[must_use]
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        for activity in &self.daily_routine {
            let _ = writeln!(
                out,
                "{} - {}: {}",
                format_minute_of_day(activity.start_minute),
                format_minute_of_day(activity.end_minute),
                activity.location_id
            );
        }
        out
    }
}

/// First activity containing `minute`, else the last entry, else `None`.
#[must_use]
pub fn find_activity(activities: &[Activity], minute: u32) -> Option<&Activity> {
    activities
        .iter()
        .find(|activity| activity.contains(minute))
        .or_else(|| activities.last())
}

fn validate_activities(character: &str, activities: &[Activity]) -> Result<(), ContentError> {
    let mut previous_end = 0;
    for (index, activity) in activities.iter().enumerate() {
        if activity.start_minute >= activity.end_minute || activity.end_minute > MINUTES_PER_DAY {
            return Err(ContentError::ActivityBounds {
                character: character.to_string(),
                index,
                start: activity.start_minute,
                end: activity.end_minute,
            });
        }
        if index > 0 && activity.start_minute < previous_end {
            return Err(ContentError::ActivityOrder {
                character: character.to_string(),
                index,
            });
        }
        previous_end = activity.end_minute;
    }
    Ok(())
}

/// All schedules in the world, keyed by character id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleBook {
    schedules: BTreeMap<String, Schedule>,
}

impl ScheduleBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the schedule for its character.
    pub fn insert(&mut self, schedule: Schedule) {
        self.schedules.insert(schedule.character_id.clone(), schedule);
    }

    #[must_use]
    pub fn get(&self, character_id: &str) -> Option<&Schedule> {
        self.schedules.get(character_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Schedule> {
        self.schedules.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }

    /// Install an event override for a character, replacing any previous one.
    ///
    /// Returns false when the character has no schedule; one is created in that case so the
    /// override still governs them.
    pub fn set_event_override(&mut self, character_id: &str, event: EventOverride) -> bool {
        let existed = self.schedules.contains_key(character_id);
        let schedule = self
            .schedules
            .entry(character_id.to_string())
            .or_insert_with(|| Schedule::new(character_id, Vec::new()));
        schedule.event_override = Some(event);
        existed
    }

    /// Remove a character's event override, returning it when one was installed.
    pub fn clear_event_override(&mut self, character_id: &str) -> Option<EventOverride> {
        self.schedules
            .get_mut(character_id)
            .and_then(|schedule| schedule.event_override.take())
    }

    /// Remove every override installed for `event_id`; returns the affected character ids.
    pub fn clear_overrides_for_event(&mut self, event_id: &str) -> Vec<String> {
        let mut cleared = Vec::new();
        for schedule in self.schedules.values_mut() {
            if schedule
                .event_override
                .as_ref()
                .is_some_and(|event| event.event_id == event_id)
            {
                schedule.event_override = None;
                cleared.push(schedule.character_id.clone());
            }
        }
        cleared
    }

    /// Validate every schedule.
    ///
    /// # Errors
    ///
    /// Returns the first structural violation found.
    pub fn validate(&self) -> Result<(), ContentError> {
        self.schedules.values().try_for_each(Schedule::validate)
    }
}

/// A character whose resolved activity changed during [`update_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityChange {
    pub character_id: String,
    pub previous: Option<Activity>,
    pub current: Option<Activity>,
}

/// Resolve the activity `character_id` should be doing at `time`.
#[must_use]
pub fn resolve_activity(book: &ScheduleBook, character_id: &str, time: &SimTime) -> Option<Activity> {
    book.get(character_id)
        .and_then(|schedule| schedule.resolve(time))
        .cloned()
}

/// Re-resolve every living character. Dead characters are left without an activity.
pub fn update_all(
    book: &ScheduleBook,
    time: &SimTime,
    characters: &mut [Character],
) -> SmallVec<[ActivityChange; 4]> {
    let mut changes = SmallVec::new();
    for character in characters.iter_mut() {
        let next = if character.is_alive() {
            resolve_activity(book, &character.id, time)
        } else {
            None
        };
        if next != character.current_activity {
            let previous = std::mem::replace(&mut character.current_activity, next.clone());
            changes.push(ActivityChange {
                character_id: character.id.clone(),
                previous,
                current: next,
            });
        }
    }
    changes
}

/// Whether a living character's schedule places them at `location_id` at `time`.
#[must_use]
pub fn is_at(book: &ScheduleBook, character: &Character, location_id: &str, time: &SimTime) -> bool {
    character.is_alive()
        && book
            .get(&character.id)
            .and_then(|schedule| schedule.resolve(time))
            .is_some_and(|activity| activity.location_id == location_id)
}

/// Ids of every living character scheduled at `location_id` at `time`.
#[must_use]
pub fn characters_at(
    book: &ScheduleBook,
    location_id: &str,
    time: &SimTime,
    characters: &[Character],
) -> Vec<String> {
    characters
        .iter()
        .filter(|character| is_at(book, character, location_id, time))
        .map(|character| character.id.clone())
        .collect()
}
