//! Conference entity and its input mappings.
//!
//! # Invariants
//! - `0 <= seats_available <= max_attendees`.
//! - `month` mirrors `start_date` (0 when no start date is set).
//! - `end_date` is not earlier than `start_date` when both are set.

use super::{non_blank, normalize_label, parse_date, ConferenceId, EntityValidationError, UserId};
use crate::error::{ConferenceError, ConferenceResult};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CITY: &str = "Default City";
pub const DEFAULT_TOPICS: [&str; 2] = ["Default", "Topic"];

/// Capacity-limited event owned by its organizer's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conference {
    pub id: ConferenceId,
    /// Parent profile; only this user may update the conference or add sessions.
    pub organizer_user_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub city: String,
    /// Distinct, normalized topics in ascending order.
    pub topics: Vec<String>,
    pub month: u32,
    pub max_attendees: u32,
    pub seats_available: u32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Caller input for conference creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConferenceDraft {
    pub name: String,
    pub description: Option<String>,
    pub city: Option<String>,
    pub topics: Vec<String>,
    pub max_attendees: Option<u32>,
    /// `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`.
    pub end_date: Option<String>,
}

/// Organizer edit; only `Some` (and non-blank) fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConferenceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub city: Option<String>,
    pub topics: Option<Vec<String>>,
    pub max_attendees: Option<u32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl Conference {
    /// Builds a new conference from a creation draft.
    ///
    /// Missing city/topics/capacity fall back to defaults and every seat starts
    /// available.
    pub fn from_draft(
        id: ConferenceId,
        organizer_user_id: impl Into<UserId>,
        draft: &ConferenceDraft,
    ) -> ConferenceResult<Self> {
        let name = normalize_label(&draft.name);
        if name.is_empty() {
            return Err(ConferenceError::Validation(
                "conference `name` field required".to_string(),
            ));
        }

        let topics = match normalize_topics(&draft.topics) {
            topics if topics.is_empty() => DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
            topics => topics,
        };
        let start_date = draft
            .start_date
            .as_deref()
            .map(|raw| parse_date("startDate", raw))
            .transpose()?;
        let end_date = draft
            .end_date
            .as_deref()
            .map(|raw| parse_date("endDate", raw))
            .transpose()?;
        let max_attendees = draft.max_attendees.unwrap_or(0);

        let conference = Self {
            id,
            organizer_user_id: organizer_user_id.into(),
            name,
            description: non_blank(draft.description.as_deref()),
            city: non_blank(draft.city.as_deref()).unwrap_or_else(|| DEFAULT_CITY.to_string()),
            topics,
            month: month_of(start_date),
            max_attendees,
            seats_available: max_attendees,
            start_date,
            end_date,
        };
        conference
            .validate()
            .map_err(|err| ConferenceError::Validation(err.to_string()))?;
        Ok(conference)
    }

    /// Applies an organizer update in place.
    ///
    /// A capacity change keeps the number of registered attendees fixed: seats
    /// are recomputed from it, and shrinking below it is a conflict.
    pub fn apply_update(&mut self, update: &ConferenceUpdate) -> ConferenceResult<()> {
        if let Some(name) = non_blank(update.name.as_deref()) {
            self.name = name;
        }
        if let Some(description) = non_blank(update.description.as_deref()) {
            self.description = Some(description);
        }
        if let Some(city) = non_blank(update.city.as_deref()) {
            self.city = city;
        }
        if let Some(topics) = update.topics.as_ref() {
            let topics = normalize_topics(topics);
            if !topics.is_empty() {
                self.topics = topics;
            }
        }
        if let Some(raw) = update.start_date.as_deref().filter(|raw| !raw.trim().is_empty()) {
            let start = parse_date("startDate", raw)?;
            self.start_date = Some(start);
            self.month = start.month();
        }
        if let Some(raw) = update.end_date.as_deref().filter(|raw| !raw.trim().is_empty()) {
            self.end_date = Some(parse_date("endDate", raw)?);
        }
        if let Some(max_attendees) = update.max_attendees {
            let registered = self.registered_count();
            if max_attendees < registered {
                return Err(ConferenceError::Conflict(format!(
                    "capacity {max_attendees} is below the {registered} current registrations"
                )));
            }
            self.max_attendees = max_attendees;
            self.seats_available = max_attendees - registered;
        }

        self.validate()
            .map_err(|err| ConferenceError::Validation(err.to_string()))
    }

    /// Seats currently taken.
    pub fn registered_count(&self) -> u32 {
        self.max_attendees.saturating_sub(self.seats_available)
    }

    /// Checks entity invariants.
    pub fn validate(&self) -> Result<(), EntityValidationError> {
        if self.name.trim().is_empty() {
            return Err(EntityValidationError::BlankName);
        }
        if self.seats_available > self.max_attendees {
            return Err(EntityValidationError::SeatsExceedCapacity {
                seats_available: self.seats_available,
                max_attendees: self.max_attendees,
            });
        }
        if self.month > 12 {
            return Err(EntityValidationError::MonthOutOfRange(self.month));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(EntityValidationError::DateRangeInverted { start, end });
            }
        }
        Ok(())
    }
}

fn month_of(start_date: Option<NaiveDate>) -> u32 {
    start_date.map_or(0, |date| date.month())
}

fn normalize_topics(topics: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = topics
        .iter()
        .map(|topic| normalize_label(topic))
        .filter(|topic| !topic.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}
