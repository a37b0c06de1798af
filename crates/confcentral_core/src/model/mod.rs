//! Domain model for conferences, sessions and attendee profiles.
//!
//! # Responsibility
//! - Define the entities persisted by the entity store.
//! - Map caller input (`*Draft`, `*Update`) onto entities explicitly, field by field.
//! - Parse externally supplied keys, dates and times into typed values.
//!
//! # Invariants
//! - Entity ids are v4 UUIDs allocated once and never reused.
//! - A malformed key is indistinguishable from a missing entity (`NotFound`).
//! - Labels (names, speakers, cities, topics) are trimmed with inner
//!   whitespace collapsed before they are stored or compared.

pub mod conference;
pub mod profile;
pub mod session;

use crate::error::{ConferenceError, ConferenceResult};
use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Stable conference identifier.
pub type ConferenceId = Uuid;
/// Stable session identifier. Sessions always carry their parent conference id.
pub type SessionId = Uuid;
/// Identity-provider user id; doubles as the profile id.
pub type UserId = String;

/// Kind of entity a key refers to, used in not-found messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Conference,
    Session,
}

impl KeyKind {
    fn label(self) -> &'static str {
        match self {
            Self::Conference => "conference",
            Self::Session => "session",
        }
    }
}

/// Parses an externally supplied entity key.
///
/// Malformed keys fail with `NotFound`, the same as keys of missing entities.
pub fn parse_key(kind: KeyKind, raw: &str) -> ConferenceResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| {
        ConferenceError::NotFound(format!("no {} found with key: {}", kind.label(), raw.trim()))
    })
}

/// Entity-level invariant violations detected before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValidationError {
    BlankName,
    DateRangeInverted { start: NaiveDate, end: NaiveDate },
    SeatsExceedCapacity { seats_available: u32, max_attendees: u32 },
    MonthOutOfRange(u32),
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name must not be blank"),
            Self::DateRangeInverted { start, end } => {
                write!(f, "end date {end} is earlier than start date {start}")
            }
            Self::SeatsExceedCapacity {
                seats_available,
                max_attendees,
            } => write!(
                f,
                "seats available {seats_available} exceed capacity {max_attendees}"
            ),
            Self::MonthOutOfRange(month) => write!(f, "month {month} is out of range"),
        }
    }
}

impl Error for EntityValidationError {}

/// Trims and collapses inner whitespace.
pub fn normalize_label(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}

/// Normalizes an optional label; blank input becomes `None`.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(normalize_label).filter(|value| !value.is_empty())
}

/// Parses `YYYY-MM-DD`, looking at the first 10 characters only.
pub fn parse_date(field: &str, raw: &str) -> ConferenceResult<NaiveDate> {
    let head: String = raw.trim().chars().take(10).collect();
    NaiveDate::parse_from_str(&head, "%Y-%m-%d").map_err(|_| {
        ConferenceError::Validation(format!("incorrect date format for `{field}`: `{raw}`"))
    })
}

/// Parses `HH:MM`, looking at the first 5 characters only.
pub fn parse_time(field: &str, raw: &str) -> ConferenceResult<NaiveTime> {
    let head: String = raw.trim().chars().take(5).collect();
    NaiveTime::parse_from_str(&head, "%H:%M").map_err(|_| {
        ConferenceError::Validation(format!("incorrect time format for `{field}`: `{raw}`"))
    })
}

#[cfg(test)]
mod tests {
    use super::{normalize_label, parse_date, parse_key, parse_time, KeyKind};
    use crate::error::ConferenceError;

    #[test]
    fn malformed_key_is_not_found() {
        let err = parse_key(KeyKind::Session, "not-a-key").unwrap_err();
        assert!(matches!(err, ConferenceError::NotFound(message) if message.contains("session")));
    }

    #[test]
    fn dates_and_times_only_read_their_prefix() {
        let date = parse_date("startDate", "2026-06-01T09:00:00Z").unwrap();
        assert_eq!(date.to_string(), "2026-06-01");
        let time = parse_time("startTime", "18:45:10").unwrap();
        assert_eq!(time.format("%H:%M").to_string(), "18:45");
    }

    #[test]
    fn bad_time_is_validation_error() {
        let err = parse_time("startTime", "7pm").unwrap_err();
        assert!(matches!(err, ConferenceError::Validation(_)));
    }

    #[test]
    fn labels_collapse_whitespace() {
        assert_eq!(normalize_label("  Ada \t  Lovelace \n"), "Ada Lovelace");
    }
}
