//! Session entity and its creation mapping.
//!
//! # Invariants
//! - A session always belongs to exactly one conference.
//! - `wish_list_count` equals the number of profiles wishlisting the session;
//!   only the wishlist ledger changes it.

use super::conference::Conference;
use super::{non_blank, normalize_label, parse_date, parse_time, ConferenceId, SessionId};
use crate::error::{ConferenceError, ConferenceResult};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SPEAKER: &str = "unassigned";
pub const DEFAULT_HIGHLIGHTS: &str = "None";
pub const DEFAULT_SESSION_TYPE: &str = "Default";
pub const DEFAULT_DURATION_MINUTES: u32 = 15;
pub const DEFAULT_START_TIME: &str = "08:00";

/// A talk scheduled under a conference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub conference_id: ConferenceId,
    pub name: String,
    pub highlights: String,
    pub speaker: String,
    pub session_type: String,
    pub date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    pub wish_list_count: u32,
}

/// Caller input for session creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDraft {
    pub name: String,
    pub highlights: Option<String>,
    pub speaker: Option<String>,
    pub session_type: Option<String>,
    /// `YYYY-MM-DD`; defaults to the conference start date.
    pub date: Option<String>,
    /// `HH:MM`; defaults to 08:00.
    pub start_time: Option<String>,
    pub duration_minutes: Option<u32>,
}

impl Session {
    /// Builds a new session under `conference` with a zero wishlist count.
    pub fn from_draft(
        id: SessionId,
        conference: &Conference,
        draft: &SessionDraft,
    ) -> ConferenceResult<Self> {
        let name = normalize_label(&draft.name);
        if name.is_empty() {
            return Err(ConferenceError::Validation(
                "session `name` field required".to_string(),
            ));
        }

        let date = match draft.date.as_deref().filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => Some(parse_date("date", raw)?),
            None => conference.start_date,
        };
        let start_time = parse_time(
            "startTime",
            draft
                .start_time
                .as_deref()
                .filter(|raw| !raw.trim().is_empty())
                .unwrap_or(DEFAULT_START_TIME),
        )?;

        Ok(Self {
            id,
            conference_id: conference.id,
            name,
            highlights: non_blank(draft.highlights.as_deref())
                .unwrap_or_else(|| DEFAULT_HIGHLIGHTS.to_string()),
            speaker: non_blank(draft.speaker.as_deref())
                .unwrap_or_else(|| DEFAULT_SPEAKER.to_string()),
            session_type: non_blank(draft.session_type.as_deref())
                .unwrap_or_else(|| DEFAULT_SESSION_TYPE.to_string()),
            date,
            start_time,
            duration_minutes: draft.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
            wish_list_count: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Session, SessionDraft, DEFAULT_SPEAKER};
    use crate::error::ConferenceError;
    use crate::model::conference::{Conference, ConferenceDraft};
    use uuid::Uuid;

    fn conference() -> Conference {
        let draft = ConferenceDraft {
            name: "RustConf".to_string(),
            start_date: Some("2026-09-01".to_string()),
            ..ConferenceDraft::default()
        };
        Conference::from_draft(Uuid::new_v4(), "org", &draft).unwrap()
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let conference = conference();
        let draft = SessionDraft {
            name: "Keynote".to_string(),
            ..SessionDraft::default()
        };
        let session = Session::from_draft(Uuid::new_v4(), &conference, &draft).unwrap();
        assert_eq!(session.speaker, DEFAULT_SPEAKER);
        assert_eq!(session.date, conference.start_date);
        assert_eq!(session.start_time.format("%H:%M").to_string(), "08:00");
        assert_eq!(session.duration_minutes, 15);
        assert_eq!(session.wish_list_count, 0);
    }

    #[test]
    fn unparsable_date_is_validation_error() {
        let draft = SessionDraft {
            name: "Keynote".to_string(),
            date: Some("next tuesday".to_string()),
            ..SessionDraft::default()
        };
        let err = Session::from_draft(Uuid::new_v4(), &conference(), &draft).unwrap_err();
        assert!(matches!(err, ConferenceError::Validation(_)));
    }
}
