//! Seat accounting between profiles and conferences.
//!
//! # Invariants
//! - `max_attendees - seats_available` equals the number of roster entries for
//!   the conference after every committed operation.
//! - Unregistering an absent entry is a no-op that reports `false`.
//! - A seat counter already at capacity while a roster entry exists is drift,
//!   reported as invalid persisted data rather than clamped.

use super::ensure_profile;
use crate::db::{run_immediate, Database};
use crate::error::{ConferenceError, ConferenceResult};
use crate::model::ConferenceId;
use crate::repo::RepoError;
use crate::repo::conference_repo::{ConferenceRepository, SqliteConferenceRepository};
use crate::repo::profile_repo::{ProfileRepository, SqliteProfileRepository};
use log::info;

/// Registration ledger over one store handle.
#[derive(Clone)]
pub struct RegistrationLedger {
    db: Database,
}

impl RegistrationLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Takes one seat for `user_id`.
    ///
    /// # Errors
    /// - `NotFound` for an unknown conference or profile.
    /// - `Conflict` when already registered or no seat is left.
    pub fn register(&self, user_id: &str, conference_id: ConferenceId) -> ConferenceResult<()> {
        let attempts = self.db.transaction_attempts();
        let seats_left = self.db.with_conn(|conn| {
            run_immediate::<_, ConferenceError, _>(conn, attempts, |tx| {
                let conferences = SqliteConferenceRepository::new(tx);
                let profiles = SqliteProfileRepository::new(tx);
                ensure_profile(&profiles, user_id)?;

                let conference = conferences
                    .get_conference(conference_id)?
                    .ok_or_else(|| not_found(conference_id))?;
                if profiles.is_registered(user_id, conference_id)? {
                    return Err(ConferenceError::Conflict(
                        "you have already registered for this conference".to_string(),
                    ));
                }
                if conference.seats_available == 0 {
                    return Err(ConferenceError::Conflict(
                        "there are no seats available".to_string(),
                    ));
                }

                let seats_left = conference.seats_available - 1;
                profiles.add_registration(user_id, conference_id)?;
                conferences.set_seats_available(conference_id, seats_left)?;
                Ok(seats_left)
            })
        })?;

        info!(
            "event=conference_register module=ledger status=ok conference_id={conference_id} seats_available={seats_left}"
        );
        Ok(())
    }

    /// Releases the seat held by `user_id`, if any.
    ///
    /// Returns `false` without touching the store when the user is not on the
    /// roster.
    pub fn unregister(&self, user_id: &str, conference_id: ConferenceId) -> ConferenceResult<bool> {
        let attempts = self.db.transaction_attempts();
        let released = self.db.with_conn(|conn| {
            run_immediate::<_, ConferenceError, _>(conn, attempts, |tx| {
                let conferences = SqliteConferenceRepository::new(tx);
                let profiles = SqliteProfileRepository::new(tx);
                ensure_profile(&profiles, user_id)?;

                let conference = conferences
                    .get_conference(conference_id)?
                    .ok_or_else(|| not_found(conference_id))?;
                if !profiles.is_registered(user_id, conference_id)? {
                    return Ok(None);
                }

                if conference.seats_available >= conference.max_attendees {
                    return Err(ConferenceError::Store(RepoError::InvalidData(format!(
                        "conference {conference_id} has no taken seat for a registered profile"
                    ))));
                }
                let seats_left = conference.seats_available + 1;
                profiles.remove_registration(user_id, conference_id)?;
                conferences.set_seats_available(conference_id, seats_left)?;
                Ok(Some(seats_left))
            })
        })?;

        match released {
            Some(seats_left) => {
                info!(
                    "event=conference_unregister module=ledger status=ok conference_id={conference_id} seats_available={seats_left}"
                );
                Ok(true)
            }
            None => {
                info!(
                    "event=conference_unregister module=ledger status=noop conference_id={conference_id}"
                );
                Ok(false)
            }
        }
    }
}

fn not_found(conference_id: ConferenceId) -> ConferenceError {
    ConferenceError::NotFound(format!("no conference found with key: {conference_id}"))
}
