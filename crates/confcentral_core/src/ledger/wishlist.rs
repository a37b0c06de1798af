//! Wishlist accounting between profiles and sessions.
//!
//! # Invariants
//! - `wish_list_count` equals the number of wishlists holding the session
//!   after every committed operation.
//! - Removing an absent entry is a `Conflict`.
//! - Every successful change enqueues a top-sessions recompute for the parent
//!   conference, after commit.

use super::ensure_profile;
use crate::db::{run_immediate, Database};
use crate::error::{ConferenceError, ConferenceResult};
use crate::model::session::Session;
use crate::model::SessionId;
use crate::queue::{Task, WorkQueue};
use crate::repo::profile_repo::{ProfileRepository, SqliteProfileRepository};
use crate::repo::session_repo::{SessionRepository, SqliteSessionRepository};
use log::{info, warn};
use std::sync::Arc;

/// Wishlist ledger over one store handle.
#[derive(Clone)]
pub struct WishlistLedger {
    db: Database,
    queue: Arc<dyn WorkQueue>,
}

#[derive(Clone, Copy)]
enum Change {
    Add,
    Remove,
}

impl WishlistLedger {
    pub fn new(db: Database, queue: Arc<dyn WorkQueue>) -> Self {
        Self { db, queue }
    }

    /// Adds the session to the user's wishlist and returns the updated session.
    ///
    /// # Errors
    /// - `NotFound` for an unknown session or profile.
    /// - `Conflict` when the session is already wishlisted.
    pub fn add(&self, user_id: &str, session_id: SessionId) -> ConferenceResult<Session> {
        self.apply(user_id, session_id, Change::Add)
    }

    /// Removes the session from the user's wishlist and returns the updated session.
    ///
    /// # Errors
    /// - `NotFound` for an unknown session or profile.
    /// - `Conflict` when the session is not in the wishlist.
    pub fn remove(&self, user_id: &str, session_id: SessionId) -> ConferenceResult<Session> {
        self.apply(user_id, session_id, Change::Remove)
    }

    fn apply(
        &self,
        user_id: &str,
        session_id: SessionId,
        change: Change,
    ) -> ConferenceResult<Session> {
        let attempts = self.db.transaction_attempts();
        let session = self.db.with_conn(|conn| {
            run_immediate::<_, ConferenceError, _>(conn, attempts, |tx| {
                let sessions = SqliteSessionRepository::new(tx);
                let profiles = SqliteProfileRepository::new(tx);
                ensure_profile(&profiles, user_id)?;

                let mut session = sessions.get_session(session_id)?.ok_or_else(|| {
                    ConferenceError::NotFound(format!("no session found with key: {session_id}"))
                })?;
                let wishlisted = profiles.is_wishlisted(user_id, session_id)?;

                match change {
                    Change::Add => {
                        if wishlisted {
                            return Err(ConferenceError::Conflict(
                                "session already exists in wishlist".to_string(),
                            ));
                        }
                        profiles.add_to_wishlist(user_id, session_id)?;
                        session.wish_list_count += 1;
                    }
                    Change::Remove => {
                        if !wishlisted {
                            return Err(ConferenceError::Conflict(
                                "session does not exist in wishlist".to_string(),
                            ));
                        }
                        profiles.remove_from_wishlist(user_id, session_id)?;
                        session.wish_list_count = session.wish_list_count.saturating_sub(1);
                    }
                }
                sessions.set_wish_list_count(session_id, session.wish_list_count)?;
                Ok(session)
            })
        })?;

        let event = match change {
            Change::Add => "wishlist_add",
            Change::Remove => "wishlist_remove",
        };
        info!(
            "event={event} module=ledger status=ok session_id={session_id} wish_list_count={}",
            session.wish_list_count
        );
        if let Err(err) = self
            .queue
            .enqueue(Task::RecomputeTopSessions(session.conference_id))
        {
            warn!(
                "event=enqueue module=ledger status=error kind=recompute_top_sessions conference_id={} error={err}",
                session.conference_id
            );
        }
        Ok(session)
    }
}
