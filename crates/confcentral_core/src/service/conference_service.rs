//! Conference use-case service.
//!
//! # Responsibility
//! - Resolve the acting user and enforce authentication/ownership rules.
//! - Map caller input onto entities and route writes to repositories/ledgers.
//! - Emit background tasks for derived views and notifications.
//!
//! # Invariants
//! - Profiles are created lazily on first authenticated access.
//! - Only a conference's organizer may update it or add sessions to it.
//! - A failed enqueue is logged and never fails the request.
//! - The store lock is released before views or the queue are called.

use crate::cache::CacheStore;
use crate::db::{run_immediate, Database};
use crate::error::{ConferenceError, ConferenceResult};
use crate::filter::{compile_filters, FilterCondition};
use crate::identity::{CurrentUser, IdentityProvider};
use crate::ledger::{RegistrationLedger, WishlistLedger};
use crate::model::conference::{Conference, ConferenceDraft, ConferenceUpdate};
use crate::model::profile::{Profile, ProfileUpdate};
use crate::model::session::{Session, SessionDraft};
use crate::model::{non_blank, normalize_label, parse_key, ConferenceId, KeyKind};
use crate::queue::{Task, WorkQueue};
use crate::repo::conference_repo::{ConferenceRepository, SqliteConferenceRepository};
use crate::repo::profile_repo::{ProfileRepository, SqliteProfileRepository};
use crate::repo::session_repo::{SessionRepository, SqliteSessionRepository};
use crate::views::{DerivedViews, FeaturedSpeakers};
use chrono::NaiveTime;
use log::{info, warn};
use rusqlite::Connection;
use std::sync::Arc;
use uuid::Uuid;

/// Session type excluded by [`ConferenceService::non_workshop_sessions_before`].
pub const WORKSHOP_SESSION_TYPE: &str = "Workshop";

/// Service facade over the entity store, ledgers and derived views.
#[derive(Clone)]
pub struct ConferenceService {
    db: Database,
    identity: Arc<dyn IdentityProvider>,
    queue: Arc<dyn WorkQueue>,
    views: DerivedViews,
    registrations: RegistrationLedger,
    wishlist: WishlistLedger,
}

impl ConferenceService {
    pub fn new(
        db: Database,
        cache: Arc<dyn CacheStore>,
        queue: Arc<dyn WorkQueue>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            views: DerivedViews::new(db.clone(), cache, Arc::clone(&queue)),
            registrations: RegistrationLedger::new(db.clone()),
            wishlist: WishlistLedger::new(db.clone(), Arc::clone(&queue)),
            db,
            identity,
            queue,
        }
    }

    /// Replaces the derived-view front, e.g. to change the announcement threshold.
    pub fn with_views(mut self, views: DerivedViews) -> Self {
        self.views = views;
        self
    }

    /// Same store, cache and queue acting as another user.
    pub fn with_identity(&self, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            identity,
            ..self.clone()
        }
    }

    pub fn views(&self) -> &DerivedViews {
        &self.views
    }

    // Profiles

    /// Current user's profile, created on first access.
    pub fn profile(&self) -> ConferenceResult<Profile> {
        let user = self.current_user()?;
        self.ensure_profile(&user)
    }

    /// Applies the non-blank fields of `update` to the current user's profile.
    pub fn save_profile(&self, update: &ProfileUpdate) -> ConferenceResult<Profile> {
        let user = self.current_user()?;
        let mut profile = self.ensure_profile(&user)?;
        if let Some(display_name) = non_blank(update.display_name.as_deref()) {
            profile.display_name = display_name;
        }
        if let Some(size) = update.tee_shirt_size {
            profile.tee_shirt_size = size;
        }

        self.db.with_conn(|conn| -> ConferenceResult<_> {
            SqliteProfileRepository::new(conn).update_profile_fields(
                &profile.user_id,
                &profile.display_name,
                profile.tee_shirt_size,
            )?;
            Ok(())
        })?;
        info!("event=profile_save module=service status=ok");
        Ok(profile)
    }

    // Conferences

    /// Creates a conference owned by the current user.
    pub fn create_conference(&self, draft: &ConferenceDraft) -> ConferenceResult<Conference> {
        let user = self.current_user()?;
        self.ensure_profile(&user)?;
        let conference = Conference::from_draft(Uuid::new_v4(), user.user_id.as_str(), draft)?;

        self.db.with_conn(|conn| -> ConferenceResult<_> {
            SqliteConferenceRepository::new(conn).create_conference(&conference)?;
            Ok(())
        })?;
        info!(
            "event=conference_create module=service status=ok conference_id={} max_attendees={}",
            conference.id, conference.max_attendees
        );

        self.schedule(Task::SendConfirmationEmail {
            email: user.email,
            conference_id: conference.id,
            conference_name: conference.name.clone(),
        });
        Ok(conference)
    }

    /// Applies an organizer update.
    ///
    /// # Errors
    /// - `Authorization` when the current user is not the organizer.
    /// - `Conflict` when the new capacity is below current registrations.
    pub fn update_conference(
        &self,
        conference_key: &str,
        update: &ConferenceUpdate,
    ) -> ConferenceResult<Conference> {
        let user = self.current_user()?;
        let conference_id = parse_key(KeyKind::Conference, conference_key)?;

        let attempts = self.db.transaction_attempts();
        let conference = self.db.with_conn(|conn| {
            run_immediate::<_, ConferenceError, _>(conn, attempts, |tx| {
                let conferences = SqliteConferenceRepository::new(tx);
                let mut conference = load_conference(tx, conference_id)?;
                ensure_organizer(&conference, &user, "update the conference")?;
                conference.apply_update(update)?;
                conferences.update_conference(&conference)?;
                Ok(conference)
            })
        })?;
        info!(
            "event=conference_update module=service status=ok conference_id={conference_id} seats_available={}",
            conference.seats_available
        );
        Ok(conference)
    }

    pub fn conference(&self, conference_key: &str) -> ConferenceResult<Conference> {
        let conference_id = parse_key(KeyKind::Conference, conference_key)?;
        self.db.with_conn(|conn| load_conference(conn, conference_id))
    }

    /// Conferences organized by the current user.
    pub fn conferences_created(&self) -> ConferenceResult<Vec<Conference>> {
        let user = self.current_user()?;
        self.db.with_conn(|conn| -> ConferenceResult<_> {
            Ok(SqliteConferenceRepository::new(conn).list_by_organizer(&user.user_id)?)
        })
    }

    /// Runs a caller-supplied filter list.
    pub fn query_conferences(&self, filters: &[FilterCondition]) -> ConferenceResult<Vec<Conference>> {
        let query = compile_filters(filters)?;
        let conferences = self.db.with_conn(|conn| -> ConferenceResult<_> {
            Ok(SqliteConferenceRepository::new(conn).query_conferences(&query)?)
        })?;
        info!(
            "event=conference_query module=service status=ok predicates={} results={}",
            query.predicates.len(),
            conferences.len()
        );
        Ok(conferences)
    }

    /// Conferences on the current user's roster.
    pub fn conferences_to_attend(&self) -> ConferenceResult<Vec<Conference>> {
        let profile = self.profile()?;
        let ids: Vec<ConferenceId> = profile.conference_keys_to_attend.into_iter().collect();
        self.db.with_conn(|conn| -> ConferenceResult<_> {
            Ok(SqliteConferenceRepository::new(conn).get_conferences(&ids)?)
        })
    }

    // Registration

    pub fn register(&self, conference_key: &str) -> ConferenceResult<()> {
        let user = self.current_user()?;
        let conference_id = parse_key(KeyKind::Conference, conference_key)?;
        self.ensure_profile(&user)?;
        self.registrations.register(&user.user_id, conference_id)
    }

    /// Returns `false` when the user was not registered.
    pub fn unregister(&self, conference_key: &str) -> ConferenceResult<bool> {
        let user = self.current_user()?;
        let conference_id = parse_key(KeyKind::Conference, conference_key)?;
        self.ensure_profile(&user)?;
        self.registrations.unregister(&user.user_id, conference_id)
    }

    // Sessions

    /// Adds a session to a conference organized by the current user.
    ///
    /// # Errors
    /// - `Conflict` when the conference already has a session with that name.
    pub fn create_session(
        &self,
        conference_key: &str,
        draft: &SessionDraft,
    ) -> ConferenceResult<Session> {
        let user = self.current_user()?;
        let conference_id = parse_key(KeyKind::Conference, conference_key)?;

        let attempts = self.db.transaction_attempts();
        let session = self.db.with_conn(|conn| {
            run_immediate::<_, ConferenceError, _>(conn, attempts, |tx| {
                let conference = load_conference(tx, conference_id)?;
                ensure_organizer(&conference, &user, "add sessions")?;
                let session = Session::from_draft(Uuid::new_v4(), &conference, draft)?;

                let sessions = SqliteSessionRepository::new(tx);
                if sessions.name_exists(conference_id, &session.name)? {
                    return Err(ConferenceError::Conflict(format!(
                        "a session named `{}` already exists in this conference",
                        session.name
                    )));
                }
                sessions.create_session(&session)?;
                Ok(session)
            })
        })?;
        info!(
            "event=session_create module=service status=ok conference_id={conference_id} session_id={}",
            session.id
        );

        self.schedule(Task::RecomputeFeaturedSpeakers(conference_id));
        Ok(session)
    }

    pub fn conference_sessions(&self, conference_key: &str) -> ConferenceResult<Vec<Session>> {
        self.sessions_of(conference_key, |sessions, id| sessions.list_for_conference(id))
    }

    pub fn conference_sessions_by_type(
        &self,
        conference_key: &str,
        session_type: &str,
    ) -> ConferenceResult<Vec<Session>> {
        let session_type = normalize_label(session_type);
        self.sessions_of(conference_key, |sessions, id| {
            sessions.list_for_conference_by_type(id, &session_type)
        })
    }

    /// Sessions ordered by date, then start time.
    pub fn conference_sessions_by_date(&self, conference_key: &str) -> ConferenceResult<Vec<Session>> {
        self.sessions_of(conference_key, |sessions, id| {
            sessions.list_for_conference_by_schedule(id)
        })
    }

    /// Sessions of any conference given by `speaker`.
    pub fn sessions_by_speaker(&self, speaker: &str) -> ConferenceResult<Vec<Session>> {
        let speaker = normalize_label(speaker);
        self.db.with_conn(|conn| -> ConferenceResult<_> {
            Ok(SqliteSessionRepository::new(conn).list_by_speaker(&speaker)?)
        })
    }

    /// Non-workshop sessions starting strictly before `cutoff`.
    pub fn non_workshop_sessions_before(
        &self,
        conference_key: &str,
        cutoff: NaiveTime,
    ) -> ConferenceResult<Vec<Session>> {
        let mut sessions = self.conference_sessions_by_date(conference_key)?;
        sessions.retain(|session| {
            session.session_type != WORKSHOP_SESSION_TYPE && session.start_time < cutoff
        });
        Ok(sessions)
    }

    // Wishlist

    pub fn add_session_to_wishlist(&self, session_key: &str) -> ConferenceResult<Session> {
        let user = self.current_user()?;
        let session_id = parse_key(KeyKind::Session, session_key)?;
        self.ensure_profile(&user)?;
        self.wishlist.add(&user.user_id, session_id)
    }

    pub fn remove_session_from_wishlist(&self, session_key: &str) -> ConferenceResult<Session> {
        let user = self.current_user()?;
        let session_id = parse_key(KeyKind::Session, session_key)?;
        self.ensure_profile(&user)?;
        self.wishlist.remove(&user.user_id, session_id)
    }

    pub fn sessions_in_wishlist(&self) -> ConferenceResult<Vec<Session>> {
        let profile = self.profile()?;
        let ids: Vec<_> = profile.session_keys_in_wishlist.into_iter().collect();
        self.db.with_conn(|conn| -> ConferenceResult<_> {
            Ok(SqliteSessionRepository::new(conn).get_sessions(&ids)?)
        })
    }

    // Derived views

    pub fn top_sessions(&self, conference_key: &str) -> ConferenceResult<Vec<Session>> {
        let conference_id = parse_key(KeyKind::Conference, conference_key)?;
        self.views.top_sessions(conference_id)
    }

    pub fn featured_speakers(&self, conference_key: &str) -> ConferenceResult<FeaturedSpeakers> {
        let conference_id = parse_key(KeyKind::Conference, conference_key)?;
        self.views.featured_speakers(conference_id)
    }

    pub fn announcement(&self) -> String {
        self.views.announcement()
    }

    pub fn refresh_announcement(&self) -> ConferenceResult<Option<String>> {
        self.views.recompute_announcement()
    }

    fn current_user(&self) -> ConferenceResult<CurrentUser> {
        self.identity
            .current_user()
            .ok_or(ConferenceError::AuthenticationRequired)
    }

    fn ensure_profile(&self, user: &CurrentUser) -> ConferenceResult<Profile> {
        let attempts = self.db.transaction_attempts();
        self.db.with_conn(|conn| {
            run_immediate::<_, ConferenceError, _>(conn, attempts, |tx| {
                let profiles = SqliteProfileRepository::new(tx);
                if let Some(profile) = profiles.get_profile(&user.user_id)? {
                    return Ok(profile);
                }
                let profile = Profile::new(
                    user.user_id.as_str(),
                    user.nickname.as_str(),
                    user.email.as_str(),
                );
                profiles.create_profile(&profile)?;
                info!("event=profile_create module=service status=ok");
                Ok(profile)
            })
        })
    }

    fn sessions_of<F>(&self, conference_key: &str, list: F) -> ConferenceResult<Vec<Session>>
    where
        F: FnOnce(&SqliteSessionRepository<'_>, ConferenceId) -> crate::repo::RepoResult<Vec<Session>>,
    {
        let conference_id = parse_key(KeyKind::Conference, conference_key)?;
        self.db.with_conn(|conn| -> ConferenceResult<_> {
            load_conference(conn, conference_id)?;
            Ok(list(&SqliteSessionRepository::new(conn), conference_id)?)
        })
    }

    fn schedule(&self, task: Task) {
        if let Err(err) = self.queue.enqueue(task.clone()) {
            warn!(
                "event=enqueue module=service status=error kind={} conference_id={} error={err}",
                task.kind(),
                task.conference_id()
            );
        }
    }
}

fn load_conference(conn: &Connection, conference_id: ConferenceId) -> ConferenceResult<Conference> {
    SqliteConferenceRepository::new(conn)
        .get_conference(conference_id)?
        .ok_or_else(|| {
            ConferenceError::NotFound(format!("no conference found with key: {conference_id}"))
        })
}

fn ensure_organizer(
    conference: &Conference,
    user: &CurrentUser,
    action: &str,
) -> ConferenceResult<()> {
    if conference.organizer_user_id == user.user_id {
        return Ok(());
    }
    Err(ConferenceError::Authorization(format!(
        "only the organizer can {action}"
    )))
}
