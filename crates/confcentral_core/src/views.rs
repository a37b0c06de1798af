//! Cached aggregate views: top sessions, featured speakers, announcement.
//!
//! # Responsibility
//! - Compute each view from the entity store (pure and idempotent).
//! - Serve views from the cache, recomputing synchronously on a miss.
//!
//! # Invariants
//! - Recomputing without intervening mutations writes byte-identical values.
//! - Reads for an existing conference never fail because of the cache; they
//!   may be stale until the queued refresh runs.
//! - An undecodable cached value is treated as a miss.

use crate::cache::{featured_speakers_key, top_sessions_key, CacheStore, ANNOUNCEMENT_KEY};
use crate::db::Database;
use crate::error::{ConferenceError, ConferenceResult};
use crate::model::session::Session;
use crate::model::ConferenceId;
use crate::notify::Notifier;
use crate::queue::{Task, TaskHandler, WorkQueue};
use crate::repo::conference_repo::{ConferenceRepository, SqliteConferenceRepository};
use crate::repo::session_repo::{SessionRepository, SqliteSessionRepository};
use crate::repo::RepoError;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

pub const TOP_SESSIONS_LIMIT: usize = 5;
pub const DEFAULT_NEAR_SOLD_OUT_SEATS: u32 = 5;
const ANNOUNCEMENT_PREFIX: &str =
    "Last chance to attend! The following conferences are nearly sold out: ";

/// Speaker name to the names of their sessions, both ascending.
pub type FeaturedSpeakers = BTreeMap<String, Vec<String>>;

/// View computer and cache front.
#[derive(Clone)]
pub struct DerivedViews {
    db: Database,
    cache: Arc<dyn CacheStore>,
    queue: Arc<dyn WorkQueue>,
    near_sold_out_seats: u32,
}

impl DerivedViews {
    pub fn new(db: Database, cache: Arc<dyn CacheStore>, queue: Arc<dyn WorkQueue>) -> Self {
        Self {
            db,
            cache,
            queue,
            near_sold_out_seats: DEFAULT_NEAR_SOLD_OUT_SEATS,
        }
    }

    /// Overrides the seat count at or below which a conference is announced.
    pub fn with_near_sold_out_seats(mut self, seats: u32) -> Self {
        self.near_sold_out_seats = seats;
        self
    }

    /// Most-wishlisted sessions of a conference, at most five.
    ///
    /// Ordered by `wish_list_count DESC, name ASC, id ASC`.
    pub fn top_sessions(&self, conference_id: ConferenceId) -> ConferenceResult<Vec<Session>> {
        let key = top_sessions_key(conference_id);
        if let Some(sessions) = self.cached::<Vec<Session>>(&key) {
            return Ok(sessions);
        }
        let sessions = self.recompute_top_sessions(conference_id)?;
        self.schedule(Task::RecomputeTopSessions(conference_id));
        Ok(sessions)
    }

    /// Speakers with at least two sessions in the conference.
    pub fn featured_speakers(&self, conference_id: ConferenceId) -> ConferenceResult<FeaturedSpeakers> {
        let key = featured_speakers_key(conference_id);
        if let Some(speakers) = self.cached::<FeaturedSpeakers>(&key) {
            return Ok(speakers);
        }
        let speakers = self.recompute_featured_speakers(conference_id)?;
        self.schedule(Task::RecomputeFeaturedSpeakers(conference_id));
        Ok(speakers)
    }

    /// Cached announcement text, or `""` when none is cached.
    pub fn announcement(&self) -> String {
        self.cached::<String>(ANNOUNCEMENT_KEY).unwrap_or_default()
    }

    /// Recomputes and caches the top sessions of one conference.
    pub fn recompute_top_sessions(&self, conference_id: ConferenceId) -> ConferenceResult<Vec<Session>> {
        let started_at = Instant::now();
        let mut sessions = self.conference_sessions(conference_id)?;
        sessions.sort_by(|left, right| {
            right
                .wish_list_count
                .cmp(&left.wish_list_count)
                .then_with(|| left.name.cmp(&right.name))
                .then_with(|| left.id.cmp(&right.id))
        });
        sessions.truncate(TOP_SESSIONS_LIMIT);

        self.store(&top_sessions_key(conference_id), &sessions)?;
        info!(
            "event=recompute_top_sessions module=views status=ok conference_id={conference_id} count={} duration_ms={}",
            sessions.len(),
            started_at.elapsed().as_millis()
        );
        Ok(sessions)
    }

    /// Recomputes and caches the featured speakers of one conference.
    pub fn recompute_featured_speakers(
        &self,
        conference_id: ConferenceId,
    ) -> ConferenceResult<FeaturedSpeakers> {
        let started_at = Instant::now();
        let mut speakers = FeaturedSpeakers::new();
        for session in self.conference_sessions(conference_id)? {
            speakers.entry(session.speaker).or_default().push(session.name);
        }
        speakers.retain(|_, names| names.len() >= 2);
        for names in speakers.values_mut() {
            names.sort();
        }

        self.store(&featured_speakers_key(conference_id), &speakers)?;
        info!(
            "event=recompute_featured_speakers module=views status=ok conference_id={conference_id} speakers={} duration_ms={}",
            speakers.len(),
            started_at.elapsed().as_millis()
        );
        Ok(speakers)
    }

    /// Rebuilds the nearly-sold-out announcement.
    ///
    /// Returns the new text, or `None` after deleting the entry because no
    /// conference qualifies.
    pub fn recompute_announcement(&self) -> ConferenceResult<Option<String>> {
        let seats = self.near_sold_out_seats;
        let conferences = self
            .db
            .with_conn(|conn| -> ConferenceResult<_> {
                Ok(SqliteConferenceRepository::new(conn).list_nearly_sold_out(seats)?)
            })?;

        if conferences.is_empty() {
            self.cache.delete(ANNOUNCEMENT_KEY);
            info!("event=recompute_announcement module=views status=ok conferences=0");
            return Ok(None);
        }

        let names: Vec<&str> = conferences.iter().map(|c| c.name.as_str()).collect();
        let text = format!("{ANNOUNCEMENT_PREFIX}{}", names.join(", "));
        self.store(ANNOUNCEMENT_KEY, &text)?;
        info!(
            "event=recompute_announcement module=views status=ok conferences={}",
            conferences.len()
        );
        Ok(Some(text))
    }

    fn conference_sessions(&self, conference_id: ConferenceId) -> ConferenceResult<Vec<Session>> {
        self.db.with_conn(|conn| -> ConferenceResult<_> {
            if SqliteConferenceRepository::new(conn)
                .get_conference(conference_id)?
                .is_none()
            {
                return Err(ConferenceError::NotFound(format!(
                    "no conference found with key: {conference_id}"
                )));
            }
            Ok(SqliteSessionRepository::new(conn).list_for_conference(conference_id)?)
        })
    }

    fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.cache.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("event=cache_read module=views status=hit key={key}");
                Some(value)
            }
            Err(err) => {
                warn!("event=cache_read module=views status=undecodable key={key} error={err}");
                None
            }
        }
    }

    fn store<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> ConferenceResult<()> {
        let encoded = serde_json::to_string(value).map_err(|err| {
            ConferenceError::Store(RepoError::InvalidData(format!(
                "cannot encode cached view `{key}`: {err}"
            )))
        })?;
        self.cache.set(key, encoded);
        Ok(())
    }

    fn schedule(&self, task: Task) {
        if let Err(err) = self.queue.enqueue(task.clone()) {
            warn!(
                "event=enqueue module=views status=error kind={} conference_id={} error={err}",
                task.kind(),
                task.conference_id()
            );
        }
    }
}

/// Routes queued tasks to view recomputes and the notifier.
#[derive(Clone)]
pub struct TaskDispatcher {
    views: DerivedViews,
    notifier: Arc<dyn Notifier>,
}

impl TaskDispatcher {
    pub fn new(views: DerivedViews, notifier: Arc<dyn Notifier>) -> Self {
        Self { views, notifier }
    }
}

impl TaskHandler for TaskDispatcher {
    fn handle(&self, task: &Task) -> ConferenceResult<()> {
        match task {
            Task::RecomputeTopSessions(id) => self.views.recompute_top_sessions(*id).map(|_| ()),
            Task::RecomputeFeaturedSpeakers(id) => {
                self.views.recompute_featured_speakers(*id).map(|_| ())
            }
            Task::SendConfirmationEmail {
                email,
                conference_id,
                conference_name,
            } => self
                .notifier
                .conference_created(email, *conference_id, conference_name),
        }
    }
}
