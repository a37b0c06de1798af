#![allow(dead_code)]

use confcentral_core::{
    ConferenceDraft, ConferenceService, CurrentUser, Database, MemoryCache, PendingQueue,
    SessionDraft, StaticIdentity,
};
use std::sync::Arc;

pub struct Harness {
    pub db: Database,
    pub cache: Arc<MemoryCache>,
    pub queue: Arc<PendingQueue>,
    pub service: ConferenceService,
}

impl Harness {
    pub fn in_memory(user_id: &str) -> Self {
        Self::with_db(Database::open_in_memory().unwrap(), user_id)
    }

    pub fn with_db(db: Database, user_id: &str) -> Self {
        let cache = Arc::new(MemoryCache::new());
        let queue = Arc::new(PendingQueue::new());
        let service = ConferenceService::new(
            db.clone(),
            cache.clone(),
            queue.clone(),
            Arc::new(signed_in(user_id)),
        );
        Self {
            db,
            cache,
            queue,
            service,
        }
    }

    /// Same store, cache and queue acting as `user_id`.
    pub fn as_user(&self, user_id: &str) -> ConferenceService {
        self.service.with_identity(Arc::new(signed_in(user_id)))
    }
}

pub fn signed_in(user_id: &str) -> StaticIdentity {
    StaticIdentity::signed_in(CurrentUser::from_email(
        user_id,
        format!("{user_id}@example.com"),
    ))
}

pub fn conference_draft(name: &str, max_attendees: u32) -> ConferenceDraft {
    ConferenceDraft {
        name: name.to_string(),
        max_attendees: Some(max_attendees),
        ..ConferenceDraft::default()
    }
}

pub fn session_draft(name: &str, speaker: &str) -> SessionDraft {
    SessionDraft {
        name: name.to_string(),
        speaker: Some(speaker.to_string()),
        ..SessionDraft::default()
    }
}
