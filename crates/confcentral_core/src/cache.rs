//! Key/value cache store for derived views.
//!
//! # Invariants
//! - Cache entries are advisory: losing any of them only costs a recompute.
//! - Cache access is never coupled to ledger transactions.

use crate::model::ConferenceId;
use std::collections::HashMap;
use std::sync::Mutex;

pub const ANNOUNCEMENT_KEY: &str = "RECENT_ANNOUNCEMENTS";

pub fn top_sessions_key(conference_id: ConferenceId) -> String {
    format!("TOP_SESSIONS_FOR_{conference_id}")
}

pub fn featured_speakers_key(conference_id: ConferenceId) -> String {
    format!("FEATURED_SPEAKERS_FOR_{conference_id}")
}

/// Eventually consistent string cache.
///
/// Implementations swallow their own failures: a failed `get` is a miss and a
/// failed `set`/`delete` leaves a stale entry behind.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn delete(&self, key: &str);
}

/// In-process cache backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value);
        }
    }

    fn delete(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{top_sessions_key, CacheStore, MemoryCache};
    use uuid::Uuid;

    #[test]
    fn set_get_delete() {
        let cache = MemoryCache::new();
        let key = top_sessions_key(Uuid::nil());
        assert_eq!(key, "TOP_SESSIONS_FOR_00000000-0000-0000-0000-000000000000");

        cache.set(&key, "[]".to_string());
        assert_eq!(cache.get(&key).as_deref(), Some("[]"));
        cache.delete(&key);
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }
}
