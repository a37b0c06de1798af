//! Core domain logic for Conference Central.
//!
//! Conferences, sessions and attendee profiles live in an embedded SQLite
//! store. Seat and wishlist counters are owned by transactional ledgers;
//! aggregate views are cached and refreshed through a background queue.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod notify;
pub mod queue;
pub mod repo;
pub mod service;
pub mod views;

pub use cache::{CacheStore, MemoryCache};
pub use config::{ConfigError, CoreConfig};
pub use db::{Database, DbError};
pub use error::{ConferenceError, ConferenceResult};
pub use filter::{compile_filters, CompiledQuery, FilterCondition, FilterField, FilterOperator};
pub use identity::{CurrentUser, IdentityProvider, StaticIdentity};
pub use ledger::{RegistrationLedger, WishlistLedger};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::conference::{Conference, ConferenceDraft, ConferenceUpdate};
pub use model::profile::{Profile, ProfileUpdate, TeeShirtSize};
pub use model::session::{Session, SessionDraft};
pub use model::{parse_key, ConferenceId, KeyKind, SessionId};
pub use notify::{LogNotifier, Notifier};
pub use queue::{
    BackgroundQueue, PendingQueue, RetryPolicy, Task, TaskHandler, WorkQueue,
};
pub use repo::{RepoError, RepoResult};
pub use service::conference_service::ConferenceService;
pub use views::{DerivedViews, FeaturedSpeakers, TaskDispatcher};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
