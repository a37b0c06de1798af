//! Caller-facing error taxonomy for conference use-cases.
//!
//! # Invariants
//! - Every locally detected failure maps to exactly one kind and is never retried.
//! - Store contention that outlived transaction retries is `Transient`; all
//!   other storage failures are `Store`.

use crate::db::{Contention, DbError};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ConferenceResult<T> = Result<T, ConferenceError>;

/// Error kinds surfaced by ledgers, views and the conference service.
#[derive(Debug)]
pub enum ConferenceError {
    /// No current user.
    AuthenticationRequired,
    /// Acting user is not the resource's organizer.
    Authorization(String),
    /// Key does not resolve to an entity, or is malformed.
    NotFound(String),
    /// Missing required field or unparsable date/time.
    Validation(String),
    /// Unknown filter field/operator, bad value, or a second inequality field.
    InvalidFilter(String),
    /// Duplicate registration/wishlist entry, exhausted capacity, absent entry.
    Conflict(String),
    /// Write contention outlasted the transaction retry limit; safe to retry.
    Transient(String),
    /// Non-retryable storage failure or invalid persisted data.
    Store(RepoError),
}

impl ConferenceError {
    /// Returns true when the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl Display for ConferenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthenticationRequired => write!(f, "authorization required"),
            Self::Authorization(message) => write!(f, "forbidden: {message}"),
            Self::NotFound(message) => write!(f, "not found: {message}"),
            Self::Validation(message) => write!(f, "invalid request: {message}"),
            Self::InvalidFilter(message) => write!(f, "invalid filter: {message}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::Transient(message) => write!(f, "temporarily unavailable: {message}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConferenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl Contention for ConferenceError {
    fn is_contention(&self) -> bool {
        self.is_retryable()
    }
}

impl From<RepoError> for ConferenceError {
    fn from(value: RepoError) -> Self {
        if value.is_contention() {
            return Self::Transient(value.to_string());
        }
        match value {
            RepoError::NotFound(key) => Self::NotFound(key),
            RepoError::Validation(err) => Self::Validation(err.to_string()),
            other => Self::Store(other),
        }
    }
}

impl From<DbError> for ConferenceError {
    fn from(value: DbError) -> Self {
        RepoError::Db(value).into()
    }
}

impl From<rusqlite::Error> for ConferenceError {
    fn from(value: rusqlite::Error) -> Self {
        RepoError::from(value).into()
    }
}

#[cfg(test)]
mod tests {
    use super::ConferenceError;
    use crate::db::Contention;
    use crate::repo::RepoError;
    use rusqlite::ffi;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), None)
    }

    #[test]
    fn busy_database_maps_to_transient() {
        let err = ConferenceError::from(sqlite_failure(ffi::SQLITE_BUSY));
        assert!(matches!(err, ConferenceError::Transient(_)));
        assert!(err.is_contention());
    }

    #[test]
    fn other_sqlite_failures_map_to_store() {
        let err = ConferenceError::from(sqlite_failure(ffi::SQLITE_CONSTRAINT));
        assert!(matches!(err, ConferenceError::Store(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn repo_not_found_keeps_key() {
        let err = ConferenceError::from(RepoError::NotFound("conference abc".to_string()));
        match err {
            ConferenceError::NotFound(key) => assert_eq!(key, "conference abc"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
