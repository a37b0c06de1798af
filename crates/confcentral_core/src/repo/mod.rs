//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define entity-oriented data access contracts.
//! - Isolate SQL details from ledger/service orchestration.
//!
//! # Invariants
//! - Write paths validate entities before persistence.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repositories never open transactions; callers own atomicity.

pub mod conference_repo;
pub mod profile_repo;
pub mod session_repo;

use crate::db::{is_contention, Contention, DbError};
use crate::model::EntityValidationError;
use chrono::{NaiveDate, NaiveTime};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(EntityValidationError),
    Db(DbError),
    /// Describes the missing entity, e.g. `conference <uuid>`.
    NotFound(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(what) => write!(f, "{what} not found"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl Contention for RepoError {
    fn is_contention(&self) -> bool {
        matches!(self, Self::Db(DbError::Sqlite(err)) if is_contention(err))
    }
}

impl From<EntityValidationError> for RepoError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

pub(crate) fn date_to_db(date: Option<NaiveDate>) -> Option<String> {
    date.map(|value| value.format(DATE_FORMAT).to_string())
}

pub(crate) fn time_to_db(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub(crate) fn parse_db_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_db_date(value: Option<String>, column: &'static str) -> RepoResult<Option<NaiveDate>> {
    value
        .map(|text| {
            NaiveDate::parse_from_str(&text, DATE_FORMAT)
                .map_err(|_| RepoError::InvalidData(format!("invalid date `{text}` in {column}")))
        })
        .transpose()
}

pub(crate) fn parse_db_time(value: &str, column: &'static str) -> RepoResult<NaiveTime> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|_| RepoError::InvalidData(format!("invalid time `{value}` in {column}")))
}

pub(crate) fn parse_db_count(value: i64, column: &'static str) -> RepoResult<u32> {
    u32::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid count `{value}` in {column}")))
}
