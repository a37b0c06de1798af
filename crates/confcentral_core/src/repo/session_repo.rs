//! Session repository contract and SQLite implementation.
//!
//! # Invariants
//! - Session names are unique within their conference (schema `UNIQUE`).
//! - Per-conference listings order by `name ASC, uuid ASC` unless stated.

use super::{
    date_to_db, parse_db_count, parse_db_date, parse_db_time, parse_db_uuid, time_to_db,
    RepoError, RepoResult,
};
use crate::model::session::Session;
use crate::model::{ConferenceId, SessionId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const SESSION_SELECT_SQL: &str = "SELECT
    uuid,
    conference_uuid,
    name,
    highlights,
    speaker,
    session_type,
    session_date,
    start_time,
    duration_minutes,
    wish_list_count
FROM sessions";

/// Repository interface for session persistence.
pub trait SessionRepository {
    fn create_session(&self, session: &Session) -> RepoResult<SessionId>;
    fn get_session(&self, id: SessionId) -> RepoResult<Option<Session>>;
    /// Batch get; preserves input order and skips ids that do not resolve.
    fn get_sessions(&self, ids: &[SessionId]) -> RepoResult<Vec<Session>>;
    fn list_for_conference(&self, conference_id: ConferenceId) -> RepoResult<Vec<Session>>;
    fn list_for_conference_by_type(
        &self,
        conference_id: ConferenceId,
        session_type: &str,
    ) -> RepoResult<Vec<Session>>;
    /// Ordered by date (undated first), start time, then name.
    fn list_for_conference_by_schedule(
        &self,
        conference_id: ConferenceId,
    ) -> RepoResult<Vec<Session>>;
    /// Sessions across every conference for one speaker.
    fn list_by_speaker(&self, speaker: &str) -> RepoResult<Vec<Session>>;
    fn name_exists(&self, conference_id: ConferenceId, name: &str) -> RepoResult<bool>;
    /// Sets the wishlist counter; used only by the wishlist ledger.
    fn set_wish_list_count(&self, id: SessionId, wish_list_count: u32) -> RepoResult<()>;
}

/// SQLite-backed session repository.
pub struct SqliteSessionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSessionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_all(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Session>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next()? {
            sessions.push(parse_session_row(row)?);
        }
        Ok(sessions)
    }
}

impl SessionRepository for SqliteSessionRepository<'_> {
    fn create_session(&self, session: &Session) -> RepoResult<SessionId> {
        self.conn.execute(
            "INSERT INTO sessions (
                uuid,
                conference_uuid,
                name,
                highlights,
                speaker,
                session_type,
                session_date,
                start_time,
                duration_minutes,
                wish_list_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                session.id.to_string(),
                session.conference_id.to_string(),
                session.name.as_str(),
                session.highlights.as_str(),
                session.speaker.as_str(),
                session.session_type.as_str(),
                date_to_db(session.date),
                time_to_db(session.start_time),
                session.duration_minutes,
                session.wish_list_count,
            ],
        )?;
        Ok(session.id)
    }

    fn get_session(&self, id: SessionId) -> RepoResult<Option<Session>> {
        let mut sessions = self.load_all(
            &format!("{SESSION_SELECT_SQL} WHERE uuid = ?;"),
            vec![Value::Text(id.to_string())],
        )?;
        Ok(sessions.pop())
    }

    fn get_sessions(&self, ids: &[SessionId]) -> RepoResult<Vec<Session>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(session) = self.get_session(*id)? {
                found.push(session);
            }
        }
        Ok(found)
    }

    fn list_for_conference(&self, conference_id: ConferenceId) -> RepoResult<Vec<Session>> {
        self.load_all(
            &format!(
                "{SESSION_SELECT_SQL}
                 WHERE conference_uuid = ?
                 ORDER BY name ASC, uuid ASC;"
            ),
            vec![Value::Text(conference_id.to_string())],
        )
    }

    fn list_for_conference_by_type(
        &self,
        conference_id: ConferenceId,
        session_type: &str,
    ) -> RepoResult<Vec<Session>> {
        self.load_all(
            &format!(
                "{SESSION_SELECT_SQL}
                 WHERE conference_uuid = ?
                   AND session_type = ?
                 ORDER BY name ASC, uuid ASC;"
            ),
            vec![
                Value::Text(conference_id.to_string()),
                Value::Text(session_type.to_string()),
            ],
        )
    }

    fn list_for_conference_by_schedule(
        &self,
        conference_id: ConferenceId,
    ) -> RepoResult<Vec<Session>> {
        self.load_all(
            &format!(
                "{SESSION_SELECT_SQL}
                 WHERE conference_uuid = ?
                 ORDER BY session_date ASC, start_time ASC, name ASC, uuid ASC;"
            ),
            vec![Value::Text(conference_id.to_string())],
        )
    }

    fn list_by_speaker(&self, speaker: &str) -> RepoResult<Vec<Session>> {
        self.load_all(
            &format!(
                "{SESSION_SELECT_SQL}
                 WHERE speaker = ?
                 ORDER BY conference_uuid ASC, name ASC, uuid ASC;"
            ),
            vec![Value::Text(speaker.to_string())],
        )
    }

    fn name_exists(&self, conference_id: ConferenceId, name: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sessions
                WHERE conference_uuid = ?1 AND name = ?2
            );",
            params![conference_id.to_string(), name],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn set_wish_list_count(&self, id: SessionId, wish_list_count: u32) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE sessions SET wish_list_count = ?2 WHERE uuid = ?1;",
            params![id.to_string(), wish_list_count],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("session {id}")));
        }
        Ok(())
    }
}

fn parse_session_row(row: &Row<'_>) -> RepoResult<Session> {
    let uuid_text: String = row.get("uuid")?;
    let conference_text: String = row.get("conference_uuid")?;
    let start_time: String = row.get("start_time")?;

    Ok(Session {
        id: parse_db_uuid(&uuid_text, "sessions.uuid")?,
        conference_id: parse_db_uuid(&conference_text, "sessions.conference_uuid")?,
        name: row.get("name")?,
        highlights: row.get("highlights")?,
        speaker: row.get("speaker")?,
        session_type: row.get("session_type")?,
        date: parse_db_date(row.get("session_date")?, "sessions.session_date")?,
        start_time: parse_db_time(&start_time, "sessions.start_time")?,
        duration_minutes: parse_db_count(row.get("duration_minutes")?, "sessions.duration_minutes")?,
        wish_list_count: parse_db_count(row.get("wish_list_count")?, "sessions.wish_list_count")?,
    })
}
