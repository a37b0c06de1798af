//! Conference repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist conferences together with their topic sets.
//! - Serve compiled filter queries, organizer listings and capacity scans.
//!
//! # Invariants
//! - Topic rows are replaced wholesale on every conference write.
//! - Listing order is deterministic; `uuid` is always the final tie-breaker.

use super::{
    date_to_db, parse_db_count, parse_db_date, parse_db_uuid, RepoError, RepoResult,
};
use crate::filter::{CompiledQuery, FilterField, FilterValue, SortKey};
use crate::model::conference::Conference;
use crate::model::ConferenceId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const CONFERENCE_SELECT_SQL: &str = "SELECT
    c.uuid AS uuid,
    c.organizer_user_id AS organizer_user_id,
    c.name AS name,
    c.description AS description,
    c.city AS city,
    c.month AS month,
    c.max_attendees AS max_attendees,
    c.seats_available AS seats_available,
    c.start_date AS start_date,
    c.end_date AS end_date
FROM conferences c";

const TOPIC_EXISTS_SQL: &str =
    "EXISTS (SELECT 1 FROM conference_topics t WHERE t.conference_uuid = c.uuid AND t.topic";
const TOPIC_MIN_SQL: &str =
    "(SELECT MIN(t.topic) FROM conference_topics t WHERE t.conference_uuid = c.uuid)";

/// Repository interface for conference persistence.
pub trait ConferenceRepository {
    fn create_conference(&self, conference: &Conference) -> RepoResult<ConferenceId>;
    /// Overwrites every column and the topic set.
    fn update_conference(&self, conference: &Conference) -> RepoResult<()>;
    fn get_conference(&self, id: ConferenceId) -> RepoResult<Option<Conference>>;
    /// Batch get; preserves input order and skips ids that do not resolve.
    fn get_conferences(&self, ids: &[ConferenceId]) -> RepoResult<Vec<Conference>>;
    /// Conferences owned by one organizer, by name.
    fn list_by_organizer(&self, organizer_user_id: &str) -> RepoResult<Vec<Conference>>;
    /// Runs a compiled filter query.
    fn query_conferences(&self, query: &CompiledQuery) -> RepoResult<Vec<Conference>>;
    /// Conferences with `0 < seats_available <= max_seats`, by name.
    fn list_nearly_sold_out(&self, max_seats: u32) -> RepoResult<Vec<Conference>>;
    /// Sets the seat counter; used only by the registration ledger.
    fn set_seats_available(&self, id: ConferenceId, seats_available: u32) -> RepoResult<()>;
}

/// SQLite-backed conference repository.
pub struct SqliteConferenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteConferenceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_all(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Conference>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut conferences = Vec::new();
        while let Some(row) = rows.next()? {
            conferences.push(parse_conference_row(row)?);
        }
        for conference in &mut conferences {
            conference.topics = load_topics(self.conn, conference.id)?;
        }
        Ok(conferences)
    }
}

impl ConferenceRepository for SqliteConferenceRepository<'_> {
    fn create_conference(&self, conference: &Conference) -> RepoResult<ConferenceId> {
        conference.validate()?;

        self.conn.execute(
            "INSERT INTO conferences (
                uuid,
                organizer_user_id,
                name,
                description,
                city,
                month,
                max_attendees,
                seats_available,
                start_date,
                end_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                conference.id.to_string(),
                conference.organizer_user_id.as_str(),
                conference.name.as_str(),
                conference.description.as_deref(),
                conference.city.as_str(),
                conference.month,
                conference.max_attendees,
                conference.seats_available,
                date_to_db(conference.start_date),
                date_to_db(conference.end_date),
            ],
        )?;
        replace_topics(self.conn, conference)?;

        Ok(conference.id)
    }

    fn update_conference(&self, conference: &Conference) -> RepoResult<()> {
        conference.validate()?;

        let changed = self.conn.execute(
            "UPDATE conferences
             SET
                name = ?2,
                description = ?3,
                city = ?4,
                month = ?5,
                max_attendees = ?6,
                seats_available = ?7,
                start_date = ?8,
                end_date = ?9,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                conference.id.to_string(),
                conference.name.as_str(),
                conference.description.as_deref(),
                conference.city.as_str(),
                conference.month,
                conference.max_attendees,
                conference.seats_available,
                date_to_db(conference.start_date),
                date_to_db(conference.end_date),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("conference {}", conference.id)));
        }
        replace_topics(self.conn, conference)
    }

    fn get_conference(&self, id: ConferenceId) -> RepoResult<Option<Conference>> {
        let mut conferences = self.load_all(
            &format!("{CONFERENCE_SELECT_SQL} WHERE c.uuid = ?;"),
            vec![Value::Text(id.to_string())],
        )?;
        Ok(conferences.pop())
    }

    fn get_conferences(&self, ids: &[ConferenceId]) -> RepoResult<Vec<Conference>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(conference) = self.get_conference(*id)? {
                found.push(conference);
            }
        }
        Ok(found)
    }

    fn list_by_organizer(&self, organizer_user_id: &str) -> RepoResult<Vec<Conference>> {
        self.load_all(
            &format!(
                "{CONFERENCE_SELECT_SQL}
                 WHERE c.organizer_user_id = ?
                 ORDER BY c.name ASC, c.uuid ASC;"
            ),
            vec![Value::Text(organizer_user_id.to_string())],
        )
    }

    fn query_conferences(&self, query: &CompiledQuery) -> RepoResult<Vec<Conference>> {
        let mut sql = format!("{CONFERENCE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::with_capacity(query.predicates.len());

        for predicate in &query.predicates {
            let op = predicate.operator.sql();
            match predicate.field {
                FilterField::Topic => sql.push_str(&format!(" AND {TOPIC_EXISTS_SQL} {op} ?)")),
                field => sql.push_str(&format!(" AND {} {op} ?", field_column(field))),
            }
            bind_values.push(match &predicate.value {
                FilterValue::Text(text) => Value::Text(text.clone()),
                FilterValue::Integer(number) => Value::Integer(*number),
            });
        }

        let order: Vec<String> = query
            .order
            .iter()
            .map(|key| match key {
                SortKey::Field(FilterField::Topic) => format!("{TOPIC_MIN_SQL} ASC"),
                SortKey::Field(field) => format!("{} ASC", field_column(*field)),
                SortKey::Name => "c.name ASC".to_string(),
            })
            .collect();
        sql.push_str(&format!(" ORDER BY {}, c.uuid ASC;", order.join(", ")));

        self.load_all(&sql, bind_values)
    }

    fn list_nearly_sold_out(&self, max_seats: u32) -> RepoResult<Vec<Conference>> {
        self.load_all(
            &format!(
                "{CONFERENCE_SELECT_SQL}
                 WHERE c.seats_available > 0
                   AND c.seats_available <= ?
                 ORDER BY c.name ASC, c.uuid ASC;"
            ),
            vec![Value::Integer(i64::from(max_seats))],
        )
    }

    fn set_seats_available(&self, id: ConferenceId, seats_available: u32) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE conferences
             SET
                seats_available = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), seats_available],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("conference {id}")));
        }
        Ok(())
    }
}

fn field_column(field: FilterField) -> &'static str {
    match field {
        FilterField::City => "c.city",
        FilterField::Month => "c.month",
        FilterField::MaxAttendees => "c.max_attendees",
        FilterField::Topic => TOPIC_MIN_SQL,
    }
}

fn replace_topics(conn: &Connection, conference: &Conference) -> RepoResult<()> {
    conn.execute(
        "DELETE FROM conference_topics WHERE conference_uuid = ?1;",
        [conference.id.to_string()],
    )?;
    for topic in &conference.topics {
        conn.execute(
            "INSERT OR IGNORE INTO conference_topics (conference_uuid, topic) VALUES (?1, ?2);",
            params![conference.id.to_string(), topic.as_str()],
        )?;
    }
    Ok(())
}

fn load_topics(conn: &Connection, id: ConferenceId) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT topic
         FROM conference_topics
         WHERE conference_uuid = ?1
         ORDER BY topic ASC;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut topics = Vec::new();
    while let Some(row) = rows.next()? {
        topics.push(row.get(0)?);
    }
    Ok(topics)
}

fn parse_conference_row(row: &Row<'_>) -> RepoResult<Conference> {
    let uuid_text: String = row.get("uuid")?;
    let conference = Conference {
        id: parse_db_uuid(&uuid_text, "conferences.uuid")?,
        organizer_user_id: row.get("organizer_user_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        city: row.get("city")?,
        topics: Vec::new(),
        month: parse_db_count(row.get("month")?, "conferences.month")?,
        max_attendees: parse_db_count(row.get("max_attendees")?, "conferences.max_attendees")?,
        seats_available: parse_db_count(
            row.get("seats_available")?,
            "conferences.seats_available",
        )?,
        start_date: parse_db_date(row.get("start_date")?, "conferences.start_date")?,
        end_date: parse_db_date(row.get("end_date")?, "conferences.end_date")?,
    };
    conference
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("conference {}: {err}", conference.id)))?;
    Ok(conference)
}
