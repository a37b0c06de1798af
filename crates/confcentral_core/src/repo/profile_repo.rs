//! Profile repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist profiles and their two id-sets (registration roster, wishlist).
//! - Expose membership primitives used by the ledgers.
//!
//! # Invariants
//! - Membership rows are keyed by `(user_id, entity uuid)`; duplicates are
//!   impossible at the schema level.

use super::{parse_db_uuid, RepoError, RepoResult};
use crate::model::profile::{Profile, TeeShirtSize};
use crate::model::{ConferenceId, SessionId};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;

/// Repository interface for profile persistence and membership sets.
pub trait ProfileRepository {
    /// Inserts the profile row; the id-sets of `profile` are ignored.
    fn create_profile(&self, profile: &Profile) -> RepoResult<()>;
    fn profile_exists(&self, user_id: &str) -> RepoResult<bool>;
    /// Loads the profile with both id-sets.
    fn get_profile(&self, user_id: &str) -> RepoResult<Option<Profile>>;
    fn update_profile_fields(
        &self,
        user_id: &str,
        display_name: &str,
        tee_shirt_size: TeeShirtSize,
    ) -> RepoResult<()>;

    fn is_registered(&self, user_id: &str, conference_id: ConferenceId) -> RepoResult<bool>;
    fn add_registration(&self, user_id: &str, conference_id: ConferenceId) -> RepoResult<()>;
    fn remove_registration(&self, user_id: &str, conference_id: ConferenceId) -> RepoResult<()>;
    /// Number of profiles whose roster contains the conference.
    fn count_registrations(&self, conference_id: ConferenceId) -> RepoResult<u32>;

    fn is_wishlisted(&self, user_id: &str, session_id: SessionId) -> RepoResult<bool>;
    fn add_to_wishlist(&self, user_id: &str, session_id: SessionId) -> RepoResult<()>;
    fn remove_from_wishlist(&self, user_id: &str, session_id: SessionId) -> RepoResult<()>;
    /// Number of profiles whose wishlist contains the session.
    fn count_wishlisted(&self, session_id: SessionId) -> RepoResult<u32>;
}

/// SQLite-backed profile repository.
pub struct SqliteProfileRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProfileRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn member_ids(
        &self,
        sql: &str,
        user_id: &str,
        column: &'static str,
    ) -> RepoResult<BTreeSet<uuid::Uuid>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([user_id])?;
        let mut ids = BTreeSet::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.insert(parse_db_uuid(&value, column)?);
        }
        Ok(ids)
    }

    fn count(&self, sql: &str, id: uuid::Uuid, column: &'static str) -> RepoResult<u32> {
        let count: i64 = self.conn.query_row(sql, [id.to_string()], |row| row.get(0))?;
        super::parse_db_count(count, column)
    }
}

impl ProfileRepository for SqliteProfileRepository<'_> {
    fn create_profile(&self, profile: &Profile) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO profiles (user_id, display_name, main_email, tee_shirt_size)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                profile.user_id.as_str(),
                profile.display_name.as_str(),
                profile.main_email.as_str(),
                profile.tee_shirt_size.code(),
            ],
        )?;
        Ok(())
    }

    fn profile_exists(&self, user_id: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM profiles WHERE user_id = ?1);",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn get_profile(&self, user_id: &str) -> RepoResult<Option<Profile>> {
        let row = self
            .conn
            .query_row(
                "SELECT display_name, main_email, tee_shirt_size
                 FROM profiles
                 WHERE user_id = ?1;",
                [user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((display_name, main_email, size_code)) = row else {
            return Ok(None);
        };

        let tee_shirt_size = TeeShirtSize::parse(&size_code).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid shirt size `{size_code}` in profiles.tee_shirt_size"
            ))
        })?;

        Ok(Some(Profile {
            user_id: user_id.to_string(),
            display_name,
            main_email,
            tee_shirt_size,
            conference_keys_to_attend: self.member_ids(
                "SELECT conference_uuid FROM profile_registrations WHERE user_id = ?1;",
                user_id,
                "profile_registrations.conference_uuid",
            )?,
            session_keys_in_wishlist: self.member_ids(
                "SELECT session_uuid FROM profile_wishlist WHERE user_id = ?1;",
                user_id,
                "profile_wishlist.session_uuid",
            )?,
        }))
    }

    fn update_profile_fields(
        &self,
        user_id: &str,
        display_name: &str,
        tee_shirt_size: TeeShirtSize,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE profiles
             SET
                display_name = ?2,
                tee_shirt_size = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE user_id = ?1;",
            params![user_id, display_name, tee_shirt_size.code()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("profile {user_id}")));
        }
        Ok(())
    }

    fn is_registered(&self, user_id: &str, conference_id: ConferenceId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM profile_registrations
                WHERE user_id = ?1 AND conference_uuid = ?2
            );",
            params![user_id, conference_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn add_registration(&self, user_id: &str, conference_id: ConferenceId) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO profile_registrations (user_id, conference_uuid) VALUES (?1, ?2);",
            params![user_id, conference_id.to_string()],
        )?;
        Ok(())
    }

    fn remove_registration(&self, user_id: &str, conference_id: ConferenceId) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM profile_registrations WHERE user_id = ?1 AND conference_uuid = ?2;",
            params![user_id, conference_id.to_string()],
        )?;
        Ok(())
    }

    fn count_registrations(&self, conference_id: ConferenceId) -> RepoResult<u32> {
        self.count(
            "SELECT COUNT(*) FROM profile_registrations WHERE conference_uuid = ?1;",
            conference_id,
            "profile_registrations",
        )
    }

    fn is_wishlisted(&self, user_id: &str, session_id: SessionId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM profile_wishlist
                WHERE user_id = ?1 AND session_uuid = ?2
            );",
            params![user_id, session_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn add_to_wishlist(&self, user_id: &str, session_id: SessionId) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO profile_wishlist (user_id, session_uuid) VALUES (?1, ?2);",
            params![user_id, session_id.to_string()],
        )?;
        Ok(())
    }

    fn remove_from_wishlist(&self, user_id: &str, session_id: SessionId) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM profile_wishlist WHERE user_id = ?1 AND session_uuid = ?2;",
            params![user_id, session_id.to_string()],
        )?;
        Ok(())
    }

    fn count_wishlisted(&self, session_id: SessionId) -> RepoResult<u32> {
        self.count(
            "SELECT COUNT(*) FROM profile_wishlist WHERE session_uuid = ?1;",
            session_id,
            "profile_wishlist",
        )
    }
}
