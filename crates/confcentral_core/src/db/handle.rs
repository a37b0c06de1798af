//! Shareable entity store handle.
//!
//! # Responsibility
//! - Let services, ledgers and background workers share one migrated connection.
//! - Carry the transaction attempt limit used by ledger writes.
//!
//! # Invariants
//! - The connection is only reachable while the handle's lock is held.
//! - Callers must not re-enter [`Database::with_conn`] from inside the closure.

use super::tx::DEFAULT_TRANSACTION_ATTEMPTS;
use super::{open_db, open_db_in_memory, DbError, DbResult};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Cloneable handle over one SQLite connection.
///
/// Clones share the same connection. Independent handles opened on the same
/// file contend through SQLite's own locking.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    transaction_attempts: u32,
}

impl Database {
    /// Opens (and migrates) a file-backed store.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens (and migrates) a private in-memory store.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            transaction_attempts: DEFAULT_TRANSACTION_ATTEMPTS,
        }
    }

    /// Overrides how many times a contended ledger transaction is attempted.
    ///
    /// Values below 1 are raised to 1.
    pub fn with_transaction_attempts(mut self, attempts: u32) -> Self {
        self.transaction_attempts = attempts.max(1);
        self
    }

    /// Attempt limit for immediate transactions.
    pub fn transaction_attempts(&self) -> u32 {
        self.transaction_attempts
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_conn<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let guard = self.conn.lock().map_err(|_| E::from(DbError::Poisoned))?;
        f(&guard)
    }
}
