//! Immediate-transaction runner with bounded retry on write contention.
//!
//! # Invariants
//! - The body runs inside `BEGIN IMMEDIATE`, so the write lock is held from the
//!   first read; check-then-write sequences cannot interleave.
//! - A body error rolls the transaction back (drop without commit).
//! - Only contention errors are retried; every other error returns at once.

use log::warn;
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};

/// Attempts made for one ledger transaction unless configured otherwise.
pub const DEFAULT_TRANSACTION_ATTEMPTS: u32 = 3;

/// Errors that can report store write contention.
pub trait Contention {
    /// Returns true when the failure came from a busy/locked database.
    fn is_contention(&self) -> bool;
}

/// Returns true for SQLite busy/locked failures.
pub fn is_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
    )
}

/// Runs `body` in an immediate transaction, retrying on contention.
///
/// Returns the last contention error once `max_attempts` are used up.
pub fn run_immediate<T, E, F>(conn: &Connection, max_attempts: u32, mut body: F) -> Result<T, E>
where
    E: From<rusqlite::Error> + Contention,
    F: FnMut(&Transaction<'_>) -> Result<T, E>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match attempt_once(conn, &mut body) {
            Err(err) if err.is_contention() && attempt < max_attempts => {
                warn!(
                    "event=tx_retry module=db status=retry attempt={attempt} max_attempts={max_attempts}"
                );
                attempt += 1;
            }
            other => return other,
        }
    }
}

fn attempt_once<T, E, F>(conn: &Connection, body: &mut F) -> Result<T, E>
where
    E: From<rusqlite::Error>,
    F: FnMut(&Transaction<'_>) -> Result<T, E>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let value = body(&tx)?;
    tx.commit()?;
    Ok(value)
}
