//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or named in-memory SQLite connections from a `StoreConfig`.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::{DbError, DbResult, StoreConfig, StoreLocation};
use log::{debug, error};
use rusqlite::{Connection, OpenFlags};
use std::time::Instant;

/// Opens a fresh handle to the configured store and applies pending migrations.
///
/// # Side effects
/// - Performs connection bootstrap and migration checks.
/// - Emits `db_open` logging events on failure, and at debug level on success.
pub fn open_store(config: &StoreConfig) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = config.mode();

    let mut conn = match connect(config) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }
    };

    match bootstrap_connection(&mut conn, config) {
        Ok(()) => {
            debug!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn connect(config: &StoreConfig) -> DbResult<Connection> {
    match &config.location {
        StoreLocation::File(path) => Ok(Connection::open(path)?),
        StoreLocation::Memory(identifier) => {
            let identifier = identifier.trim();
            if identifier.is_empty() {
                return Err(DbError::InvalidConfig(
                    "memory store identifier cannot be empty".to_string(),
                ));
            }
            let uri = format!("file:{identifier}?mode=memory&cache=shared");
            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            Ok(Connection::open_with_flags(uri, flags)?)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, config: &StoreConfig) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(config.busy_timeout)?;
    apply_migrations(conn)?;
    Ok(())
}
