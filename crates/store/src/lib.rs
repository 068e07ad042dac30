//! Durable storage for the mesh routing and trust subsystem.
//!
//! A single [`Store`] handle wraps one SQLite connection behind a mutex and
//! is cloned into every component; there is no other shared mutable state.
//! Every mutation is a single SQL upsert or conditional update whose WHERE
//! clause carries its precondition, so concurrent callers compose by
//! last-writer-wins instead of read-modify-write races.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use loomnet_core::error::Result;

mod identity;
mod node;
mod notification;
mod route;
mod schema;
mod trust;
mod verification;

/// Cloneable handle to the relational store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at `path` and initialize the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        // WAL keeps maintenance sweeps from blocking live readers.
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with the connection held. Statement execution is serialized
    /// here; the atomicity guarantees live in the SQL itself.
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }
}

/// Map a stored enum string onto its domain type inside a rusqlite row
/// closure.
pub(crate) fn parse_text<T>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = loomnet_core::Error>,
{
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e.to_string(),
            )),
        )
    })
}
