use anyhow::{Result, anyhow};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::TicketStore;
use crate::db::query::RepairFilter;
use crate::db::{self, query};
use crate::model::ticket::RepairTicket;

/// Ticket store over a single SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating and migrating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = db::open_database(path)?;
        tracing::debug!(path = %path.display(), "opened sqlite repair store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database; mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be configured.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(db::open_in_memory()?),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite repair store lock poisoned"))
    }
}

impl TicketStore for SqliteStore {
    fn insert(&self, ticket: &RepairTicket) -> Result<()> {
        let conn = self.lock()?;
        query::insert_ticket(&conn, ticket)
    }

    fn query(&self, filter: &RepairFilter) -> Result<Vec<RepairTicket>> {
        let conn = self.lock()?;
        query::list_tickets(&conn, filter)
    }

    fn get(&self, id: &str) -> Result<Option<RepairTicket>> {
        let conn = self.lock()?;
        query::get_ticket(&conn, id)
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
