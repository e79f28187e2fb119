//! Storage collaborators for repair tickets.
//!
//! The store handle is built once at startup ([`open_store`]) and shared as
//! `Arc<dyn TicketStore>`; nothing in the crate keeps a global client.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};
use crate::db::query::RepairFilter;
use crate::model::ticket::RepairTicket;

/// Persistence operations the ticket layer relies on.
pub trait TicketStore: Send + Sync {
    /// Durably insert one ticket. A returned error means nothing was stored.
    fn insert(&self, ticket: &RepairTicket) -> Result<()>;

    /// All tickets matching `filter`, in store order.
    fn query(&self, filter: &RepairFilter) -> Result<Vec<RepairTicket>>;

    /// The ticket with exactly this id, if any.
    fn get(&self, id: &str) -> Result<Option<RepairTicket>>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Build the configured store.
///
/// # Errors
///
/// Returns an error if the SQLite database cannot be opened or migrated.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn TicketStore>> {
    let store: Arc<dyn TicketStore> = match config.backend {
        StorageBackend::Sqlite => Arc::new(SqliteStore::open(&config.path)?),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };
    tracing::info!(backend = store.backend(), "repair store ready");
    Ok(store)
}
