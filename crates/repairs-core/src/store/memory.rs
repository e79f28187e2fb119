use anyhow::{Result, anyhow};
use std::sync::{Mutex, MutexGuard};

use super::TicketStore;
use crate::db::query::RepairFilter;
use crate::model::ticket::RepairTicket;

/// Process-lifetime ticket list.
///
/// Appends and reads each take the lock once, so a concurrent reader sees a
/// ticket either fully or not at all.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tickets: Mutex<Vec<RepairTicket>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<RepairTicket>>> {
        self.tickets
            .lock()
            .map_err(|_| anyhow!("in-memory repair store lock poisoned"))
    }
}

impl TicketStore for MemoryStore {
    fn insert(&self, ticket: &RepairTicket) -> Result<()> {
        let mut tickets = self.lock()?;
        if tickets.iter().any(|t| t.id == ticket.id) {
            anyhow::bail!("repair '{}' already exists", ticket.id);
        }
        tickets.push(ticket.clone());
        Ok(())
    }

    fn query(&self, filter: &RepairFilter) -> Result<Vec<RepairTicket>> {
        Ok(self
            .lock()?
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    fn get(&self, id: &str) -> Result<Option<RepairTicket>> {
        Ok(self.lock()?.iter().find(|t| t.id == id).cloned())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
