//! Ticket operations: create, list and fetch over a [`TicketStore`].
//!
//! Store errors are wrapped, not translated: the caller only learns whether a
//! write or a read failed, plus the original error chain.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::authorship::CallerContext;
use crate::db::query::RepairFilter;
use crate::error::RepairError;
use crate::model::ticket::{NewRepair, RepairTicket};
use crate::store::TicketStore;

/// Build a ticket for `new`, credit it to `caller`, and insert it.
///
/// The ticket is only returned after the store accepted it.
///
/// # Errors
///
/// Returns [`RepairError::WriteFailed`] if the store rejects the insert.
pub fn create_ticket(
    store: &dyn TicketStore,
    new: NewRepair,
    caller: &CallerContext,
) -> Result<RepairTicket, RepairError> {
    let ticket = RepairTicket::from_new(new, caller.created_by(), Utc::now());

    if let Err(err) = store.insert(&ticket) {
        warn!(repair_id = %ticket.id, error = %format!("{err:#}"), "repair insert failed");
        return Err(RepairError::WriteFailed(err));
    }

    info!(
        repair_id = %ticket.id,
        created_by = ticket.created_by.as_deref().unwrap_or_default(),
        status = %ticket.status,
        "repair created"
    );
    Ok(ticket)
}

/// List tickets matching `filter`. An empty result is `Ok(vec![])`.
///
/// # Errors
///
/// Returns [`RepairError::ReadFailed`] if the store query fails.
pub fn list_tickets(
    store: &dyn TicketStore,
    filter: &RepairFilter,
) -> Result<Vec<RepairTicket>, RepairError> {
    let tickets = store.query(filter).map_err(RepairError::ReadFailed)?;
    debug!(count = tickets.len(), ?filter, "listed repairs");
    Ok(tickets)
}

/// Fetch one ticket by id.
///
/// # Errors
///
/// Returns [`RepairError::NotFound`] on a miss and
/// [`RepairError::ReadFailed`] if the store query fails.
pub fn get_ticket(store: &dyn TicketStore, id: &str) -> Result<RepairTicket, RepairError> {
    store
        .get(id)
        .map_err(RepairError::ReadFailed)?
        .ok_or_else(|| RepairError::NotFound { id: id.to_string() })
}
