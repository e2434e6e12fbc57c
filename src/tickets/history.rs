//! Append-only audit trail.
//!
//! One row per ticket-visible state change: transitions, assignment calls,
//! containment, approval requests and decisions. Rows are never updated or
//! deleted, not even when the parent ticket is soft-deleted; replaying them in
//! timestamp order reconstructs the full lifecycle.

use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::core::shared::schema::ticket_status_history;

use super::error::WorkflowError;
use super::{MaintenanceTicket, TicketStatusHistory};

/// Append one audit row recording the ticket's (possibly unchanged) status.
/// Callers run this inside the same transaction as the mutation it records.
pub fn append(
    conn: &mut PgConnection,
    ticket: &MaintenanceTicket,
    actor_id: Uuid,
    note: Option<String>,
) -> Result<TicketStatusHistory, WorkflowError> {
    let entry = TicketStatusHistory {
        id: Uuid::new_v4(),
        org_id: ticket.org_id,
        ticket_id: ticket.id,
        status: ticket.status,
        actor_id,
        note,
        created_at: Utc::now(),
    };

    diesel::insert_into(ticket_status_history::table)
        .values(&entry)
        .execute(conn)?;

    Ok(entry)
}

/// Full trail for a ticket, oldest first.
pub fn list_for_ticket(
    conn: &mut PgConnection,
    org_id: Uuid,
    ticket_id: Uuid,
) -> Result<Vec<TicketStatusHistory>, WorkflowError> {
    let entries = ticket_status_history::table
        .filter(ticket_status_history::org_id.eq(org_id))
        .filter(ticket_status_history::ticket_id.eq(ticket_id))
        .order(ticket_status_history::created_at.asc())
        .load::<TicketStatusHistory>(conn)?;

    Ok(entries)
}
