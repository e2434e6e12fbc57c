//! Status machine for maintenance tickets.
//!
//! The machine is split in two layers. `plan_transition` is a pure function
//! over a ticket snapshot: it evaluates the authorization predicate and every
//! guard, and returns what the transition would change without touching
//! storage. `apply_action` commits a plan inside a single transaction with a
//! compare-and-set on the prior status, so two concurrent actions on the same
//! ticket can never both win.
//!
//! Lifecycle: submitted -> in_progress -> needs_approval -> completed ->
//! verified -> closed, with `rejected` reachable from submitted/in_progress.
//! No path leaves `closed` or `rejected`.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::enums::{TicketStatus, UserRole};
use crate::core::shared::schema::maintenance_tickets;

use super::error::WorkflowError;
use super::{approvals, history, load_ticket, MaintenanceTicket};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketAction {
    StartWork,
    Complete,
    Verify,
    Close,
    Reject,
}

impl std::fmt::Display for TicketAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartWork => write!(f, "start_work"),
            Self::Complete => write!(f, "complete"),
            Self::Verify => write!(f, "verify"),
            Self::Close => write!(f, "close"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// Role floor per action, evaluated in one place rather than at call sites.
///
/// `Complete` additionally accepts the current assignee; that check needs the
/// ticket and lives in [`plan_transition`].
pub fn authorize(role: UserRole, action: TicketAction) -> bool {
    match action {
        TicketAction::StartWork | TicketAction::Complete => true,
        TicketAction::Verify | TicketAction::Close | TicketAction::Reject => role.is_supervisor(),
    }
}

/// Everything a committed transition changes on the ticket row.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub action: TicketAction,
    pub next_status: TicketStatus,
    pub sets_completed_at: bool,
    pub sets_closed_at: bool,
    pub resolution_notes: Option<String>,
}

impl TransitionOutcome {
    fn new(action: TicketAction, next_status: TicketStatus) -> Self {
        Self {
            action,
            next_status,
            sets_completed_at: false,
            sets_closed_at: false,
            resolution_notes: None,
        }
    }

    pub fn apply_to(&self, ticket: &mut MaintenanceTicket, now: DateTime<Utc>) {
        ticket.status = self.next_status;
        if self.sets_completed_at {
            ticket.completed_at = Some(now);
        }
        if self.sets_closed_at {
            ticket.closed_at = Some(now);
        }
        if let Some(notes) = &self.resolution_notes {
            ticket.resolution_notes = Some(notes.clone());
        }
        ticket.updated_at = now;
    }

    pub fn audit_note(&self) -> String {
        match self.action {
            TicketAction::StartWork => "work started".to_string(),
            TicketAction::Complete => "work completed".to_string(),
            TicketAction::Verify => "work verified".to_string(),
            TicketAction::Close => "ticket closed".to_string(),
            TicketAction::Reject => "ticket rejected".to_string(),
        }
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Validate a requested transition against the current ticket snapshot.
///
/// Pure: no storage access. `approval_pending` is the caller's view of the
/// cost-approval gate, loaded in the same transaction that commits the plan.
pub fn plan_transition(
    ticket: &MaintenanceTicket,
    actor: &AuthenticatedUser,
    action: TicketAction,
    approval_pending: bool,
    resolution_notes: Option<&str>,
) -> Result<TransitionOutcome, WorkflowError> {
    if ticket.org_id != actor.org_id {
        return Err(WorkflowError::NotFound("ticket"));
    }

    if !authorize(actor.role, action) {
        return Err(WorkflowError::Forbidden(format!(
            "{} requires a manager or admin",
            action
        )));
    }

    if let Some(notes) = resolution_notes {
        if !ticket.is_emergency {
            return Err(WorkflowError::Validation(
                "resolution notes apply only to emergency tickets".to_string(),
            ));
        }
        if is_blank(notes) {
            return Err(WorkflowError::Validation(
                "resolution notes must not be blank".to_string(),
            ));
        }
    }

    let status = ticket.status;

    match action {
        TicketAction::StartWork => {
            if status != TicketStatus::Submitted {
                return Err(WorkflowError::InvalidTransition(format!(
                    "cannot start work on a {} ticket",
                    status
                )));
            }
            // Emergency responders may act before formal assignment is
            // recorded; everyone else needs an assignee or vendor first.
            if !ticket.is_emergency && ticket.assignee_id.is_none() && ticket.vendor_id.is_none() {
                return Err(WorkflowError::PreconditionFailed(
                    "must be assigned before work begins".to_string(),
                ));
            }
            Ok(TransitionOutcome::new(action, TicketStatus::InProgress))
        }
        TicketAction::Complete => {
            let is_assignee = ticket.assignee_id == Some(actor.user_id);
            if !is_assignee && !actor.is_supervisor() {
                return Err(WorkflowError::Forbidden(
                    "only the assignee or a manager/admin may complete a ticket".to_string(),
                ));
            }
            if status != TicketStatus::InProgress {
                return Err(WorkflowError::InvalidTransition(format!(
                    "cannot complete a {} ticket",
                    status
                )));
            }
            let mut outcome = TransitionOutcome::new(action, TicketStatus::Completed);
            outcome.sets_completed_at = true;
            outcome.resolution_notes = resolution_notes.map(|n| n.trim().to_string());
            Ok(outcome)
        }
        TicketAction::Verify => {
            if status != TicketStatus::Completed {
                return Err(WorkflowError::InvalidTransition(format!(
                    "cannot verify a {} ticket",
                    status
                )));
            }
            Ok(TransitionOutcome::new(action, TicketStatus::Verified))
        }
        TicketAction::Close => {
            if status != TicketStatus::Completed && status != TicketStatus::Verified {
                return Err(WorkflowError::InvalidTransition(format!(
                    "cannot close a {} ticket",
                    status
                )));
            }
            if approval_pending {
                return Err(WorkflowError::PreconditionFailed(
                    "a pending cost approval blocks closing".to_string(),
                ));
            }
            if ticket.is_emergency {
                if ticket.contained_at.is_none() {
                    return Err(WorkflowError::PreconditionFailed(
                        "emergency ticket must be contained before it can close".to_string(),
                    ));
                }
                let effective = resolution_notes.or(ticket.resolution_notes.as_deref());
                if effective.map(is_blank).unwrap_or(true) {
                    return Err(WorkflowError::PreconditionFailed(
                        "resolution notes are required to close an emergency ticket".to_string(),
                    ));
                }
            }
            let mut outcome = TransitionOutcome::new(action, TicketStatus::Closed);
            outcome.sets_closed_at = true;
            outcome.resolution_notes = resolution_notes.map(|n| n.trim().to_string());
            Ok(outcome)
        }
        TicketAction::Reject => {
            if status != TicketStatus::Submitted && status != TicketStatus::InProgress {
                return Err(WorkflowError::InvalidTransition(format!(
                    "cannot reject a {} ticket",
                    status
                )));
            }
            Ok(TransitionOutcome::new(action, TicketStatus::Rejected))
        }
    }
}

/// Plan and commit a transition atomically.
///
/// The update is a compare-and-set on the status the plan was computed
/// against; zero affected rows means a concurrent writer got there first and
/// the whole transaction rolls back, audit row included.
pub fn apply_action(
    conn: &mut PgConnection,
    actor: &AuthenticatedUser,
    ticket_id: Uuid,
    action: TicketAction,
    resolution_notes: Option<String>,
) -> Result<MaintenanceTicket, WorkflowError> {
    conn.transaction::<_, WorkflowError, _>(|conn| {
        let mut ticket = load_ticket(conn, actor.org_id, ticket_id)?;
        let approval_pending = approvals::has_pending(conn, actor.org_id, ticket_id)?;

        let outcome = plan_transition(
            &ticket,
            actor,
            action,
            approval_pending,
            resolution_notes.as_deref(),
        )?;

        let prior = ticket.status;
        let now = Utc::now();
        outcome.apply_to(&mut ticket, now);

        let updated = diesel::update(
            maintenance_tickets::table
                .filter(maintenance_tickets::id.eq(ticket_id))
                .filter(maintenance_tickets::org_id.eq(actor.org_id))
                .filter(maintenance_tickets::status.eq(prior))
                .filter(maintenance_tickets::deleted_at.is_null()),
        )
        .set((
            maintenance_tickets::status.eq(ticket.status),
            maintenance_tickets::resolution_notes.eq(ticket.resolution_notes.clone()),
            maintenance_tickets::completed_at.eq(ticket.completed_at),
            maintenance_tickets::closed_at.eq(ticket.closed_at),
            maintenance_tickets::updated_at.eq(ticket.updated_at),
        ))
        .execute(conn)?;

        if updated == 0 {
            return Err(WorkflowError::Conflict(format!(
                "ticket {} was modified concurrently",
                ticket.ticket_number
            )));
        }

        history::append(
            conn,
            &ticket,
            actor.user_id,
            Some(outcome.audit_note()),
        )?;

        Ok(ticket)
    })
}
