//! Cost approval gate.
//!
//! A satellite pending/approved/denied machine a manager or admin attaches to
//! a ticket. While pending it parks the ticket in `needs_approval` and blocks
//! `close`. The status held before the request is stored on the approval row
//! itself, so `deny` restores it in O(1) instead of replaying history.
//! Decisions are single-shot: the update compare-and-sets on the pending row,
//! and a second decision fails instead of double-applying.

use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::enums::{ApprovalStatus, TicketStatus};
use crate::core::shared::schema::{cost_approvals, maintenance_tickets};

use super::error::WorkflowError;
use super::{history, load_ticket, CostApproval, MaintenanceTicket};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Deny,
}

/// Pure validation for a new approval request.
pub fn validate_request(
    actor: &AuthenticatedUser,
    ticket: &MaintenanceTicket,
    estimated_cost: &BigDecimal,
    already_pending: bool,
) -> Result<(), WorkflowError> {
    if !actor.is_supervisor() {
        return Err(WorkflowError::Forbidden(
            "request_approval requires a manager or admin".to_string(),
        ));
    }
    if *estimated_cost <= BigDecimal::from(0) {
        return Err(WorkflowError::Validation(
            "estimated cost must be positive".to_string(),
        ));
    }
    if ticket.status != TicketStatus::Submitted && ticket.status != TicketStatus::InProgress {
        return Err(WorkflowError::InvalidTransition(format!(
            "cannot request approval for a {} ticket",
            ticket.status
        )));
    }
    if already_pending {
        return Err(WorkflowError::PreconditionFailed(
            "a cost approval is already pending for this ticket".to_string(),
        ));
    }
    Ok(())
}

/// Pure validation for deciding a pending approval.
pub fn validate_decision(
    actor: &AuthenticatedUser,
    approval_status: ApprovalStatus,
    decision: ApprovalDecision,
    reason: Option<&str>,
) -> Result<(), WorkflowError> {
    if !actor.is_supervisor() {
        return Err(WorkflowError::Forbidden(
            "approval decisions require a manager or admin".to_string(),
        ));
    }
    if approval_status != ApprovalStatus::Pending {
        return Err(WorkflowError::PreconditionFailed(format!(
            "approval is already {}",
            approval_status
        )));
    }
    if decision == ApprovalDecision::Deny && reason.map(|r| r.trim().is_empty()).unwrap_or(true) {
        return Err(WorkflowError::Validation(
            "a denial reason is required".to_string(),
        ));
    }
    Ok(())
}

/// Ticket status after a decision: approve resumes work, deny restores the
/// exact status held when approval was requested.
pub fn resume_status(decision: ApprovalDecision, prior_status: TicketStatus) -> TicketStatus {
    match decision {
        ApprovalDecision::Approve => TicketStatus::InProgress,
        ApprovalDecision::Deny => prior_status,
    }
}

pub fn has_pending(
    conn: &mut PgConnection,
    org_id: Uuid,
    ticket_id: Uuid,
) -> Result<bool, WorkflowError> {
    let count: i64 = cost_approvals::table
        .filter(cost_approvals::org_id.eq(org_id))
        .filter(cost_approvals::ticket_id.eq(ticket_id))
        .filter(cost_approvals::status.eq(ApprovalStatus::Pending))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

pub fn list_for_ticket(
    conn: &mut PgConnection,
    org_id: Uuid,
    ticket_id: Uuid,
) -> Result<Vec<CostApproval>, WorkflowError> {
    let approvals = cost_approvals::table
        .filter(cost_approvals::org_id.eq(org_id))
        .filter(cost_approvals::ticket_id.eq(ticket_id))
        .order(cost_approvals::created_at.desc())
        .load::<CostApproval>(conn)?;
    Ok(approvals)
}

/// Create a pending approval and park the ticket in `needs_approval`.
pub fn request_approval(
    conn: &mut PgConnection,
    actor: &AuthenticatedUser,
    ticket_id: Uuid,
    estimated_cost: BigDecimal,
    notes: Option<String>,
    document_id: Option<Uuid>,
) -> Result<(CostApproval, MaintenanceTicket), WorkflowError> {
    conn.transaction::<_, WorkflowError, _>(|conn| {
        let mut ticket = load_ticket(conn, actor.org_id, ticket_id)?;
        let already_pending = has_pending(conn, actor.org_id, ticket_id)?;
        validate_request(actor, &ticket, &estimated_cost, already_pending)?;

        let now = Utc::now();
        let approval = CostApproval {
            id: Uuid::new_v4(),
            org_id: actor.org_id,
            ticket_id,
            requested_by: actor.user_id,
            estimated_cost,
            document_id,
            notes,
            status: ApprovalStatus::Pending,
            prior_status: ticket.status,
            reviewed_by: None,
            decided_at: None,
            denial_reason: None,
            created_at: now,
        };

        diesel::insert_into(cost_approvals::table)
            .values(&approval)
            .execute(conn)?;

        let prior = ticket.status;
        ticket.status = TicketStatus::NeedsApproval;
        ticket.updated_at = now;

        let updated = diesel::update(
            maintenance_tickets::table
                .filter(maintenance_tickets::id.eq(ticket_id))
                .filter(maintenance_tickets::org_id.eq(actor.org_id))
                .filter(maintenance_tickets::status.eq(prior))
                .filter(maintenance_tickets::deleted_at.is_null()),
        )
        .set((
            maintenance_tickets::status.eq(TicketStatus::NeedsApproval),
            maintenance_tickets::updated_at.eq(now),
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
            Some("cost approval requested".to_string()),
        )?;

        Ok((approval, ticket))
    })
}

/// Decide a pending approval exactly once and move the ticket accordingly.
pub fn decide(
    conn: &mut PgConnection,
    actor: &AuthenticatedUser,
    approval_id: Uuid,
    decision: ApprovalDecision,
    reason: Option<String>,
) -> Result<(CostApproval, MaintenanceTicket), WorkflowError> {
    conn.transaction::<_, WorkflowError, _>(|conn| {
        let mut approval = cost_approvals::table
            .filter(cost_approvals::id.eq(approval_id))
            .filter(cost_approvals::org_id.eq(actor.org_id))
            .first::<CostApproval>(conn)
            .optional()?
            .ok_or(WorkflowError::NotFound("approval"))?;

        validate_decision(actor, approval.status, decision, reason.as_deref())?;

        let now = Utc::now();
        approval.status = match decision {
            ApprovalDecision::Approve => ApprovalStatus::Approved,
            ApprovalDecision::Deny => ApprovalStatus::Denied,
        };
        approval.reviewed_by = Some(actor.user_id);
        approval.decided_at = Some(now);
        approval.denial_reason = match decision {
            ApprovalDecision::Deny => reason.map(|r| r.trim().to_string()),
            ApprovalDecision::Approve => None,
        };

        // CAS on the pending row guarantees exactly one decision ever applies.
        let decided = diesel::update(
            cost_approvals::table
                .filter(cost_approvals::id.eq(approval_id))
                .filter(cost_approvals::org_id.eq(actor.org_id))
                .filter(cost_approvals::status.eq(ApprovalStatus::Pending)),
        )
        .set((
            cost_approvals::status.eq(approval.status),
            cost_approvals::reviewed_by.eq(approval.reviewed_by),
            cost_approvals::decided_at.eq(approval.decided_at),
            cost_approvals::denial_reason.eq(approval.denial_reason.clone()),
        ))
        .execute(conn)?;

        if decided == 0 {
            return Err(WorkflowError::PreconditionFailed(
                "approval was already decided".to_string(),
            ));
        }

        let mut ticket = load_ticket(conn, actor.org_id, approval.ticket_id)?;
        let next = resume_status(decision, approval.prior_status);

        let moved = diesel::update(
            maintenance_tickets::table
                .filter(maintenance_tickets::id.eq(ticket.id))
                .filter(maintenance_tickets::org_id.eq(actor.org_id))
                .filter(maintenance_tickets::status.eq(TicketStatus::NeedsApproval))
                .filter(maintenance_tickets::deleted_at.is_null()),
        )
        .set((
            maintenance_tickets::status.eq(next),
            maintenance_tickets::updated_at.eq(now),
        ))
        .execute(conn)?;

        if moved == 0 {
            return Err(WorkflowError::Conflict(format!(
                "ticket {} was modified concurrently",
                ticket.ticket_number
            )));
        }

        ticket.status = next;
        ticket.updated_at = now;

        let note = match decision {
            ApprovalDecision::Approve => "cost approval approved".to_string(),
            ApprovalDecision::Deny => format!(
                "cost approval denied: {}",
                approval.denial_reason.as_deref().unwrap_or_default()
            ),
        };
        history::append(conn, &ticket, actor.user_id, Some(note))?;

        Ok((approval, ticket))
    })
}
