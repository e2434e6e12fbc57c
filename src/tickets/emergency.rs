//! Emergency containment sub-flow.
//!
//! Orthogonal to the main status machine: containment marks that the unsafe
//! condition is stabilized without moving the ticket. Resolution rides on the
//! ordinary complete/close transitions (see `workflow`), which demand
//! containment plus non-blank resolution notes before an emergency ticket can
//! reach `closed`.

use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::enums::TicketStatus;
use crate::core::shared::schema::maintenance_tickets;

use super::error::WorkflowError;
use super::{history, load_ticket, MaintenanceTicket};

/// Pure validation for marking containment.
///
/// Allowed while the ticket is still `submitted`, by the assignee or a
/// manager/admin; emergencies deliberately skip the assignment guard so a
/// responder can act before dispatch catches up.
pub fn plan_containment(
    ticket: &MaintenanceTicket,
    actor: &AuthenticatedUser,
) -> Result<(), WorkflowError> {
    if ticket.org_id != actor.org_id {
        return Err(WorkflowError::NotFound("ticket"));
    }
    if !ticket.is_emergency {
        return Err(WorkflowError::PreconditionFailed(
            "containment applies only to emergency tickets".to_string(),
        ));
    }
    let is_assignee = ticket.assignee_id == Some(actor.user_id);
    if !is_assignee && !actor.is_supervisor() {
        return Err(WorkflowError::Forbidden(
            "only the assignee or a manager/admin may mark containment".to_string(),
        ));
    }
    if ticket.status != TicketStatus::Submitted {
        return Err(WorkflowError::InvalidTransition(format!(
            "containment can only be marked while submitted, not {}",
            ticket.status
        )));
    }
    if ticket.contained_at.is_some() {
        return Err(WorkflowError::PreconditionFailed(
            "ticket is already contained".to_string(),
        ));
    }
    Ok(())
}

pub fn mark_contained(
    conn: &mut PgConnection,
    actor: &AuthenticatedUser,
    ticket_id: Uuid,
) -> Result<MaintenanceTicket, WorkflowError> {
    conn.transaction::<_, WorkflowError, _>(|conn| {
        let mut ticket = load_ticket(conn, actor.org_id, ticket_id)?;
        plan_containment(&ticket, actor)?;

        let now = Utc::now();
        ticket.contained_at = Some(now);
        ticket.updated_at = now;

        let updated = diesel::update(
            maintenance_tickets::table
                .filter(maintenance_tickets::id.eq(ticket_id))
                .filter(maintenance_tickets::org_id.eq(actor.org_id))
                .filter(maintenance_tickets::contained_at.is_null())
                .filter(maintenance_tickets::deleted_at.is_null()),
        )
        .set((
            maintenance_tickets::contained_at.eq(ticket.contained_at),
            maintenance_tickets::updated_at.eq(now),
        ))
        .execute(conn)?;

        if updated == 0 {
            return Err(WorkflowError::Conflict(format!(
                "ticket {} was contained concurrently",
                ticket.ticket_number
            )));
        }

        history::append(
            conn,
            &ticket,
            actor.user_id,
            Some("emergency contained".to_string()),
        )?;

        Ok(ticket)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::enums::UserRole;
    use crate::tickets::test_support::{actor, ticket};

    #[test]
    fn test_containment_only_for_emergencies() {
        let t = ticket(TicketStatus::Submitted, false);
        let manager = actor(UserRole::Manager);
        let err = plan_containment(&t, &manager).unwrap_err();
        assert!(matches!(err, WorkflowError::PreconditionFailed(_)));
    }

    #[test]
    fn test_containment_while_submitted_without_assignee() {
        let t = ticket(TicketStatus::Submitted, true);
        let manager = actor(UserRole::Manager);
        assert!(plan_containment(&t, &manager).is_ok());
    }

    #[test]
    fn test_containment_actor_set() {
        let t = ticket(TicketStatus::Submitted, true);

        let requester = actor(UserRole::User);
        let err = plan_containment(&t, &requester).unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));

        let staff = actor(UserRole::Staff);
        assert!(plan_containment(&t, &staff).is_err());

        let mut assigned = ticket(TicketStatus::Submitted, true);
        assigned.assignee_id = Some(staff.user_id);
        assert!(plan_containment(&assigned, &staff).is_ok());
    }

    #[test]
    fn test_containment_wrong_status() {
        let t = ticket(TicketStatus::InProgress, true);
        let admin = actor(UserRole::Admin);
        let err = plan_containment(&t, &admin).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition(_)));
    }

    #[test]
    fn test_containment_not_repeatable() {
        let mut t = ticket(TicketStatus::Submitted, true);
        t.contained_at = Some(Utc::now());
        let admin = actor(UserRole::Admin);
        let err = plan_containment(&t, &admin).unwrap_err();
        assert!(err.to_string().contains("already contained"));
    }
}
