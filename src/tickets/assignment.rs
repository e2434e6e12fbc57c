//! Staff/vendor assignment.
//!
//! Assignment never changes ticket status; it only flips the guard the status
//! machine evaluates for `start_work`. Staff and vendor are independent slots:
//! setting one never clears the other, and re-assignment overwrites silently
//! (notifying the previous assignee is the dispatcher's job). One audit row is
//! written per assign call, even when both slots are set at once.

use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::schema::maintenance_tickets;

use super::error::WorkflowError;
use super::{history, load_ticket, MaintenanceTicket};

/// Pure validation for an assignment request.
pub fn plan_assignment(
    actor: &AuthenticatedUser,
    staff_id: Option<Uuid>,
    vendor_id: Option<Uuid>,
) -> Result<(), WorkflowError> {
    if !actor.is_supervisor() {
        return Err(WorkflowError::Forbidden(
            "assign requires a manager or admin".to_string(),
        ));
    }
    if staff_id.is_none() && vendor_id.is_none() {
        return Err(WorkflowError::Validation(
            "assignment requires a staff id, a vendor id, or both".to_string(),
        ));
    }
    Ok(())
}

pub fn assign(
    conn: &mut PgConnection,
    actor: &AuthenticatedUser,
    ticket_id: Uuid,
    staff_id: Option<Uuid>,
    vendor_id: Option<Uuid>,
) -> Result<MaintenanceTicket, WorkflowError> {
    plan_assignment(actor, staff_id, vendor_id)?;

    conn.transaction::<_, WorkflowError, _>(|conn| {
        let mut ticket = load_ticket(conn, actor.org_id, ticket_id)?;

        let now = Utc::now();
        if let Some(staff) = staff_id {
            ticket.assignee_id = Some(staff);
        }
        if let Some(vendor) = vendor_id {
            ticket.vendor_id = Some(vendor);
        }
        ticket.updated_at = now;

        diesel::update(
            maintenance_tickets::table
                .filter(maintenance_tickets::id.eq(ticket_id))
                .filter(maintenance_tickets::org_id.eq(actor.org_id))
                .filter(maintenance_tickets::deleted_at.is_null()),
        )
        .set((
            maintenance_tickets::assignee_id.eq(ticket.assignee_id),
            maintenance_tickets::vendor_id.eq(ticket.vendor_id),
            maintenance_tickets::updated_at.eq(now),
        ))
        .execute(conn)?;

        let note = match (staff_id, vendor_id) {
            (Some(_), Some(_)) => "staff and vendor assigned",
            (Some(_), None) => "staff assigned",
            (None, Some(_)) => "vendor assigned",
            (None, None) => unreachable!("validated above"),
        };
        history::append(conn, &ticket, actor.user_id, Some(note.to_string()))?;

        Ok(ticket)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::enums::UserRole;
    use crate::tickets::test_support::actor;

    #[test]
    fn test_assignment_is_supervisor_only() {
        let staff = actor(UserRole::Staff);
        let err = plan_assignment(&staff, Some(Uuid::new_v4()), None).unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));

        let manager = actor(UserRole::Manager);
        assert!(plan_assignment(&manager, Some(Uuid::new_v4()), None).is_ok());
        assert!(plan_assignment(&manager, None, Some(Uuid::new_v4())).is_ok());
    }

    #[test]
    fn test_assignment_requires_a_target() {
        let admin = actor(UserRole::Admin);
        let err = plan_assignment(&admin, None, None).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }
}
