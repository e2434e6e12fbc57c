//! End-to-end lifecycle scenarios driven through the pure workflow planner.
//!
//! Each test mirrors a real sequence of API calls: every committed step
//! applies the planned outcome to the in-memory ticket and appends the
//! resulting status to a shadow audit trail, which must replay to the final
//! state.

use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use maintserver::core::middleware::AuthenticatedUser;
use maintserver::core::shared::enums::{ApprovalStatus, TicketPriority, TicketStatus, UserRole};
use maintserver::tickets::approvals::{
    resume_status, validate_decision, validate_request, ApprovalDecision,
};
use maintserver::tickets::duplicates::titles_match;
use maintserver::tickets::emergency::plan_containment;
use maintserver::tickets::error::WorkflowError;
use maintserver::tickets::workflow::{plan_transition, TicketAction};
use maintserver::tickets::{CostApproval, MaintenanceTicket};

const ORG: Uuid = Uuid::from_u128(0x74657374206f7267000000000000bb01);

fn make_actor(role: UserRole) -> AuthenticatedUser {
    AuthenticatedUser::new(Uuid::new_v4(), ORG, role)
}

fn make_ticket(title: &str, is_emergency: bool) -> MaintenanceTicket {
    let now = Utc::now();
    MaintenanceTicket {
        id: Uuid::new_v4(),
        org_id: ORG,
        ticket_number: "MNT-000042".to_string(),
        title: title.to_string(),
        description: None,
        category: None,
        priority: TicketPriority::Medium,
        location_id: Uuid::from_u128(0x10c),
        asset_id: None,
        is_emergency,
        status: TicketStatus::Submitted,
        assignee_id: None,
        vendor_id: None,
        requested_by: Uuid::new_v4(),
        contained_at: None,
        resolution_notes: None,
        completed_at: None,
        closed_at: None,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Apply a planned transition the way the service layer commits it, recording
/// the resulting status on the shadow trail.
fn commit(
    ticket: &mut MaintenanceTicket,
    actor: &AuthenticatedUser,
    action: TicketAction,
    approval_pending: bool,
    notes: Option<&str>,
    trail: &mut Vec<TicketStatus>,
) -> Result<(), WorkflowError> {
    let outcome = plan_transition(ticket, actor, action, approval_pending, notes)?;
    outcome.apply_to(ticket, Utc::now());
    trail.push(ticket.status);
    Ok(())
}

fn request_approval(
    ticket: &mut MaintenanceTicket,
    manager: &AuthenticatedUser,
    cost: BigDecimal,
    trail: &mut Vec<TicketStatus>,
) -> CostApproval {
    validate_request(manager, ticket, &cost, false).expect("approval request should be valid");
    let approval = CostApproval {
        id: Uuid::new_v4(),
        org_id: ticket.org_id,
        ticket_id: ticket.id,
        requested_by: manager.user_id,
        estimated_cost: cost,
        document_id: None,
        notes: None,
        status: ApprovalStatus::Pending,
        prior_status: ticket.status,
        reviewed_by: None,
        decided_at: None,
        denial_reason: None,
        created_at: Utc::now(),
    };
    ticket.status = TicketStatus::NeedsApproval;
    trail.push(ticket.status);
    approval
}

fn decide(
    ticket: &mut MaintenanceTicket,
    approval: &mut CostApproval,
    manager: &AuthenticatedUser,
    decision: ApprovalDecision,
    reason: Option<&str>,
    trail: &mut Vec<TicketStatus>,
) -> Result<(), WorkflowError> {
    validate_decision(manager, approval.status, decision, reason)?;
    approval.status = match decision {
        ApprovalDecision::Approve => ApprovalStatus::Approved,
        ApprovalDecision::Deny => ApprovalStatus::Denied,
    };
    approval.reviewed_by = Some(manager.user_id);
    approval.decided_at = Some(Utc::now());
    if decision == ApprovalDecision::Deny {
        approval.denial_reason = reason.map(|r| r.to_string());
    }
    ticket.status = resume_status(decision, approval.prior_status);
    trail.push(ticket.status);
    Ok(())
}

#[test]
fn scenario_a_unassigned_start_work_fails() {
    let mut ticket = make_ticket("Leaking faucet", false);
    let staff = make_actor(UserRole::Staff);
    let mut trail = Vec::new();

    let err = commit(
        &mut ticket,
        &staff,
        TicketAction::StartWork,
        false,
        None,
        &mut trail,
    )
    .unwrap_err();

    assert!(matches!(err, WorkflowError::PreconditionFailed(_)));
    assert_eq!(ticket.status, TicketStatus::Submitted);
    assert!(trail.is_empty(), "failed transitions must not append audit rows");
}

#[test]
fn scenario_b_assign_start_request_approve() {
    let mut ticket = make_ticket("Leaking faucet", false);
    let staff = make_actor(UserRole::Staff);
    let manager = make_actor(UserRole::Manager);
    let mut trail = vec![ticket.status]; // creation row

    ticket.assignee_id = Some(staff.user_id);

    commit(&mut ticket, &staff, TicketAction::StartWork, false, None, &mut trail).unwrap();
    assert_eq!(ticket.status, TicketStatus::InProgress);

    let mut approval = request_approval(&mut ticket, &manager, BigDecimal::from(500), &mut trail);
    assert_eq!(ticket.status, TicketStatus::NeedsApproval);
    assert_eq!(approval.prior_status, TicketStatus::InProgress);

    decide(
        &mut ticket,
        &mut approval,
        &manager,
        ApprovalDecision::Approve,
        None,
        &mut trail,
    )
    .unwrap();

    assert_eq!(ticket.status, TicketStatus::InProgress);
    assert_eq!(approval.status, ApprovalStatus::Approved);
    assert!(approval.decided_at.is_some());
    assert!(approval.denial_reason.is_none());

    // one row per committed operation, and the trail replays to the final state
    assert_eq!(trail.len(), 4);
    assert_eq!(*trail.last().unwrap(), ticket.status);
}

#[test]
fn scenario_c_denial_restores_pre_request_status() {
    let mut ticket = make_ticket("Leaking faucet", false);
    let staff = make_actor(UserRole::Staff);
    let manager = make_actor(UserRole::Manager);
    let mut trail = vec![ticket.status];

    ticket.assignee_id = Some(staff.user_id);
    commit(&mut ticket, &staff, TicketAction::StartWork, false, None, &mut trail).unwrap();

    let mut approval = request_approval(&mut ticket, &manager, BigDecimal::from(500), &mut trail);

    decide(
        &mut ticket,
        &mut approval,
        &manager,
        ApprovalDecision::Deny,
        Some("too expensive"),
        &mut trail,
    )
    .unwrap();

    assert_eq!(ticket.status, TicketStatus::InProgress);
    assert_eq!(approval.status, ApprovalStatus::Denied);
    assert_eq!(approval.denial_reason.as_deref(), Some("too expensive"));

    // a decided approval cannot be decided again
    let err = decide(
        &mut ticket,
        &mut approval,
        &manager,
        ApprovalDecision::Approve,
        None,
        &mut trail,
    )
    .unwrap_err();
    assert!(matches!(err, WorkflowError::PreconditionFailed(_)));
    assert_eq!(approval.status, ApprovalStatus::Denied);
}

#[test]
fn scenario_d_emergency_containment_and_close() {
    let mut ticket = make_ticket("Gas smell in basement", true);
    let manager = make_actor(UserRole::Manager);
    let mut trail = vec![ticket.status];

    // containment while submitted, no assignee required
    plan_containment(&ticket, &manager).unwrap();
    ticket.contained_at = Some(Utc::now());
    trail.push(ticket.status); // containment row, status unchanged
    assert_eq!(ticket.status, TicketStatus::Submitted);

    // emergency relaxes the assignment guard
    commit(&mut ticket, &manager, TicketAction::StartWork, false, None, &mut trail).unwrap();
    assert_eq!(ticket.status, TicketStatus::InProgress);

    commit(&mut ticket, &manager, TicketAction::Complete, false, None, &mut trail).unwrap();
    assert_eq!(ticket.status, TicketStatus::Completed);

    // closing without resolution notes must fail
    let err = commit(&mut ticket, &manager, TicketAction::Close, false, None, &mut trail)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PreconditionFailed(_)));
    assert_eq!(ticket.status, TicketStatus::Completed);

    commit(
        &mut ticket,
        &manager,
        TicketAction::Close,
        false,
        Some("shutoff valve replaced, line purged"),
        &mut trail,
    )
    .unwrap();

    assert_eq!(ticket.status, TicketStatus::Closed);
    assert!(ticket.closed_at.is_some());
    assert_eq!(
        ticket.resolution_notes.as_deref(),
        Some("shutoff valve replaced, line purged")
    );
    assert_eq!(*trail.last().unwrap(), TicketStatus::Closed);
}

#[test]
fn scenario_e_duplicate_detection_is_advisory() {
    let existing = make_ticket("AC not cooling in suite 4B", false);

    // near-identical title at the same location is flagged
    assert!(titles_match(&existing.title, "AC not cooling suite 4B"));

    // forcing creation anyway yields an independent ticket
    let forced = make_ticket("AC not cooling suite 4B", false);
    assert_ne!(existing.id, forced.id);
    assert_eq!(existing.location_id, forced.location_id);
    assert_eq!(forced.status, TicketStatus::Submitted);
}

#[test]
fn full_lifecycle_trail_replays_to_closed() {
    let mut ticket = make_ticket("Broken door closer", false);
    let staff = make_actor(UserRole::Staff);
    let manager = make_actor(UserRole::Manager);
    let mut trail = vec![ticket.status];

    ticket.assignee_id = Some(staff.user_id);
    commit(&mut ticket, &staff, TicketAction::StartWork, false, None, &mut trail).unwrap();
    commit(&mut ticket, &staff, TicketAction::Complete, false, None, &mut trail).unwrap();
    commit(&mut ticket, &manager, TicketAction::Verify, false, None, &mut trail).unwrap();
    commit(&mut ticket, &manager, TicketAction::Close, false, None, &mut trail).unwrap();

    assert_eq!(
        trail,
        vec![
            TicketStatus::Submitted,
            TicketStatus::InProgress,
            TicketStatus::Completed,
            TicketStatus::Verified,
            TicketStatus::Closed,
        ]
    );
    assert!(ticket.completed_at.is_some());
    assert!(ticket.closed_at.is_some());
}
