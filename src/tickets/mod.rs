pub mod approvals;
pub mod assignment;
pub mod duplicates;
pub mod emergency;
pub mod error;
pub mod events;
pub mod history;
pub mod workflow;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::middleware::AuthenticatedUser;
use crate::core::shared::enums::{ApprovalStatus, TicketPriority, TicketStatus};
use crate::core::shared::schema::{cost_approvals, maintenance_tickets, ticket_status_history};
use crate::core::shared::state::AppState;

use approvals::ApprovalDecision;
use error::WorkflowError;
use events::TicketEvent;
use workflow::TicketAction;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = maintenance_tickets)]
pub struct MaintenanceTicket {
    pub id: Uuid,
    pub org_id: Uuid,
    pub ticket_number: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: TicketPriority,
    pub location_id: Uuid,
    pub asset_id: Option<Uuid>,
    pub is_emergency: bool,
    pub status: TicketStatus,
    pub assignee_id: Option<Uuid>,
    pub vendor_id: Option<Uuid>,
    pub requested_by: Uuid,
    pub contained_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = ticket_status_history)]
pub struct TicketStatusHistory {
    pub id: Uuid,
    pub org_id: Uuid,
    pub ticket_id: Uuid,
    pub status: TicketStatus,
    pub actor_id: Uuid,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = cost_approvals)]
pub struct CostApproval {
    pub id: Uuid,
    pub org_id: Uuid,
    pub ticket_id: Uuid,
    pub requested_by: Uuid,
    pub estimated_cost: BigDecimal,
    pub document_id: Option<Uuid>,
    pub notes: Option<String>,
    pub status: ApprovalStatus,
    pub prior_status: TicketStatus,
    pub reviewed_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub denial_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<TicketPriority>,
    pub location_id: Uuid,
    pub asset_id: Option<Uuid>,
    pub is_emergency: Option<bool>,
    pub force_create: Option<bool>,
}

/// When duplicates are found and the caller did not force, `ticket` is `None`
/// and `duplicates` carries the suspected matches. Creation is advisory-gated
/// only: retrying with `force_create` always succeeds.
#[derive(Debug, Serialize)]
pub struct CreateTicketResponse {
    pub ticket: Option<MaintenanceTicket>,
    pub duplicates: Vec<MaintenanceTicket>,
}

#[derive(Debug, Deserialize)]
pub struct AssignTicketRequest {
    pub staff_id: Option<Uuid>,
    pub vendor_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolutionRequest {
    pub resolution_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RequestApprovalRequest {
    pub estimated_cost: BigDecimal,
    pub notes: Option<String>,
    pub document_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: ApprovalDecision,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub approval: CostApproval,
    pub ticket: MaintenanceTicket,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub location_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub vendor_id: Option<Uuid>,
    pub is_emergency: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DuplicateQuery {
    pub location_id: Uuid,
    pub asset_id: Option<Uuid>,
    pub title: String,
}

pub(crate) fn load_ticket(
    conn: &mut PgConnection,
    org_id: Uuid,
    ticket_id: Uuid,
) -> Result<MaintenanceTicket, WorkflowError> {
    maintenance_tickets::table
        .filter(maintenance_tickets::id.eq(ticket_id))
        .filter(maintenance_tickets::org_id.eq(org_id))
        .filter(maintenance_tickets::deleted_at.is_null())
        .first::<MaintenanceTicket>(conn)
        .optional()?
        .ok_or(WorkflowError::NotFound("ticket"))
}

fn generate_ticket_number(
    conn: &mut PgConnection,
    org_id: Uuid,
) -> Result<String, WorkflowError> {
    let count: i64 = maintenance_tickets::table
        .filter(maintenance_tickets::org_id.eq(org_id))
        .count()
        .get_result(conn)?;
    Ok(format!("MNT-{:06}", count + 1))
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Json(req): Json<CreateTicketRequest>,
) -> Result<Json<CreateTicketResponse>, WorkflowError> {
    if req.title.trim().is_empty() {
        return Err(WorkflowError::Validation(
            "title must not be blank".to_string(),
        ));
    }

    let mut conn = state.conn.get()?;

    if !req.force_create.unwrap_or(false) {
        let duplicates = duplicates::find_duplicates(
            &mut conn,
            actor.org_id,
            req.location_id,
            req.asset_id,
            &req.title,
        )?;
        if !duplicates.is_empty() {
            return Ok(Json(CreateTicketResponse {
                ticket: None,
                duplicates,
            }));
        }
    }

    let ticket = conn.transaction::<_, WorkflowError, _>(|conn| {
        let now = Utc::now();
        let ticket = MaintenanceTicket {
            id: Uuid::new_v4(),
            org_id: actor.org_id,
            ticket_number: generate_ticket_number(conn, actor.org_id)?,
            title: req.title,
            description: req.description,
            category: req.category,
            priority: req.priority.unwrap_or_default(),
            location_id: req.location_id,
            asset_id: req.asset_id,
            is_emergency: req.is_emergency.unwrap_or(false),
            status: TicketStatus::Submitted,
            assignee_id: None,
            vendor_id: None,
            requested_by: actor.user_id,
            contained_at: None,
            resolution_notes: None,
            completed_at: None,
            closed_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };

        diesel::insert_into(maintenance_tickets::table)
            .values(&ticket)
            .execute(conn)?;

        history::append(conn, &ticket, actor.user_id, Some("ticket created".to_string()))?;

        Ok(ticket)
    })?;

    events::publish(
        &state,
        TicketEvent::Created {
            org_id: ticket.org_id,
            ticket_id: ticket.id,
            ticket_number: ticket.ticket_number.clone(),
            is_emergency: ticket.is_emergency,
        },
    );

    Ok(Json(CreateTicketResponse {
        ticket: Some(ticket),
        duplicates: Vec::new(),
    }))
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<MaintenanceTicket>>, WorkflowError> {
    let mut conn = state.conn.get()?;

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let offset = query.offset.unwrap_or(0).max(0);

    let mut q = maintenance_tickets::table
        .filter(maintenance_tickets::org_id.eq(actor.org_id))
        .filter(maintenance_tickets::deleted_at.is_null())
        .into_boxed();

    if let Some(status) = query.status {
        q = q.filter(maintenance_tickets::status.eq(status));
    }
    if let Some(priority) = query.priority {
        q = q.filter(maintenance_tickets::priority.eq(priority));
    }
    if let Some(location_id) = query.location_id {
        q = q.filter(maintenance_tickets::location_id.eq(location_id));
    }
    if let Some(assignee_id) = query.assignee_id {
        q = q.filter(maintenance_tickets::assignee_id.eq(assignee_id));
    }
    if let Some(vendor_id) = query.vendor_id {
        q = q.filter(maintenance_tickets::vendor_id.eq(vendor_id));
    }
    if let Some(is_emergency) = query.is_emergency {
        q = q.filter(maintenance_tickets::is_emergency.eq(is_emergency));
    }

    let tickets: Vec<MaintenanceTicket> = q
        .order(maintenance_tickets::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)?;

    Ok(Json(tickets))
}

pub async fn probe_duplicates(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Query(query): Query<DuplicateQuery>,
) -> Result<Json<Vec<MaintenanceTicket>>, WorkflowError> {
    let mut conn = state.conn.get()?;
    let duplicates = duplicates::find_duplicates(
        &mut conn,
        actor.org_id,
        query.location_id,
        query.asset_id,
        &query.title,
    )?;
    Ok(Json(duplicates))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MaintenanceTicket>, WorkflowError> {
    let mut conn = state.conn.get()?;
    let ticket = load_ticket(&mut conn, actor.org_id, id)?;
    Ok(Json(ticket))
}

/// Soft delete: the row is tombstoned, never removed, and its audit trail
/// stays intact.
pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, WorkflowError> {
    if !actor.is_supervisor() {
        return Err(WorkflowError::Forbidden(
            "delete requires a manager or admin".to_string(),
        ));
    }

    let mut conn = state.conn.get()?;
    let now = Utc::now();

    let updated = diesel::update(
        maintenance_tickets::table
            .filter(maintenance_tickets::id.eq(id))
            .filter(maintenance_tickets::org_id.eq(actor.org_id))
            .filter(maintenance_tickets::deleted_at.is_null()),
    )
    .set((
        maintenance_tickets::deleted_at.eq(Some(now)),
        maintenance_tickets::updated_at.eq(now),
    ))
    .execute(&mut conn)?;

    if updated == 0 {
        return Err(WorkflowError::NotFound("ticket"));
    }

    events::publish(
        &state,
        TicketEvent::Deleted {
            org_id: actor.org_id,
            ticket_id: id,
            actor_id: actor.user_id,
        },
    );

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_ticket_history(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TicketStatusHistory>>, WorkflowError> {
    let mut conn = state.conn.get()?;
    let entries = history::list_for_ticket(&mut conn, actor.org_id, id)?;
    Ok(Json(entries))
}

pub async fn assign_ticket(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignTicketRequest>,
) -> Result<Json<MaintenanceTicket>, WorkflowError> {
    let mut conn = state.conn.get()?;
    let ticket = assignment::assign(&mut conn, &actor, id, req.staff_id, req.vendor_id)?;

    events::publish(
        &state,
        TicketEvent::Assigned {
            org_id: ticket.org_id,
            ticket_id: ticket.id,
            assignee_id: ticket.assignee_id,
            vendor_id: ticket.vendor_id,
            actor_id: actor.user_id,
        },
    );

    Ok(Json(ticket))
}

fn run_action(
    state: &Arc<AppState>,
    actor: &AuthenticatedUser,
    ticket_id: Uuid,
    action: TicketAction,
    resolution_notes: Option<String>,
) -> Result<Json<MaintenanceTicket>, WorkflowError> {
    let mut conn = state.conn.get()?;
    let ticket = workflow::apply_action(&mut conn, actor, ticket_id, action, resolution_notes)?;

    events::publish(
        state,
        TicketEvent::StatusChanged {
            org_id: ticket.org_id,
            ticket_id: ticket.id,
            status: ticket.status,
            actor_id: actor.user_id,
        },
    );

    Ok(Json(ticket))
}

pub async fn start_work(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MaintenanceTicket>, WorkflowError> {
    run_action(&state, &actor, id, TicketAction::StartWork, None)
}

pub async fn complete_ticket(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
    req: Option<Json<ResolutionRequest>>,
) -> Result<Json<MaintenanceTicket>, WorkflowError> {
    let notes = req.and_then(|Json(r)| r.resolution_notes);
    run_action(&state, &actor, id, TicketAction::Complete, notes)
}

pub async fn verify_ticket(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MaintenanceTicket>, WorkflowError> {
    run_action(&state, &actor, id, TicketAction::Verify, None)
}

pub async fn close_ticket(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
    req: Option<Json<ResolutionRequest>>,
) -> Result<Json<MaintenanceTicket>, WorkflowError> {
    let notes = req.and_then(|Json(r)| r.resolution_notes);
    run_action(&state, &actor, id, TicketAction::Close, notes)
}

pub async fn reject_ticket(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MaintenanceTicket>, WorkflowError> {
    run_action(&state, &actor, id, TicketAction::Reject, None)
}

pub async fn contain_ticket(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MaintenanceTicket>, WorkflowError> {
    let mut conn = state.conn.get()?;
    let ticket = emergency::mark_contained(&mut conn, &actor, id)?;

    events::publish(
        &state,
        TicketEvent::ContainmentMarked {
            org_id: ticket.org_id,
            ticket_id: ticket.id,
            actor_id: actor.user_id,
        },
    );

    Ok(Json(ticket))
}

pub async fn request_ticket_approval(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<RequestApprovalRequest>,
) -> Result<Json<ApprovalResponse>, WorkflowError> {
    let mut conn = state.conn.get()?;
    let (approval, ticket) = approvals::request_approval(
        &mut conn,
        &actor,
        id,
        req.estimated_cost,
        req.notes,
        req.document_id,
    )?;

    events::publish(
        &state,
        TicketEvent::ApprovalRequested {
            org_id: approval.org_id,
            ticket_id: approval.ticket_id,
            approval_id: approval.id,
            estimated_cost: approval.estimated_cost.clone(),
        },
    );

    Ok(Json(ApprovalResponse { approval, ticket }))
}

pub async fn list_ticket_approvals(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CostApproval>>, WorkflowError> {
    let mut conn = state.conn.get()?;
    let list = approvals::list_for_ticket(&mut conn, actor.org_id, id)?;
    Ok(Json(list))
}

pub async fn decide_approval(
    State(state): State<Arc<AppState>>,
    actor: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<ApprovalResponse>, WorkflowError> {
    let mut conn = state.conn.get()?;
    let (approval, ticket) = approvals::decide(&mut conn, &actor, id, req.decision, req.reason)?;

    events::publish(
        &state,
        TicketEvent::ApprovalDecided {
            org_id: approval.org_id,
            ticket_id: approval.ticket_id,
            approval_id: approval.id,
            decision: approval.status,
        },
    );

    Ok(Json(ApprovalResponse { approval, ticket }))
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/duplicates", get(probe_duplicates))
        .route("/api/tickets/:id", get(get_ticket).delete(delete_ticket))
        .route("/api/tickets/:id/history", get(list_ticket_history))
        .route("/api/tickets/:id/assign", put(assign_ticket))
        .route("/api/tickets/:id/start", put(start_work))
        .route("/api/tickets/:id/complete", put(complete_ticket))
        .route("/api/tickets/:id/verify", put(verify_ticket))
        .route("/api/tickets/:id/close", put(close_ticket))
        .route("/api/tickets/:id/reject", put(reject_ticket))
        .route("/api/tickets/:id/contain", put(contain_ticket))
        .route(
            "/api/tickets/:id/approvals",
            get(list_ticket_approvals).post(request_ticket_approval),
        )
        .route("/api/approvals/:id/decision", put(decide_approval))
}
