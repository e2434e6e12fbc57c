//! Domain events published after each committed mutation.
//!
//! The engine only emits; delivery, retry and fan-out belong to whatever
//! subscribes to the broadcast channel on [`AppState`]. Emission happens
//! after the transaction commits, so subscribers never observe rolled-back
//! state.

use bigdecimal::BigDecimal;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::core::shared::enums::{ApprovalStatus, TicketStatus};
use crate::core::shared::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TicketEvent {
    Created {
        org_id: Uuid,
        ticket_id: Uuid,
        ticket_number: String,
        is_emergency: bool,
    },
    Assigned {
        org_id: Uuid,
        ticket_id: Uuid,
        assignee_id: Option<Uuid>,
        vendor_id: Option<Uuid>,
        actor_id: Uuid,
    },
    StatusChanged {
        org_id: Uuid,
        ticket_id: Uuid,
        status: TicketStatus,
        actor_id: Uuid,
    },
    ContainmentMarked {
        org_id: Uuid,
        ticket_id: Uuid,
        actor_id: Uuid,
    },
    ApprovalRequested {
        org_id: Uuid,
        ticket_id: Uuid,
        approval_id: Uuid,
        estimated_cost: BigDecimal,
    },
    ApprovalDecided {
        org_id: Uuid,
        ticket_id: Uuid,
        approval_id: Uuid,
        decision: ApprovalStatus,
    },
    Deleted {
        org_id: Uuid,
        ticket_id: Uuid,
        actor_id: Uuid,
    },
}

/// Fire-and-forget publish. A send error only means nobody is subscribed.
pub fn publish(state: &AppState, event: TicketEvent) {
    if state.events.send(event).is_err() {
        debug!("ticket event dropped: no active subscribers");
    }
}
