//! Database enum types for the maintenance schema.
//!
//! Rust enums that map to SmallInt columns instead of TEXT, so status and
//! priority values are validated at compile time and cheap to index.
//! All enums derive the traits Diesel needs for ORM integration.

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::SmallInt;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use std::io::Write;

// ============================================================================
// TICKET STATUS
// ============================================================================

/// Lifecycle status of a maintenance ticket.
///
/// `Closed` and `Rejected` are terminal; every other value can still move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum TicketStatus {
    Submitted = 0,
    InProgress = 1,
    NeedsApproval = 2,
    Completed = 3,
    Verified = 4,
    Closed = 5,
    Rejected = 6,
}

impl Default for TicketStatus {
    fn default() -> Self {
        Self::Submitted
    }
}

impl TicketStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Rejected)
    }

    /// Open means the ticket still counts for duplicate detection and
    /// dashboards: anything not closed or rejected.
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }
}

impl ToSql<SmallInt, Pg> for TicketStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let v = *self as i16;
        out.write_all(&v.to_be_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for TicketStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = i16::from_sql(bytes)?;
        match value {
            0 => Ok(Self::Submitted),
            1 => Ok(Self::InProgress),
            2 => Ok(Self::NeedsApproval),
            3 => Ok(Self::Completed),
            4 => Ok(Self::Verified),
            5 => Ok(Self::Closed),
            6 => Ok(Self::Rejected),
            _ => Err(format!("Unknown TicketStatus: {}", value).into()),
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::InProgress => write!(f, "in_progress"),
            Self::NeedsApproval => write!(f, "needs_approval"),
            Self::Completed => write!(f, "completed"),
            Self::Verified => write!(f, "verified"),
            Self::Closed => write!(f, "closed"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "submitted" => Ok(Self::Submitted),
            "in_progress" | "in-progress" => Ok(Self::InProgress),
            "needs_approval" | "needs-approval" => Ok(Self::NeedsApproval),
            "completed" => Ok(Self::Completed),
            "verified" => Ok(Self::Verified),
            "closed" => Ok(Self::Closed),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Unknown ticket status: {}", s)),
        }
    }
}

// ============================================================================
// TICKET PRIORITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum TicketPriority {
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl Default for TicketPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl ToSql<SmallInt, Pg> for TicketPriority {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let v = *self as i16;
        out.write_all(&v.to_be_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for TicketPriority {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = i16::from_sql(bytes)?;
        match value {
            0 => Ok(Self::Low),
            1 => Ok(Self::Medium),
            2 => Ok(Self::High),
            3 => Ok(Self::Critical),
            _ => Err(format!("Unknown TicketPriority: {}", value).into()),
        }
    }
}

impl std::fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for TicketPriority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Unknown ticket priority: {}", s)),
        }
    }
}

// ============================================================================
// COST APPROVAL STATUS
// ============================================================================

/// Satellite state machine for cost approvals. A row starts `Pending` and is
/// decided exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum ApprovalStatus {
    Pending = 0,
    Approved = 1,
    Denied = 2,
}

impl ToSql<SmallInt, Pg> for ApprovalStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let v = *self as i16;
        out.write_all(&v.to_be_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for ApprovalStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = i16::from_sql(bytes)?;
        match value {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Approved),
            2 => Ok(Self::Denied),
            _ => Err(format!("Unknown ApprovalStatus: {}", value).into()),
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Denied => write!(f, "denied"),
        }
    }
}

// ============================================================================
// USER ROLE
// ============================================================================

/// Role resolved by the upstream identity provider. Not persisted here; it
/// arrives with every request and gates the workflow actions.
///
/// Ordering for authorization purposes: user/staff < manager < admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Staff,
    Manager,
    Admin,
}

impl UserRole {
    /// Managers and admins may assign, verify, close, reject and decide
    /// cost approvals.
    pub fn is_supervisor(&self) -> bool {
        matches!(self, Self::Manager | Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Staff => write!(f, "staff"),
            Self::Manager => write!(f, "manager"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" | "requester" | "submitter" => Ok(Self::User),
            "staff" | "technician" => Ok(Self::Staff),
            "manager" => Ok(Self::Manager),
            "admin" | "administrator" => Ok(Self::Admin),
            _ => Err(format!("Unknown user role: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_terminal_statuses() {
        assert!(TicketStatus::Closed.is_terminal());
        assert!(TicketStatus::Rejected.is_terminal());
        assert!(!TicketStatus::Submitted.is_terminal());
        assert!(TicketStatus::NeedsApproval.is_open());
    }

    #[test]
    fn test_role_ordering() {
        assert!(!UserRole::User.is_supervisor());
        assert!(!UserRole::Staff.is_supervisor());
        assert!(UserRole::Manager.is_supervisor());
        assert!(UserRole::Admin.is_supervisor());
    }

    #[test]
    fn test_status_from_str_rejects_unknown() {
        assert!(TicketStatus::from_str("open").is_err());
        assert_eq!(
            TicketStatus::from_str("needs_approval").unwrap(),
            TicketStatus::NeedsApproval
        );
    }
}
