//! Request identity context.
//!
//! Authentication itself happens upstream (gateway/identity provider); by the
//! time a request reaches this service it carries `x-user-id`, `x-org-id` and
//! `x-user-role` headers. The extractor parses them and rejects anything
//! malformed, so handlers always see a well-formed actor.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::enums::UserRole;

/// Authenticated actor extracted from request headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn new(user_id: Uuid, org_id: Uuid, role: UserRole) -> Self {
        Self {
            user_id,
            org_id,
            role,
        }
    }

    pub fn is_supervisor(&self) -> bool {
        self.role.is_supervisor()
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, (StatusCode, String)> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                format!("Missing or invalid {} header", name),
            )
        })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id: Uuid = header_value(parts, "x-user-id")?
            .parse()
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid x-user-id".to_string()))?;

        let org_id: Uuid = header_value(parts, "x-org-id")?
            .parse()
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid x-org-id".to_string()))?;

        let role: UserRole = header_value(parts, "x-user-role")?
            .parse()
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid x-user-role".to_string()))?;

        Ok(AuthenticatedUser::new(user_id, org_id, role))
    }
}
