//! services/api/src/web/middleware.rs
//!
//! Identity middleware for protecting routes.
//!
//! Authentication itself happens upstream; the gateway forwards the verified
//! caller in the `x-user-id` and `x-user-role` headers.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Mentor,
}

impl Role {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" | "mahasantri" => Some(Self::Student),
            "mentor" => Some(Self::Mentor),
            _ => None,
        }
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claims {
    pub user_id: Uuid,
    pub role: Role,
}

impl Claims {
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        let user_id = Uuid::parse_str(header(USER_ID_HEADER)?.trim()).ok()?;
        let role = Role::parse(header(USER_ROLE_HEADER)?)?;
        Some(Self { user_id, role })
    }
}

/// Middleware that reads the caller's claims from the request headers.
///
/// If valid, inserts the `Claims` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_claims(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let claims = Claims::from_headers(req.headers()).ok_or_else(|| {
        warn!(path = %req.uri().path(), "request without valid identity headers");
        ApiError::Unauthorized(format!(
            "missing or invalid {USER_ID_HEADER} / {USER_ROLE_HEADER} headers"
        ))
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Middleware that only lets callers with the given role through.
///
/// Must run after [`require_claims`].
pub async fn require_role(
    State(role): State<Role>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .copied()
        .ok_or_else(|| ApiError::Unauthorized("caller identity was not resolved".to_string()))?;

    if claims.role != role {
        warn!(user_id = %claims.user_id, ?role, "caller lacks the required role");
        return Err(ApiError::Forbidden(format!("this route requires the {role:?} role")));
    }
    Ok(next.run(req).await)
}
