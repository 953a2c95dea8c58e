use serde_json::Value;
use std::time::Duration;

use super::context::RequestContext;
use crate::auth::{parse_timestamp, validate_jwt, Principal, Role};
use crate::config::SecurityConfig;
use crate::error::{ApiError, AuthFailure};
use crate::store::{with_deadline, ResourceStore};
use crate::types::Document;

/// Collection holding the user documents principals are resolved from
pub const PRINCIPAL_COLLECTION: &str = "users";

/// What the authenticate stage needs from the outside world
#[derive(Clone, Copy)]
pub struct Gate<'a> {
    pub store: &'a dyn ResourceStore,
    pub security: &'a SecurityConfig,
    pub deadline: Duration,
}

/// Verify the request's credential and resolve it to a `Principal`.
///
/// Missing, malformed, expired and tampered tokens are all `Unauthorized`;
/// a token issued before the user's last password change is
/// `Unauthorized(StaleCredential)`.
pub async fn authenticate(ctx: RequestContext, gate: &Gate<'_>) -> Result<RequestContext, ApiError> {
    let token = ctx
        .credential()
        .ok_or(ApiError::unauthorized(AuthFailure::MissingCredential))?;

    let claims = validate_jwt(token, gate.security)?;

    let user = with_deadline(gate.deadline, gate.store.find_by_id(PRINCIPAL_COLLECTION, &claims.id))
        .await?
        .filter(is_active)
        .ok_or_else(|| {
            tracing::warn!("Token names unknown or inactive user '{}'", claims.id);
            ApiError::unauthorized(AuthFailure::UnknownPrincipal)
        })?;

    if changed_password_after(&user, claims.iat) {
        return Err(ApiError::unauthorized(AuthFailure::StaleCredential));
    }

    let role = user
        .get("role")
        .and_then(Value::as_str)
        .map(str::parse::<Role>)
        .transpose()
        .map_err(|e| ApiError::internal(format!("user '{}' has {}", claims.id, e)))?
        .unwrap_or(Role::User);

    let issued_at = chrono::DateTime::from_timestamp(claims.iat, 0)
        .ok_or(ApiError::unauthorized(AuthFailure::InvalidCredential))?;

    let principal = Principal {
        id: claims.id,
        role,
        credential_issued_at: issued_at,
    };

    if gate.security.enable_audit_logging {
        tracing::info!("Authenticated principal {} ({})", principal.id, principal.role);
    } else {
        tracing::debug!("Authenticated principal {} ({})", principal.id, principal.role);
    }

    Ok(ctx.authenticated(principal))
}

fn is_active(user: &Document) -> bool {
    user.get("active").and_then(Value::as_bool).unwrap_or(true)
}

/// True when `passwordChangedAt` is later than the token's issue time (seconds)
fn changed_password_after(user: &Document, issued_at: i64) -> bool {
    user.get("passwordChangedAt")
        .and_then(parse_timestamp)
        .map_or(false, |changed| changed.timestamp() > issued_at)
}
