use super::context::{ChainState, RequestContext};
use crate::auth::Role;
use crate::error::{ApiError, AuthFailure};

/// Admit the request only when the principal's role is in `allowed`.
///
/// Pure predicate over the context: nothing is loaded or written.
pub fn authorize_role(ctx: RequestContext, allowed: &[Role]) -> Result<RequestContext, ApiError> {
    let principal = ctx
        .principal()
        .ok_or(ApiError::unauthorized(AuthFailure::MissingCredential))?;

    if !allowed.contains(&principal.role) {
        tracing::warn!("Role '{}' of {} not in {:?}", principal.role, principal.id, allowed);
        return Err(ApiError::forbidden("You do not have permission to perform this action"));
    }

    tracing::debug!("Authorized {} as '{}'", principal.id, principal.role);
    Ok(ctx.advance(ChainState::Authorized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Principal;
    use chrono::Utc;

    fn ctx_as(role: Role) -> RequestContext {
        RequestContext::anonymous().authenticated(Principal {
            id: "u-1".into(),
            role,
            credential_issued_at: Utc::now(),
        })
    }

    #[test]
    fn admits_listed_roles() {
        let ctx = authorize_role(ctx_as(Role::LeadGuide), &[Role::Admin, Role::LeadGuide]).unwrap();
        assert_eq!(ctx.state(), ChainState::Authorized);
    }

    #[test]
    fn user_is_forbidden_from_admin_actions() {
        let err = authorize_role(ctx_as(Role::User), &[Role::Admin]).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn requires_a_principal() {
        let err = authorize_role(RequestContext::anonymous(), &[Role::User]).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(AuthFailure::MissingCredential)));
    }
}
