use super::auth::{authenticate, Gate};
use super::authorize::authorize_role;
use super::context::RequestContext;
use super::scope::scope_nested_resource;
use crate::auth::Role;
use crate::error::ApiError;

/// One stage of an access policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Authenticate,
    RequireRole(Vec<Role>),
    ScopeNested {
        parent_field: &'static str,
        owner_field: &'static str,
    },
}

/// Ordered checks a request must pass before its handler runs.
/// The first failing check ends the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    checks: Vec<Check>,
}

impl AccessPolicy {
    /// No checks at all
    pub fn public() -> Self {
        Self::default()
    }

    pub fn authenticated() -> Self {
        Self { checks: vec![Check::Authenticate] }
    }

    /// Authenticate, then require one of `roles`
    pub fn restricted_to(roles: &[Role]) -> Self {
        Self {
            checks: vec![Check::Authenticate, Check::RequireRole(roles.to_vec())],
        }
    }

    pub fn then_scope(mut self, parent_field: &'static str, owner_field: &'static str) -> Self {
        self.checks.push(Check::ScopeNested { parent_field, owner_field });
        self
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn is_public(&self) -> bool {
        !self.checks.contains(&Check::Authenticate)
    }

    pub async fn run(&self, mut ctx: RequestContext, gate: &Gate<'_>) -> Result<RequestContext, ApiError> {
        for check in &self.checks {
            ctx = match check {
                Check::Authenticate => authenticate(ctx, gate).await?,
                Check::RequireRole(roles) => authorize_role(ctx, roles)?,
                Check::ScopeNested { parent_field, owner_field } => {
                    scope_nested_resource(ctx, parent_field, owner_field)?
                }
            };
        }
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_jwt, Claims};
    use crate::config::AppConfig;
    use crate::middleware::auth::PRINCIPAL_COLLECTION;
    use crate::middleware::context::ChainState;
    use crate::store::MemoryStore;
    use axum::http::{header, HeaderMap, HeaderValue};
    use serde_json::json;
    use std::time::Duration;

    async fn setup() -> (MemoryStore, AppConfig) {
        let store = MemoryStore::new();
        let users = vec![
            json!({"id": "u-user", "role": "user"}),
            json!({"id": "u-admin", "role": "admin"}),
        ];
        store
            .seed(PRINCIPAL_COLLECTION, users.into_iter().filter_map(|u| u.as_object().cloned()).collect())
            .await
            .unwrap();
        (store, AppConfig::development())
    }

    fn request(config: &AppConfig, id: &str) -> RequestContext {
        let token = generate_jwt(&Claims::new(id, 1), &config.security).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token)).unwrap());
        RequestContext::from_headers(&headers, &config.security.auth_cookie)
    }

    #[tokio::test]
    async fn public_policy_passes_anonymous_requests() {
        let (store, config) = setup().await;
        let gate = Gate { store: &store, security: &config.security, deadline: Duration::from_secs(1) };
        let ctx = AccessPolicy::public().run(RequestContext::anonymous(), &gate).await.unwrap();
        assert_eq!(ctx.state(), ChainState::Unauthenticated);
    }

    #[tokio::test]
    async fn checks_run_in_order_and_short_circuit() {
        let (store, config) = setup().await;
        let gate = Gate { store: &store, security: &config.security, deadline: Duration::from_secs(1) };
        let policy = AccessPolicy::restricted_to(&[Role::User]).then_scope("tour", "user");

        let ctx = request(&config, "u-user")
            .with_parent("t-1")
            .with_body(json!({"review": "ok"}).as_object().cloned().unwrap());
        let ctx = policy.run(ctx, &gate).await.unwrap();
        assert_eq!(ctx.state(), ChainState::Scoped);
        assert_eq!(ctx.body().unwrap()["user"], "u-user");

        // Admin fails the role check, so scoping never touches the body
        let ctx = request(&config, "u-admin").with_body(json!({}).as_object().cloned().unwrap());
        assert!(matches!(policy.run(ctx, &gate).await, Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn policy_shapes() {
        assert!(AccessPolicy::public().is_public());
        assert!(!AccessPolicy::authenticated().is_public());
        assert_eq!(AccessPolicy::restricted_to(&[Role::Admin]).checks().len(), 2);
    }
}
