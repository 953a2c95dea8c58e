use axum::http::{header, HeaderMap};

use crate::auth::Principal;
use crate::types::Document;

/// Position of a request in the access-control chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Unauthenticated,
    Authenticated,
    Authorized,
    Scoped,
    Handled,
}

/// Request-scoped value threaded through every stage. Stages take it by value
/// and hand back the next context; nothing else is mutated along the way.
#[derive(Debug, Clone)]
pub struct RequestContext {
    state: ChainState,
    credential: Option<String>,
    principal: Option<Principal>,
    parent_id: Option<String>,
    body: Option<Document>,
}

impl RequestContext {
    /// Capture the bearer credential from `Authorization` or, failing that,
    /// from the cookie named `cookie_name`
    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Self {
        let credential = bearer_token(headers).or_else(|| cookie_value(headers, cookie_name));
        Self {
            state: ChainState::Unauthenticated,
            credential,
            principal: None,
            parent_id: None,
            body: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::from_headers(&HeaderMap::new(), "")
    }

    /// Id of the enclosing resource on nested routes
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_body(mut self, body: Document) -> Self {
        self.body = Some(body);
        self
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn body(&self) -> Option<&Document> {
        self.body.as_ref()
    }

    pub fn into_body(self) -> Option<Document> {
        self.body
    }

    pub(crate) fn authenticated(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self.state = ChainState::Authenticated;
        self
    }

    pub(crate) fn advance(mut self, state: ChainState) -> Self {
        self.state = state;
        self
    }

    pub(crate) fn body_mut(&mut self) -> Option<&mut Document> {
        self.body.as_mut()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
