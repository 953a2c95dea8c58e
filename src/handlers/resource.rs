//! Axum adapters: extract the request, run the access policy for the action,
//! then hand off to `ResourceHandlers`.

use axum::{
    extract::{rejection::JsonRejection, Path, RawQuery as QueryString, State},
    http::HeaderMap,
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use super::factory::ResourceHandlers;
use crate::error::ApiError;
use crate::middleware::{AccessPolicy, ApiResult, ChainState, RequestContext};
use crate::query::RawQuery;
use crate::resource::{Action, Alias};
use crate::types::Document;

#[derive(Clone)]
pub struct ResourceState {
    pub handlers: Arc<ResourceHandlers>,
}

#[derive(Clone)]
pub struct AliasState {
    pub handlers: Arc<ResourceHandlers>,
    pub alias: Arc<Alias>,
}

fn context(handlers: &ResourceHandlers, headers: &HeaderMap) -> RequestContext {
    RequestContext::from_headers(headers, &handlers.config().security.auth_cookie)
}

async fn admit(handlers: &ResourceHandlers, policy: &AccessPolicy, ctx: RequestContext) -> Result<RequestContext, ApiError> {
    let ctx = policy.run(ctx, &handlers.gate()).await?;
    tracing::debug!("{} request admitted ({:?})", handlers.descriptor().name, ctx.state());
    Ok(ctx)
}

async fn guard(handlers: &ResourceHandlers, action: Action, ctx: RequestContext) -> Result<RequestContext, ApiError> {
    let policy = handlers
        .descriptor()
        .policy(action)
        .ok_or_else(|| ApiError::not_found("Route not found"))?;
    admit(handlers, policy, ctx).await
}

/// Split a JSON body into the document it carries or the error it earns.
/// The error is surfaced only after access checks pass.
fn json_object(payload: Result<Json<Value>, JsonRejection>) -> Result<Document, ApiError> {
    match payload {
        Ok(Json(Value::Object(doc))) => Ok(doc),
        Ok(Json(_)) => Err(ApiError::bad_request("Request body must be a JSON object")),
        Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
    }
}

fn with_payload(ctx: RequestContext, payload: &Result<Document, ApiError>) -> RequestContext {
    match payload {
        Ok(doc) => ctx.with_body(doc.clone()),
        Err(_) => ctx,
    }
}

/// Close the chain: a successful handler moves the request to `Handled`
fn handled<T>(ctx: RequestContext, result: ApiResult<T>) -> ApiResult<T>
where
    T: serde::Serialize,
{
    if result.is_ok() {
        tracing::debug!("Request handled ({:?} -> {:?})", ctx.state(), ChainState::Handled);
    }
    result
}

/// GET /api/v1/<resource>
pub async fn list(State(state): State<ResourceState>, headers: HeaderMap, QueryString(query): QueryString) -> ApiResult<Value> {
    let handlers = &state.handlers;
    let ctx = guard(handlers, Action::List, context(handlers, &headers)).await?;
    handled(ctx, handlers.get_all(RawQuery::from(query), None).await)
}

/// GET /api/v1/<resource>/<alias>
pub async fn alias_list(State(state): State<AliasState>, headers: HeaderMap, QueryString(query): QueryString) -> ApiResult<Value> {
    let handlers = &state.handlers;
    let ctx = admit(handlers, &state.alias.policy, context(handlers, &headers)).await?;
    let raw = state.alias.apply(RawQuery::from(query));
    handled(ctx, handlers.get_all(raw, None).await)
}

/// GET /api/v1/<resource>/:id
pub async fn get_one(State(state): State<ResourceState>, headers: HeaderMap, Path(id): Path<String>) -> ApiResult<Value> {
    let handlers = &state.handlers;
    let ctx = guard(handlers, Action::Get, context(handlers, &headers)).await?;
    handled(ctx, handlers.get_one(&id).await)
}

/// POST /api/v1/<resource>
pub async fn create(
    State(state): State<ResourceState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let handlers = &state.handlers;
    let payload = json_object(payload);
    let ctx = guard(handlers, Action::Create, with_payload(context(handlers, &headers), &payload)).await?;
    payload?;
    let body = ctx.body().cloned().unwrap_or_default();
    handled(ctx, handlers.create_one(body).await)
}

/// PATCH /api/v1/<resource>/:id
pub async fn update(
    State(state): State<ResourceState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let handlers = &state.handlers;
    let payload = json_object(payload);
    let ctx = guard(handlers, Action::Update, context(handlers, &headers)).await?;
    handled(ctx, handlers.update_one(&id, payload?).await)
}

/// DELETE /api/v1/<resource>/:id
pub async fn delete(State(state): State<ResourceState>, headers: HeaderMap, Path(id): Path<String>) -> ApiResult<()> {
    let handlers = &state.handlers;
    let ctx = guard(handlers, Action::Delete, context(handlers, &headers)).await?;
    handled(ctx, handlers.delete_one(&id).await)
}

/// GET /api/v1/<parent>/:id/<resource>
pub async fn nested_list(
    State(state): State<ResourceState>,
    headers: HeaderMap,
    Path(parent_id): Path<String>,
    QueryString(query): QueryString,
) -> ApiResult<Value> {
    let handlers = &state.handlers;
    let ctx = guard(handlers, Action::List, context(handlers, &headers)).await?;
    handled(ctx, handlers.get_all_nested(&parent_id, RawQuery::from(query)).await)
}

/// POST /api/v1/<parent>/:id/<resource>
pub async fn nested_create(
    State(state): State<ResourceState>,
    headers: HeaderMap,
    Path(parent_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let handlers = &state.handlers;
    let payload = json_object(payload);
    let ctx = with_payload(context(handlers, &headers).with_parent(parent_id), &payload);
    let ctx = guard(handlers, Action::Create, ctx).await?;
    payload?;
    let body = ctx.body().cloned().unwrap_or_default();
    handled(ctx, handlers.create_one(body).await)
}

/// GET /api/v1/users/me
pub async fn get_me(State(state): State<ResourceState>, headers: HeaderMap) -> ApiResult<Value> {
    let handlers = &state.handlers;
    let ctx = admit(handlers, &AccessPolicy::authenticated(), context(handlers, &headers)).await?;
    let principal = ctx
        .principal()
        .cloned()
        .ok_or_else(|| ApiError::internal("authenticated request without principal"))?;
    handled(ctx, handlers.get_me(&principal).await)
}
