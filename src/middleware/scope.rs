use serde_json::Value;

use super::context::{ChainState, RequestContext};
use crate::error::ApiError;
use crate::types::Document;

/// Fill the parent reference and the owner reference of a nested create.
///
/// `parent_field` comes from the route's parent id and `owner_field` from the
/// principal. A field the caller already set is left alone; `null` counts as
/// unset. Running the stage twice yields the same body.
pub fn scope_nested_resource(
    mut ctx: RequestContext,
    parent_field: &str,
    owner_field: &str,
) -> Result<RequestContext, ApiError> {
    let parent = ctx.parent_id().map(str::to_string);
    let owner = ctx.principal().map(|p| p.id.clone());

    if let Some(body) = ctx.body_mut() {
        if let Some(parent) = parent {
            fill_absent(body, parent_field, parent);
        }
        if let Some(owner) = owner {
            fill_absent(body, owner_field, owner);
        }
    }

    tracing::debug!("Scoped nested body ({} / {})", parent_field, owner_field);
    Ok(ctx.advance(ChainState::Scoped))
}

fn fill_absent(body: &mut Document, field: &str, value: String) {
    let slot = body.entry(field.to_string()).or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::String(value);
    }
}
