use axum::{extract::State, http::Uri, Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;

/// GET / - service banner
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    let resources: Vec<&str> = state.registry.iter().map(|d| d.name).collect();
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "resources": resources,
    }))
}

/// GET /health - store reachability
pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    let deadline = std::time::Duration::from_millis(state.config.store.deadline_ms);
    crate::store::with_deadline(deadline, state.store.health_check()).await?;
    Ok(ApiResponse::success(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
        "store": "ok",
    })))
}

/// Any route nothing else matched
pub async fn fallback(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Can't find {} on this server!", uri.path()))
}
