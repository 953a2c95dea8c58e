use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::ApiError;

/// Success envelope: `{status: "success", results?, data}`
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub results: Option<usize>,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 with the default envelope
    pub fn success(data: T) -> Self {
        Self {
            data,
            results: None,
            status_code: None,
        }
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            results: None,
            status_code: Some(status_code),
        }
    }

    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }

    /// 204 with no body
    pub fn no_content() -> ApiResponse<()> {
        ApiResponse::with_status((), StatusCode::NO_CONTENT)
    }
}

impl ApiResponse<Value> {
    /// `data: {<key>: item}`
    pub fn keyed(key: &str, item: impl Into<Value>) -> Self {
        let mut data = Map::new();
        data.insert(key.to_string(), item.into());
        Self::success(Value::Object(data))
    }

    /// `results: n, data: {<key>: [...]}`
    pub fn list(key: &str, items: Vec<Value>) -> Self {
        let count = items.len();
        let mut response = Self::keyed(key, Value::Array(items));
        response.results = Some(count);
        response
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        if status == StatusCode::NO_CONTENT {
            return status.into_response();
        }

        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                return ApiError::internal(format!("Failed to serialize response data: {}", e)).into_response();
            }
        };

        let mut envelope = json!({ "status": "success" });
        if let Some(results) = self.results {
            envelope["results"] = json!(results);
        }
        envelope["data"] = data_value;

        (status, Json(envelope)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;
