use axum::{Router, routing::get};

use crate::response::{ApiResponse, ApiResult};

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> ApiResult<serde_json::Value> {
    ApiResponse::ok(serde_json::json!({ "status": "ok" }))
}
