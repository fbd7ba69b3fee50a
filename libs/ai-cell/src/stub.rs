//! Responses served in place of the diagnosis pipeline while `AI_DISABLED`
//! is set.

use axum::{http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use tracing::debug;

pub const UNAVAILABLE_MESSAGE: &str = "AI diagnosis service is currently unavailable";
pub const UNAVAILABLE_CODE: &str = "AI_DISABLED";

pub async fn ai_unavailable() -> (StatusCode, Json<Value>) {
    debug!("AI request answered by disabled stub");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": UNAVAILABLE_MESSAGE,
            "code": UNAVAILABLE_CODE,
            "available": false
        })),
    )
}

pub async fn disabled_status() -> Json<Value> {
    Json(json!({
        "enabled": false,
        "status": "disabled"
    }))
}

/// Every path answers 503 except `GET /status`.
pub fn disabled_routes() -> Router {
    Router::new()
        .route("/status", get(disabled_status).fallback(ai_unavailable))
        .fallback(ai_unavailable)
}
