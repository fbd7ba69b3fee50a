use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn call_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::initiate_call))
        .route("/active", get(handlers::get_active_call))
        .route("/admin/expire", post(handlers::expire_stale_calls))
        .route("/consultation/{consultation_id}", get(handlers::list_consultation_calls))
        .route("/{call_id}", get(handlers::get_call))
        .route("/{call_id}/accept", post(handlers::accept_call))
        .route("/{call_id}/reject", post(handlers::reject_call))
        .route("/{call_id}/end", post(handlers::end_call))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
