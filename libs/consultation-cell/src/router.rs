use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn consultation_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_consultation).get(handlers::list_consultations))
        .route("/{consultation_id}", get(handlers::get_consultation))
        .route("/{consultation_id}/status", patch(handlers::update_status))
        .route("/{consultation_id}/notes", patch(handlers::update_notes))
        .route(
            "/{consultation_id}/messages",
            post(handlers::send_message).get(handlers::list_messages),
        )
        .route("/{consultation_id}/messages/read", post(handlers::mark_messages_read))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
