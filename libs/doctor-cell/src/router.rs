use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post, put},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/search", get(handlers::search_doctors_public))
        .route("/{doctor_id}", get(handlers::get_doctor_public));

    let protected_routes = Router::new()
        .route("/{doctor_id}", put(handlers::update_doctor))
        .route("/{doctor_id}/availability", patch(handlers::set_availability))
        .route("/{doctor_id}/verify", patch(handlers::verify_doctor))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn doctor_application_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::submit_application).get(handlers::list_applications))
        .route("/mine", get(handlers::list_my_applications))
        .route("/{application_id}", get(handlers::get_application))
        .route("/{application_id}/review", post(handlers::review_application))
        .route("/{application_id}/withdraw", post(handlers::withdraw_application))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
