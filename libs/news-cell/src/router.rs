use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn news_routes(state: Arc<AppConfig>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/", get(handlers::list_news))
        .route("/{article_id}", get(handlers::get_news));

    let admin_routes = Router::new()
        .route("/", post(handlers::create_news))
        .route("/admin/all", get(handlers::list_all_news))
        .route("/{article_id}", put(handlers::update_news).delete(handlers::delete_news))
        .route("/{article_id}/publish", post(handlers::publish_news))
        .route("/{article_id}/unpublish", post(handlers::unpublish_news))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .with_state(state)
}
