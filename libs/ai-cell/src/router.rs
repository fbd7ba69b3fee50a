use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tracing::info;

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AiState};
use crate::services::DiagnosisEngine;
use crate::stub;

/// The diagnosis API, or the unavailable stub when AI is switched off or no
/// engine was built.
pub fn ai_routes(config: Arc<AppConfig>, engine: Option<Arc<DiagnosisEngine>>) -> Router {
    match engine {
        Some(engine) if config.is_ai_enabled() => enabled_routes(config, engine),
        _ => {
            info!("AI diagnosis disabled; serving stub responses");
            stub::disabled_routes()
        }
    }
}

fn enabled_routes(config: Arc<AppConfig>, engine: Arc<DiagnosisEngine>) -> Router {
    let state = AiState {
        config: config.clone(),
        engine,
    };

    let public_routes = Router::new()
        .route("/status", get(handlers::model_status))
        .route("/symptoms", get(handlers::list_symptoms));

    let protected_routes = Router::new()
        .route("/diagnose", post(handlers::diagnose))
        .route("/feedback", post(handlers::submit_feedback))
        .route("/retrain", post(handlers::retrain))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
