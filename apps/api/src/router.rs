use std::sync::Arc;

use axum::{routing::get, Router};

use ai_cell::{ai_routes, DiagnosisEngine};
use auth_cell::router::auth_routes;
use call_cell::call_routes;
use consultation_cell::consultation_routes;
use doctor_cell::{doctor_application_routes, doctor_routes};
use news_cell::news_routes;
use patient_cell::create_patient_router;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>, engine: Option<Arc<DiagnosisEngine>>) -> Router {
    Router::new()
        .route("/", get(|| async { "Telecare API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/patients", create_patient_router(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/doctor-applications", doctor_application_routes(state.clone()))
        .nest("/consultations", consultation_routes(state.clone()))
        .nest("/calls", call_routes(state.clone()))
        .nest("/news", news_routes(state.clone()))
        .nest("/ai", ai_routes(state, engine))
}
