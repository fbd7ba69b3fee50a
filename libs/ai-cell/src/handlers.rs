use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::info;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_admin;

use crate::models::{DiagnoseRequest, FeedbackRequest};
use crate::services::{DiagnosisEngine, FeedbackService, RetrainingScheduler};

#[derive(Clone)]
pub struct AiState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<DiagnosisEngine>,
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn model_status(State(state): State<AiState>) -> Json<Value> {
    Json(json!(state.engine.status().await))
}

#[axum::debug_handler]
pub async fn list_symptoms(State(state): State<AiState>) -> Json<Value> {
    let symptoms = state.engine.symptoms().await;

    Json(json!({
        "total": symptoms.len(),
        "symptoms": symptoms
    }))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn diagnose(
    State(state): State<AiState>,
    Extension(user): Extension<User>,
    Json(request): Json<DiagnoseRequest>,
) -> Result<Json<Value>, AppError> {
    let response = state.engine.diagnose(&request).await?;

    info!(
        "Symptom check by {} returned {} suggestions",
        user.id,
        response.predictions.len()
    );
    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn submit_feedback(
    State(state): State<AiState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<FeedbackRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let feedback_service = FeedbackService::new(&state.config);

    let feedback = feedback_service.record_feedback(&user, request, auth.token()).await?;

    Ok((StatusCode::CREATED, Json(json!(feedback))))
}

#[axum::debug_handler]
pub async fn retrain(
    State(state): State<AiState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let scheduler = RetrainingScheduler::new(&state.config, state.engine.clone());
    let outcome = scheduler.run_once(Some(auth.token())).await?;

    info!("Manual retraining by {}: {:?}", user.id, outcome);
    Ok(Json(json!(outcome)))
}
